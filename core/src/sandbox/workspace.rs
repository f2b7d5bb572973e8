use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
};

use tempfile::TempDir;

use crate::{
    str_interp::{interp, shell_quote, InterpError},
    template::ProgramSource,
};

/// Fresh directory holding one submission's source and build artefacts; removed on drop.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    source_path: PathBuf,
}

impl Workspace {
    const PREFIX: &str = "cvj-";

    pub fn create(
        root: Option<&Path>,
        source_file: &str,
        source: &ProgramSource,
    ) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(Self::PREFIX);
        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };

        let source_path = dir.path().join(source_file);
        fsutil::write(&source_path, source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        log::debug!("Created workspace {}", dir.path().to_string_lossy());

        Ok(Self { dir, source_path })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Expands `#{sourceFile}`, `#{sourcePath}`, `#{sourceStem}` and `#{workDir}`, shell-quoted.
    pub fn command(&self, fmt: &str) -> Result<String, InterpError> {
        interp(fmt, &self.interp_vars())
    }

    fn interp_vars(&self) -> HashMap<&'static str, String> {
        let name = |p: Option<&std::ffi::OsStr>| {
            shell_quote(&p.unwrap_or_default().to_string_lossy())
        };
        let mut m = HashMap::new();
        m.insert("sourceFile", name(self.source_path.file_name()));
        m.insert("sourceStem", name(self.source_path.file_stem()));
        m.insert(
            "sourcePath",
            shell_quote(&self.source_path.to_string_lossy()),
        );
        m.insert("workDir", shell_quote(&self.dir().to_string_lossy()));
        m
    }
}
