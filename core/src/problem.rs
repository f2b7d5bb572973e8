pub mod testcase;

use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use testcase::TestCase;

use crate::{
    compare::ComparePolicy,
    language::Language,
    sandbox::LimitsOverride,
    template::{Template, DEFAULT_PLACEHOLDER},
};

#[derive(Debug, thiserror::Error)]
pub enum ProblemError {
    #[error("Problem not found: {0}")]
    NotFound(PathBuf),

    #[error(transparent)]
    Fs(#[from] fsutil::Error),

    #[error("Invalid {path}: {source}")]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Problem '{0}' has no testcases")]
    NoTestcases(String),
}

/// `problem.toml`; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProblemManifest {
    pub id: Option<String>,
    pub title: Option<String>,
    pub placeholder: Option<String>,
    pub compare: ComparePolicy,
    pub limits: LimitsOverride,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    pub id: String,
    pub title: String,
    pub templates: Vec<Template>,
    pub testcases: Vec<TestCase>,
    pub compare: ComparePolicy,
    pub limits: LimitsOverride,
}

impl Problem {
    pub const MANIFEST_FILENAME: &str = "problem.toml";
    pub const TEMPLATE_DIR_NAME: &str = "boilerplate-full";
    pub const INPUTS_DIR: &str = "tests/inputs";
    pub const OUTPUTS_DIR: &str = "tests/outputs";

    pub fn new(id: impl Into<String>, templates: Vec<Template>, testcases: Vec<TestCase>) -> Self {
        let id = id.into();
        Self {
            title: title_from_id(&id),
            id,
            templates,
            testcases,
            compare: ComparePolicy::default(),
            limits: LimitsOverride::default(),
        }
    }

    /// Loads `<dir>/problem.toml`, `<dir>/boilerplate-full/*` and `<dir>/tests/{inputs,outputs}/*.txt`.
    ///
    /// Malformed templates are logged but still loaded; grading against one is an internal error.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ProblemError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(ProblemError::NotFound(dir.to_owned()));
        }

        let manifest_path = dir.join(Self::MANIFEST_FILENAME);
        let manifest = match fsutil::read_to_string_if_exists(&manifest_path)? {
            Some(toml) => toml::from_str::<ProblemManifest>(&toml).map_err(|source| {
                ProblemError::Manifest {
                    path: manifest_path.clone(),
                    source,
                }
            })?,
            None => ProblemManifest::default(),
        };

        let id = manifest.id.clone().unwrap_or_else(|| {
            dir.file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unnamed".to_owned())
        });
        let placeholder = manifest
            .placeholder
            .as_deref()
            .unwrap_or(DEFAULT_PLACEHOLDER);

        let mut templates = Vec::new();
        for path in fsutil::list_files(dir.join(Self::TEMPLATE_DIR_NAME))? {
            let name = path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let t = Template::with_placeholder(name, fsutil::read_to_string(&path)?, placeholder);
            if let Err(e) = t.validate() {
                log::error!("{} (problem '{}')", e, id);
            }
            templates.push(t);
        }

        let testcases =
            TestCase::enumerate(dir.join(Self::INPUTS_DIR), dir.join(Self::OUTPUTS_DIR))?;
        if testcases.is_empty() {
            return Err(ProblemError::NoTestcases(id));
        }

        log::debug!(
            "Loaded problem '{}': {} templates, {} testcases",
            id,
            templates.len(),
            testcases.len()
        );
        Ok(Self {
            title: manifest.title.unwrap_or_else(|| title_from_id(&id)),
            id,
            templates,
            testcases,
            compare: manifest.compare,
            limits: manifest.limits,
        })
    }

    pub fn template_for(&self, lang: &Language) -> Option<&Template> {
        self.templates
            .iter()
            .find(|t| lang.pattern.matches(t.name()))
    }
}

/// `two-sum` => `Two Sum`
fn title_from_id(id: &str) -> String {
    id.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut cs = w.chars();
            match cs.next() {
                Some(c) => c.to_uppercase().chain(cs).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
