use std::{
    cmp::Ordering,
    path::{Path, PathBuf},
};

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCase {
    pub name: String,
    pub input: String,
    pub expected_output: String,
}

impl TestCase {
    pub fn new(
        name: impl Into<String>,
        input: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            input: input.into(),
            expected_output: expected_output.into(),
        }
    }

    /// Pairs `<inputs_dir>/<stem>.txt` with `<outputs_dir>/<stem>.txt`.
    ///
    /// Ordered by numeric stem (`2` before `10`), then other stems by name.
    pub fn enumerate(
        inputs_dir: impl AsRef<Path>,
        outputs_dir: impl AsRef<Path>,
    ) -> fsutil::Result<Vec<Self>> {
        let mut pairs: Vec<(String, PathBuf, PathBuf)> = Vec::new();

        for input_path in fsutil::list_files(&inputs_dir)? {
            if input_path.extension().map_or(true, |ext| ext != "txt") {
                continue;
            }
            let Some(stem) = input_path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue
            };
            let output_path = outputs_dir.as_ref().join(format!("{}.txt", stem));
            if !output_path.is_file() {
                log::warn!(
                    "Skip testcase '{}': no expected output at {}",
                    stem,
                    output_path.to_string_lossy()
                );
                continue;
            }
            pairs.push((stem, input_path, output_path));
        }
        pairs.sort_by(|a, b| cmp_case_names(&a.0, &b.0));

        pairs
            .into_iter()
            .map(|(name, input, output)| {
                Ok(Self {
                    name,
                    input: fsutil::read_to_string(input)?,
                    expected_output: fsutil::read_to_string(output)?,
                })
            })
            .collect()
    }
}

fn cmp_case_names(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
