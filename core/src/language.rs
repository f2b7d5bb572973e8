use serde::{Deserialize, Serialize};

use crate::serdable::GlobPattern;

/// `[[language]]` entry of `cvj.toml`.
///
/// `pattern` selects both the problem template (`function.cpp`) and, in the CLI,
/// the language of a code file. Commands may use `#{sourceFile}`, `#{sourceStem}`,
/// `#{sourcePath}` and `#{workDir}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Language {
    pub name: String,
    pub pattern: GlobPattern,
    pub source_file: String,
    pub compile: Option<String>,
    pub run: String,
}

impl Language {
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }
}

pub trait LanguageList {
    fn find_by_name(&self, name: &str) -> Option<&Language>;
    fn find_for_filename(&self, filename: &str) -> Option<&Language>;
}

impl LanguageList for [Language] {
    fn find_by_name(&self, name: &str) -> Option<&Language> {
        self.iter().find(|l| l.name.eq_ignore_ascii_case(name))
    }

    fn find_for_filename(&self, filename: &str) -> Option<&Language> {
        self.iter().find(|l| l.pattern.matches(filename))
    }
}
