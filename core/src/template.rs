use std::fmt;

pub const DEFAULT_PLACEHOLDER: &str = "##USER_CODE_HERE##";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("Malformed template '{name}': placeholder '{placeholder}' must appear exactly once (found {count})")]
    MalformedTemplate {
        name: String,
        placeholder: String,
        count: usize,
    },

    #[error("Submitted code contains the reserved marker '{0}'")]
    PlaceholderInCode(String),
}

/// A language-specific scaffold with a single insertion point for learner code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    name: String,
    text: String,
    placeholder: String,
}

/// Complete program text produced by [`Template::splice`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSource(String);

impl Template {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_placeholder(name, text, DEFAULT_PLACEHOLDER)
    }

    pub fn with_placeholder(
        name: impl Into<String>,
        text: impl Into<String>,
        placeholder: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            placeholder: placeholder.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn placeholder_count(&self) -> usize {
        if self.placeholder.is_empty() {
            return 0;
        }
        self.text.matches(self.placeholder.as_str()).count()
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        match self.placeholder_count() {
            1 => Ok(()),
            count => Err(TemplateError::MalformedTemplate {
                name: self.name.clone(),
                placeholder: self.placeholder.clone(),
                count,
            }),
        }
    }

    pub fn splice(&self, user_code: &str) -> Result<ProgramSource, TemplateError> {
        self.validate()?;
        if user_code.contains(self.placeholder.as_str()) {
            return Err(TemplateError::PlaceholderInCode(self.placeholder.clone()));
        }
        let Some((head, tail)) = self.text.split_once(self.placeholder.as_str()) else {
            unreachable!("placeholder count was validated")
        };

        let mut src = String::with_capacity(head.len() + user_code.len() + tail.len());
        src.push_str(head);
        src.push_str(user_code);
        src.push_str(tail);
        Ok(ProgramSource(src))
    }
}

/// Splices `user_code` into `template` using the default placeholder.
pub fn splice(template: &str, user_code: &str) -> Result<String, TemplateError> {
    Template::new("<inline>", template)
        .splice(user_code)
        .map(ProgramSource::into_string)
}

impl ProgramSource {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<[u8]> for ProgramSource {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for ProgramSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
