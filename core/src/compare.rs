use serde::{Deserialize, Serialize};

/// How expected and actual output are normalized before exact comparison.
///
/// Fixed per problem (`[compare]` in `problem.toml`); it defines what "correct" means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComparePolicy {
    /// `\r\n` and lone `\r` become `\n`.
    pub normalize_line_endings: bool,
    /// Spaces and tabs at the end of every line are dropped.
    pub trim_trailing_whitespace: bool,
    /// Empty lines at the end of the output are dropped, as is the final newline.
    pub trim_trailing_blank_lines: bool,
    /// Every whitespace character is dropped. Implies the two options above.
    pub ignore_all_whitespace: bool,
}

impl Default for ComparePolicy {
    fn default() -> Self {
        Self {
            normalize_line_endings: true,
            trim_trailing_whitespace: true,
            trim_trailing_blank_lines: true,
            ignore_all_whitespace: false,
        }
    }
}

impl ComparePolicy {
    pub const EXACT: Self = Self {
        normalize_line_endings: false,
        trim_trailing_whitespace: false,
        trim_trailing_blank_lines: false,
        ignore_all_whitespace: false,
    };

    pub fn normalize(&self, text: &str) -> String {
        if self.ignore_all_whitespace {
            return text.chars().filter(|c| !c.is_whitespace()).collect();
        }

        let text = if self.normalize_line_endings {
            text.replace("\r\n", "\n").replace('\r', "\n")
        } else {
            text.to_owned()
        };

        let mut out = if self.trim_trailing_whitespace {
            let mut s = String::with_capacity(text.len());
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    s.push('\n');
                }
                s.push_str(line.trim_end_matches([' ', '\t']));
            }
            s
        } else {
            text
        };

        if self.trim_trailing_blank_lines {
            let keep = out.trim_end_matches('\n').len();
            out.truncate(keep);
        }
        out
    }

    pub fn compare(&self, expected: &str, actual: &str) -> bool {
        self.normalize(expected) == self.normalize(actual)
    }
}

pub fn compare(expected: &str, actual: &str, policy: &ComparePolicy) -> bool {
    policy.compare(expected, actual)
}

#[cfg(test)]
mod test {
    use super::*;

    const ALL: [ComparePolicy; 4] = [
        ComparePolicy::EXACT,
        ComparePolicy {
            normalize_line_endings: true,
            trim_trailing_whitespace: true,
            trim_trailing_blank_lines: true,
            ignore_all_whitespace: false,
        },
        ComparePolicy {
            normalize_line_endings: false,
            trim_trailing_whitespace: true,
            trim_trailing_blank_lines: false,
            ignore_all_whitespace: false,
        },
        ComparePolicy {
            normalize_line_endings: true,
            trim_trailing_whitespace: true,
            trim_trailing_blank_lines: true,
            ignore_all_whitespace: true,
        },
    ];

    #[test]
    fn default_policy() {
        let p = ComparePolicy::default();
        assert!(p.compare("7", "7\n"));
        assert!(p.compare("7\n", "7  \n\n\n"));
        assert!(p.compare("1 2\n3 4\n", "1 2 \r\n3 4\t\r\n"));
        assert!(!p.compare("7", "8"));
        assert!(!p.compare("1 2", "1  2"));
        assert!(!p.compare("1\n2", "1\n\n2"));
        assert!(!p.compare("x", " x"));
    }

    #[test]
    fn exact_policy() {
        let p = ComparePolicy::EXACT;
        assert!(p.compare("hello_123\n", "hello_123\n"));
        assert!(!p.compare("hello_123\n", "hello_123"));
        assert!(!p.compare("a\n", "a \n"));
    }

    #[test]
    fn ignore_all_whitespace() {
        let p = ComparePolicy {
            ignore_all_whitespace: true,
            ..Default::default()
        };
        assert!(p.compare("1 2 3\n", "1\n2\n3"));
        assert!(p.compare("123", "1 2 3"));
        assert!(!p.compare("123", "1 2 4"));
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "",
            "\n",
            "7",
            "7\n",
            "a \t\r\nb\r\n\r\n",
            "  lead\n\n mid \n\ntail  \t\n\n",
            "\r\r\n\n x",
        ];
        for p in ALL {
            for s in samples {
                let once = p.normalize(s);
                assert_eq!(p.normalize(&once), once, "policy={:?} s={:?}", p, s);
            }
            for a in samples {
                for b in samples {
                    assert_eq!(
                        p.compare(a, b),
                        p.compare(&p.normalize(a), &p.normalize(b)),
                        "policy={:?} a={:?} b={:?}",
                        p,
                        a,
                        b
                    );
                }
            }
        }
    }

    #[test]
    fn deserialize_partial() {
        let p: ComparePolicy = toml::from_str("ignore_all_whitespace = true").unwrap();
        assert!(p.ignore_all_whitespace);
        assert!(p.trim_trailing_whitespace);
        assert!(toml::from_str::<ComparePolicy>("unknown = 1").is_err());
    }
}
