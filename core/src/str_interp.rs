//! `#{name}` expansion for configured compile/run commands.
//!
//! `##` yields a literal `#`, so `##{x}` is the text `#{x}`.

use std::{borrow::Borrow, collections::HashMap, hash::Hash};

pub type Result = std::result::Result<String, InterpError>;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    #[error("Undefined variable '{0}' at column {}", .1+1)]
    UndefinedVar(String, usize),

    #[error("Unclosed brace (opened at column {})", .0+1)]
    UnclosedBrace(usize),
}

pub fn interp<K, V>(fmt: &str, variables: &HashMap<K, V>) -> Result
where
    K: Borrow<str> + Hash + Eq,
    V: AsRef<str>,
{
    let mut res = String::with_capacity(fmt.len() * 2);
    let mut chars = fmt.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if c != '#' {
            res.push(c);
            continue;
        }
        match chars.peek() {
            Some((_, '#')) => {
                chars.next();
                res.push('#');
            }
            Some((_, '{')) => {
                chars.next();
                let name_start = i + 2;
                let Some((name_end, _)) = chars.by_ref().find(|&(_, c)| c == '}') else {
                    return Err(InterpError::UnclosedBrace(i));
                };
                let name = &fmt[name_start..name_end];
                let Some(value) = variables.get(name) else {
                    return Err(InterpError::UndefinedVar(name.to_owned(), i));
                };
                res.push_str(value.as_ref());
            }
            _ => res.push('#'),
        }
    }

    res.shrink_to_fit();
    Ok(res)
}

/// Quotes `s` for a POSIX shell when it contains anything besides `[A-Za-z0-9_./-]`.
pub fn shell_quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '/' | '-'));
    if plain {
        s.to_owned()
    } else {
        // terminate ' , emit an escaped ' , reopen '
        format!("'{}'", s.replace('\'', r#"'\''"#))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use maplit::hashmap;

    #[test]
    fn interp_ok() {
        let vars = hashmap! {
            "sourceFile" => "Main.java",
            "workDir" => "/tmp/cvj-x",
            "sourceStem" => "Main",
        };

        assert_eq!(interp("javac #{sourceFile}", &vars).unwrap(), "javac Main.java");
        assert_eq!(
            interp("java -cp #{workDir} #{sourceStem}", &vars).unwrap(),
            "java -cp /tmp/cvj-x Main"
        );
        assert_eq!(interp("#{sourceStem}#{sourceStem}", &vars).unwrap(), "MainMain");
        assert_eq!(interp("no vars", &vars).unwrap(), "no vars");
        assert_eq!(interp("{sourceFile}", &vars).unwrap(), "{sourceFile}");
        assert_eq!(interp("# {sourceFile}", &vars).unwrap(), "# {sourceFile}");
        assert_eq!(interp("##{sourceFile}", &vars).unwrap(), "#{sourceFile}");
        assert_eq!(interp("#", &vars).unwrap(), "#");
        assert_eq!(interp("##", &vars).unwrap(), "#");
        assert_eq!(interp("###", &vars).unwrap(), "##");
        assert_eq!(interp("a#b", &vars).unwrap(), "a#b");
    }

    #[test]
    fn interp_ng() {
        let vars = hashmap! { "workDir" => "/w" };
        assert_eq!(
            interp("g++ #{sourceFile}", &vars).unwrap_err(),
            InterpError::UndefinedVar("sourceFile".to_owned(), 4)
        );
        assert_eq!(
            interp("#{workDir} #{oops", &vars).unwrap_err(),
            InterpError::UnclosedBrace(11)
        );
    }

    #[test]
    fn quote() {
        assert_eq!(shell_quote("/tmp/cvj-1/main.cpp"), "/tmp/cvj-1/main.cpp");
        assert_eq!(shell_quote("a b"), "'a b'");
        assert_eq!(shell_quote("it's"), r#"'it'\''s'"#);
        assert_eq!(shell_quote(""), "''");
    }
}
