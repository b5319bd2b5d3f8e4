use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path escapes the root: {0}")]
    EscapesRoot(String),
    #[error("invalid wildcard pattern: {0}")]
    Wildcard(String),
}

/// Normalizes a slash-delimited path into its absolute form: `/` or
/// `/a/b` with no empty, `.` or `..` components left over.
pub fn normalize(path: &str) -> Result<String, PathError> {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => continue,
            ".." => {
                if parts.pop().is_none() {
                    return Err(PathError::EscapesRoot(path.to_string()));
                }
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Ok("/".to_string());
    }
    let mut out = String::with_capacity(path.len() + 1);
    for part in parts {
        out.push('/');
        out.push_str(part);
    }
    Ok(out)
}

/// Appends a single name to a normalized directory path.
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// True when `path` lies strictly below `ancestor`.
pub fn is_descendant(ancestor: &str, path: &str) -> bool {
    if ancestor == "/" {
        return path != "/";
    }
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.starts_with('/'))
}

/// Every non-root prefix of `path`, shallowest first, ending with `path`
/// itself: `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`.
pub fn lineage(path: &str) -> Vec<&str> {
    path.match_indices('/')
        .skip(1)
        .map(|(idx, _)| &path[..idx])
        .chain((path != "/").then_some(path))
        .collect()
}

/// Shell-style wildcard (`*`, `?`, `[...]`) compiled to an anchored regex.
#[derive(Debug, Clone)]
pub struct Wildcard {
    regex: Regex,
}

impl Wildcard {
    pub fn new(pattern: &str) -> Result<Self, PathError> {
        let mut expr = String::with_capacity(pattern.len() * 2 + 2);
        expr.push('^');
        let mut chars = pattern.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                '[' => {
                    let mut class = String::new();
                    let mut closed = false;
                    if chars.peek() == Some(&'!') {
                        chars.next();
                        class.push('^');
                    }
                    for inner in chars.by_ref() {
                        if inner == ']' {
                            closed = true;
                            break;
                        }
                        if matches!(inner, '\\' | '[' | '^' | '&' | '~') {
                            class.push('\\');
                        }
                        class.push(inner);
                    }
                    if closed {
                        expr.push('[');
                        expr.push_str(&class);
                        expr.push(']');
                    } else {
                        expr.push_str(&regex::escape("["));
                        expr.push_str(&regex::escape(&class));
                    }
                }
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');
        let regex = Regex::new(&expr).map_err(|_| PathError::Wildcard(pattern.to_string()))?;
        Ok(Self { regex })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_components() {
        assert_eq!(normalize("").unwrap(), "/");
        assert_eq!(normalize("/").unwrap(), "/");
        assert_eq!(normalize("a/b/").unwrap(), "/a/b");
        assert_eq!(normalize("//a/./b/../c").unwrap(), "/a/c");
    }

    #[test]
    fn normalize_rejects_escaping_root() {
        assert!(matches!(
            normalize("/../secret"),
            Err(PathError::EscapesRoot(_))
        ));
    }

    #[test]
    fn dirname_and_basename() {
        assert_eq!(dirname("/a/b/c"), "/a/b");
        assert_eq!(dirname("/a"), "/");
        assert_eq!(dirname("/"), "/");
        assert_eq!(basename("/a/b/c.txt"), "c.txt");
        assert_eq!(basename("/"), "");
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }

    #[test]
    fn descendant_is_strict() {
        assert!(is_descendant("/x", "/x/y"));
        assert!(is_descendant("/", "/x"));
        assert!(!is_descendant("/x", "/x"));
        assert!(!is_descendant("/x", "/xy"));
        assert!(!is_descendant("/", "/"));
    }

    #[test]
    fn lineage_lists_prefixes_top_down() {
        assert_eq!(lineage("/a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
        assert_eq!(lineage("/a"), vec!["/a"]);
        assert!(lineage("/").is_empty());
    }

    #[test]
    fn wildcard_matches_shell_patterns() {
        let txt = Wildcard::new("*.txt").unwrap();
        assert!(txt.matches("notes.txt"));
        assert!(!txt.matches("notes.txt.bak"));

        let single = Wildcard::new("file?.[ch]").unwrap();
        assert!(single.matches("file1.c"));
        assert!(single.matches("file2.h"));
        assert!(!single.matches("file10.c"));

        let negated = Wildcard::new("[!a]*").unwrap();
        assert!(negated.matches("beta"));
        assert!(!negated.matches("alpha"));

        let literal = Wildcard::new("a+b(1).txt").unwrap();
        assert!(literal.matches("a+b(1).txt"));
    }
}
