//! Remote file path checks shared by the transfer clients.

use std::collections::HashMap;

use crate::error::{Error, Result};

pub fn validate_remote_path(path: &str) -> Result<()> {
    let path = path.trim();
    if path.is_empty() {
        return Err(Error::InvalidArgument("remote path is blank".into()));
    }

    // a very common mistake, the device answers it with a cryptic error
    if path.ends_with('/') {
        return Err(Error::InvalidArgument(format!(
            "remote path '{}' points to a directory, not a file",
            path
        )));
    }

    if path.contains(|c: char| matches!(c, '\r' | '\n' | '\x0c')) {
        return Err(Error::InvalidArgument(format!(
            "remote path {:?} contains line breaks",
            path
        )));
    }

    Ok(())
}

/// Trims `path` and makes it absolute.
pub fn sanitize_remote_path(path: &str) -> String {
    let path = path.trim();
    if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{}", path)
    }
}

/// Validates and sanitizes a single path.
pub fn prepare_remote_path(path: &str) -> Result<String> {
    validate_remote_path(path)?;
    Ok(sanitize_remote_path(path))
}

/// Validates every path, then sanitizes them and drops duplicates, keeping the
/// first occurrence.
pub fn sanitize_remote_paths<I, P>(paths: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = P>,
    P: AsRef<str>,
{
    let mut unique = Vec::new();
    for path in paths {
        let path = prepare_remote_path(path.as_ref())?;
        if !unique.contains(&path) {
            unique.push(path);
        }
    }
    Ok(unique)
}

/// Like [`sanitize_remote_paths`] for path/payload pairs. A later payload for
/// the same sanitized path replaces the earlier one.
pub fn sanitize_remote_paths_with_data<I, P, D>(entries: I) -> Result<Vec<(String, D)>>
where
    I: IntoIterator<Item = (P, D)>,
    P: AsRef<str>,
{
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<(String, D)> = Vec::new();
    for (path, data) in entries {
        let path = prepare_remote_path(path.as_ref())?;
        match positions.get(&path) {
            Some(&index) => unique[index].1 = data,
            None => {
                positions.insert(path.clone(), unique.len());
                unique.push((path, data));
            }
        }
    }
    Ok(unique)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn rejects_bad_paths() {
        for path in ["", "   ", "/logs/", "a\nb", "a\rb", "a\x0cb"] {
            let err = validate_remote_path(path).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument, "{path:?}");
        }
        assert!(validate_remote_path(" /logs/a.bin ").is_ok());
    }

    #[test]
    fn sanitizes_to_absolute_trimmed_paths() {
        assert_eq!(sanitize_remote_path("  logs/a.bin "), "/logs/a.bin");
        assert_eq!(sanitize_remote_path("/logs/a.bin"), "/logs/a.bin");
    }

    #[test]
    fn deduplicates_after_sanitizing() {
        let paths = sanitize_remote_paths(["/a", "a", " /b ", "/a"]).unwrap();
        assert_eq!(paths, vec!["/a".to_string(), "/b".to_string()]);
    }

    #[test]
    fn one_bad_path_fails_the_batch() {
        assert!(sanitize_remote_paths(["/a", "/dir/"]).is_err());
    }

    #[test]
    fn later_payload_wins_for_duplicate_paths() {
        let entries =
            sanitize_remote_paths_with_data([("a", 1), ("/b", 2), ("/a", 3)]).unwrap();
        assert_eq!(entries, vec![("/a".to_string(), 3), ("/b".to_string(), 2)]);
    }
}
