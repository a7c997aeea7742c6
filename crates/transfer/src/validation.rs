use std::path::{Component, Path};

use crate::TransferError;

/// Validates that a relative path does not escape the directory it is
/// joined onto.
///
/// Rejects:
/// - Empty paths
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Windows prefix components (`C:`, `\\server`)
pub fn validate_relative_path(file_path: &str) -> Result<(), TransferError> {
    if file_path.is_empty() {
        return Err(TransferError::InvalidPath("empty path".into()));
    }

    let path = Path::new(file_path);
    if path.is_absolute() {
        return Err(TransferError::InvalidPath(format!(
            "absolute path not allowed: {file_path}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {file_path}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "absolute path not allowed: {file_path}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

/// Validates a single file name reported by the remote before it is joined
/// onto a local directory.
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(TransferError::InvalidPath(format!("invalid file name: {name:?}")));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(TransferError::InvalidPath(format!(
            "file name contains a separator: {name}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_path() {
        assert!(validate_relative_path("").is_err());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(validate_relative_path("../../../etc/passwd").is_err());
        assert!(validate_relative_path("sub/../../../escape").is_err());
        assert!(validate_relative_path("..").is_err());
    }

    #[test]
    fn rejects_absolute_unix_path() {
        assert!(validate_relative_path("/tmp/malicious").is_err());
    }

    #[test]
    fn accepts_nested_relative_path() {
        assert!(validate_relative_path("photos/2023/a.jpg").is_ok());
        assert!(validate_relative_path("./a.txt").is_ok());
        assert!(validate_relative_path(".config/settings.json").is_ok());
    }

    #[test]
    fn file_name_accepts_plain_names() {
        assert!(validate_file_name("b.txt").is_ok());
        assert!(validate_file_name(".hidden").is_ok());
        assert!(validate_file_name("report (1).pdf").is_ok());
    }

    #[test]
    fn file_name_rejects_traversal() {
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name(".").is_err());
        assert!(validate_file_name("..").is_err());
        assert!(validate_file_name("../etc/passwd").is_err());
        assert!(validate_file_name("a/b.txt").is_err());
        assert!(validate_file_name("..\\evil.exe").is_err());
    }
}
