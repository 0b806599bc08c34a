/// Database credential loading.
///
/// The environment variable holds a path, not the secret itself; the file's
/// trimmed contents are the secret.
use std::path::{Path, PathBuf};

/// Resolve the secret named by `env_var`.
///
/// Returns `Ok(None)` when the variable is unset or empty.
pub fn load(env_var: &str) -> Result<Option<String>, SecretError> {
    match std::env::var_os(env_var) {
        Some(path) if !path.is_empty() => read_secret_file(Path::new(&path)).map(Some),
        _ => {
            tracing::debug!(env_var, "no database secret configured");
            Ok(None)
        }
    }
}

/// Read a secret from `path`, trimming surrounding whitespace.
pub fn read_secret_file(path: &Path) -> Result<String, SecretError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SecretError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let secret = raw.trim();
    if secret.is_empty() {
        return Err(SecretError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(secret.to_string())
}

#[derive(Debug)]
pub enum SecretError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Empty {
        path: PathBuf,
    },
}

impl std::fmt::Display for SecretError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretError::Read { path, source } => {
                write!(f, "failed to read secret file {}: {source}", path.display())
            }
            SecretError::Empty { path } => write!(f, "secret file {} is empty", path.display()),
        }
    }
}

impl std::error::Error for SecretError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SecretError::Read { source, .. } => Some(source),
            SecretError::Empty { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn reads_and_trims() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.secret");
        std::fs::write(&path, "  hunter2\n").unwrap();
        assert_eq!(read_secret_file(&path).unwrap(), "hunter2");
    }

    #[test]
    fn empty_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.secret");
        std::fs::write(&path, "\n\n").unwrap();
        assert!(matches!(
            read_secret_file(&path),
            Err(SecretError::Empty { .. })
        ));
    }

    #[test]
    fn missing_file_rejected() {
        let dir = TempDir::new().unwrap();
        let err = read_secret_file(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, SecretError::Read { .. }));
        assert!(err.to_string().contains("absent"));
    }

    #[test]
    fn unset_variable_means_no_secret() {
        assert_eq!(
            load("MIRRORSTATS_TEST_SECRET_VARIABLE_THAT_IS_NEVER_SET").unwrap(),
            None
        );
    }

    // Each test owns its variable name; tests run in parallel threads.
    #[test]
    fn set_variable_reads_named_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.secret");
        std::fs::write(&path, "hunter2\n").unwrap();
        std::env::set_var("MIRRORSTATS_TEST_SECRET_FILE_PRESENT", &path);
        assert_eq!(
            load("MIRRORSTATS_TEST_SECRET_FILE_PRESENT").unwrap(),
            Some("hunter2".to_string())
        );
    }

    #[test]
    fn set_variable_with_empty_file_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db.secret");
        std::fs::write(&path, "  \n").unwrap();
        std::env::set_var("MIRRORSTATS_TEST_SECRET_FILE_EMPTY", &path);
        assert!(matches!(
            load("MIRRORSTATS_TEST_SECRET_FILE_EMPTY"),
            Err(SecretError::Empty { .. })
        ));
    }

    #[test]
    fn set_variable_with_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        std::env::set_var(
            "MIRRORSTATS_TEST_SECRET_FILE_MISSING",
            dir.path().join("absent"),
        );
        assert!(matches!(
            load("MIRRORSTATS_TEST_SECRET_FILE_MISSING"),
            Err(SecretError::Read { .. })
        ));
    }

    #[test]
    fn empty_variable_means_no_secret() {
        std::env::set_var("MIRRORSTATS_TEST_SECRET_FILE_BLANK", "");
        assert_eq!(load("MIRRORSTATS_TEST_SECRET_FILE_BLANK").unwrap(), None);
    }
}
