use std::path::PathBuf;

use super::error::StorageError;

const SQLITE_SCHEME: &str = "sqlite://";

/// Resolves a `sqlite://<path>` connection string to a database path.
///
/// `sqlite://data/broker.db` is relative to the working directory,
/// `sqlite:///var/lib/intake/broker.db` is absolute.
pub fn sqlite_path(location: &str) -> Result<PathBuf, StorageError> {
    let path = location
        .trim()
        .strip_prefix(SQLITE_SCHEME)
        .ok_or_else(|| StorageError::InvalidLocation(location.to_string()))?;

    if path.is_empty() {
        return Err(StorageError::InvalidLocation(location.to_string()));
    }

    Ok(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_and_absolute_paths() {
        assert_eq!(
            sqlite_path("sqlite://data/broker.db").unwrap(),
            PathBuf::from("data/broker.db")
        );
        assert_eq!(
            sqlite_path("sqlite:///var/lib/intake/results.db").unwrap(),
            PathBuf::from("/var/lib/intake/results.db")
        );
    }

    #[test]
    fn other_schemes_are_rejected() {
        assert!(matches!(
            sqlite_path("redis://localhost:6379"),
            Err(StorageError::InvalidLocation(_))
        ));
        assert!(sqlite_path("sqlite://").is_err());
    }
}
