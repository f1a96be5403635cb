//! Where the pool's connections point.

use std::fmt;
use std::path::PathBuf;

use crate::errors::Error;

/// Database location, either as a combined connection string or as explicit parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionTarget {
    /// `sqlite://<path>`, `sqlite:<path>` or a SQLite URI filename (`file:...`).
    Url(String),
    /// Resolves to `<directory>/<database>.db`; names already ending in
    /// `.db`, `.db3`, `.sqlite` or `.sqlite3` are used as is.
    Descriptor { directory: PathBuf, database: String },
}

impl ConnectionTarget {
    /// Resolve to the filename handed to SQLite (URI filenames are enabled).
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for unknown schemes, empty paths, and private
    /// `:memory:` databases (every pooled connection would see a different one).
    pub fn resolve(&self) -> Result<String, Error> {
        match self {
            ConnectionTarget::Url(url) => resolve_url(url.trim()),
            ConnectionTarget::Descriptor {
                directory,
                database,
            } => {
                let database = database.trim();
                if database.is_empty() {
                    return Err(Error::Config("Database name cannot be empty".to_string()));
                }
                if directory.as_os_str().is_empty() {
                    return Err(Error::Config(
                        "Database directory cannot be empty".to_string(),
                    ));
                }
                let file = if has_database_extension(database) {
                    database.to_string()
                } else {
                    format!("{database}.db")
                };
                Ok(directory.join(file).to_string_lossy().into_owned())
            }
        }
    }
}

/// Extensions that mark a database name as a complete file name.
const DATABASE_EXTENSIONS: &[&str] = &["db", "db3", "sqlite", "sqlite3"];

fn has_database_extension(database: &str) -> bool {
    database.rsplit_once('.').is_some_and(|(_, ext)| {
        DATABASE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}

fn resolve_url(url: &str) -> Result<String, Error> {
    let path = if url.starts_with("file:") {
        url
    } else if let Some(rest) = url.strip_prefix("sqlite://") {
        rest
    } else if let Some(rest) = url.strip_prefix("sqlite:") {
        rest
    } else {
        return Err(Error::Config(format!(
            "Unsupported connection string '{url}': expected sqlite://, sqlite: or file:"
        )));
    };

    if path.is_empty() || path == "file:" {
        return Err(Error::Config(format!(
            "Connection string '{url}' has no database path"
        )));
    }
    if path == ":memory:" {
        return Err(Error::Config(
            "Private :memory: databases cannot be pooled; use file:<name>?mode=memory&cache=shared"
                .to_string(),
        ));
    }
    Ok(path.to_string())
}

impl fmt::Display for ConnectionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionTarget::Url(url) => f.write_str(url),
            ConnectionTarget::Descriptor {
                directory,
                database,
            } => write!(f, "{} ({})", database, directory.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_scheme_with_absolute_path() {
        let target = ConnectionTarget::Url("sqlite:///var/lib/memoria/memories.db".to_string());
        assert_eq!(target.resolve().unwrap(), "/var/lib/memoria/memories.db");
    }

    #[test]
    fn test_short_sqlite_scheme() {
        let target = ConnectionTarget::Url("sqlite:data/memories.db".to_string());
        assert_eq!(target.resolve().unwrap(), "data/memories.db");
    }

    #[test]
    fn test_file_uri_passes_through() {
        let uri = "file:shared?mode=memory&cache=shared";
        let target = ConnectionTarget::Url(uri.to_string());
        assert_eq!(target.resolve().unwrap(), uri);
    }

    #[test]
    fn test_unknown_scheme_rejected() {
        let target = ConnectionTarget::Url("postgresql://user:pw@localhost/db".to_string());
        assert!(matches!(target.resolve(), Err(Error::Config(_))));
    }

    #[test]
    fn test_private_memory_rejected() {
        let target = ConnectionTarget::Url("sqlite::memory:".to_string());
        assert!(matches!(target.resolve(), Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_path_rejected() {
        let target = ConnectionTarget::Url("sqlite://".to_string());
        assert!(matches!(target.resolve(), Err(Error::Config(_))));
    }

    #[test]
    fn test_descriptor_appends_extension() {
        let target = ConnectionTarget::Descriptor {
            directory: PathBuf::from("/data"),
            database: "memoria_db".to_string(),
        };
        assert_eq!(
            PathBuf::from(target.resolve().unwrap()),
            PathBuf::from("/data/memoria_db.db")
        );
    }

    #[test]
    fn test_descriptor_keeps_explicit_extension() {
        let target = ConnectionTarget::Descriptor {
            directory: PathBuf::from("/data"),
            database: "memories.sqlite3".to_string(),
        };
        assert_eq!(
            PathBuf::from(target.resolve().unwrap()),
            PathBuf::from("/data/memories.sqlite3")
        );
    }

    #[test]
    fn test_descriptor_dotted_name_still_gets_extension() {
        let target = ConnectionTarget::Descriptor {
            directory: PathBuf::from("/data"),
            database: "my.notes".to_string(),
        };
        assert_eq!(
            PathBuf::from(target.resolve().unwrap()),
            PathBuf::from("/data/my.notes.db")
        );
    }

    #[test]
    fn test_descriptor_requires_name() {
        let target = ConnectionTarget::Descriptor {
            directory: PathBuf::from("/data"),
            database: "  ".to_string(),
        };
        assert!(matches!(target.resolve(), Err(Error::Config(_))));
    }
}
