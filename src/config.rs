use std::env;
use std::path::PathBuf;

pub const DEFAULT_DATABASE_PATH : &str = "links.sqlite3";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path : PathBuf,
}

impl Config {
    /// Reads `LINK_REGISTRY_DB`, after loading a `.env` file if one exists.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let database_path = env::var_os("LINK_REGISTRY_DB")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE_PATH));

        Config {
            database_path,
        }
    }

    pub fn with_database_path(mut self, path : Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.database_path = path;
        }
        self
    }
}
