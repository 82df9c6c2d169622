use std::path::PathBuf;

use crate::error::AppError;
use crate::feed::DEFAULT_FEED_CAP;
use crate::search::DEFAULT_SEARCH_CAP;

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub acting_user: Option<String>,
    pub json: bool,
    pub search_cap: usize,
    pub feed_cap: usize,
}

impl Config {
    pub fn new(db_path: Option<PathBuf>, acting_user: Option<String>, json: bool) -> Self {
        Self {
            db_path: db_path.unwrap_or_else(default_db_path),
            acting_user: acting_user.filter(|u| !u.trim().is_empty()),
            json,
            search_cap: DEFAULT_SEARCH_CAP,
            feed_cap: DEFAULT_FEED_CAP,
        }
    }

    pub fn with_caps(mut self, search_cap: Option<usize>, feed_cap: Option<usize>) -> Self {
        if let Some(cap) = search_cap.filter(|c| *c > 0) {
            self.search_cap = cap;
        }
        if let Some(cap) = feed_cap.filter(|c| *c > 0) {
            self.feed_cap = cap;
        }
        self
    }

    pub fn require_user(&self) -> Result<&str, AppError> {
        self.acting_user.as_deref().ok_or(AppError::Unauthenticated)
    }
}

fn default_db_path() -> PathBuf {
    // XDG data directory, or the current directory as a fallback
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "workthread") {
        proj_dirs.data_dir().join("workthread.db")
    } else {
        PathBuf::from("workthread.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new(Some(PathBuf::from("/tmp/w.db")), None, false);
        assert_eq!(config.db_path, PathBuf::from("/tmp/w.db"));
        assert_eq!(config.search_cap, 100);
        assert_eq!(config.feed_cap, 50);
        assert!(matches!(config.require_user(), Err(AppError::Unauthenticated)));
    }

    #[test]
    fn test_blank_user_is_unset() {
        let config = Config::new(None, Some("  ".to_string()), false);
        assert!(config.acting_user.is_none());
        assert!(config.db_path.ends_with("workthread.db"));
    }

    #[test]
    fn test_caps_ignore_zero() {
        let config = Config::new(None, Some("bob".to_string()), true).with_caps(Some(0), Some(10));
        assert_eq!(config.search_cap, 100);
        assert_eq!(config.feed_cap, 10);
        assert_eq!(config.require_user().unwrap(), "bob");
    }
}
