//! Database configuration.

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the database if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to error if the database already exists.
    pub error_if_exists: bool,

    /// Whether to sync the node log on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// Maximum number of elements in a B+tree leaf before it splits.
    pub max_leaf_size: usize,

    /// Deepest allowed nesting of collections inside mixed values.
    pub max_nesting_level: usize,

    /// Format version to use for new databases.
    pub format_version: (u16, u16),
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            sync_on_commit: true,
            max_leaf_size: 1000,
            max_nesting_level: 100,
            format_version: (1, 0),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to error if database exists.
    #[must_use]
    pub const fn error_if_exists(mut self, value: bool) -> Self {
        self.error_if_exists = value;
        self
    }

    /// Sets whether to sync the node log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the B+tree leaf capacity. Values below 2 are raised to 2.
    #[must_use]
    pub const fn max_leaf_size(mut self, size: usize) -> Self {
        self.max_leaf_size = if size < 2 { 2 } else { size };
        self
    }

    /// Sets the deepest allowed collection nesting.
    #[must_use]
    pub const fn max_nesting_level(mut self, level: usize) -> Self {
        self.max_nesting_level = level;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(!config.error_if_exists);
        assert!(config.sync_on_commit);
        assert_eq!(config.max_leaf_size, 1000);
        assert_eq!(config.max_nesting_level, 100);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_commit(false)
            .max_leaf_size(1)
            .max_nesting_level(3);

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
        assert_eq!(config.max_leaf_size, 2);
        assert_eq!(config.max_nesting_level, 3);
    }
}
