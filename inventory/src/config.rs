//! Configuration Management
//!
//! Runtime settings for the inventory service. The binary fills this from
//! command line flags and `ESTOQUE_*` environment variables; everything has
//! a sensible default so `Config::default()` is enough for local runs.
//!
//! ## Configuration Variables
//!
//! - `ESTOQUE_DATABASE_URL`: SQLite database (default: `sqlite://estoque.db`)
//! - `ESTOQUE_HOST` / `ESTOQUE_PORT`: HTTP bind address (default: `0.0.0.0:5000`)
//! - `ESTOQUE_DEBUG`: verbose logging (default: off)
//! - `ESTOQUE_SEED`: load sample categories, products and users (default: off)
//! - `ESTOQUE_ADMIN_*`: administrator created when none exists

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub seed: bool,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
    pub session_ttl_days: i64,
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://estoque.db".to_string(),
            host: "0.0.0.0".to_string(),
            port: 5000,
            debug: false,
            seed: false,
            admin_name: "Administrador".to_string(),
            admin_email: "admin@estoque.com".to_string(),
            admin_password: "admin123".to_string(),
            session_ttl_days: 30,
            log_dir: None,
        }
    }
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Log filter used when `RUST_LOG` is not set
    pub fn default_log_filter(&self) -> &'static str {
        if self.debug { "debug" } else { "info" }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bind_address() {
        let config = Config::default();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }

    #[test]
    fn test_debug_raises_log_filter() {
        let mut config = Config::default();
        assert_eq!(config.default_log_filter(), "info");
        config.debug = true;
        assert_eq!(config.default_log_filter(), "debug");
    }
}
