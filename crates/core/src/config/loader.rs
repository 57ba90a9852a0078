use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("TORRENTI_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
[crawl]
seed = "http://example.com/"
concurrency = 2
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.crawl.seed, "http://example.com/");
        assert_eq!(config.crawl.concurrency, Some(2));
    }

    #[test]
    fn test_load_config_from_str_missing_crawl() {
        let toml = r#"
[database]
path = "index.db"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[crawl]
seed = "http://forum.example.com/"
fatal = true

[[sites]]
name = "forum"
hosts = ["forum.example.com"]
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert!(config.crawl.fatal);
        assert_eq!(config.sites.len(), 1);
        assert_eq!(config.sites[0].hosts, vec!["forum.example.com"]);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[crawl]
seed = "http://forum.example.com/"
fatal = false
concurrency = 2
"#
        )
        .unwrap();

        // the other file test also expects fatal, so parallel runs agree
        std::env::set_var("TORRENTI_CRAWL__FATAL", "true");
        std::env::set_var("TORRENTI_CRAWL__CONCURRENCY", "7");
        let config = load_config(temp_file.path());
        std::env::remove_var("TORRENTI_CRAWL__CONCURRENCY");

        let config = config.unwrap();
        assert!(config.crawl.fatal);
        assert_eq!(config.crawl.concurrency, Some(7));
        assert_eq!(config.crawl.seed, "http://forum.example.com/");
    }
}
