use url::Url;

use super::{types::Config, ConfigError};
use crate::scraper::LinkRule;

/// Validate configuration
/// Currently validates:
/// - Seed is an absolute http(s) URL
/// - Concurrency, when set, is not 0
/// - Every site has a host and compilable link patterns
/// - Server port is not 0 when the status server is enabled
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let seed = Url::parse(&config.crawl.seed).map_err(|e| {
        ConfigError::ValidationError(format!("crawl.seed is not a valid URL: {}", e))
    })?;
    if !matches!(seed.scheme(), "http" | "https") {
        return Err(ConfigError::ValidationError(format!(
            "crawl.seed must be http or https, got {}",
            seed.scheme()
        )));
    }

    if config.crawl.concurrency == Some(0) {
        return Err(ConfigError::ValidationError(
            "crawl.concurrency cannot be 0".to_string(),
        ));
    }

    for site in &config.sites {
        if site.hosts.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "site {} has no hosts",
                site.name
            )));
        }
        for rule in &site.links {
            LinkRule::from_config(rule).map_err(|e| {
                ConfigError::ValidationError(format!(
                    "site {} rule {:?}: {}",
                    site.name, rule.reason, e
                ))
            })?;
        }
    }

    if config.server.enabled && config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        CrawlConfig, DatabaseConfig, ExtractConfig, LinkRuleConfig, PathPatternConfig,
        ServerConfig, SiteConfig,
    };

    fn valid_config() -> Config {
        Config {
            crawl: CrawlConfig::new("http://forum.example.com/"),
            database: DatabaseConfig::default(),
            extract: ExtractConfig::default(),
            sites: vec![SiteConfig {
                name: "forum".to_string(),
                hosts: vec!["forum.example.com".to_string()],
                allowed_domains: vec![],
                request_timeout_secs: 30,
                max_body_size: 1024,
                links: vec![LinkRuleConfig {
                    reason: "thread".to_string(),
                    source: None,
                    target: PathPatternConfig::Regex("^/thread-\\d+$".to_string()),
                    rewrite: None,
                }],
            }],
            server: ServerConfig::default(),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_relative_seed_fails() {
        let mut config = valid_config();
        config.crawl.seed = "/thread-1".to_string();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_non_http_seed_fails() {
        let mut config = valid_config();
        config.crawl.seed = "ftp://example.com/".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let mut config = valid_config();
        config.crawl.concurrency = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_site_without_hosts_fails() {
        let mut config = valid_config();
        config.sites[0].hosts.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_bad_regex_fails() {
        let mut config = valid_config();
        config.sites[0].links[0].target = PathPatternConfig::Regex("(".to_string());
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("forum"));
    }

    #[test]
    fn test_validate_port_zero_only_when_enabled() {
        let mut config = valid_config();
        config.server.port = 0;
        assert!(validate_config(&config).is_ok());

        config.server.enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
