//! Link classification rules.
//!
//! A rule matches the path of the page a link was found on (`source`) and the
//! path of the link target (`target`). Paths include the query string, so
//! `/forum.php?mod=viewthread` style URLs can be told apart.

use regex_lite::Regex;

use super::ScraperError;
use crate::config::{LinkRuleConfig, PathPatternConfig};

#[derive(Debug, Clone)]
pub enum PathPattern {
    Prefix(String),
    Regex(Regex),
}

impl PathPattern {
    pub fn from_config(config: &PathPatternConfig) -> Result<Self, ScraperError> {
        match config {
            PathPatternConfig::Prefix(prefix) => Ok(Self::Prefix(prefix.clone())),
            PathPatternConfig::Regex(pattern) => Regex::new(pattern)
                .map(Self::Regex)
                .map_err(|e| ScraperError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                }),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            Self::Prefix(prefix) => path.starts_with(prefix.as_str()),
            Self::Regex(re) => re.is_match(path),
        }
    }
}

/// One `(source, target)` rule.
#[derive(Debug, Clone)]
pub struct LinkRule {
    pub reason: String,
    pub source: Option<PathPattern>,
    pub target: PathPattern,
    pub rewrite: Option<(String, String)>,
}

impl LinkRule {
    pub fn from_config(config: &LinkRuleConfig) -> Result<Self, ScraperError> {
        Ok(Self {
            reason: config.reason.clone(),
            source: config
                .source
                .as_ref()
                .map(PathPattern::from_config)
                .transpose()?,
            target: PathPattern::from_config(&config.target)?,
            rewrite: config
                .rewrite
                .as_ref()
                .map(|r| (r.from.clone(), r.to.clone())),
        })
    }

    /// The (possibly rewritten) target path when the rule applies.
    pub fn apply(&self, source: &str, target: &str) -> Option<String> {
        if let Some(pattern) = &self.source {
            if !pattern.matches(source) {
                return None;
            }
        }
        if !self.target.matches(target) {
            return None;
        }

        Some(match &self.rewrite {
            Some((from, to)) => target.replacen(from.as_str(), to, 1),
            None => target.to_string(),
        })
    }
}

/// First rule matching a link, with the path to queue.
pub fn classify<'a>(
    rules: &'a [LinkRule],
    source: &str,
    target: &str,
) -> Option<(&'a LinkRule, String)> {
    rules
        .iter()
        .find_map(|rule| rule.apply(source, target).map(|path| (rule, path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewriteConfig;

    fn rule(
        reason: &str,
        source: Option<PathPatternConfig>,
        target: PathPatternConfig,
        rewrite: Option<(&str, &str)>,
    ) -> LinkRule {
        LinkRule::from_config(&LinkRuleConfig {
            reason: reason.to_string(),
            source,
            target,
            rewrite: rewrite.map(|(from, to)| RewriteConfig {
                from: from.to_string(),
                to: to.to_string(),
            }),
        })
        .unwrap()
    }

    fn forum_rules() -> Vec<LinkRule> {
        vec![
            rule(
                "forum to thread",
                Some(PathPatternConfig::Prefix("/forum-".to_string())),
                PathPatternConfig::Regex(r"^/thread-\d+".to_string()),
                None,
            ),
            rule(
                "forum to forum page",
                Some(PathPatternConfig::Prefix("/forum-".to_string())),
                PathPatternConfig::Regex(r"^/forum-1-\d+\.htm$".to_string()),
                None,
            ),
            rule(
                "thread to attachment",
                Some(PathPatternConfig::Prefix("/thread-".to_string())),
                PathPatternConfig::Prefix("/attach-dialog-".to_string()),
                Some(("/attach-dialog-", "/attach-download-")),
            ),
        ]
    }

    #[test]
    fn test_first_match_wins() {
        let rules = forum_rules();
        let (rule, path) = classify(&rules, "/forum-1-1.htm", "/thread-42.htm").unwrap();
        assert_eq!(rule.reason, "forum to thread");
        assert_eq!(path, "/thread-42.htm");
    }

    #[test]
    fn test_source_must_match() {
        let rules = forum_rules();
        assert!(classify(&rules, "/thread-1.htm", "/forum-1-2.htm").is_none());
        assert!(classify(&rules, "/forum-1-1.htm", "/forum-1-2.htm").is_some());
    }

    #[test]
    fn test_rewrite() {
        let rules = forum_rules();
        let (rule, path) =
            classify(&rules, "/thread-42.htm", "/attach-dialog-7-1.htm").unwrap();
        assert_eq!(rule.reason, "thread to attachment");
        assert_eq!(path, "/attach-download-7-1.htm");
    }

    #[test]
    fn test_no_match() {
        let rules = forum_rules();
        assert!(classify(&rules, "/thread-42.htm", "/user-1.htm").is_none());
    }

    #[test]
    fn test_rule_without_source_matches_any_page() {
        let rules = vec![rule(
            "any",
            None,
            PathPatternConfig::Prefix("/attach-".to_string()),
            None,
        )];
        assert!(classify(&rules, "/", "/attach-1").is_some());
        assert!(classify(&rules, "/whatever", "/attach-1").is_some());
    }

    #[test]
    fn test_invalid_regex() {
        let result = PathPattern::from_config(&PathPatternConfig::Regex("(".to_string()));
        assert!(matches!(result, Err(ScraperError::InvalidPattern { .. })));
    }
}
