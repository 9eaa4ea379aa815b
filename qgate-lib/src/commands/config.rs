use crate::Result;
use crate::engine::concat::referenced_checks;
use crate::engine::{CheckDefinition, CheckOptions, EngineConfig, ErrorPolicy, NamedCheck};
use camino::Utf8Path;
use core::time::Duration;
use ohno::{IntoAppError, app_err, bail};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::sync::LazyLock;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// File name `init` writes when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "qgate.toml";

static NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("invalid regex"));

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CheckConfig {
    /// Identifier used by the concatenation expression and in reports
    pub name: String,

    /// JSONPath selecting the values to judge
    pub reference: String,

    /// CEL condition judging the selected values
    pub condition: String,

    #[serde(default)]
    pub options: CheckOptions,
}

impl CheckConfig {
    #[must_use]
    pub fn to_named_check(&self) -> NamedCheck {
        NamedCheck {
            name: self.name.clone(),
            definition: CheckDefinition {
                reference: self.reference.clone(),
                condition: self.condition.clone(),
                options: self.options.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Keep examining elements after a quantifier fails
    #[serde(default)]
    pub continue_search_on_fail: bool,

    /// Maximum time a single condition may take to evaluate
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// What to do when a check cannot be evaluated
    #[serde(default)]
    pub on_error: ErrorPolicy,

    /// Expression combining check statuses into the verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concatenation: Option<String>,

    #[serde(default)]
    pub checks: Vec<CheckConfig>,
}

const fn default_timeout() -> Duration {
    crate::engine::DEFAULT_TIMEOUT
}

impl Config {
    /// Load and validate a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading qgate configuration file '{path}'"))?;
        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{path}'"))?;
        config.validate().map_err(|e| app_err!("invalid configuration file '{path}': {e}"))?;
        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Check names, paths, conditions and the concatenation without evaluating anything
    ///
    /// # Errors
    ///
    /// Returns an error describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            bail!("timeout must be greater than zero");
        }

        let mut names = HashSet::with_capacity(self.checks.len());
        for check in &self.checks {
            if !NAME_REGEX.is_match(&check.name) {
                bail!(
                    "check name '{}' must start with a letter or underscore and contain only letters, digits, '_' or '-'",
                    check.name
                );
            }

            if !names.insert(check.name.as_str()) {
                bail!("check name '{}' is used more than once", check.name);
            }

            check
                .to_named_check()
                .definition
                .validate()
                .into_app_err_with(|| format!("check '{}' is invalid", check.name))?;
        }

        if let Some(concatenation) = &self.concatenation {
            for name in referenced_checks(concatenation) {
                if !names.contains(name) {
                    return Err(app_err!("concatenation '{concatenation}' references unknown check '{name}'"));
                }
            }
        }

        Ok(())
    }

    #[must_use]
    pub const fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            continue_search_on_fail: self.continue_search_on_fail,
            timeout: self.timeout,
        }
    }

    #[must_use]
    pub fn named_checks(&self) -> Vec<NamedCheck> {
        self.checks.iter().map(CheckConfig::to_named_check).collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG_TOML).expect("default_config.toml should be valid TOML that deserializes to Config")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Status;
    use camino::Utf8PathBuf;

    fn parse(text: &str) -> Config {
        toml::from_str(text).unwrap()
    }

    fn minimal() -> Config {
        parse(
            r#"
            [[checks]]
            name = "version_set"
            reference = "$.version"
            condition = "$ != null"
            "#,
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.checks.len(), 3);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.on_error, ErrorPolicy::Abort);
    }

    #[test]
    fn test_omitted_settings_use_defaults() {
        let config = minimal();
        assert!(!config.continue_search_on_fail);
        assert_eq!(config.timeout, crate::engine::DEFAULT_TIMEOUT);
        assert_eq!(config.on_error, ErrorPolicy::Abort);
        assert!(config.concatenation.is_none());
        assert_eq!(config.checks[0].options, CheckOptions::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_settings_and_options_are_parsed() {
        let config = parse(
            r#"
            continue_search_on_fail = true
            timeout = "250ms"
            on_error = "report"
            concatenation = "a || b"

            [[checks]]
            name = "a"
            reference = "$.a"
            condition = "$ > 1"

            [checks.options]
            true = "PASS"
            return_if_empty = "YELLOW"

            [[checks]]
            name = "b"
            reference = "$.b"
            condition = "$ > 1"
            "#,
        );

        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.on_error, ErrorPolicy::Report);
        assert_eq!(config.checks[0].options.on_true, Some(Status::new("PASS")));
        assert_eq!(config.checks[0].options.return_if_empty, Some(Status::YELLOW));

        let engine_config = config.engine_config();
        assert!(engine_config.continue_search_on_fail);
        assert_eq!(engine_config.timeout, Duration::from_millis(250));

        config.validate().unwrap();
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        assert!(toml::from_str::<Config>("retries = 3").is_err());
        assert!(
            toml::from_str::<Config>(
                r#"
                [[checks]]
                name = "a"
                reference = "$.a"
                condition = "$ > 1"
                severity = "high"
                "#
            )
            .is_err()
        );
    }

    #[test]
    fn test_validate_rejects_bad_names() {
        let mut config = minimal();
        config.checks[0].name = "1st".to_string();
        assert!(config.validate().is_err());

        config.checks[0].name = "has space".to_string();
        assert!(config.validate().is_err());

        config.checks[0].name = "_ok-name_2".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let mut config = minimal();
        config.checks.push(config.checks[0].clone());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("used more than once"));
    }

    #[test]
    fn test_validate_rejects_broken_condition() {
        let mut config = minimal();
        config.checks[0].condition = "$.a == $.b".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("version_set"));
    }

    #[test]
    fn test_validate_rejects_unknown_concatenation_name() {
        let mut config = minimal();
        config.concatenation = Some("version_set && missing".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("unknown check 'missing'"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            timeout: Duration::ZERO,
            ..minimal()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_named_checks_preserve_order() {
        let names: Vec<_> = Config::default().named_checks().into_iter().map(|c| c.name).collect();
        assert_eq!(names, ["builds_succeeded", "coverage_sufficient", "no_critical_issues"]);
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_save_default_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let output_path = Utf8PathBuf::try_from(tmp.path().join(DEFAULT_CONFIG_FILE)).unwrap();
        Config::save_default(&output_path).unwrap();
        let loaded = Config::load(&output_path).unwrap();
        assert_eq!(loaded, Config::default());
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_load_missing_file_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("absent.toml")).unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string(&config).unwrap();
        assert_eq!(parse(&text), config);
    }
}
