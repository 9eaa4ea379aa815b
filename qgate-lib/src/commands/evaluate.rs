use super::Host;
use super::common::{ColorMode, LogLevel, init_logging};
use super::config::{Config, DEFAULT_CONFIG_FILE};
use crate::Result;
use crate::engine::{Engine, ErrorPolicy, Gate, GateReport, Signal};
use crate::reports::{generate_console, generate_json};
use camino::Utf8PathBuf;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use ohno::{IntoAppError, bail};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::sync::Arc;

const LOG_TARGET: &str = "  evaluate";

/// Verdict level at which `evaluate` reports failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FailOn {
    /// Never fail because of the verdict
    Never,

    /// Fail when the verdict is YELLOW or RED
    Yellow,

    /// Fail when the verdict is RED
    Red,
}

impl FailOn {
    const fn threshold(self) -> Option<Signal> {
        match self {
            Self::Never => None,
            Self::Yellow => Some(Signal::Yellow),
            Self::Red => Some(Signal::Red),
        }
    }
}

#[derive(Parser, Debug)]
pub struct EvaluateArgs {
    /// Path to configuration file
    #[arg(long, short = 'c', value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: Utf8PathBuf,

    /// Path to the JSON document to evaluate
    #[arg(long, short = 'd', value_name = "PATH")]
    pub document: Utf8PathBuf,

    /// Expression combining check statuses, overriding the configured one
    #[arg(long, value_name = "EXPR")]
    pub concatenation: Option<String>,

    /// Keep examining elements after a quantifier fails
    #[arg(long)]
    pub continue_search_on_fail: bool,

    /// Maximum time a single condition may take to evaluate
    #[arg(long, value_name = "DURATION", value_parser = humantime_serde::re::humantime::parse_duration)]
    pub timeout: Option<Duration>,

    /// What to do when a check cannot be evaluated
    #[arg(long, value_name = "POLICY")]
    pub on_error: Option<ErrorPolicy>,

    /// Output the full evaluation report to a JSON file
    #[arg(long, value_name = "PATH", help_heading = "Report Output")]
    pub json: Option<Utf8PathBuf>,

    /// Exit with status code 1 when the verdict is at or below this level
    #[arg(long, value_name = "LEVEL", default_value = "red")]
    pub fail_on: FailOn,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,
}

impl EvaluateArgs {
    fn apply_overrides(&self, config: &mut Config) -> Result<()> {
        if let Some(concatenation) = &self.concatenation {
            config.concatenation = Some(concatenation.clone());
        }

        if self.continue_search_on_fail {
            config.continue_search_on_fail = true;
        }

        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }

        if let Some(on_error) = self.on_error {
            config.on_error = on_error;
        }

        config.validate()
    }
}

/// Evaluates the configured checks against a JSON document and reports the outcome
///
/// # Errors
///
/// Returns an error if the configuration or document cannot be loaded, if a check or the
/// concatenation cannot be evaluated, if a report cannot be written, or if the verdict is
/// at or below the `--fail-on` level
pub async fn evaluate_document<H: Host>(host: &mut H, args: &EvaluateArgs) -> Result<()> {
    init_logging(args.log_level);

    let mut config = Config::load(&args.config)?;
    args.apply_overrides(&mut config)?;

    let text = fs::read_to_string(&args.document).into_app_err_with(|| format!("reading document '{}'", args.document))?;
    let document: Value = serde_json::from_str(&text).into_app_err_with(|| format!("parsing document '{}' as JSON", args.document))?;

    log::info!(target: LOG_TARGET, "Loaded {} check(s) from '{}'", config.checks.len(), args.config);

    let mut gate = Gate::new(Engine::new(config.engine_config()), config.named_checks()).with_error_policy(config.on_error);
    if let Some(concatenation) = &config.concatenation {
        gate = gate.with_concatenation(concatenation.clone());
    }

    let report = gate.evaluate(Arc::new(document)).await.into_app_err("evaluating checks")?;
    write_reports(host, args, &report)?;

    if let Some(threshold) = args.fail_on.threshold()
        && report.verdict.signal().is_some_and(|signal| signal <= threshold)
    {
        bail!("quality gate verdict is {}", report.verdict);
    }

    Ok(())
}

fn write_reports<H: Host>(host: &mut H, args: &EvaluateArgs, report: &GateReport) -> Result<()> {
    let mut console_output = String::new();
    generate_console(report, args.color.use_colors(), &mut console_output)?;
    let _ = write!(host.output(), "{console_output}");

    if let Some(filename) = &args.json {
        let mut json_output = String::new();
        generate_json(report, &mut json_output)?;
        fs::write(filename, json_output).into_app_err_with(|| format!("writing JSON report to '{filename}'"))?;
    }

    Ok(())
}
