use super::Host;
use super::config::{Config, DEFAULT_CONFIG_FILE};
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file
    #[arg(long, short = 'c', value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: Utf8PathBuf,
}

/// Loads a configuration file and verifies every check, without evaluating any document
///
/// # Errors
///
/// Returns an error if the config file cannot be loaded or parsed, or if a check is invalid
pub fn validate_config<H: Host>(host: &mut H, args: &ValidateArgs) -> Result<()> {
    match Config::load(&args.config) {
        Ok(config) => {
            let _ = writeln!(host.output(), "Configuration file is valid");
            let _ = writeln!(host.output(), "Config file: {}", args.config);
            let _ = writeln!(host.output(), "Checks: {}", config.checks.len());
            Ok(())
        }
        Err(e) => {
            let _ = writeln!(host.error(), "❌ Configuration validation failed: {e}");
            host.exit(1);
            Err(e)
        }
    }
}
