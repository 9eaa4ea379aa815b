//! Command dispatch logic for qgate

use super::{EvaluateArgs, InitArgs, ValidateArgs, evaluate_document, init_config, validate_config};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "qgate", version, author, long_about = None)]
#[command(about = "Evaluate quality-gate checks against JSON documents")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: QgateSubcommand,
}

#[derive(Subcommand, Debug)]
enum QgateSubcommand {
    /// Evaluate the configured checks against a JSON document
    Evaluate(Box<EvaluateArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if command parsing fails or if the executed command fails
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match &Cli::parse_from(args).command {
        QgateSubcommand::Evaluate(evaluate_args) => evaluate_document(host, evaluate_args).await,
        QgateSubcommand::Init(init_args) => init_config(host, init_args),
        QgateSubcommand::Validate(validate_args) => validate_config(host, validate_args),
    }
}
