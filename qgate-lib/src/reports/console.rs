use crate::Result;
use crate::engine::{CheckOutcome, CheckResult, GateReport, Signal};
use core::fmt::Write;
use owo_colors::OwoColorize;

const LABEL_WIDTH: usize = 7;
const ERROR_LABEL: &str = "ERROR";

pub fn generate<W: Write>(report: &GateReport, use_colors: bool, writer: &mut W) -> Result<()> {
    for check in &report.checks {
        match &check.outcome {
            CheckOutcome::Evaluated(result) => {
                let label = format!("{:<LABEL_WIDTH$}", result.status.as_str());
                writeln!(writer, "{} {}", paint(label, result.status.signal(), use_colors), check.name)?;
                if !result.passed {
                    write_reasons(result, writer)?;
                }
            }
            CheckOutcome::Failed { error } => {
                let label = format!("{ERROR_LABEL:<LABEL_WIDTH$}");
                writeln!(writer, "{} {}: {error}", paint(label, Some(Signal::Red), use_colors), check.name)?;
            }
        }
    }

    if !report.checks.is_empty() {
        writeln!(writer)?;
    }

    if let Some(concatenation) = &report.concatenation {
        writeln!(writer, "Concatenation: {}", concatenation.condition)?;
    }

    let verdict = report.verdict.to_string();
    writeln!(writer, "Verdict: {}", paint(verdict, report.verdict.signal(), use_colors))?;
    Ok(())
}

fn write_reasons<W: Write>(result: &CheckResult, writer: &mut W) -> Result<()> {
    let indent = " ".repeat(LABEL_WIDTH + 1);
    for package in &result.reason_packages {
        write!(writer, "{indent}reasons: {}", serde_json::to_string(&package.reasons)?)?;
        if let Some(context) = &package.context {
            write!(writer, ", context: {}", serde_json::to_string(context)?)?;
        }
        writeln!(writer)?;
    }
    Ok(())
}

fn paint(text: String, signal: Option<Signal>, use_colors: bool) -> String {
    if !use_colors {
        return text;
    }

    match signal {
        Some(Signal::Green) => text.green().bold().to_string(),
        Some(Signal::Yellow) => text.yellow().bold().to_string(),
        Some(Signal::Red) => text.red().bold().to_string(),
        None => text.bold().to_string(),
    }
}
