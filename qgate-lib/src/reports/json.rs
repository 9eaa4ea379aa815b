use crate::Result;
use crate::engine::GateReport;
use core::fmt::Write;

pub fn generate<W: Write>(report: &GateReport, writer: &mut W) -> Result<()> {
    writeln!(writer, "{}", serde_json::to_string_pretty(report)?)?;
    Ok(())
}
