use super::Host;
use super::config::{Config, DEFAULT_CONFIG_FILE};
use crate::Result;
use camino::Utf8PathBuf;
use clap::Parser;
use std::io::Write;

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output configuration file path (default is `qgate.toml` in the current directory)
    #[arg(value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,
}

/// Writes the default configuration file
///
/// # Errors
///
/// Returns an error if the file cannot be written
pub fn init_config<H: Host>(host: &mut H, args: &InitArgs) -> Result<()> {
    let output = args.output.clone().unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_CONFIG_FILE));

    Config::save_default(&output)?;
    let _ = writeln!(host.output(), "Generated default configuration file: {output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::config::DEFAULT_CONFIG_TOML;
    use crate::commands::host::TestHost;

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_writes_embedded_default() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = Utf8PathBuf::try_from(temp_dir.path().join("gate.toml")).unwrap();

        let mut host = TestHost::new();
        init_config(
            &mut host,
            &InitArgs {
                output: Some(output.clone()),
            },
        )
        .unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), DEFAULT_CONFIG_TOML);
        assert!(host.output_text().contains("gate.toml"));
    }

    #[test]
    #[cfg_attr(miri, ignore = "Miri cannot call GetTempPathW")]
    fn test_unwritable_destination_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let output = Utf8PathBuf::try_from(temp_dir.path().join("missing").join("qgate.toml")).unwrap();

        let mut host = TestHost::new();
        let err = init_config(&mut host, &InitArgs { output: Some(output) }).unwrap_err();
        assert!(err.to_string().contains("writing default configuration"));
    }
}
