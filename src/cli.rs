use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "unxmit",
    about = "Extract members from a TSO TRANSMIT (XMIT) dataset envelope"
)]
pub struct Cli {
    /// XMIT input file to process
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Directory where the extracted members are written (must exist)
    #[arg(long)]
    pub target: Option<PathBuf>,

    /// Extension appended to each member file name
    #[arg(long = "type", value_name = "EXTENSION")]
    pub extension: Option<String>,

    /// Keep the intermediate unload stream at this path instead of a
    /// temporary file
    #[arg(long)]
    pub unload: Option<PathBuf>,

    /// EBCDIC codepage of the source dataset
    #[arg(long, default_value = "IBM-1047")]
    pub encoding: String,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Enable trace output (very verbose)
    #[arg(long)]
    pub trace: bool,
}

impl Cli {
    /// Names of the required arguments that were not supplied.
    ///
    /// The required flags are declared optional in clap so that the program
    /// controls the exit code for a missing argument (16) instead of clap's
    /// own usage-error code.
    pub fn missing_arguments(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.input.is_none() {
            missing.push("--input");
        }
        if self.target.is_none() {
            missing.push("--target");
        }
        if self.extension.is_none() {
            missing.push("--type");
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_required_present() {
        let cli = Cli::parse_from([
            "unxmit", "--input", "a.xmi", "--target", "out", "--type", "txt",
        ]);
        assert!(cli.missing_arguments().is_empty());
        assert_eq!(cli.encoding, "IBM-1047");
    }

    #[test]
    fn reports_missing_arguments() {
        let cli = Cli::parse_from(["unxmit", "--input", "a.xmi"]);
        assert_eq!(cli.missing_arguments(), vec!["--target", "--type"]);
    }

    #[test]
    fn type_flag_maps_to_extension() {
        let cli = Cli::parse_from([
            "unxmit", "--input", "a.xmi", "--target", "out", "--type", "cbl",
        ]);
        assert_eq!(cli.extension.as_deref(), Some("cbl"));
    }
}
