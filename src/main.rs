use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use unxmit::cli::Cli;
use unxmit::codepage::Codepage;
use unxmit::error::XmitError;
use unxmit::extract::{self, ExtractOptions};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.trace {
        EnvFilter::new("trace")
    } else if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
            .add_directive("unxmit=info".parse().expect("valid log directive"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let missing = cli.missing_arguments();
    if !missing.is_empty() {
        eprintln!("missing required argument(s): {}", missing.join(", "));
        return ExitCode::from(16);
    }

    let codepage = match Codepage::from_name(&cli.encoding) {
        Ok(cp) => cp,
        Err(err) => return fail(err),
    };

    let opts = ExtractOptions {
        input: cli.input.expect("checked above"),
        target: cli.target.expect("checked above"),
        extension: cli.extension.expect("checked above"),
        unload: cli.unload,
        codepage,
    };

    match extract::run(&opts) {
        Ok(report) if report.cleanup_failed => ExitCode::from(2),
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => fail(err),
    }
}

fn fail(err: XmitError) -> ExitCode {
    let code = err.exit_code();
    eprintln!("{:?}", miette::Report::new(err));
    ExitCode::from(code)
}
