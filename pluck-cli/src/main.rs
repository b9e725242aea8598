//! CLI for pluck: copy one file out of a container image.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod logging;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use pluck::{Deadline, Destination, Outcome, Pipeline};
use pluck_oci::{ImageName, Source};
use tracing::debug;

const EXIT_USAGE: u8 = 1;
const EXIT_FAILURE: u8 = 2;
const EXIT_NOT_FOUND: u8 = 3;

#[derive(Parser)]
#[command(
    name = "pluck",
    version,
    about = "Copy a single file out of a container image",
    long_about = "Copy a single file out of a container image.\n\n\
        Layers are scanned in manifest order and the first entry whose path \
        matches PATH exactly is copied. Later layers are never fetched.\n\n\
        Exit status: 0 copied, 1 usage error, 2 failure, 3 not found."
)]
struct Cli {
    /// Image name: `docker://REF`, a bare registry reference, or `oci:DIR[:TAG]`.
    image: String,

    /// Path of the file inside the image, exactly as stored in the layer (e.g. `etc/os-release`).
    path: String,

    /// Where to write the file. Omitted or `-` writes to stdout.
    output: Option<PathBuf>,

    /// Seconds the whole run may take.
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..=86_400)
    )]
    timeout: u64,

    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    logging::init(cli.verbose);

    let result = cli.run();
    match &result {
        Ok(Outcome::NotFound) => eprintln!("pluck: {} not found in {}", cli.path, cli.image),
        Err(e) => eprintln!("pluck: {e:#}"),
        Ok(_) => {}
    }
    ExitCode::from(exit_code(&result))
}

impl Cli {
    fn run(&self) -> Result<Outcome> {
        let deadline = Deadline::new(Duration::from_secs(self.timeout));

        let name = ImageName::parse(&self.image)
            .with_context(|| format!("invalid image name {:?}", self.image))?;
        let mut source =
            Source::open(&name, deadline).with_context(|| format!("cannot open {name}"))?;
        let layers = source
            .layers()
            .with_context(|| format!("cannot load manifest for {name}"))?;
        debug!(layers = layers.len(), "loaded image");

        let mut out = Destination::from_arg(self.output.as_deref());
        let outcome = Pipeline::new(&mut source, deadline)
            .run(&layers, &self.path, &mut out)
            .with_context(|| format!("extracting {} from {name}", self.path))?;
        Ok(outcome)
    }
}

/// Maps a run's result to the process exit status.
fn exit_code(result: &Result<Outcome>) -> u8 {
    match result {
        Ok(Outcome::NotFound) => EXIT_NOT_FOUND,
        Ok(_) => 0,
        Err(_) => EXIT_FAILURE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use clap::error::ErrorKind;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exit_codes() {
        let found = Ok(Outcome::Found {
            digest: "sha256:ab".into(),
            bytes: 5,
        });
        assert_eq!(exit_code(&found), 0);
        assert_eq!(exit_code(&Ok(Outcome::NotFound)), EXIT_NOT_FOUND);
        assert_eq!(exit_code(&Err(anyhow::anyhow!("boom"))), EXIT_FAILURE);
    }

    #[test]
    fn positional_arguments() {
        let cli = Cli::try_parse_from(["pluck", "alpine:3.20", "etc/os-release"]).unwrap();
        assert_eq!(cli.image, "alpine:3.20");
        assert_eq!(cli.path, "etc/os-release");
        assert_eq!(cli.output, None);
        assert_eq!(cli.timeout, 10);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::try_parse_from([
            "pluck", "-vv", "--timeout", "30", "img", "a", "out.txt",
        ])
        .unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("out.txt")));
        assert_eq!(cli.timeout, 30);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn missing_arguments_are_usage_errors() {
        let err = Cli::try_parse_from(["pluck", "alpine"]).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert!(err.use_stderr());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(Cli::try_parse_from(["pluck", "--timeout", "0", "img", "a"]).is_err());
    }

    #[test]
    fn help_is_not_an_error() {
        let err = Cli::try_parse_from(["pluck", "--help"]).err().unwrap();
        assert!(!err.use_stderr());
    }
}
