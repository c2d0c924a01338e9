mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "nanoocp", version, about = "AES70 / OCP.1 device CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_get_subcommand() {
        let cli = Cli::try_parse_from([
            "nanoocp",
            "get",
            "--host",
            "10.0.0.5",
            "--ono",
            "0x10002001",
            "--prop-index",
            "2",
        ])
        .expect("get args should parse");

        let Command::Get(args) = cli.command else {
            panic!("expected get");
        };
        assert_eq!(args.target.host, "10.0.0.5");
        assert_eq!(args.property.ono, 0x1000_2001);
        assert_eq!(args.property.prop_index, 2);
        assert_eq!(args.property.def_level, 4);
    }

    #[test]
    fn set_accepts_negative_values() {
        let cli = Cli::try_parse_from([
            "nanoocp", "set", "--ono", "4096", "--type", "float32", "--value", "-6.5",
        ])
        .expect("set args should parse");

        let Command::Set(args) = cli.command else {
            panic!("expected set");
        };
        assert_eq!(args.value, "-6.5");
    }

    #[test]
    fn set_requires_value() {
        let err = Cli::try_parse_from(["nanoocp", "set", "--ono", "4096"])
            .expect_err("missing value should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn rejects_unknown_type() {
        let err = Cli::try_parse_from(["nanoocp", "get", "--ono", "1", "--type", "float16"])
            .expect_err("unknown type should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }

    #[test]
    fn global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["nanoocp", "ono", "--record", "2", "--format", "json"])
            .expect("ono args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        assert!(matches!(cli.command, Command::Ono(_)));
    }
}
