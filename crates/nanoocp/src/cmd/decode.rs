use nanoocp_frame::{Header, Message, HEADER_SIZE};

use crate::cmd::DecodeArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_report, MessageReport, OutputFormat};

fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let compact = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(compact.as_str());
    hex::decode(compact).map_err(|err| CliError::new(USAGE, format!("invalid hex input: {err}")))
}

fn decode(bytes: &[u8]) -> CliResult<Message> {
    let Some(header) = Header::parse(bytes) else {
        return Err(CliError::new(
            DATA_INVALID,
            format!("need at least {HEADER_SIZE} bytes, got {}", bytes.len()),
        ));
    };
    if !header.is_valid() {
        return Err(CliError::new(
            DATA_INVALID,
            format!("invalid header: {header:?}"),
        ));
    }
    Message::unmarshal(bytes).ok_or_else(|| {
        CliError::new(
            DATA_INVALID,
            format!(
                "{} message of {} bytes does not parse",
                header.kind().map_or("unknown", |kind| kind.name()),
                bytes.len()
            ),
        )
    })
}

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    let message = decode(&bytes)?;

    let mut report = MessageReport::new(&message);
    if let Some(data_type) = args.data_type {
        report = report.with_value(message.parameter_data(), data_type.into());
    }
    print_report(&report, format);
    Ok(SUCCESS)
}
