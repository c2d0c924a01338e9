use nanoocp_frame::data::{get_ono, get_ono_ty2};
use serde::Serialize;

use crate::cmd::{OnoArgs, OnoScheme};
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{format_ono, OutputFormat};

#[derive(Serialize, Debug, PartialEq)]
struct OnoOutput {
    scheme: &'static str,
    ono: u32,
    hex: String,
}

/// Largest value each component can hold, per scheme.
fn limits(scheme: OnoScheme) -> [(&'static str, u32); 5] {
    match scheme {
        OnoScheme::Ty1 => [
            ("obj-type", 0xF),
            ("record", 0xFF),
            ("channel", 0x1F),
            ("box", 0x7FFF),
            ("object", 0),
        ],
        OnoScheme::Ty2 => [
            ("obj-type", 0xF),
            ("record", 0xFF),
            ("channel", 0xFF),
            ("box", 0x1F),
            ("object", 0x7F),
        ],
    }
}

fn compute(args: &OnoArgs) -> CliResult<OnoOutput> {
    let values = [
        args.object_type,
        args.record,
        args.channel,
        args.box_number,
        args.object,
    ];
    for ((name, max), value) in limits(args.scheme).into_iter().zip(values) {
        if value > max {
            return Err(CliError::new(
                USAGE,
                format!("--{name} {value} does not fit the {:?} scheme (max {max})", args.scheme),
            ));
        }
    }

    let (scheme, ono) = match args.scheme {
        OnoScheme::Ty1 => (
            "ty1",
            get_ono(args.object_type, args.record, args.channel, args.box_number),
        ),
        OnoScheme::Ty2 => (
            "ty2",
            get_ono_ty2(
                args.object_type,
                args.record,
                args.channel,
                args.box_number,
                args.object,
            ),
        ),
    };
    Ok(OnoOutput {
        scheme,
        ono,
        hex: format_ono(ono),
    })
}

pub fn run(args: OnoArgs, format: OutputFormat) -> CliResult<i32> {
    let out = compute(&args)?;
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{} {} ({})", out.scheme, out.hex, out.ono);
        }
        OutputFormat::Raw => println!("{}", out.ono),
    }
    Ok(SUCCESS)
}
