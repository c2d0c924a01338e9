use nanoocp_frame::{Message, Variant};

use crate::cmd::session::Session;
use crate::cmd::SetArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, FAILURE, SUCCESS};
use crate::output::{print_report, MessageReport, OutputFormat};

pub fn run(args: SetArgs, format: OutputFormat) -> CliResult<i32> {
    let definition = args.property.definition();
    let value = Variant::String(args.value.clone());
    let command = definition.set_value(&value).ok_or_else(|| {
        CliError::new(
            DATA_INVALID,
            format!(
                "value {:?} cannot be sent as {}",
                args.value,
                definition.data_type()
            ),
        )
    })?;

    let session = Session::open(&args.target)?;
    let response = session.request(&command)?;
    session.close()?;

    let ok = response.status() == 0;
    print_report(&MessageReport::new(&Message::from(response)), format);
    Ok(if ok { SUCCESS } else { FAILURE })
}
