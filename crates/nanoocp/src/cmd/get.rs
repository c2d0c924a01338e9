use nanoocp_frame::Message;

use crate::cmd::session::Session;
use crate::cmd::GetArgs;
use crate::exit::{CliResult, FAILURE, SUCCESS};
use crate::output::{print_report, MessageReport, OutputFormat};

pub fn run(args: GetArgs, format: OutputFormat) -> CliResult<i32> {
    let definition = args.property.definition();
    let session = Session::open(&args.target)?;
    let response = session.request(&definition.get_value())?;
    session.close()?;

    let ok = response.status() == 0;
    let data_type = definition.data_type();
    let message = Message::from(response);
    let report = MessageReport::new(&message).with_value(message.parameter_data(), data_type);
    print_report(&report, format);

    Ok(if ok { SUCCESS } else { FAILURE })
}
