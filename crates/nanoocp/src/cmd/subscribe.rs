use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nanoocp_frame::data::status_to_string;
use nanoocp_frame::Message;
use tracing::{info, warn};

use crate::cmd::session::{install_ctrlc_handler, Session};
use crate::cmd::SubscribeArgs;
use crate::exit::{CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{format_ono, print_report, MessageReport, OutputFormat};

const POLL: Duration = Duration::from_millis(200);

pub fn run(args: SubscribeArgs, format: OutputFormat) -> CliResult<i32> {
    let definition = args.property.definition();
    let session = Session::open(&args.target)?;

    let response = session.request(&definition.add_subscription())?;
    if response.status() != 0 {
        return Err(CliError::new(
            FAILURE,
            format!("subscription refused: {}", status_to_string(response.status())),
        ));
    }
    info!(ono = %format_ono(definition.target_ono), "subscribed");

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let Some(message) = session.next_message(POLL)? else {
            continue;
        };
        let Message::Notification(notification) = &message else {
            continue;
        };
        if !notification.matches_object(&definition) {
            continue;
        }

        let report = MessageReport::new(&message)
            .with_value(notification.parameter_data(), definition.data_type());
        print_report(&report, format);
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    if let Err(err) = session.request(&definition.remove_subscription()) {
        warn!(error = %err, "failed to remove subscription");
    }
    session.close()?;
    Ok(SUCCESS)
}
