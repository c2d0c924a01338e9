use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nanoocp_frame::data::{handle_to_string, status_to_string};
use nanoocp_frame::{DataType, Message, Variant};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Printable fields of one OCP.1 message.
#[derive(Serialize, Debug, Default, PartialEq)]
pub struct MessageReport {
    pub message_type: &'static str,
    pub size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ono: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_def_level: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method_index: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emitter_ono: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_def_level: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_index: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_seconds: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heartbeat_millis: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_count: Option<u8>,
    pub payload: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl MessageReport {
    pub fn new(message: &Message) -> Self {
        let mut report = Self {
            message_type: message.message_type().name(),
            size: message.header().frame_len(),
            payload: hex::encode(message.parameter_data()),
            ..Self::default()
        };

        match message {
            Message::Command(m) => {
                report.handle = Some(m.handle());
                report.target_ono = Some(m.target_ono());
                report.method_def_level = Some(m.method_def_level());
                report.method_index = Some(m.method_index());
                report.param_count = Some(m.param_count());
            }
            Message::CommandResponseRequired(m) => {
                report.handle = Some(m.handle());
                report.target_ono = Some(m.target_ono());
                report.method_def_level = Some(m.method_def_level());
                report.method_index = Some(m.method_index());
                report.param_count = Some(m.param_count());
            }
            Message::Notification(m) => {
                report.emitter_ono = Some(m.emitter_ono());
                report.property_def_level = Some(m.property_def_level());
                report.property_index = Some(m.property_index());
                report.param_count = Some(m.param_count());
            }
            Message::Response(m) => {
                report.handle = Some(m.handle());
                report.status = Some(m.status());
                report.status_name = Some(status_to_string(m.status()));
                report.param_count = Some(m.param_count());
            }
            Message::KeepAlive(m) => {
                let seconds = m.heartbeat_seconds();
                let millis = m.heartbeat_millis();
                report.heartbeat_seconds = (m.parameter_data().len() == 2).then_some(seconds);
                report.heartbeat_millis = (m.parameter_data().len() == 4).then_some(millis);
            }
        }
        report
    }

    /// Decode the payload as `data_type` into [`MessageReport::value`].
    ///
    /// A payload that does not decode leaves `value` empty.
    pub fn with_value(mut self, data: &[u8], data_type: DataType) -> Self {
        self.data_type = Some(data_type.name());
        self.value = Variant::from_param_data(data, data_type)
            .ok()
            .and_then(|value| render_value(&value, data_type));
        self
    }

    fn rows(&self) -> Vec<(&'static str, String)> {
        let mut rows = vec![
            ("type", self.message_type.to_string()),
            ("size", self.size.to_string()),
        ];
        let mut push = |name: &'static str, value: Option<String>| {
            if let Some(value) = value {
                rows.push((name, value));
            }
        };
        push("handle", self.handle.map(handle_to_string));
        push("target_ono", self.target_ono.map(format_ono));
        push("method", method_label(self.method_def_level, self.method_index));
        push(
            "status",
            self.status_name
                .as_ref()
                .zip(self.status)
                .map(|(name, code)| format!("{name} ({code})")),
        );
        push("emitter_ono", self.emitter_ono.map(format_ono));
        push("property", method_label(self.property_def_level, self.property_index));
        push("heartbeat", self.heartbeat_seconds.map(|s| format!("{s}s")));
        push("heartbeat", self.heartbeat_millis.map(|ms| format!("{ms}ms")));
        push("param_count", self.param_count.map(|c| c.to_string()));
        push("data_type", self.data_type.map(str::to_string));
        push("value", self.value.clone());
        rows.push(("payload", self.payload.clone()));
        rows
    }
}

pub fn print_report(report: &MessageReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "VALUE"]);
            for (name, value) in report.rows() {
                table.add_row(vec![name.to_string(), value]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            let line = report
                .rows()
                .into_iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("{line}");
        }
        OutputFormat::Raw => {
            println!("{}", report.value.as_deref().unwrap_or(&report.payload));
        }
    }
}

/// Text form of a decoded value. Blobs print as hex.
pub fn render_value(value: &Variant, data_type: DataType) -> Option<String> {
    match data_type {
        DataType::DbPosition => value
            .to_position_string()
            .or_else(|| value.to_aiming_and_position_string())
            .or_else(|| value.to_byte_vector().map(hex::encode)),
        DataType::Blob => value.to_byte_vector().map(hex::encode),
        _ => value.to_string_value(),
    }
}

pub fn format_ono(ono: u32) -> String {
    format!("0x{ono:08x}")
}

fn method_label(def_level: Option<u16>, index: Option<u16>) -> Option<String> {
    Some(format!("{}.{}", def_level?, index?))
}
