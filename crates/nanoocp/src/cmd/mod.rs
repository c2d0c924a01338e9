use clap::{Args, Subcommand, ValueEnum};
use nanoocp_frame::{CommandDefinition, DataType, DefinitionKind};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod decode;
pub mod get;
pub mod ono;
pub mod serve;
pub mod session;
pub mod set;
pub mod subscribe;
pub mod version;

/// Default OCP.1 port of d&b devices.
pub const DEFAULT_PORT: u16 = 50014;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read a property value.
    Get(GetArgs),
    /// Write a property value.
    Set(SetArgs),
    /// Subscribe to a property and print change notifications.
    Subscribe(SubscribeArgs),
    /// Run a stand-in device that acknowledges every command.
    Serve(ServeArgs),
    /// Compute an object number from its components.
    Ono(OnoArgs),
    /// Decode a hex encoded OCP.1 message.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Get(args) => get::run(args, format),
        Command::Set(args) => set::run(args, format),
        Command::Subscribe(args) => subscribe::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Ono(args) => ono::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Device host name or address.
    #[arg(long, env = "NANOOCP_HOST", default_value = "127.0.0.1")]
    pub host: String,
    /// Device OCP.1 port.
    #[arg(long, env = "NANOOCP_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Connect and response timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct PropertyArgs {
    /// Target object number, decimal or 0x-prefixed hex.
    #[arg(long, value_parser = parse_u32)]
    pub ono: u32,
    /// Class definition level of the property.
    #[arg(long, default_value_t = 4)]
    pub def_level: u16,
    /// Property index within its definition level.
    #[arg(long, default_value_t = 1)]
    pub prop_index: u16,
    /// Wire type of the property value.
    #[arg(long = "type", value_name = "TYPE", default_value = "float32")]
    pub data_type: TypeArg,
    /// Object flavour, selecting the getter method.
    #[arg(long, default_value = "default")]
    pub kind: KindArg,
}

impl PropertyArgs {
    pub fn definition(&self) -> CommandDefinition {
        CommandDefinition::new(
            self.ono,
            self.data_type.into(),
            self.def_level,
            self.prop_index,
        )
        .with_kind(self.kind.into())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TypeArg {
    Bool,
    Int32,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    String,
    Blob,
    Position,
}

impl From<TypeArg> for DataType {
    fn from(value: TypeArg) -> Self {
        match value {
            TypeArg::Bool => DataType::Boolean,
            TypeArg::Int32 => DataType::Int32,
            TypeArg::Uint8 => DataType::UInt8,
            TypeArg::Uint16 => DataType::UInt16,
            TypeArg::Uint32 => DataType::UInt32,
            TypeArg::Uint64 => DataType::UInt64,
            TypeArg::Float32 => DataType::Float32,
            TypeArg::Float64 => DataType::Float64,
            TypeArg::String => DataType::String,
            TypeArg::Blob => DataType::Blob,
            TypeArg::Position => DataType::DbPosition,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Default,
    SwitchNames,
    SwitchEnableds,
    SceneAgent,
}

impl From<KindArg> for DefinitionKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Default => DefinitionKind::Default,
            KindArg::SwitchNames => DefinitionKind::SwitchPositionNames,
            KindArg::SwitchEnableds => DefinitionKind::SwitchPositionEnableds,
            KindArg::SceneAgent => DefinitionKind::SceneAgent,
        }
    }
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    #[command(flatten)]
    pub property: PropertyArgs,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    #[command(flatten)]
    pub property: PropertyArgs,
    /// New value, converted to the property type.
    #[arg(long, allow_hyphen_values = true)]
    pub value: String,
}

#[derive(Args, Debug)]
pub struct SubscribeArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    #[command(flatten)]
    pub property: PropertyArgs,
    /// Exit after receiving N notifications.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on; empty listens on all interfaces.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,
    /// Port to listen on; 0 picks a free port.
    #[arg(long, env = "NANOOCP_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Heartbeat in seconds announced in a KeepAlive when a controller connects.
    #[arg(long, default_value_t = 30)]
    pub keepalive: u16,
    /// Float32 payload attached to every OK response.
    #[arg(long, allow_hyphen_values = true)]
    pub reply_float: Option<f32>,
    /// Exit after answering N commands.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OnoScheme {
    /// 4-bit type, 8-bit record, 5-bit channel, 15-bit box.
    Ty1,
    /// 4-bit type, 8-bit record, 8-bit channel, 5-bit box, 7-bit object.
    Ty2,
}

#[derive(Args, Debug)]
pub struct OnoArgs {
    #[arg(long, value_enum, default_value = "ty1")]
    pub scheme: OnoScheme,
    #[arg(long = "obj-type", default_value_t = 1)]
    pub object_type: u32,
    #[arg(long, default_value_t = 0)]
    pub record: u32,
    #[arg(long, default_value_t = 0)]
    pub channel: u32,
    #[arg(long = "box", default_value_t = 0)]
    pub box_number: u32,
    /// Object number within the box (ty2 only).
    #[arg(long, default_value_t = 0)]
    pub object: u32,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// The complete message as hex; whitespace is ignored.
    pub hex: String,
    /// Decode the payload as this type.
    #[arg(long = "type", value_name = "TYPE")]
    pub data_type: Option<TypeArg>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Decimal or `0x`-prefixed hexadecimal.
pub fn parse_u32(input: &str) -> Result<u32, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|err| format!("invalid number {input:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_decimal_object_numbers() {
        assert_eq!(parse_u32("0x00201001"), Ok(0x0020_1001));
        assert_eq!(parse_u32("4096"), Ok(4096));
        assert!(parse_u32("0xzz").is_err());
    }

    #[test]
    fn property_args_build_definition() {
        let args = PropertyArgs {
            ono: 0x1000_2001,
            def_level: 4,
            prop_index: 2,
            data_type: TypeArg::Float32,
            kind: KindArg::SwitchNames,
        };
        let definition = args.definition();
        assert_eq!(definition.target_ono, 0x1000_2001);
        assert_eq!(definition.data_type(), DataType::Float32);
        assert_eq!(definition.kind, DefinitionKind::SwitchPositionNames);
    }
}
