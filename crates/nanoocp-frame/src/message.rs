//! OCP.1 message kinds, serialization and parsing.
//!
//! Every message serializes as a [`Header`] followed by a type specific
//! body. [`Message::unmarshal`] is the single parsing entry point: it
//! validates the header, dispatches on the type and returns `None` for
//! anything malformed, truncated or unsupported.

use std::sync::atomic::{AtomicU32, Ordering};

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{Header, MessageType, HEADER_SIZE};
use crate::data::{read_u16, read_u32};
use crate::definition::CommandDefinition;

/// Handle value that never identifies a command.
pub const INVALID_SESSION_ID: u32 = 0;
/// Handle value reserved for local use.
pub const LOCAL_SESSION_ID: u32 = 1;
/// First handle handed out by [`next_handle`].
pub const FIRST_HANDLE: u32 = 2;

/// Size field minimum of a command body (size, handle, ONo, method id).
const MIN_COMMAND_SIZE: usize = 16;
/// Response body bytes in front of the parameters.
const RESPONSE_OVERHEAD: usize = 10;
/// Notification body bytes in front of and behind the value, context excluded.
const NOTIFICATION_OVERHEAD: usize = 28;
/// Parameter count written into every notification.
const NOTIFICATION_PARAM_COUNT: u8 = 2;
/// Change type appended to every notification (CurrentChanged).
const NOTIFICATION_CHANGE_TYPE: u8 = 0x01;

static NEXT_HANDLE: AtomicU32 = AtomicU32::new(FIRST_HANDLE);

/// Allocate a process wide command handle.
///
/// Handles increase monotonically and skip the reserved values 0 and 1 when
/// the counter wraps.
pub fn next_handle() -> u32 {
    let previous = NEXT_HANDLE.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |handle| {
        Some(if handle == u32::MAX {
            FIRST_HANDLE
        } else {
            handle + 1
        })
    });
    // The closure always returns Some, so both arms carry the previous value.
    match previous {
        Ok(handle) | Err(handle) => handle,
    }
}

#[allow(clippy::too_many_arguments)]
fn encode_command_body(
    dst: &mut BytesMut,
    message_type: MessageType,
    handle: u32,
    target_ono: u32,
    method_def_level: u16,
    method_index: u16,
    param_count: u8,
    parameter_data: &[u8],
) {
    let header = Header::new(message_type, parameter_data.len());
    dst.reserve(header.frame_len());
    header.encode(dst);
    dst.put_u32(header.message_size - 9);
    dst.put_u32(handle);
    dst.put_u32(target_ono);
    dst.put_u16(method_def_level);
    dst.put_u16(method_index);
    dst.put_u8(param_count);
    dst.put_slice(parameter_data);
}

/// A method call that expects a [`Response`] carrying the same handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResponseRequired {
    handle: u32,
    target_ono: u32,
    method_def_level: u16,
    method_index: u16,
    param_count: u8,
    parameter_data: Vec<u8>,
}

impl CommandResponseRequired {
    /// Build a command with a freshly allocated handle.
    pub fn new(
        target_ono: u32,
        method_def_level: u16,
        method_index: u16,
        param_count: u8,
        parameter_data: Vec<u8>,
    ) -> Self {
        Self {
            handle: next_handle(),
            target_ono,
            method_def_level,
            method_index,
            param_count,
            parameter_data,
        }
    }

    /// Build a command from a definition, allocating a new handle.
    pub fn from_definition(definition: &CommandDefinition) -> Self {
        Self::new(
            definition.target_ono,
            definition.def_level,
            definition.property_index,
            definition.param_count,
            definition.param_data.clone(),
        )
    }

    /// Replace the allocated handle, for replies to a known request.
    pub fn with_handle(mut self, handle: u32) -> Self {
        self.handle = handle;
        self
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn target_ono(&self) -> u32 {
        self.target_ono
    }

    pub fn method_def_level(&self) -> u16 {
        self.method_def_level
    }

    pub fn method_index(&self) -> u16 {
        self.method_index
    }

    pub fn param_count(&self) -> u8 {
        self.param_count
    }

    pub fn parameter_data(&self) -> &[u8] {
        &self.parameter_data
    }

    fn encode(&self, dst: &mut BytesMut) {
        encode_command_body(
            dst,
            MessageType::CommandResponseRequired,
            self.handle,
            self.target_ono,
            self.method_def_level,
            self.method_index,
            self.param_count,
            &self.parameter_data,
        );
    }

    fn unmarshal(data: &[u8]) -> Option<Self> {
        let command_size = read_u32(data, HEADER_SIZE)? as usize;
        if command_size < MIN_COMMAND_SIZE {
            return None;
        }
        let end = HEADER_SIZE.checked_add(command_size)?;
        if data.len() < end {
            return None;
        }

        let handle = read_u32(data, 14)?;
        let target_ono = read_u32(data, 18)?;
        let method_def_level = read_u16(data, 22)?;
        let method_index = read_u16(data, 24)?;
        if handle == INVALID_SESSION_ID || target_ono == 0 || method_def_level < 1 || method_index < 1
        {
            return None;
        }

        let param_count = data.get(26).copied().unwrap_or(0);
        let parameter_data = if param_count > 0 && end > 27 {
            data[27..end].to_vec()
        } else {
            Vec::new()
        };

        Some(Self {
            handle,
            target_ono,
            method_def_level,
            method_index,
            param_count,
            parameter_data,
        })
    }
}

/// A method call that expects no response.
///
/// It can be built and sent, but received commands of this type are not
/// parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    handle: u32,
    target_ono: u32,
    method_def_level: u16,
    method_index: u16,
    param_count: u8,
    parameter_data: Vec<u8>,
}

impl Command {
    pub fn new(
        target_ono: u32,
        method_def_level: u16,
        method_index: u16,
        param_count: u8,
        parameter_data: Vec<u8>,
    ) -> Self {
        Self {
            handle: next_handle(),
            target_ono,
            method_def_level,
            method_index,
            param_count,
            parameter_data,
        }
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    pub fn target_ono(&self) -> u32 {
        self.target_ono
    }

    pub fn method_def_level(&self) -> u16 {
        self.method_def_level
    }

    pub fn method_index(&self) -> u16 {
        self.method_index
    }

    pub fn param_count(&self) -> u8 {
        self.param_count
    }

    pub fn parameter_data(&self) -> &[u8] {
        &self.parameter_data
    }

    fn encode(&self, dst: &mut BytesMut) {
        encode_command_body(
            dst,
            MessageType::Command,
            self.handle,
            self.target_ono,
            self.method_def_level,
            self.method_index,
            self.param_count,
            &self.parameter_data,
        );
    }
}

/// Reply to a [`CommandResponseRequired`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    handle: u32,
    status: u8,
    param_count: u8,
    parameter_data: Vec<u8>,
}

impl Response {
    pub fn new(handle: u32, status: u8, param_count: u8, parameter_data: Vec<u8>) -> Self {
        Self {
            handle,
            status,
            param_count,
            parameter_data,
        }
    }

    pub fn handle(&self) -> u32 {
        self.handle
    }

    /// Status code, see [`crate::data::status_to_string`].
    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn param_count(&self) -> u8 {
        self.param_count
    }

    pub fn parameter_data(&self) -> &[u8] {
        &self.parameter_data
    }

    fn encode(&self, dst: &mut BytesMut) {
        let header = Header::new(MessageType::Response, self.parameter_data.len());
        dst.reserve(header.frame_len());
        header.encode(dst);
        dst.put_u32(header.message_size - 9);
        dst.put_u32(self.handle);
        dst.put_u8(self.status);
        dst.put_u8(self.param_count);
        dst.put_slice(&self.parameter_data);
    }

    fn unmarshal(data: &[u8]) -> Option<Self> {
        let size = read_u32(data, HEADER_SIZE)? as usize;
        if size < RESPONSE_OVERHEAD {
            return None;
        }
        let handle = read_u32(data, 14)?;
        if handle == INVALID_SESSION_ID {
            return None;
        }
        let status = *data.get(18)?;
        let param_count = *data.get(19)?;
        let payload_len = size - RESPONSE_OVERHEAD;
        let parameter_data = data.get(20..20 + payload_len)?.to_vec();

        Some(Self {
            handle,
            status,
            param_count,
            parameter_data,
        })
    }
}

/// A PropertyChanged event pushed by a device for a subscribed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    emitter_ono: u32,
    property_def_level: u16,
    property_index: u16,
    param_count: u8,
    parameter_data: Vec<u8>,
}

impl Notification {
    pub fn new(
        emitter_ono: u32,
        property_def_level: u16,
        property_index: u16,
        parameter_data: Vec<u8>,
    ) -> Self {
        Self {
            emitter_ono,
            property_def_level,
            property_index,
            param_count: NOTIFICATION_PARAM_COUNT,
            parameter_data,
        }
    }

    pub fn emitter_ono(&self) -> u32 {
        self.emitter_ono
    }

    pub fn property_def_level(&self) -> u16 {
        self.property_def_level
    }

    pub fn property_index(&self) -> u16 {
        self.property_index
    }

    pub fn param_count(&self) -> u8 {
        self.param_count
    }

    /// The new property value.
    pub fn parameter_data(&self) -> &[u8] {
        &self.parameter_data
    }

    /// Whether this event was emitted for the property a definition targets.
    pub fn matches_object(&self, definition: &CommandDefinition) -> bool {
        self.emitter_ono == definition.target_ono
            && self.property_def_level == definition.def_level
            && self.property_index == definition.property_index
    }

    fn encode(&self, dst: &mut BytesMut) {
        let header = Header::new(MessageType::Notification, self.parameter_data.len());
        dst.reserve(header.frame_len());
        header.encode(dst);
        dst.put_u32(header.message_size - 9);
        dst.put_u32(self.emitter_ono);
        // Subscriber method 3.1.
        dst.put_u16(0x0003);
        dst.put_u16(0x0001);
        dst.put_u8(NOTIFICATION_PARAM_COUNT);
        // Empty context.
        dst.put_u16(0x0000);
        // Event id 1.1 (PropertyChanged) of the emitter.
        dst.put_u32(self.emitter_ono);
        dst.put_u16(0x0001);
        dst.put_u16(0x0001);
        dst.put_u16(self.property_def_level);
        dst.put_u16(self.property_index);
        dst.put_slice(&self.parameter_data);
        dst.put_u8(NOTIFICATION_CHANGE_TYPE);
    }

    fn unmarshal(data: &[u8]) -> Option<Self> {
        let size = read_u32(data, HEADER_SIZE)? as usize;
        if size < NOTIFICATION_OVERHEAD + 1 {
            return None;
        }

        let target_ono = read_u32(data, 14)?;
        let method_def_level = read_u16(data, 18)?;
        let method_index = read_u16(data, 20)?;
        let param_count = *data.get(22)?;
        if target_ono == 0 || method_def_level < 1 || method_index < 1 || param_count < 1 {
            return None;
        }

        let context = usize::from(read_u16(data, 23)?);
        let emitter_ono = read_u32(data, 25 + context)?;
        let event_def_level = read_u16(data, 29 + context)?;
        let event_index = read_u16(data, 31 + context)?;
        let property_def_level = read_u16(data, 33 + context)?;
        let property_index = read_u16(data, 35 + context)?;
        if emitter_ono == 0
            || event_def_level != 1
            || event_index != 1
            || property_def_level == 0
            || property_index == 0
        {
            return None;
        }

        let value_len = size.checked_sub(NOTIFICATION_OVERHEAD + context)?;
        if value_len < 1 {
            return None;
        }
        let start = 37 + context;
        let parameter_data = data.get(start..start + value_len)?.to_vec();

        Some(Self {
            emitter_ono,
            property_def_level,
            property_index,
            param_count,
            parameter_data,
        })
    }
}

/// Heartbeat advertising the sender's keep-alive interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAlive {
    parameter_data: Vec<u8>,
}

impl KeepAlive {
    /// Interval in whole seconds, 2 byte payload.
    pub fn from_seconds(seconds: u16) -> Self {
        Self {
            parameter_data: seconds.to_be_bytes().to_vec(),
        }
    }

    /// Interval in milliseconds, 4 byte payload.
    pub fn from_millis(millis: u32) -> Self {
        Self {
            parameter_data: millis.to_be_bytes().to_vec(),
        }
    }

    /// Interval in seconds, or 0 if this heartbeat carries milliseconds.
    pub fn heartbeat_seconds(&self) -> u16 {
        match self.parameter_data.as_slice() {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            _ => 0,
        }
    }

    /// Interval in milliseconds, or 0 if this heartbeat carries seconds.
    pub fn heartbeat_millis(&self) -> u32 {
        match self.parameter_data.as_slice() {
            [a, b, c, d] => u32::from_be_bytes([*a, *b, *c, *d]),
            _ => 0,
        }
    }

    pub fn parameter_data(&self) -> &[u8] {
        &self.parameter_data
    }

    fn encode(&self, dst: &mut BytesMut) {
        let header = Header::new(MessageType::KeepAlive, self.parameter_data.len());
        dst.reserve(header.frame_len());
        header.encode(dst);
        dst.put_slice(&self.parameter_data);
    }

    fn unmarshal(header: &Header, data: &[u8]) -> Option<Self> {
        if header.frame_len() == HEADER_SIZE + 4 {
            return read_u32(data, HEADER_SIZE).map(Self::from_millis);
        }
        read_u16(data, HEADER_SIZE).map(Self::from_seconds)
    }
}

/// Any OCP.1 message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Command(Command),
    CommandResponseRequired(CommandResponseRequired),
    Notification(Notification),
    Response(Response),
    KeepAlive(KeepAlive),
}

impl Message {
    /// Parse one complete message. Returns `None` for an invalid header,
    /// an unparseable body or a plain [`Command`].
    pub fn unmarshal(data: &[u8]) -> Option<Self> {
        let header = Header::parse(data)?;
        if !header.is_valid() {
            return None;
        }

        match header.kind()? {
            MessageType::Command => None,
            MessageType::CommandResponseRequired => {
                CommandResponseRequired::unmarshal(data).map(Self::CommandResponseRequired)
            }
            MessageType::Notification => Notification::unmarshal(data).map(Self::Notification),
            MessageType::Response => Response::unmarshal(data).map(Self::Response),
            MessageType::KeepAlive => KeepAlive::unmarshal(&header, data).map(Self::KeepAlive),
        }
    }

    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Command(_) => MessageType::Command,
            Self::CommandResponseRequired(_) => MessageType::CommandResponseRequired,
            Self::Notification(_) => MessageType::Notification,
            Self::Response(_) => MessageType::Response,
            Self::KeepAlive(_) => MessageType::KeepAlive,
        }
    }

    pub fn parameter_data(&self) -> &[u8] {
        match self {
            Self::Command(m) => m.parameter_data(),
            Self::CommandResponseRequired(m) => m.parameter_data(),
            Self::Notification(m) => m.parameter_data(),
            Self::Response(m) => m.parameter_data(),
            Self::KeepAlive(m) => m.parameter_data(),
        }
    }

    /// The header this message serializes with.
    pub fn header(&self) -> Header {
        Header::new(self.message_type(), self.parameter_data().len())
    }

    /// Append the wire form of this message to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Self::Command(m) => m.encode(dst),
            Self::CommandResponseRequired(m) => m.encode(dst),
            Self::Notification(m) => m.encode(dst),
            Self::Response(m) => m.encode(dst),
            Self::KeepAlive(m) => m.encode(dst),
        }
    }

    /// The wire form of this message.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.freeze()
    }
}

impl From<Command> for Message {
    fn from(value: Command) -> Self {
        Self::Command(value)
    }
}

impl From<CommandResponseRequired> for Message {
    fn from(value: CommandResponseRequired) -> Self {
        Self::CommandResponseRequired(value)
    }
}

impl From<Notification> for Message {
    fn from(value: Notification) -> Self {
        Self::Notification(value)
    }
}

impl From<Response> for Message {
    fn from(value: Response) -> Self {
        Self::Response(value)
    }
}

impl From<KeepAlive> for Message {
    fn from(value: KeepAlive) -> Self {
        Self::KeepAlive(value)
    }
}
