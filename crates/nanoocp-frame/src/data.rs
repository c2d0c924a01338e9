//! Big-endian primitive codec and small protocol helpers.
//!
//! Every decoder returns `None` when the input is too short (or, for
//! booleans, not exactly one byte). Encoders never fail. Values that carry
//! extra bytes beyond what a primitive needs are decoded from the leading
//! bytes and the rest is ignored.

use std::fmt;

/// OCA object number of the subscription manager.
pub const SUBSCRIPTION_MANAGER_ONO: u32 = 0x04;

/// OCP.1 data type codes for property values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum DataType {
    #[default]
    None = 0,
    Boolean = 1,
    Int8 = 2,
    Int16 = 3,
    Int32 = 4,
    Int64 = 5,
    UInt8 = 6,
    UInt16 = 7,
    UInt32 = 8,
    UInt64 = 9,
    Float32 = 10,
    Float64 = 11,
    String = 12,
    BitString = 13,
    Blob = 14,
    BlobFixedLength = 15,
    /// d&b specific: 3, 6 or 9 packed floats describing a position.
    DbPosition = 32,
    Custom = 128,
}

impl DataType {
    /// Map a wire code to a data type.
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::Boolean,
            2 => Self::Int8,
            3 => Self::Int16,
            4 => Self::Int32,
            5 => Self::Int64,
            6 => Self::UInt8,
            7 => Self::UInt16,
            8 => Self::UInt32,
            9 => Self::UInt64,
            10 => Self::Float32,
            11 => Self::Float64,
            12 => Self::String,
            13 => Self::BitString,
            14 => Self::Blob,
            15 => Self::BlobFixedLength,
            32 => Self::DbPosition,
            128 => Self::Custom,
            _ => return None,
        })
    }

    /// Wire code of this data type.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human readable name. `None` has no name and yields an empty string.
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "",
            Self::Boolean => "Boolean",
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::UInt8 => "UInt8",
            Self::UInt16 => "UInt16",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::Float32 => "Float32",
            Self::Float64 => "Float64",
            Self::String => "String",
            Self::BitString => "BitString",
            Self::Blob => "Blob",
            Self::BlobFixedLength => "BlobFixedLength",
            Self::DbPosition => "Position (d&b)",
            Self::Custom => "Custom",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name of a raw data type code. Unknown codes yield an empty string.
pub fn data_type_to_string(code: u8) -> String {
    DataType::from_u8(code)
        .map(|ty| ty.name().to_string())
        .unwrap_or_default()
}

/// Name of an OCP.1 response status code, or its decimal value if unknown.
pub fn status_to_string(status: u8) -> String {
    let name = match status {
        0 => "OK",
        1 => "ProtocolVersionError",
        2 => "DeviceError",
        3 => "Locked",
        4 => "BadFormat",
        5 => "BadONo",
        6 => "ParameterError",
        7 => "ParameterOutOfRange",
        8 => "NotImplemented",
        9 => "InvalidRequest",
        10 => "ProcessingFailed",
        11 => "BadMethod",
        12 => "PartiallySucceeded",
        13 => "Timeout",
        14 => "BufferOverflow",
        15 => "PermissionDenied",
        other => return other.to_string(),
    };
    name.to_string()
}

/// Name of a reserved message handle, or its decimal value.
pub fn handle_to_string(handle: u32) -> String {
    match handle {
        0 => "InvalidSessionID".to_string(),
        1 => "LocalSessionID".to_string(),
        other => other.to_string(),
    }
}

fn array_at<const N: usize>(data: &[u8], offset: usize) -> Option<[u8; N]> {
    let end = offset.checked_add(N)?;
    data.get(offset..end)?.try_into().ok()
}

/// Read a big-endian `u16` at `offset`.
pub fn read_u16(data: &[u8], offset: usize) -> Option<u16> {
    array_at(data, offset).map(u16::from_be_bytes)
}

/// Read a big-endian `u32` at `offset`.
pub fn read_u32(data: &[u8], offset: usize) -> Option<u32> {
    array_at(data, offset).map(u32::from_be_bytes)
}

fn read_f32(data: &[u8], offset: usize) -> Option<f32> {
    read_u32(data, offset).map(f32::from_bits)
}

pub fn data_to_bool(data: &[u8]) -> Option<bool> {
    match data {
        [byte] => Some(*byte == 1),
        _ => None,
    }
}

pub fn data_from_bool(value: bool) -> Vec<u8> {
    vec![u8::from(value)]
}

pub fn data_to_i32(data: &[u8]) -> Option<i32> {
    array_at(data, 0).map(i32::from_be_bytes)
}

pub fn data_from_i32(value: i32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn data_to_u8(data: &[u8]) -> Option<u8> {
    data.first().copied()
}

pub fn data_from_u8(value: u8) -> Vec<u8> {
    vec![value]
}

pub fn data_to_u16(data: &[u8]) -> Option<u16> {
    read_u16(data, 0)
}

pub fn data_from_u16(value: u16) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn data_to_u32(data: &[u8]) -> Option<u32> {
    read_u32(data, 0)
}

pub fn data_from_u32(value: u32) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

pub fn data_to_u64(data: &[u8]) -> Option<u64> {
    array_at(data, 0).map(u64::from_be_bytes)
}

pub fn data_from_u64(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// Decode a length-prefixed string. Invalid UTF-8 is replaced lossily.
pub fn data_to_string(data: &[u8]) -> Option<String> {
    let len = usize::from(read_u16(data, 0)?);
    let bytes = data.get(2..2 + len)?;
    Some(String::from_utf8_lossy(bytes).into_owned())
}

/// Encode a string with its `u16` byte length in front. Strings longer than
/// `u16::MAX` bytes are cut off.
pub fn data_from_string(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let len = bytes.len().min(usize::from(u16::MAX));
    let mut out = Vec::with_capacity(2 + len);
    out.extend_from_slice(&(len as u16).to_be_bytes());
    out.extend_from_slice(&bytes[..len]);
    out
}

pub fn data_to_f32(data: &[u8]) -> Option<f32> {
    read_f32(data, 0)
}

pub fn data_from_f32(value: f32) -> Vec<u8> {
    value.to_bits().to_be_bytes().to_vec()
}

pub fn data_to_f64(data: &[u8]) -> Option<f64> {
    array_at(data, 0).map(u64::from_be_bytes).map(f64::from_bits)
}

pub fn data_from_f64(value: f64) -> Vec<u8> {
    value.to_bits().to_be_bytes().to_vec()
}

fn floats_to_data(values: &[f32]) -> Vec<u8> {
    values
        .iter()
        .flat_map(|value| value.to_bits().to_be_bytes())
        .collect()
}

/// Decode `N` consecutive big-endian floats from the start of `data`.
pub(crate) fn data_to_floats<const N: usize>(data: &[u8]) -> Option<[f32; N]> {
    let mut out = [0f32; N];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = read_f32(data, i * 4)?;
    }
    Some(out)
}

/// Encode a position as three floats `x, y, z`.
pub fn data_from_position(x: f32, y: f32, z: f32) -> Vec<u8> {
    floats_to_data(&[x, y, z])
}

/// Encode aiming and position as six floats in wire order
/// `h, v, r, x, y, z`.
pub fn data_from_aiming_and_position(
    h: f32,
    v: f32,
    r: f32,
    x: f32,
    y: f32,
    z: f32,
) -> Vec<u8> {
    floats_to_data(&[h, v, r, x, y, z])
}

/// Same layout as [`data_from_aiming_and_position`], taking the position
/// first.
pub fn data_from_position_and_rotation(
    x: f32,
    y: f32,
    z: f32,
    h: f32,
    v: f32,
    r: f32,
) -> Vec<u8> {
    data_from_aiming_and_position(h, v, r, x, y, z)
}

/// Parameters for `AddSubscription` (when `add`) or `RemoveSubscription`
/// on the subscription manager, targeting the PropertyChanged event of
/// `ono`.
pub fn data_from_ono_for_subscription(ono: u32, add: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(25);
    // Event: emitter ONo plus event id 1.1 (PropertyChanged).
    out.extend_from_slice(&ono.to_be_bytes());
    out.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
    // Subscriber method: the subscriber object and method 3.1.
    out.extend_from_slice(&ono.to_be_bytes());
    out.extend_from_slice(&[0x00, 0x03, 0x00, 0x01]);
    if add {
        // Empty context, reliable delivery, empty network address.
        out.extend_from_slice(&[0x00, 0x00]);
        out.push(0x01);
        out.extend_from_slice(&[0x00, 0x04]);
        out.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    }
    out
}

/// Pack a type 1 object number: 4 bit type, 8 bit record, 5 bit channel and
/// 15 bit box number.
pub fn get_ono(ty: u32, record: u32, channel: u32, box_number: u32) -> u32 {
    ((ty & 0xF) << 28) | ((record & 0xFF) << 20) | ((channel & 0x1F) << 15) | (box_number & 0x7FFF)
}

/// Pack a type 2 object number: 4 bit type, 8 bit record, 8 bit channel,
/// 5 bit box and 7 bit object number.
pub fn get_ono_ty2(ty: u32, record: u32, channel: u32, box_number: u32, object: u32) -> u32 {
    ((ty & 0xF) << 28)
        | ((record & 0xFF) << 20)
        | ((channel & 0xFF) << 12)
        | ((box_number & 0x1F) << 7)
        | (object & 0x7F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_requires_exactly_one_byte() {
        assert_eq!(data_to_bool(&[1]), Some(true));
        assert_eq!(data_to_bool(&[0]), Some(false));
        assert_eq!(data_to_bool(&[2]), Some(false));
        assert_eq!(data_to_bool(&[]), None);
        assert_eq!(data_to_bool(&[1, 0]), None);
        assert_eq!(data_from_bool(true), vec![1]);
    }

    #[test]
    fn test_integers_are_big_endian() {
        assert_eq!(data_from_u32(0x0102_0304), vec![1, 2, 3, 4]);
        assert_eq!(data_from_u16(0xABCD), vec![0xAB, 0xCD]);
        assert_eq!(data_from_i32(-2), vec![0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(data_to_i32(&[0xFF, 0xFF, 0xFF, 0xFE]), Some(-2));
        assert_eq!(
            data_to_u64(&[0, 0, 0, 0, 0, 0, 1, 0]),
            Some(256)
        );
    }

    #[test]
    fn test_short_input_is_rejected() {
        assert_eq!(data_to_u16(&[1]), None);
        assert_eq!(data_to_u32(&[1, 2, 3]), None);
        assert_eq!(data_to_u64(&[0; 7]), None);
        assert_eq!(data_to_f32(&[0; 3]), None);
        assert_eq!(data_to_f64(&[0; 7]), None);
        assert_eq!(data_to_u8(&[]), None);
        assert_eq!(data_to_i32(&[]), None);
    }

    #[test]
    fn test_scalars_survive_the_wire() {
        for v in [0, -1, i32::MIN, i32::MAX, 0x1234_5678] {
            assert_eq!(data_to_i32(&data_from_i32(v)), Some(v));
        }
        for v in [0, 1, u8::MAX] {
            assert_eq!(data_to_u8(&data_from_u8(v)), Some(v));
        }
        for v in [0, u16::MAX, 0x1234] {
            assert_eq!(data_to_u16(&data_from_u16(v)), Some(v));
        }
        for v in [0, u32::MAX, 0x1234_5678] {
            assert_eq!(data_to_u32(&data_from_u32(v)), Some(v));
        }
        for v in [0, u64::MAX, 0x1234_5678_9ABC_DEF0] {
            assert_eq!(data_to_u64(&data_from_u64(v)), Some(v));
        }
        for v in [0.0, -6.5, f32::MAX, f32::MIN_POSITIVE] {
            assert_eq!(data_to_f32(&data_from_f32(v)), Some(v));
        }
        for v in [0.0, -0.125, f64::MAX] {
            assert_eq!(data_to_f64(&data_from_f64(v)), Some(v));
        }
        assert_eq!(data_from_u32(0x1234_5678), vec![0x12, 0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_longer_input_uses_leading_bytes() {
        assert_eq!(data_to_u32(&[0, 0, 0, 7, 0xFF, 0xFF]), Some(7));
        assert_eq!(data_to_u8(&[9, 1, 2]), Some(9));
    }

    #[test]
    fn test_float_encoding() {
        assert_eq!(data_from_f32(1.0), vec![0x3F, 0x80, 0x00, 0x00]);
        assert_eq!(data_to_f32(&[0x40, 0x60, 0x00, 0x00]), Some(3.5));
        assert_eq!(
            data_from_f64(-2.5),
            vec![0xC0, 0x04, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_string_prefix_bounds_the_value() {
        let data = data_from_string("Mute");
        assert_eq!(data, vec![0, 4, b'M', b'u', b't', b'e']);

        let mut padded = data.clone();
        padded.extend_from_slice(b"junk");
        assert_eq!(data_to_string(&padded).as_deref(), Some("Mute"));

        assert_eq!(data_to_string(&[0, 10, b'a']), None);
        assert_eq!(data_to_string(&[0]), None);
        assert_eq!(data_to_string(&[0, 0]).as_deref(), Some(""));
    }

    #[test]
    fn test_aiming_and_position_layout() {
        let direct = data_from_aiming_and_position(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let reordered = data_from_position_and_rotation(4.0, 5.0, 6.0, 1.0, 2.0, 3.0);
        assert_eq!(direct, reordered);
        assert_eq!(direct.len(), 24);
        assert_eq!(data_to_floats::<6>(&direct), Some([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]));
        assert_eq!(data_from_position(1.0, 2.0, 3.0).len(), 12);
    }

    #[test]
    fn test_subscription_parameters() {
        let add = data_from_ono_for_subscription(0x1000_0001, true);
        assert_eq!(add.len(), 25);
        assert_eq!(&add[0..4], &[0x10, 0x00, 0x00, 0x01]);
        assert_eq!(&add[4..8], &[0x00, 0x01, 0x00, 0x01]);
        assert_eq!(&add[8..12], &[0x10, 0x00, 0x00, 0x01]);
        assert_eq!(&add[12..16], &[0x00, 0x03, 0x00, 0x01]);
        assert_eq!(&add[16..], &[0x00, 0x00, 0x01, 0x00, 0x04, 0, 0, 0, 0]);

        let remove = data_from_ono_for_subscription(0x1000_0001, false);
        assert_eq!(remove.len(), 16);
        assert_eq!(remove.as_slice(), &add[..16]);
    }

    #[test]
    fn test_ono_packing() {
        assert_eq!(get_ono(1, 2, 3, 4), 0x1021_8004);
        assert_eq!(get_ono(0x1F, 0, 0, 0), 0xF000_0000);
        assert_eq!(get_ono(0, 0, 0, 0xFFFF), 0x7FFF);
        assert_eq!(get_ono_ty2(1, 2, 3, 4, 5), 0x1020_3205);
        assert_eq!(get_ono_ty2(0, 0, 0x1FF, 0, 0), 0x000F_F000);
    }

    #[test]
    fn test_status_and_handle_names() {
        assert_eq!(status_to_string(0), "OK");
        assert_eq!(status_to_string(5), "BadONo");
        assert_eq!(status_to_string(15), "PermissionDenied");
        assert_eq!(status_to_string(42), "42");
        assert_eq!(handle_to_string(0), "InvalidSessionID");
        assert_eq!(handle_to_string(1), "LocalSessionID");
        assert_eq!(handle_to_string(77), "77");
    }

    #[test]
    fn test_data_type_names() {
        assert_eq!(data_type_to_string(10), "Float32");
        assert_eq!(data_type_to_string(32), "Position (d&b)");
        assert_eq!(data_type_to_string(0), "");
        assert_eq!(data_type_to_string(99), "");
        assert_eq!(DataType::from_u8(14), Some(DataType::Blob));
        assert_eq!(DataType::Custom.as_u8(), 128);
    }
}
