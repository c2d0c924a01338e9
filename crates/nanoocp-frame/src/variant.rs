//! Dynamic property values.
//!
//! A [`Variant`] holds one property value of any of the primitive OCP.1 types
//! and converts between them. Conversions return `None` when no sensible
//! value exists (an empty variant, an unparseable string, a byte vector of
//! the wrong length) rather than a silent default.

use std::fmt;

use crate::data::{
    data_from_bool, data_from_f32, data_from_f64, data_from_i32, data_from_position,
    data_from_string, data_from_u16, data_from_u32, data_from_u64, data_from_u8, data_to_bool,
    data_to_f32, data_to_f64, data_to_floats, data_to_i32, data_to_string, data_to_u16,
    data_to_u32, data_to_u64, data_to_u8, read_u16, DataType,
};
use crate::error::{FrameError, Result};

/// A property value of one of the supported types.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    #[default]
    None,
    Bool(bool),
    Int32(i32),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    ByteVector(Vec<u8>),
}

impl Variant {
    /// A d&b position (three floats) as a byte vector.
    pub fn position(x: f32, y: f32, z: f32) -> Self {
        Self::ByteVector(data_from_position(x, y, z))
    }

    /// Decode wire bytes of the given type.
    ///
    /// Blobs need at least their 2 byte length prefix, positions must hold
    /// 3, 6 or 9 floats. Types without a variant representation fail.
    pub fn from_param_data(data: &[u8], data_type: DataType) -> Result<Self> {
        let unsupported = || FrameError::UnsupportedType {
            data_type,
            len: data.len(),
        };
        let value = match data_type {
            DataType::Boolean => data_to_bool(data).map(Self::Bool),
            DataType::Int32 => data_to_i32(data).map(Self::Int32),
            DataType::UInt8 => data_to_u8(data).map(Self::UInt8),
            DataType::UInt16 => data_to_u16(data).map(Self::UInt16),
            DataType::UInt32 => data_to_u32(data).map(Self::UInt32),
            DataType::UInt64 => data_to_u64(data).map(Self::UInt64),
            DataType::Float32 => data_to_f32(data).map(Self::Float),
            DataType::Float64 => data_to_f64(data).map(Self::Double),
            DataType::String => data_to_string(data).map(Self::String),
            DataType::Blob if data.len() >= 2 => Some(Self::ByteVector(data.to_vec())),
            DataType::DbPosition if matches!(data.len(), 12 | 24 | 36) => {
                Some(Self::ByteVector(data.to_vec()))
            }
            _ => None,
        };
        value.ok_or_else(unsupported)
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// The wire type this value marshals as by default.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::None => DataType::None,
            Self::Bool(_) => DataType::Boolean,
            Self::Int32(_) => DataType::Int32,
            Self::UInt8(_) => DataType::UInt8,
            Self::UInt16(_) => DataType::UInt16,
            Self::UInt32(_) => DataType::UInt32,
            Self::UInt64(_) => DataType::UInt64,
            Self::Float(_) => DataType::Float32,
            Self::Double(_) => DataType::Float64,
            Self::String(_) => DataType::String,
            Self::ByteVector(_) => DataType::Blob,
        }
    }

    /// Any nonzero number is `true`; strings must read `true`.
    pub fn to_bool(&self) -> Option<bool> {
        match self {
            Self::None => None,
            Self::Bool(v) => Some(*v),
            Self::Int32(v) => Some(*v != 0),
            Self::UInt8(v) => Some(*v != 0),
            Self::UInt16(v) => Some(*v != 0),
            Self::UInt32(v) => Some(*v != 0),
            Self::UInt64(v) => Some(*v != 0),
            Self::Float(v) => Some(*v != 0.0),
            Self::Double(v) => Some(*v != 0.0),
            Self::String(v) => Some(v == "true"),
            Self::ByteVector(v) => data_to_bool(v),
        }
    }

    /// Integer view of the value. Floats are rounded half away from zero,
    /// wider integers are truncated.
    pub fn to_i32(&self) -> Option<i32> {
        match self {
            Self::ByteVector(v) => data_to_i32(v),
            other => other.to_integer().map(|v| v as i32),
        }
    }

    pub fn to_u8(&self) -> Option<u8> {
        match self {
            Self::ByteVector(v) => data_to_u8(v),
            other => other.to_integer().map(|v| v as u8),
        }
    }

    pub fn to_u16(&self) -> Option<u16> {
        match self {
            Self::ByteVector(v) => data_to_u16(v),
            other => other.to_integer().map(|v| v as u16),
        }
    }

    pub fn to_u32(&self) -> Option<u32> {
        match self {
            Self::ByteVector(v) => data_to_u32(v),
            other => other.to_integer().map(|v| v as u32),
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        match self {
            Self::ByteVector(v) => data_to_u64(v),
            Self::UInt64(v) => Some(*v),
            Self::String(v) => v.trim().parse::<u64>().ok(),
            other => other.to_integer().map(|v| v as u64),
        }
    }

    fn to_integer(&self) -> Option<i64> {
        match self {
            Self::None | Self::ByteVector(_) => None,
            Self::Bool(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::UInt8(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::UInt64(v) => Some(*v as i64),
            Self::Float(v) => Some(v.round() as i64),
            Self::Double(v) => Some(v.round() as i64),
            Self::String(v) => v.trim().parse::<i64>().ok(),
        }
    }

    pub fn to_f32(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            Self::ByteVector(v) => data_to_f32(v),
            Self::String(v) => v.trim().parse::<f32>().ok(),
            other => other.to_f64().map(|v| v as f32),
        }
    }

    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Self::None => None,
            Self::Bool(v) => Some(f64::from(u8::from(*v))),
            Self::Int32(v) => Some(f64::from(*v)),
            Self::UInt8(v) => Some(f64::from(*v)),
            Self::UInt16(v) => Some(f64::from(*v)),
            Self::UInt32(v) => Some(f64::from(*v)),
            Self::UInt64(v) => Some(*v as f64),
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            Self::String(v) => v.trim().parse::<f64>().ok(),
            Self::ByteVector(v) => data_to_f64(v),
        }
    }

    /// Text form of the value. Booleans render as `true`/`false`, byte
    /// vectors are decoded as length-prefixed strings.
    pub fn to_string_value(&self) -> Option<String> {
        match self {
            Self::None => None,
            Self::Bool(v) => Some(v.to_string()),
            Self::Int32(v) => Some(v.to_string()),
            Self::UInt8(v) => Some(v.to_string()),
            Self::UInt16(v) => Some(v.to_string()),
            Self::UInt32(v) => Some(v.to_string()),
            Self::UInt64(v) => Some(v.to_string()),
            Self::Float(v) => Some(v.to_string()),
            Self::Double(v) => Some(v.to_string()),
            Self::String(v) => Some(v.clone()),
            Self::ByteVector(v) => data_to_string(v),
        }
    }

    /// Wire bytes of the value in its own type.
    pub fn to_byte_vector(&self) -> Option<Vec<u8>> {
        match self {
            Self::None => None,
            Self::Bool(v) => Some(data_from_bool(*v)),
            Self::Int32(v) => Some(data_from_i32(*v)),
            Self::UInt8(v) => Some(data_from_u8(*v)),
            Self::UInt16(v) => Some(data_from_u16(*v)),
            Self::UInt32(v) => Some(data_from_u32(*v)),
            Self::UInt64(v) => Some(data_from_u64(*v)),
            Self::Float(v) => Some(data_from_f32(*v)),
            Self::Double(v) => Some(data_from_f64(*v)),
            Self::String(v) => Some(data_from_string(v)),
            Self::ByteVector(v) => Some(v.clone()),
        }
    }

    /// Wire bytes of the value converted to `data_type`.
    ///
    /// [`DataType::None`] means the value's own type. Blobs and positions
    /// use [`Variant::to_byte_vector`].
    pub fn to_param_data(&self, data_type: DataType) -> Option<Vec<u8>> {
        let target = match data_type {
            DataType::None => self.data_type(),
            other => other,
        };
        match target {
            DataType::Boolean => self.to_bool().map(data_from_bool),
            DataType::Int32 => self.to_i32().map(data_from_i32),
            DataType::UInt8 => self.to_u8().map(data_from_u8),
            DataType::UInt16 => self.to_u16().map(data_from_u16),
            DataType::UInt32 => self.to_u32().map(data_from_u32),
            DataType::UInt64 => self.to_u64().map(data_from_u64),
            DataType::Float32 => self.to_f32().map(data_from_f32),
            DataType::Float64 => self.to_f64().map(data_from_f64),
            DataType::String => self.to_string_value().map(|v| data_from_string(&v)),
            DataType::Blob | DataType::DbPosition => self.to_byte_vector(),
            _ => None,
        }
    }

    fn byte_vector(&self) -> Option<&[u8]> {
        match self {
            Self::ByteVector(v) => Some(v),
            _ => None,
        }
    }

    /// `x, y, z` of a 3 or 9 float position.
    pub fn to_position(&self) -> Option<[f32; 3]> {
        let data = self.byte_vector()?;
        if !matches!(data.len(), 12 | 36) {
            return None;
        }
        data_to_floats::<3>(data)
    }

    pub fn to_position_string(&self) -> Option<String> {
        self.to_position().map(|values| join_floats(&values))
    }

    /// `h, v, r, x, y, z` of a 6 float aiming and position value.
    pub fn to_aiming_and_position(&self) -> Option<[f32; 6]> {
        let data = self.byte_vector()?;
        if data.len() != 24 {
            return None;
        }
        data_to_floats::<6>(data)
    }

    pub fn to_aiming_and_position_string(&self) -> Option<String> {
        self.to_aiming_and_position()
            .map(|values| join_floats(&values))
    }

    /// A `u16` count followed by one byte per boolean.
    pub fn to_bool_vector(&self) -> Option<Vec<bool>> {
        let data = self.byte_vector()?;
        let count = usize::from(read_u16(data, 0)?);
        if data.len() != count + 2 {
            return None;
        }
        Some(data[2..].iter().map(|byte| *byte == 1).collect())
    }

    /// A `u16` count followed by length-prefixed strings.
    pub fn to_string_vector(&self) -> Option<Vec<String>> {
        let data = self.byte_vector()?;
        let count = usize::from(read_u16(data, 0)?);
        if data.len() < count * 2 + 2 {
            return None;
        }

        let mut strings = Vec::with_capacity(count);
        let mut pos = 2;
        while pos + 2 <= data.len() {
            let len = usize::from(read_u16(data, pos)?);
            pos += 2;
            let bytes = data.get(pos..pos + len)?;
            strings.push(String::from_utf8_lossy(bytes).into_owned());
            pos += len;
        }

        (strings.len() == count).then_some(strings)
    }
}

fn join_floats(values: &[f32]) -> String {
    values
        .iter()
        .map(f32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_value().unwrap_or_default())
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<u8> for Variant {
    fn from(value: u8) -> Self {
        Self::UInt8(value)
    }
}

impl From<u16> for Variant {
    fn from(value: u16) -> Self {
        Self::UInt16(value)
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Self {
        Self::UInt32(value)
    }
}

impl From<u64> for Variant {
    fn from(value: u64) -> Self {
        Self::UInt64(value)
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<Vec<u8>> for Variant {
    fn from(value: Vec<u8>) -> Self {
        Self::ByteVector(value)
    }
}
