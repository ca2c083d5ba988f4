//! Dtype-dynamic numeric kind dispatch.
//!
//! The engine does not carry a Rust-type generic parameter for chunk
//! elements; instead every element-aware operation is driven by this small
//! tagged enumeration, and the rest of the engine operates on raw byte
//! buffers sized by `DataType::size_bytes()`.

use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// The byte order used to serialize multi-byte elements on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

#[cfg(target_endian = "little")]
pub const NATIVE_BYTE_ORDER: ByteOrder = ByteOrder::Little;
#[cfg(target_endian = "big")]
pub const NATIVE_BYTE_ORDER: ByteOrder = ByteOrder::Big;

impl ByteOrder {
    fn code(self) -> char {
        match self {
            ByteOrder::Little => '<',
            ByteOrder::Big => '>',
        }
    }

    fn from_code(c: char) -> Option<Self> {
        match c {
            '<' => Some(ByteOrder::Little),
            '>' => Some(ByteOrder::Big),
            _ => None,
        }
    }
}

/// One of the numeric kinds this store can hold. Fixes element size and the
/// byte-swap / fill-encoding routines used by the codec pipeline and
/// geometry copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl DataType {
    /// Size of one element, in bytes.
    pub fn size_bytes(self) -> usize {
        match self {
            DataType::Int8 | DataType::UInt8 => 1,
            DataType::Int16 | DataType::UInt16 => 2,
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => 8,
        }
    }

    fn type_code(self) -> char {
        match self {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => 'i',
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => 'u',
            DataType::Float32 | DataType::Float64 => 'f',
        }
    }

    /// The zarr-v2-style dtype string, e.g. `"<f4"`, `">i2"`. Single-byte
    /// kinds always use `<` since byte order is meaningless for them.
    pub fn to_dtype_string(self, order: ByteOrder) -> String {
        let order = if self.size_bytes() == 1 {
            ByteOrder::Little
        } else {
            order
        };
        format!("{}{}{}", order.code(), self.type_code(), self.size_bytes())
    }

    /// Parse a zarr-v2-style dtype string into its `(DataType, ByteOrder)`.
    pub fn parse_dtype_string(s: &str) -> Result<(Self, ByteOrder), String> {
        let mut chars = s.chars();
        let order_char = chars.next().ok_or_else(|| "empty dtype string".to_string())?;
        let order = ByteOrder::from_code(order_char)
            .ok_or_else(|| format!("unrecognized byte order code '{order_char}'"))?;
        let kind_char = chars
            .next()
            .ok_or_else(|| "dtype string missing type code".to_string())?;
        let size: usize = chars
            .as_str()
            .parse()
            .map_err(|_| format!("invalid element size in dtype string '{s}'"))?;
        let dt = match (kind_char, size) {
            ('i', 1) => DataType::Int8,
            ('i', 2) => DataType::Int16,
            ('i', 4) => DataType::Int32,
            ('i', 8) => DataType::Int64,
            ('u', 1) => DataType::UInt8,
            ('u', 2) => DataType::UInt16,
            ('u', 4) => DataType::UInt32,
            ('u', 8) => DataType::UInt64,
            ('f', 4) => DataType::Float32,
            ('f', 8) => DataType::Float64,
            _ => return Err(format!("unsupported dtype string '{s}'")),
        };
        Ok((dt, order))
    }

    /// Encode a JSON fill value into `size_bytes()` native-order bytes.
    pub fn encode_fill_value(self, value: &serde_json::Value) -> Result<Vec<u8>, String> {
        macro_rules! enc_int {
            ($t:ty) => {{
                let v: $t = serde_json::from_value(value.clone())
                    .map_err(|e| format!("invalid fill value for {:?}: {e}", self))?;
                v.to_ne_bytes().to_vec()
            }};
        }
        Ok(match self {
            DataType::Int8 => enc_int!(i8),
            DataType::Int16 => enc_int!(i16),
            DataType::Int32 => enc_int!(i32),
            DataType::Int64 => enc_int!(i64),
            DataType::UInt8 => enc_int!(u8),
            DataType::UInt16 => enc_int!(u16),
            DataType::UInt32 => enc_int!(u32),
            DataType::UInt64 => enc_int!(u64),
            DataType::Float32 => enc_int!(f32),
            DataType::Float64 => enc_int!(f64),
        })
    }

    /// Decode `size_bytes()` native-order bytes back into a JSON number.
    pub fn decode_fill_value(self, bytes: &[u8]) -> serde_json::Value {
        macro_rules! dec {
            ($t:ty) => {{
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice(&bytes[..std::mem::size_of::<$t>()]);
                serde_json::json!(<$t>::from_ne_bytes(buf))
            }};
        }
        match self {
            DataType::Int8 => dec!(i8),
            DataType::Int16 => dec!(i16),
            DataType::Int32 => dec!(i32),
            DataType::Int64 => dec!(i64),
            DataType::UInt8 => dec!(u8),
            DataType::UInt16 => dec!(u16),
            DataType::UInt32 => dec!(u32),
            DataType::UInt64 => dec!(u64),
            DataType::Float32 => dec!(f32),
            DataType::Float64 => dec!(f64),
        }
    }

    /// Byte-swap `buf` in place, element by element, between native order
    /// and `order`. A no-op for single-byte dtypes.
    pub fn swap_buffer(self, buf: &mut [u8], order: ByteOrder) {
        let size = self.size_bytes();
        if size == 1 || order == NATIVE_BYTE_ORDER {
            return;
        }
        for chunk in buf.chunks_exact_mut(size) {
            chunk.reverse();
        }
    }

    /// Read `buf` (which is stored in `order`) into a freshly allocated
    /// native-order buffer. Used by the codec pipeline's decode path; kept
    /// separate from `swap_buffer` so callers can choose copy vs. in-place.
    pub fn to_native(self, buf: &[u8], order: ByteOrder) -> Vec<u8> {
        let mut owned = buf.to_vec();
        self.swap_buffer(&mut owned, order);
        owned
    }

    /// Write native-order `buf` out in `order`. Used by the codec
    /// pipeline's encode path.
    pub fn from_native(self, buf: &[u8], order: ByteOrder) -> Vec<u8> {
        let mut owned = buf.to_vec();
        self.swap_buffer(&mut owned, order);
        owned
    }

    /// Tile a single-element fill buffer into `count` repeated elements.
    pub fn tile_fill(self, fill_native: &[u8], count: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(fill_native.len() * count);
        for _ in 0..count {
            out.extend_from_slice(fill_native);
        }
        out
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_dtype_string(NATIVE_BYTE_ORDER))
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_dtype_string(s).map(|(dt, _)| dt)
    }
}

/// Combined `(DataType, ByteOrder)` pair serialized as a single zarr-v2-style
/// dtype string (e.g. `"<f4"`) via `FromStr`/`Display`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedDtype {
    pub data_type: DataType,
    pub byte_order: ByteOrder,
}

impl fmt::Display for TypedDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data_type.to_dtype_string(self.byte_order))
    }
}

impl FromStr for TypedDtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (data_type, byte_order) = DataType::parse_dtype_string(s)?;
        Ok(TypedDtype {
            data_type,
            byte_order,
        })
    }
}

impl Serialize for TypedDtype {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TypedDtype {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TypedDtype::from_str(&s).map_err(de::Error::custom)
    }
}
