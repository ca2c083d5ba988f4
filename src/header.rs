//! Array header model: the JSON descriptor stored alongside each array.
//!
//! Unknown compressor parameters round-trip untouched via `#[serde(flatten)]`
//! so a reader that doesn't understand every knob a writer set still
//! preserves them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chunk_key::Layout;
use crate::data_type::{ByteOrder, DataType, NATIVE_BYTE_ORDER};
use crate::error::{Error, Result};
use crate::GridCoord;

pub const ZARR_FORMAT: u8 = 2;

/// The `compressor` header field: `null`, or an id plus an opaque
/// parameter bag. Unknown parameters (anything beyond what this crate's
/// own codecs understand) round-trip untouched via the `extra` map, so a
/// future codec version's settings survive a read-modify-write by an
/// older build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressorSpec {
    pub id: String,
    #[serde(flatten)]
    pub params: serde_json::Map<String, Value>,
}

/// The parsed/serialized `.zarray` descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    pub zarr_format: u8,
    pub shape: GridCoord,
    pub chunks: GridCoord,
    pub dtype: String,
    pub fill_value: Value,
    pub compressor: Option<CompressorSpec>,
    pub order: String,
    #[serde(default)]
    pub filters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension_separator: Option<String>,
}

impl Header {
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn data_type(&self) -> Result<DataType> {
        DataType::parse_dtype_string(&self.dtype)
            .map(|(dt, _)| dt)
            .map_err(|e| Error::open_failed("<header>", e))
    }

    pub fn byte_order(&self) -> Result<ByteOrder> {
        DataType::parse_dtype_string(&self.dtype)
            .map(|(_, order)| order)
            .map_err(|e| Error::open_failed("<header>", e))
    }

    /// Native-order bytes of the fill value.
    pub fn fill_value_bytes(&self) -> Result<Vec<u8>> {
        let dt = self.data_type()?;
        dt.encode_fill_value(&self.fill_value)
            .map_err(|e| Error::open_failed("<header>", e))
    }

    /// The explicit layout hint, if the header carries one.
    pub fn layout_hint(&self) -> Result<Option<Layout>> {
        match &self.dimension_separator {
            None => Ok(None),
            Some(s) => {
                let c = s.chars().next().ok_or_else(|| {
                    Error::open_failed("<header>", "empty dimension_separator")
                })?;
                Layout::from_separator_char(c)
                    .map(Some)
                    .ok_or_else(|| Error::open_failed("<header>", format!("bad dimension_separator '{s}'")))
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.zarr_format != ZARR_FORMAT {
            return Err(Error::open_failed(
                "<header>",
                format!("unsupported zarr_format {}", self.zarr_format),
            ));
        }
        if self.shape.len() != self.chunks.len() || self.shape.is_empty() {
            return Err(Error::open_failed(
                "<header>",
                "shape and chunks must be non-empty and of equal length",
            ));
        }
        if self.shape.iter().any(|&s| s == 0) || self.chunks.iter().any(|&c| c == 0) {
            return Err(Error::open_failed(
                "<header>",
                "shape and chunks entries must be positive",
            ));
        }
        if self.order != "C" {
            return Err(Error::open_failed(
                "<header>",
                format!("unsupported order '{}', only \"C\" is supported", self.order),
            ));
        }
        self.data_type()?;
        Ok(())
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let header: Header = serde_json::from_slice(bytes)?;
        header.validate()?;
        Ok(header)
    }

    pub fn chunk_element_count(&self) -> u64 {
        self.chunks.iter().product()
    }

    pub fn chunk_byte_size(&self) -> Result<usize> {
        Ok(self.chunk_element_count() as usize * self.data_type()?.size_bytes())
    }
}

/// Fluent constructor for a valid [`Header`].
pub struct HeaderBuilder {
    shape: GridCoord,
    chunks: GridCoord,
    data_type: DataType,
    byte_order: ByteOrder,
    fill_value: Option<Value>,
    compressor: Option<CompressorSpec>,
    nested: Option<bool>,
}

impl HeaderBuilder {
    pub fn new(shape: GridCoord, chunks: GridCoord, data_type: DataType) -> Self {
        Self {
            shape,
            chunks,
            data_type,
            byte_order: NATIVE_BYTE_ORDER,
            fill_value: None,
            compressor: None,
            nested: None,
        }
    }

    pub fn byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn fill_value(mut self, value: Value) -> Self {
        self.fill_value = Some(value);
        self
    }

    pub fn compressor(mut self, id: impl Into<String>, params: serde_json::Map<String, Value>) -> Self {
        self.compressor = Some(CompressorSpec {
            id: id.into(),
            params,
        });
        self
    }

    pub fn nested(mut self, nested: bool) -> Self {
        self.nested = Some(nested);
        self
    }

    pub fn build(self) -> Result<Header> {
        let fill_value = self.fill_value.unwrap_or(Value::from(0));
        self.data_type
            .encode_fill_value(&fill_value)
            .map_err(|e| Error::open_failed("<header>", e))?;

        let header = Header {
            zarr_format: ZARR_FORMAT,
            shape: self.shape,
            chunks: self.chunks,
            dtype: self.data_type.to_dtype_string(self.byte_order),
            fill_value,
            compressor: self.compressor,
            order: "C".to_string(),
            filters: None,
            dimension_separator: self.nested.map(|n| {
                if n {
                    "/".to_string()
                } else {
                    ".".to_string()
                }
            }),
        };
        header.validate()?;
        Ok(header)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;

    #[test]
    fn build_and_roundtrip_json() {
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[10]),
            GridCoord::from_slice(&[3]),
            DataType::Int32,
        )
        .fill_value(Value::from(-1))
        .nested(false)
        .build()
        .unwrap();

        let json = header.to_json().unwrap();
        let parsed = Header::from_json(&json).unwrap();
        assert_eq!(parsed.shape.as_slice(), &[10]);
        assert_eq!(parsed.chunks.as_slice(), &[3]);
        assert_eq!(parsed.data_type().unwrap(), DataType::Int32);
        assert_eq!(parsed.layout_hint().unwrap(), Some(Layout::Flat));
    }

    #[test]
    fn unknown_compressor_params_round_trip() {
        let mut params = serde_json::Map::new();
        params.insert("clevel".to_string(), Value::from(5));
        params.insert("future_knob".to_string(), Value::from("xyz"));
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[4]),
            GridCoord::from_slice(&[2]),
            DataType::Float32,
        )
        .compressor("blosc", params)
        .build()
        .unwrap();

        let json = header.to_json().unwrap();
        let parsed = Header::from_json(&json).unwrap();
        let c = parsed.compressor.unwrap();
        assert_eq!(c.id, "blosc");
        assert_eq!(c.params.get("future_knob").unwrap(), "xyz");
    }

    #[test]
    fn rejects_bad_zarr_format() {
        let bad = serde_json::json!({
            "zarr_format": 3,
            "shape": [1],
            "chunks": [1],
            "dtype": "<i4",
            "fill_value": 0,
            "compressor": null,
            "order": "C",
            "filters": null
        });
        let bytes = serde_json::to_vec(&bad).unwrap();
        assert!(Header::from_json(&bytes).is_err());
    }
}
