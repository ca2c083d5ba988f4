//! Chunk compression.
//!
//! Each array carries a single compressor slot, not a multi-stage codec
//! chain: one `encode`/`decode` pass per chunk.

use crate::error::{Error, Result};

/// A chunk-blob transform: `encode` is applied before a chunk is written,
/// `decode` before it is interpreted as elements. Implementations must be
/// mutual inverses.
pub trait Compressor {
    fn encode(&self, decoded: &[u8]) -> Vec<u8>;
    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>>;
    /// The `id` string recorded in the header's `compressor.id` field.
    fn id(&self) -> &'static str;
}

/// The `"none"` compressor: encode/decode are a copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Compressor for Identity {
    fn encode(&self, decoded: &[u8]) -> Vec<u8> {
        decoded.to_vec()
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        Ok(encoded.to_vec())
    }

    fn id(&self) -> &'static str {
        "none"
    }
}

#[cfg(feature = "gzip")]
#[derive(Debug, Clone, Copy)]
pub struct Gzip {
    pub level: u32,
}

#[cfg(feature = "gzip")]
impl Default for Gzip {
    fn default() -> Self {
        Self { level: 6 }
    }
}

#[cfg(feature = "gzip")]
impl Compressor for Gzip {
    fn encode(&self, decoded: &[u8]) -> Vec<u8> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(decoded).expect("in-memory gzip write cannot fail");
        encoder.finish().expect("in-memory gzip finish cannot fail")
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        use flate2::read::GzDecoder;
        use std::io::Read;

        let mut decoder = GzDecoder::new(encoded);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::corrupt_chunk("<unknown>", format!("gzip decode failed: {e}")))?;
        Ok(out)
    }

    fn id(&self) -> &'static str {
        "gzip"
    }
}

#[cfg(feature = "gzip")]
#[derive(Debug, Clone, Copy)]
pub struct Zlib {
    pub level: u32,
}

#[cfg(feature = "gzip")]
impl Default for Zlib {
    fn default() -> Self {
        Self { level: 6 }
    }
}

#[cfg(feature = "gzip")]
impl Compressor for Zlib {
    fn encode(&self, decoded: &[u8]) -> Vec<u8> {
        use flate2::write::ZlibEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(decoded).expect("in-memory zlib write cannot fail");
        encoder.finish().expect("in-memory zlib finish cannot fail")
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        use flate2::read::ZlibDecoder;
        use std::io::Read;

        let mut decoder = ZlibDecoder::new(encoded);
        let mut out = Vec::new();
        decoder
            .read_to_end(&mut out)
            .map_err(|e| Error::corrupt_chunk("<unknown>", format!("zlib decode failed: {e}")))?;
        Ok(out)
    }

    fn id(&self) -> &'static str {
        "zlib"
    }
}

#[cfg(feature = "blosc")]
#[derive(Debug, Clone, Copy)]
pub struct Blosc {
    pub cname: blosc::Compressor,
    pub clevel: blosc::Clevel,
    pub shuffle: blosc::ShuffleMode,
}

#[cfg(feature = "blosc")]
impl Default for Blosc {
    fn default() -> Self {
        Self {
            cname: blosc::Compressor::BloscLZ,
            clevel: blosc::Clevel::L6,
            shuffle: blosc::ShuffleMode::Byte,
        }
    }
}

#[cfg(feature = "blosc")]
impl Compressor for Blosc {
    fn encode(&self, decoded: &[u8]) -> Vec<u8> {
        let ctx = blosc::Context::new()
            .compressor(self.cname)
            .expect("blosc compressor not enabled in this build")
            .clevel(self.clevel)
            .shuffle(self.shuffle);
        ctx.compress(decoded).into()
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        // SAFETY: we are decompressing bytes into bytes (no type change);
        // the encoded buffer's trustworthiness is the store's concern, not
        // this call's.
        unsafe { blosc::decompress_bytes(encoded) }
            .map_err(|_| Error::corrupt_chunk("<unknown>", "blosc decode failed".to_string()))
    }

    fn id(&self) -> &'static str {
        "blosc"
    }
}

/// Registry lookup by codec id string. Unknown id ⇒ `OpenFailed`.
pub enum CodecType {
    Identity(Identity),
    #[cfg(feature = "gzip")]
    Gzip(Gzip),
    #[cfg(feature = "gzip")]
    Zlib(Zlib),
    #[cfg(feature = "blosc")]
    Blosc(Blosc),
}

impl Compressor for CodecType {
    fn encode(&self, decoded: &[u8]) -> Vec<u8> {
        match self {
            CodecType::Identity(c) => c.encode(decoded),
            #[cfg(feature = "gzip")]
            CodecType::Gzip(c) => c.encode(decoded),
            #[cfg(feature = "gzip")]
            CodecType::Zlib(c) => c.encode(decoded),
            #[cfg(feature = "blosc")]
            CodecType::Blosc(c) => c.encode(decoded),
        }
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        match self {
            CodecType::Identity(c) => c.decode(encoded),
            #[cfg(feature = "gzip")]
            CodecType::Gzip(c) => c.decode(encoded),
            #[cfg(feature = "gzip")]
            CodecType::Zlib(c) => c.decode(encoded),
            #[cfg(feature = "blosc")]
            CodecType::Blosc(c) => c.decode(encoded),
        }
    }

    fn id(&self) -> &'static str {
        match self {
            CodecType::Identity(c) => c.id(),
            #[cfg(feature = "gzip")]
            CodecType::Gzip(c) => c.id(),
            #[cfg(feature = "gzip")]
            CodecType::Zlib(c) => c.id(),
            #[cfg(feature = "blosc")]
            CodecType::Blosc(c) => c.id(),
        }
    }
}

impl CodecType {
    /// Look up a compressor by its header `id` plus JSON params. `None`
    /// compressor (`compressor: null` in the header) is handled by the
    /// caller before reaching here.
    pub fn from_id(id: &str, params: &serde_json::Value) -> Result<Self> {
        match id {
            "none" => Ok(CodecType::Identity(Identity)),
            #[cfg(feature = "gzip")]
            "gzip" => {
                let level = params
                    .get("level")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(6) as u32;
                Ok(CodecType::Gzip(Gzip { level }))
            }
            #[cfg(feature = "gzip")]
            "zlib" => {
                let level = params
                    .get("level")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(6) as u32;
                Ok(CodecType::Zlib(Zlib { level }))
            }
            #[cfg(feature = "blosc")]
            "blosc" => Ok(CodecType::Blosc(Blosc::default())),
            other => Err(Error::open_failed(
                "<header>",
                format!("unknown compressor id '{other}'"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_is_noop() {
        let c = Identity;
        let data = b"hello world".to_vec();
        assert_eq!(c.encode(&data), data);
        assert_eq!(c.decode(&data).unwrap(), data);
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn gzip_round_trips() {
        let c = Gzip::default();
        let data = vec![7u8; 4096];
        let encoded = c.encode(&data);
        assert_ne!(encoded.len(), data.len());
        assert_eq!(c.decode(&encoded).unwrap(), data);
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn zlib_round_trips() {
        let c = Zlib::default();
        let data: Vec<u8> = (0..2000u32).map(|x| (x % 251) as u8).collect();
        let encoded = c.encode(&data);
        assert_eq!(c.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn unknown_id_is_open_failed() {
        let err = CodecType::from_id("lz99", &serde_json::json!({}));
        assert!(matches!(err, Err(Error::OpenFailed { .. })));
    }
}
