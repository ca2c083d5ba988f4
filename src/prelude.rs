//! Convenience re-exports for downstream users of this crate.

pub use crate::array::Array;
pub use crate::chunk_key::Layout;
pub use crate::codec::{CodecType, Compressor};
pub use crate::data_type::{ByteOrder, DataType, TypedDtype};
pub use crate::error::{Error, Result};
pub use crate::header::{Header, HeaderBuilder};
pub use crate::store::{MemoryStore, Store};

#[cfg(feature = "filesystem")]
pub use crate::store::FileSystemStore;

#[cfg(feature = "ndarray")]
pub use crate::ndarray_ext::{ArrayExt, TypedElement};

pub use serde_json;
pub use smallvec;
