//! The array engine: open, create, read_region, write_region, and their
//! convenience forms.
//!
//! Orchestrates `chunks_in_region` against each write or read, branching
//! whole-vs-partial chunk handling and eliding storage for all-fill chunks.
//! Operates on `&[u8]`/`Vec<u8>` tagged by `DataType` rather than a
//! compile-time element type, composed from the `geometry`, `chunk_key`,
//! `codec`, and `lock` modules.

use log::{debug, warn};

use crate::chunk_key::{self, Layout};
use crate::codec::{CodecType, Compressor};
use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::geometry::{self, ChunkWindow};
use crate::header::{Header, HeaderBuilder};
use crate::lock::ChunkLocks;
use crate::store::Store;
use crate::GridCoord;

const HEADER_KEY: &str = ".zarray";

/// An open chunked array, bound to a store and a root key prefix.
pub struct Array<'s, S: Store> {
    store: &'s S,
    prefix: String,
    header: Header,
    data_type: DataType,
    byte_order: crate::data_type::ByteOrder,
    fill_native: Vec<u8>,
    layout: Layout,
    locks: ChunkLocks,
}

impl<'s, S: Store> Array<'s, S> {
    fn header_key(prefix: &str) -> String {
        format!("{prefix}/{HEADER_KEY}")
    }

    /// Create a new array: deletes any stale data at `prefix`, then writes
    /// the header.
    pub fn create(store: &'s S, prefix: impl Into<String>, header: Header) -> Result<Self> {
        let prefix = prefix.into();
        header.validate()?;
        store
            .delete(&prefix)
            .map_err(|e| Error::store(prefix.clone(), e))?;
        let bytes = header.to_json()?;
        store
            .put(&Self::header_key(&prefix), bytes)
            .map_err(|e| Error::store(prefix.clone(), e))?;

        let data_type = header.data_type()?;
        let byte_order = header.byte_order()?;
        let fill_native = header.fill_value_bytes()?;
        let layout = header
            .layout_hint()?
            .unwrap_or(Layout::Flat);

        let array = Self {
            store,
            prefix,
            header,
            data_type,
            byte_order,
            fill_native,
            layout,
            locks: ChunkLocks::new(),
        };
        array.compressor()?;
        Ok(array)
    }

    /// Convenience: build a header via [`HeaderBuilder`]'s default shape
    /// semantics then create.
    pub fn create_with(
        store: &'s S,
        prefix: impl Into<String>,
        shape: GridCoord,
        chunks: GridCoord,
        data_type: DataType,
    ) -> Result<Self> {
        let header = HeaderBuilder::new(shape, chunks, data_type).build()?;
        Self::create(store, prefix, header)
    }

    /// Open an existing array: read the header, and
    /// if it omits the layout hint, probe chunk-grid positions for the
    /// first existing key's separator style.
    pub fn open(store: &'s S, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        let key = Self::header_key(&prefix);
        let bytes = store
            .get(&key)
            .map_err(|e| Error::store(prefix.clone(), e))?
            .ok_or_else(|| Error::open_failed(prefix.clone(), "header not found"))?;
        let header = Header::from_json(&bytes)?;

        let data_type = header.data_type()?;
        let byte_order = header.byte_order()?;
        let fill_native = header.fill_value_bytes()?;

        let layout = match header.layout_hint()? {
            Some(l) => l,
            None => {
                debug!("array at '{prefix}' has no dimension_separator hint, probing layout");
                match chunk_key::probe_layout(store, &prefix, &header.shape, &header.chunks)
                    .map_err(|e| Error::store(prefix.clone(), e))?
                {
                    Some(l) => l,
                    None => {
                        warn!(
                            "array at '{prefix}' has no chunks to probe; defaulting to flat layout"
                        );
                        Layout::Flat
                    }
                }
            }
        };

        let array = Self {
            store,
            prefix,
            header,
            data_type,
            byte_order,
            fill_native,
            layout,
            locks: ChunkLocks::new(),
        };
        array.compressor()?;
        Ok(array)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn shape(&self) -> &[u64] {
        &self.header.shape
    }

    pub fn chunks(&self) -> &[u64] {
        &self.header.chunks
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    fn elem_size(&self) -> usize {
        self.data_type.size_bytes()
    }

    fn chunk_elements(&self) -> usize {
        self.header.chunks.iter().product::<u64>() as usize
    }

    fn compressor(&self) -> Result<CodecType> {
        match &self.header.compressor {
            None => Ok(CodecType::Identity(crate::codec::Identity)),
            Some(spec) => CodecType::from_id(&spec.id, &serde_json::Value::Object(spec.params.clone())),
        }
    }

    fn chunk_key(&self, index: &[u64]) -> String {
        chunk_key::chunk_key(&self.prefix, index, self.layout)
    }

    /// Load a chunk's native-order element buffer, synthesizing a
    /// fill-value buffer if the chunk is absent.
    fn load_chunk(&self, key: &str) -> Result<Vec<u8>> {
        let codec = self.compressor()?;
        match self
            .store
            .get(key)
            .map_err(|e| Error::store(key.to_string(), e))?
        {
            None => Ok(self.data_type.tile_fill(&self.fill_native, self.chunk_elements())),
            Some(blob) => {
                let stored = codec.decode(&blob)?;
                let expected = self.chunk_elements() * self.elem_size();
                if stored.len() != expected {
                    return Err(Error::corrupt_chunk(
                        key.to_string(),
                        format!("expected {expected} bytes, got {}", stored.len()),
                    ));
                }
                Ok(self.data_type.to_native(&stored, self.byte_order))
            }
        }
    }

    /// Store a chunk's native-order element buffer. Erases the key instead
    /// if every element equals the fill value, so all-default chunks cost
    /// nothing in the store.
    fn store_chunk(&self, key: &str, native: &[u8]) -> Result<()> {
        let elem_size = self.elem_size();
        let is_all_fill = self.fill_native.len() == elem_size
            && native
                .chunks_exact(elem_size)
                .all(|e| e == self.fill_native.as_slice());
        if is_all_fill {
            return self
                .store
                .delete(key)
                .map_err(|e| Error::store(key.to_string(), e));
        }
        let codec = self.compressor()?;
        let on_disk = self.data_type.from_native(native, self.byte_order);
        let blob = codec.encode(&on_disk);
        self.store
            .put(key, blob)
            .map_err(|e| Error::store(key.to_string(), e))
    }

    /// Read an axis-aligned region into a freshly allocated native-order
    /// buffer.
    pub fn read_region(&self, offset: &[u64], region_shape: &[u64]) -> Result<Vec<u8>> {
        geometry::validate_region(&self.header.shape, offset, region_shape)?;
        let elem_size = self.elem_size();
        let region_elems: u64 = region_shape.iter().product();
        let mut out = self
            .data_type
            .tile_fill(&self.fill_native, region_elems as usize);

        let windows =
            geometry::chunks_in_region(&self.header.shape, &self.header.chunks, offset, region_shape);
        for window in &windows {
            let key = self.chunk_key(&window.chunk_index);
            let chunk_buf = self.load_chunk(&key)?;
            geometry::copy_chunk_into_region(
                window,
                elem_size,
                &self.header.chunks,
                &chunk_buf,
                region_shape,
                &mut out,
            );
        }
        Ok(out)
    }

    pub fn read_all(&self) -> Result<Vec<u8>> {
        let zero = vec![0u64; self.header.rank()];
        self.read_region(&zero, &self.header.shape)
    }

    /// Write `buf` (a native-order element buffer, `∏ region_shape`
    /// elements) into the region at `offset`.
    pub fn write_region(&self, offset: &[u64], region_shape: &[u64], buf: &[u8]) -> Result<()> {
        geometry::validate_region(&self.header.shape, offset, region_shape)?;
        let elem_size = self.elem_size();
        let expected_len = region_shape.iter().product::<u64>() as usize * elem_size;
        if buf.len() != expected_len {
            return Err(Error::buffer_mismatch(format!(
                "expected {expected_len} bytes for region shape {region_shape:?}, got {}",
                buf.len()
            )));
        }

        let windows =
            geometry::chunks_in_region(&self.header.shape, &self.header.chunks, offset, region_shape);
        for window in &windows {
            self.write_one_chunk(window, elem_size, region_shape, buf)?;
        }
        Ok(())
    }

    fn write_one_chunk(
        &self,
        window: &ChunkWindow,
        elem_size: usize,
        region_shape: &[u64],
        region_buf: &[u8],
    ) -> Result<()> {
        let key = self.chunk_key(&window.chunk_index);
        let guard = self.locks.lock(&key);
        let _held = guard.held();

        // Fast path: when the window covers the whole chunk there is no
        // existing content to preserve, so skip the decode. The copy itself
        // still has to go through `copy_region_into_chunk`: a "whole chunk"
        // window is not generally a contiguous byte range within
        // `region_buf` once the region spans more than one chunk along a
        // non-innermost axis.
        let mut chunk_buf = if window.is_full_chunk(&self.header.chunks) {
            vec![0u8; self.chunk_elements() * elem_size]
        } else {
            self.load_chunk(&key)?
        };
        geometry::copy_region_into_chunk(
            window,
            elem_size,
            region_shape,
            region_buf,
            &self.header.chunks,
            &mut chunk_buf,
        );
        self.store_chunk(&key, &chunk_buf)
    }

    /// Write a single scalar value, encoded per the array's dtype, to
    /// every element of `region_shape` at `offset`.
    pub fn write_fill(&self, offset: &[u64], region_shape: &[u64], value: &serde_json::Value) -> Result<()> {
        let native = self
            .data_type
            .encode_fill_value(value)
            .map_err(|e| Error::buffer_mismatch(e))?;
        let count = region_shape.iter().product::<u64>() as usize;
        let buf = self.data_type.tile_fill(&native, count);
        self.write_region(offset, region_shape, &buf)
    }

    /// Erase the whole array (header and all chunks).
    pub fn erase(&self) -> Result<()> {
        self.store
            .delete(&self.prefix)
            .map_err(|e| Error::store(self.prefix.clone(), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_type::DataType;
    use crate::header::HeaderBuilder;
    use crate::store::MemoryStore;

    fn i32_bytes(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_ne_bytes()).collect()
    }

    fn as_i32(bytes: &[u8]) -> Vec<i32> {
        bytes
            .chunks_exact(4)
            .map(|b| i32::from_ne_bytes(b.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn scenario_1_straddling_write_and_fill() {
        let store = MemoryStore::new();
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[10]),
            GridCoord::from_slice(&[3]),
            DataType::Int32,
        )
        .fill_value(serde_json::json!(-1))
        .build()
        .unwrap();
        let array = Array::create(&store, "arr", header).unwrap();

        array.write_region(&[4], &[3], &i32_bytes(&[7, 8, 9])).unwrap();
        let full = array.read_all().unwrap();
        assert_eq!(
            as_i32(&full),
            vec![-1, -1, -1, -1, 7, 8, 9, -1, -1, -1]
        );
    }

    #[test]
    fn scenario_2_2d_block_write() {
        let store = MemoryStore::new();
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[4, 4]),
            GridCoord::from_slice(&[2, 2]),
            DataType::Float32,
        )
        .fill_value(serde_json::json!(0.0))
        .build()
        .unwrap();
        let array = Array::create(&store, "arr", header).unwrap();

        let block: Vec<u8> = [1.0f32, 0.0, 0.0, 1.0].iter().flat_map(|v| v.to_ne_bytes()).collect();
        array.write_region(&[1, 1], &[2, 2], &block).unwrap();

        let full = array.read_all().unwrap();
        let values: Vec<f32> = full
            .chunks_exact(4)
            .map(|b| f32::from_ne_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(
            values,
            vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0]
        );
    }

    #[test]
    fn scenario_3_whole_array_fast_path_single_key() {
        let store = MemoryStore::new();
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[5, 5]),
            GridCoord::from_slice(&[5, 5]),
            DataType::Int32,
        )
        .build()
        .unwrap();
        let array = Array::create(&store, "arr", header).unwrap();

        let data = i32_bytes(&(0..25).collect::<Vec<_>>());
        array.write_region(&[0, 0], &[5, 5], &data).unwrap();
        assert!(store.exists("arr/0.0").unwrap());
        assert!(!store.exists("arr/1.0").unwrap());
    }

    #[test]
    fn scenario_4_nested_layout_keys() {
        let store = MemoryStore::new();
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[2, 2]),
            GridCoord::from_slice(&[1, 1]),
            DataType::Int32,
        )
        .nested(true)
        .build()
        .unwrap();
        let array = Array::create(&store, "arr", header).unwrap();
        array.write_region(&[0, 0], &[2, 2], &i32_bytes(&[1, 2, 3, 4])).unwrap();

        for key in ["arr/0/0", "arr/0/1", "arr/1/0", "arr/1/1"] {
            assert!(store.exists(key).unwrap(), "missing nested key {key}");
        }
        assert!(!store.exists("arr/0.0").unwrap());
    }

    #[test]
    fn scenario_5_probe_detects_nested_without_hint() {
        // Header omits dimension_separator; the on-disk chunk is placed
        // under a nested-style key to simulate a pre-existing array whose
        // layout must be probed for at open time.
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[2, 2]),
            GridCoord::from_slice(&[1, 1]),
            DataType::Int32,
        )
        .build()
        .unwrap();
        let store = MemoryStore::new();
        let created = Array::create(&store, "arr", header).unwrap();
        created.write_region(&[0, 0], &[1, 1], &i32_bytes(&[42])).unwrap();

        let blob = store.get("arr/0.0").unwrap().unwrap();
        store.delete("arr/0.0").unwrap();
        store.put("arr/0/0", blob).unwrap();

        let reopened = Array::open(&store, "arr").unwrap();
        let region = reopened.read_region(&[0, 0], &[1, 1]).unwrap();
        assert_eq!(as_i32(&region), vec![42]);
    }

    #[test]
    fn scenario_6_zlib_ramp_slice() {
        let store = MemoryStore::new();
        let mut params = serde_json::Map::new();
        params.insert("level".to_string(), serde_json::json!(6));
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[1000]),
            GridCoord::from_slice(&[100]),
            DataType::Int32,
        )
        .compressor("zlib", params)
        .build()
        .unwrap();
        let array = Array::create(&store, "arr", header).unwrap();

        let ramp: Vec<i32> = (0..1000).collect();
        array.write_region(&[0], &[1000], &i32_bytes(&ramp)).unwrap();

        let region = array.read_region(&[250], &[500]).unwrap();
        let expected: Vec<i32> = (250..750).collect();
        assert_eq!(as_i32(&region), expected);
    }

    #[test]
    fn fill_on_miss() {
        let store = MemoryStore::new();
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[6]),
            GridCoord::from_slice(&[3]),
            DataType::Int32,
        )
        .fill_value(serde_json::json!(9))
        .build()
        .unwrap();
        let array = Array::create(&store, "arr", header).unwrap();
        let region = array.read_all().unwrap();
        assert_eq!(as_i32(&region), vec![9; 6]);
    }

    #[test]
    fn out_of_range_region_is_rejected() {
        let store = MemoryStore::new();
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[4]),
            GridCoord::from_slice(&[2]),
            DataType::Int32,
        )
        .build()
        .unwrap();
        let array = Array::create(&store, "arr", header).unwrap();
        let err = array.read_region(&[3], &[2]);
        assert!(matches!(err, Err(Error::OutOfRange { .. })));
    }
}
