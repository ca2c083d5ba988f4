//! Region ↔ chunk-grid arithmetic.
//!
//! Enumerates which chunks a region touches and the overlap window within
//! each, then copies between region and chunk buffers over raw byte slices
//! with a runtime element size.

use crate::error::{Error, Result};
use crate::GridCoord;

/// Number of chunks along each axis needed to cover `shape` given `chunks`.
pub fn grid_shape(shape: &[u64], chunks: &[u64]) -> GridCoord {
    shape
        .iter()
        .zip(chunks.iter())
        .map(|(s, c)| (s + c - 1) / c)
        .collect()
}

/// Validate that `(offset, shape)` is a valid region against `array_shape`.
pub fn validate_region(array_shape: &[u64], offset: &[u64], region_shape: &[u64]) -> Result<()> {
    let rank = array_shape.len();
    if offset.len() != rank || region_shape.len() != rank {
        return Err(Error::out_of_range(format!(
            "rank mismatch: array has rank {rank}, region offset/shape has rank {}/{}",
            offset.len(),
            region_shape.len()
        )));
    }
    for k in 0..rank {
        let end = offset[k].checked_add(region_shape[k]).ok_or_else(|| {
            Error::out_of_range(format!("axis {k} offset+shape overflows u64"))
        })?;
        if end > array_shape[k] {
            return Err(Error::out_of_range(format!(
                "axis {k}: region [{}, {}) exceeds array extent {}",
                offset[k], end, array_shape[k]
            )));
        }
    }
    Ok(())
}

/// A single chunk's overlap with a caller region: which chunk, where the
/// overlap sits within the chunk, where it sits within the caller's region
/// buffer, and its extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWindow {
    pub chunk_index: GridCoord,
    /// Offset of the overlap within the chunk (chunk-local coordinates).
    pub chunk_offset: GridCoord,
    /// Offset of the overlap within the caller's region buffer.
    pub region_offset: GridCoord,
    /// Shape of the overlap, shared between chunk and region space.
    pub shape: GridCoord,
}

impl ChunkWindow {
    /// True when this window covers the chunk's entire extent: the fast
    /// path where a whole-chunk replace/read can skip
    /// decode-merge-encode.
    pub fn is_full_chunk(&self, chunk_shape: &[u64]) -> bool {
        self.chunk_offset.iter().all(|&o| o == 0) && self.shape.as_slice() == chunk_shape
    }
}

/// Enumerate, in row-major order of chunk index, every chunk touched by
/// `(region_offset, region_shape)` against `(array_shape, chunk_shape)`,
/// together with each chunk's overlap window.
///
/// Callers must validate the region first via [`validate_region`].
pub fn chunks_in_region(
    array_shape: &[u64],
    chunk_shape: &[u64],
    region_offset: &[u64],
    region_shape: &[u64],
) -> Vec<ChunkWindow> {
    let rank = array_shape.len();
    if rank == 0 || region_shape.iter().any(|&s| s == 0) {
        return Vec::new();
    }

    // Per-axis inclusive range of touched chunk indices.
    let mut first_chunk = GridCoord::with_capacity(rank);
    let mut last_chunk = GridCoord::with_capacity(rank);
    for k in 0..rank {
        let start = region_offset[k];
        let end = region_offset[k] + region_shape[k]; // exclusive, validated in range
        first_chunk.push(start / chunk_shape[k]);
        last_chunk.push((end - 1) / chunk_shape[k]);
    }

    let mut windows = Vec::new();
    let mut current = first_chunk.clone();
    'outer: loop {
        windows.push(window_for_chunk(
            &current,
            chunk_shape,
            region_offset,
            region_shape,
        ));

        // Odometer increment, row-major (last axis fastest).
        for axis in (0..rank).rev() {
            if current[axis] < last_chunk[axis] {
                current[axis] += 1;
                break;
            } else {
                current[axis] = first_chunk[axis];
                if axis == 0 {
                    break 'outer;
                }
            }
        }
    }
    windows
}

fn window_for_chunk(
    chunk_index: &[u64],
    chunk_shape: &[u64],
    region_offset: &[u64],
    region_shape: &[u64],
) -> ChunkWindow {
    let rank = chunk_index.len();
    let mut chunk_offset = GridCoord::with_capacity(rank);
    let mut win_region_offset = GridCoord::with_capacity(rank);
    let mut shape = GridCoord::with_capacity(rank);

    for k in 0..rank {
        let chunk_start = chunk_index[k] * chunk_shape[k];
        let chunk_end = chunk_start + chunk_shape[k];
        let region_start = region_offset[k];
        let region_end = region_offset[k] + region_shape[k];

        let overlap_start = chunk_start.max(region_start);
        let overlap_end = chunk_end.min(region_end);

        chunk_offset.push(overlap_start - chunk_start);
        win_region_offset.push(overlap_start - region_start);
        shape.push(overlap_end - overlap_start);
    }

    ChunkWindow {
        chunk_index: chunk_index.iter().cloned().collect(),
        chunk_offset,
        region_offset: win_region_offset,
        shape,
    }
}

/// Row-major strides (in elements) for a buffer of the given shape.
fn strides(shape: &[u64]) -> GridCoord {
    let rank = shape.len();
    let mut strides = GridCoord::from_elem(1, rank);
    for k in (0..rank.saturating_sub(1)).rev() {
        strides[k] = strides[k + 1] * shape[k + 1];
    }
    strides
}

/// Copy the overlap described by `window` from `region_buf` (laid out as
/// `region_shape`, `elem_size`-byte elements) into `chunk_buf` (laid out as
/// `chunk_shape`). Used on the write path.
#[allow(clippy::too_many_arguments)]
pub fn copy_region_into_chunk(
    window: &ChunkWindow,
    elem_size: usize,
    region_shape: &[u64],
    region_buf: &[u8],
    chunk_shape: &[u64],
    chunk_buf: &mut [u8],
) {
    copy_nd(
        &window.region_offset,
        region_shape,
        region_buf,
        &window.chunk_offset,
        chunk_shape,
        chunk_buf,
        &window.shape,
        elem_size,
    );
}

/// Copy the overlap described by `window` from `chunk_buf` into
/// `region_buf`. Used on the read path.
#[allow(clippy::too_many_arguments)]
pub fn copy_chunk_into_region(
    window: &ChunkWindow,
    elem_size: usize,
    chunk_shape: &[u64],
    chunk_buf: &[u8],
    region_shape: &[u64],
    region_buf: &mut [u8],
) {
    copy_nd(
        &window.chunk_offset,
        chunk_shape,
        chunk_buf,
        &window.region_offset,
        region_shape,
        region_buf,
        &window.shape,
        elem_size,
    );
}

/// Generic R-dimensional memcpy between two row-major byte buffers: copies
/// the box of `extent` elements starting at `src_offset` within `src`
/// (shaped `src_shape`) to the box starting at `dst_offset` within `dst`
/// (shaped `dst_shape`). The innermost axis is copied with one contiguous
/// `copy_from_slice`; outer axes are walked with an odometer.
#[allow(clippy::too_many_arguments)]
fn copy_nd(
    src_offset: &[u64],
    src_shape: &[u64],
    src: &[u8],
    dst_offset: &[u64],
    dst_shape: &[u64],
    dst: &mut [u8],
    extent: &[u64],
    elem_size: usize,
) {
    let rank = extent.len();
    if rank == 0 || extent.iter().any(|&e| e == 0) {
        return;
    }
    let src_strides = strides(src_shape);
    let dst_strides = strides(dst_shape);
    let row_len = extent[rank - 1] as usize * elem_size;

    // Iterate every outer coordinate (all axes but the last), copying one
    // contiguous innermost row per iteration.
    let mut outer = GridCoord::from_elem(0, rank - 1);
    loop {
        let mut src_lin: u64 = 0;
        let mut dst_lin: u64 = 0;
        for k in 0..rank - 1 {
            src_lin += (src_offset[k] + outer[k]) * src_strides[k];
            dst_lin += (dst_offset[k] + outer[k]) * dst_strides[k];
        }
        let src_start = (src_lin + src_offset[rank - 1]) as usize * elem_size;
        let dst_start = (dst_lin + dst_offset[rank - 1]) as usize * elem_size;
        dst[dst_start..dst_start + row_len].copy_from_slice(&src[src_start..src_start + row_len]);

        if rank == 1 {
            break;
        }
        let mut axis = rank as isize - 2;
        loop {
            if axis < 0 {
                return;
            }
            let a = axis as usize;
            outer[a] += 1;
            if outer[a] < extent[a] {
                break;
            }
            outer[a] = 0;
            axis -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enumerates_single_chunk_fast_path() {
        let windows = chunks_in_region(&[5, 5], &[5, 5], &[0, 0], &[5, 5]);
        assert_eq!(windows.len(), 1);
        assert!(windows[0].is_full_chunk(&[5, 5]));
    }

    #[test]
    fn enumerates_straddling_chunks() {
        // shape=[10], chunks=[3]; region offset=4 shape=3 touches chunks 1,2
        let windows = chunks_in_region(&[10], &[3], &[4], &[3]);
        let idxs: Vec<u64> = windows.iter().map(|w| w.chunk_index[0]).collect();
        assert_eq!(idxs, vec![1, 2]);
    }

    #[test]
    fn copy_round_trip_partial_region() {
        // chunk shape [4], write region [2] at offset [1] into a fresh chunk
        let chunk_shape = [4u64];
        let mut chunk_buf = vec![0u8; 4 * 4]; // i32 elements
        let region_shape = [2u64];
        let region_buf: Vec<u8> = [10i32, 20i32]
            .iter()
            .flat_map(|v| v.to_ne_bytes())
            .collect();

        let windows = chunks_in_region(&[4], &chunk_shape, &[1], &region_shape);
        assert_eq!(windows.len(), 1);
        copy_region_into_chunk(
            &windows[0],
            4,
            &region_shape,
            &region_buf,
            &chunk_shape,
            &mut chunk_buf,
        );

        let mut out = vec![0u8; region_buf.len()];
        copy_chunk_into_region(&windows[0], 4, &chunk_shape, &chunk_buf, &region_shape, &mut out);
        assert_eq!(out, region_buf);
    }

    #[test]
    fn copy_2d_window() {
        // array 4x4, chunk 2x2, write [[1,0],[0,1]] at offset (1,1)
        let array_shape = [4u64, 4];
        let chunk_shape = [2u64, 2];
        let region_shape = [2u64, 2];
        let region_offset = [1u64, 1];
        let region_buf: Vec<u8> = [1i32, 0, 0, 1].iter().flat_map(|v| v.to_ne_bytes()).collect();

        let windows = chunks_in_region(&array_shape, &chunk_shape, &region_offset, &region_shape);
        // touches all 4 chunks (0,0)(0,1)(1,0)(1,1)
        assert_eq!(windows.len(), 4);

        let mut full = vec![0u8; 16 * 4];
        for w in &windows {
            let chunk_start_row = w.chunk_index[0] * chunk_shape[0];
            let chunk_start_col = w.chunk_index[1] * chunk_shape[1];
            let mut chunk_buf = vec![0u8; 4 * 4];
            copy_region_into_chunk(w, 4, &region_shape, &region_buf, &chunk_shape, &mut chunk_buf);
            // splat this chunk into `full` at its own position for verification
            for r in 0..chunk_shape[0] {
                for c in 0..chunk_shape[1] {
                    let src = ((r * chunk_shape[1] + c) * 4) as usize;
                    let row = chunk_start_row + r;
                    let col = chunk_start_col + c;
                    let dst = ((row * 4 + col) * 4) as usize;
                    full[dst..dst + 4].copy_from_slice(&chunk_buf[src..src + 4]);
                }
            }
        }
        let expected: Vec<i32> = vec![0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0];
        let actual: Vec<i32> = full
            .chunks_exact(4)
            .map(|b| i32::from_ne_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(actual, expected);
    }
}
