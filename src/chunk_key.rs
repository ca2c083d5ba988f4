//! Chunk-key formatting and layout auto-detection.
//!
//! When a header omits its separator hint, `probe_layout` walks chunk-grid
//! positions (not element positions - the grid can be much smaller than the
//! array) trying both separator styles until one resolves to an existing
//! key.

use crate::geometry::grid_shape;
use crate::store::Store;

/// Chunk-key separator style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `"i.j.k"`
    Flat,
    /// `"i/j/k"`
    Nested,
}

impl Layout {
    fn separator(self) -> char {
        match self {
            Layout::Flat => '.',
            Layout::Nested => '/',
        }
    }

    /// Parses the optional `dimension_separator` header field.
    pub fn from_separator_char(c: char) -> Option<Self> {
        match c {
            '.' => Some(Layout::Flat),
            '/' => Some(Layout::Nested),
            _ => None,
        }
    }

    pub fn separator_char(self) -> char {
        self.separator()
    }
}

/// Join a chunk index tuple into its store key, under `prefix` (the
/// array's root key, without a trailing separator).
pub fn chunk_key(prefix: &str, index: &[u64], layout: Layout) -> String {
    let sep = layout.separator();
    let mut key = String::with_capacity(prefix.len() + index.len() * 3 + 1);
    key.push_str(prefix);
    key.push('/');
    for (i, idx) in index.iter().enumerate() {
        if i > 0 {
            key.push(sep);
        }
        key.push_str(&idx.to_string());
    }
    key
}

/// Probe an existing array for its chunk-key layout when the header omits
/// the hint. Walks chunk-grid positions (bounded by
/// `∏ ceil(shape[k]/chunks[k])`), trying both separators at each position,
/// and returns the first layout for which a chunk exists. Returns `None`
/// if no chunk exists anywhere; the caller should fall back to a
/// configured default and log a warning.
pub fn probe_layout<S: Store>(
    store: &S,
    prefix: &str,
    shape: &[u64],
    chunks: &[u64],
) -> std::io::Result<Option<Layout>> {
    let grid = grid_shape(shape, chunks);
    if grid.is_empty() || grid.iter().any(|&g| g == 0) {
        return Ok(None);
    }

    let rank = grid.len();
    let mut index = vec![0u64; rank];
    loop {
        for layout in [Layout::Flat, Layout::Nested] {
            let key = chunk_key(prefix, &index, layout);
            if store.exists(&key)? {
                return Ok(Some(layout));
            }
        }

        let mut axis = rank;
        loop {
            if axis == 0 {
                return Ok(None);
            }
            axis -= 1;
            index[axis] += 1;
            if index[axis] < grid[axis] {
                break;
            }
            index[axis] = 0;
            if axis == 0 {
                return Ok(None);
            }
        }
    }
}
