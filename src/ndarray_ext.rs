//! Typed `ndarray` convenience layer, feature-gated behind `ndarray`.
//!
//! The core engine in [`crate::array`] is dtype-dynamic: it speaks raw
//! byte buffers tagged by [`crate::data_type::DataType`], not a Rust element
//! type. This module is the thin typed wrapper on top, casting between
//! `ArrayD<T>` and the engine's byte buffers via `bytemuck::Pod`.

use bytemuck::Pod;
use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::array::Array;
use crate::data_type::DataType;
use crate::error::{Error, Result};
use crate::store::Store;

/// A Rust type that can be read/written as one of this engine's dtypes.
/// Implemented for every numeric kind [`DataType`] knows about.
pub trait TypedElement: Pod {
    const DATA_TYPE: DataType;
}

macro_rules! impl_typed_element {
    ($($t:ty => $dt:expr),+ $(,)?) => {
        $(impl TypedElement for $t {
            const DATA_TYPE: DataType = $dt;
        })+
    };
}

impl_typed_element! {
    i8 => DataType::Int8,
    i16 => DataType::Int16,
    i32 => DataType::Int32,
    i64 => DataType::Int64,
    u8 => DataType::UInt8,
    u16 => DataType::UInt16,
    u32 => DataType::UInt32,
    u64 => DataType::UInt64,
    f32 => DataType::Float32,
    f64 => DataType::Float64,
}

fn check_dtype<T: TypedElement>(array_dtype: DataType) -> Result<()> {
    if array_dtype != T::DATA_TYPE {
        return Err(Error::buffer_mismatch(format!(
            "array dtype is {array_dtype:?}, requested element type is {:?}",
            T::DATA_TYPE
        )));
    }
    Ok(())
}

/// `ndarray`-typed read/write convenience methods on [`Array`].
pub trait ArrayExt<S: Store> {
    fn read_ndarray<T: TypedElement>(&self, offset: &[u64], shape: &[u64]) -> Result<ArrayD<T>>;
    fn write_ndarray<T: TypedElement>(&self, offset: &[u64], data: ArrayViewD<'_, T>) -> Result<()>;
}

impl<'s, S: Store> ArrayExt<S> for Array<'s, S> {
    fn read_ndarray<T: TypedElement>(&self, offset: &[u64], shape: &[u64]) -> Result<ArrayD<T>> {
        check_dtype::<T>(self.data_type())?;
        let bytes = self.read_region(offset, shape)?;
        let elements: &[T] = bytemuck::cast_slice(&bytes);
        let dims: Vec<usize> = shape.iter().map(|&s| s as usize).collect();
        ArrayD::from_shape_vec(IxDyn(&dims), elements.to_vec())
            .map_err(|e| Error::buffer_mismatch(e.to_string()))
    }

    fn write_ndarray<T: TypedElement>(&self, offset: &[u64], data: ArrayViewD<'_, T>) -> Result<()> {
        check_dtype::<T>(self.data_type())?;
        let shape: Vec<u64> = data.shape().iter().map(|&s| s as u64).collect();
        let contiguous = data
            .as_standard_layout()
            .to_owned()
            .into_raw_vec();
        let bytes: &[u8] = bytemuck::cast_slice(&contiguous);
        self.write_region(offset, &shape, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HeaderBuilder;
    use crate::store::MemoryStore;
    use crate::GridCoord;
    use ndarray::Array2;

    #[test]
    fn write_and_read_ndarray_roundtrip() {
        let store = MemoryStore::new();
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[4, 4]),
            GridCoord::from_slice(&[2, 2]),
            DataType::Int32,
        )
        .build()
        .unwrap();
        let array = Array::create(&store, "arr", header).unwrap();

        let data = Array2::<i32>::from_shape_vec((2, 2), vec![1, 2, 3, 4]).unwrap();
        array.write_ndarray(&[1, 1], data.into_dyn().view()).unwrap();

        let out = array.read_ndarray::<i32>(&[1, 1], &[2, 2]).unwrap();
        assert_eq!(out.into_raw_vec(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn dtype_mismatch_is_rejected() {
        let store = MemoryStore::new();
        let header = HeaderBuilder::new(
            GridCoord::from_slice(&[2]),
            GridCoord::from_slice(&[2]),
            DataType::Int32,
        )
        .build()
        .unwrap();
        let array = Array::create(&store, "arr", header).unwrap();
        let err = array.read_ndarray::<f32>(&[0], &[2]);
        assert!(err.is_err());
    }
}
