use std::fmt;

use crate::error::{IrError, IrResult};
use crate::tensor::{Datum, DatumType, Shape};

/// Number of blob bytes shown by `Debug`.
const BLOB_PREVIEW: usize = 16;
/// Number of typed elements shown by `Debug`.
const VALUES_PREVIEW: usize = 16;

/// Flat, row-major tensor over little-endian byte storage.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Tensor {
    dtype: DatumType,
    shape: Shape,
    data: Vec<u8>,
}

impl Tensor {
    /// Builds a tensor from typed values; `values` must fill `shape` exactly.
    pub fn from_vec<T: Datum>(shape: impl Into<Shape>, values: Vec<T>) -> IrResult<Self> {
        let shape = shape.into();
        if values.len() != shape.checked_volume()? {
            return Err(IrError::Tensor(format!(
                "{} values do not fill shape {:?}",
                values.len(),
                shape
            )));
        }
        let mut data = Vec::with_capacity(values.len() * T::DATUM_TYPE.size_of().unwrap_or(0));
        for v in &values {
            v.write_le(&mut data);
        }
        Ok(Self {
            dtype: T::DATUM_TYPE,
            shape,
            data,
        })
    }

    pub fn scalar<T: Datum>(value: T) -> Self {
        let mut data = vec![];
        value.write_le(&mut data);
        Self {
            dtype: T::DATUM_TYPE,
            shape: Shape::scalar(),
            data,
        }
    }

    /// A zero-filled tensor of a fixed-width type.
    pub fn zeros(dtype: DatumType, shape: impl Into<Shape>) -> IrResult<Self> {
        let shape = shape.into();
        let width = fixed_width(dtype, "Tensor::zeros")?;
        let bytes = byte_len(width, &shape)?;
        Ok(Self {
            dtype,
            data: vec![0; bytes],
            shape,
        })
    }

    /// Wraps raw bytes. Fixed-width types must supply exactly `volume * size_of` bytes.
    pub fn from_bytes(dtype: DatumType, shape: impl Into<Shape>, data: Vec<u8>) -> IrResult<Self> {
        let shape = shape.into();
        shape.checked_volume()?;
        if let Some(width) = dtype.size_of() {
            let expected = byte_len(width, &shape)?;
            if data.len() != expected {
                return Err(IrError::Tensor(format!(
                    "expected {expected} bytes for {} {:?}, got {}",
                    dtype.as_str(),
                    shape,
                    data.len()
                )));
            }
        }
        Ok(Self { dtype, shape, data })
    }

    /// A scalar opaque blob.
    pub fn blob(data: Vec<u8>) -> Self {
        Self {
            dtype: DatumType::Blob,
            shape: Shape::scalar(),
            data,
        }
    }

    pub fn dtype(&self) -> DatumType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        self.shape.strides()
    }

    /// Element count.
    pub fn len(&self) -> usize {
        self.shape.volume()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Decodes the elements as `T`, failing on a dtype mismatch.
    pub fn to_vec<T: Datum>(&self) -> IrResult<Vec<T>> {
        self.check_dtype::<T>()?;
        let width = fixed_width(self.dtype, "Tensor::to_vec")?;
        Ok(self.data.chunks_exact(width).map(T::read_le).collect())
    }

    /// Overwrites the elements in place, keeping shape and dtype.
    pub fn assign<T: Datum>(&mut self, values: &[T]) -> IrResult<()> {
        self.check_dtype::<T>()?;
        if values.len() != self.len() {
            return Err(IrError::Tensor(format!(
                "cannot assign {} values to a tensor of {} elements",
                values.len(),
                self.len()
            )));
        }
        self.data.clear();
        for v in values {
            v.write_le(&mut self.data);
        }
        Ok(())
    }

    /// Rewrites every element in place through `f`, in row-major order.
    pub fn map_in_place<T: Datum>(&mut self, mut f: impl FnMut(T) -> T) -> IrResult<()> {
        self.check_dtype::<T>()?;
        let width = fixed_width(self.dtype, "Tensor::map_in_place")?;
        for chunk in self.data.chunks_exact_mut(width) {
            f(T::read_le(chunk)).store_le(chunk);
        }
        Ok(())
    }

    /// Same bytes under a new shape of equal volume.
    pub fn into_shape(self, shape: impl Into<Shape>) -> IrResult<Self> {
        let shape = shape.into();
        if shape.checked_volume()? != self.len() {
            return Err(IrError::Tensor(format!(
                "cannot reshape {:?} into {:?}",
                self.shape, shape
            )));
        }
        Ok(Self { shape, ..self })
    }

    fn check_dtype<T: Datum>(&self) -> IrResult<()> {
        if self.dtype != T::DATUM_TYPE {
            return Err(IrError::Tensor(format!(
                "tensor holds {}, not {}",
                self.dtype.as_str(),
                T::DATUM_TYPE.as_str()
            )));
        }
        Ok(())
    }
}

fn fixed_width(dtype: DatumType, context: &str) -> IrResult<usize> {
    dtype.size_of().ok_or_else(|| IrError::UnsupportedDatum {
        dtype,
        context: context.to_string(),
    })
}

fn byte_len(width: usize, shape: &Shape) -> IrResult<usize> {
    width
        .checked_mul(shape.checked_volume()?)
        .ok_or_else(|| IrError::Tensor(format!("shape {shape:?} is too large")))
}

macro_rules! debug_values {
    ($tensor:expr, $f:expr, $($dt:ident => $t:ty),*) => {
        match $tensor.dtype {
            $(DatumType::$dt => {
                let width = fixed_width($tensor.dtype, "Debug").map_err(|_| fmt::Error)?;
                let values: Vec<$t> = $tensor
                    .data
                    .chunks_exact(width)
                    .take(VALUES_PREVIEW)
                    .map(<$t>::read_le)
                    .collect();
                write!($f, "{:?}", values)?;
                if $tensor.len() > VALUES_PREVIEW {
                    write!($f, "..")?;
                }
                Ok(())
            })*
            _ => {
                let end = $tensor.data.len().min(BLOB_PREVIEW);
                write!($f, "0x{}", hex::encode(&$tensor.data[..end]))?;
                if $tensor.data.len() > BLOB_PREVIEW {
                    write!($f, "..")?;
                }
                Ok(())
            }
        }
    };
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?},{} ", self.shape, self.dtype.as_str())?;
        debug_values!(self, f,
            Bool => bool, U8 => u8, U16 => u16, U32 => u32, U64 => u64,
            I8 => i8, I16 => i16, I32 => i32, I64 => i64, F32 => f32, F64 => f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_round_trips_typed_values() {
        let t = Tensor::from_vec(vec![3, 2], vec![1i32, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(t.dtype(), DatumType::I32);
        assert_eq!(t.len(), 6);
        assert_eq!(t.strides(), &[2, 1]);
        assert_eq!(t.as_bytes().len(), 24);
        assert_eq!(t.to_vec::<i32>().unwrap()[4], 5);
        assert!(t.to_vec::<f32>().is_err());
    }

    #[test]
    fn test_size_checks() {
        assert!(Tensor::from_vec(vec![2, 2], vec![1f32, 2.0, 3.0]).is_err());
        assert!(Tensor::from_bytes(DatumType::F32, vec![2], vec![0; 7]).is_err());
        assert!(Tensor::from_bytes(DatumType::Blob, Shape::scalar(), vec![0; 7]).is_ok());
        assert!(Tensor::zeros(DatumType::String, vec![2]).is_err());
    }

    #[test]
    fn test_map_in_place_keeps_the_buffer() {
        let mut t = Tensor::from_vec(vec![2, 2], vec![1i64, -2, 3, -4]).unwrap();
        let before = t.as_bytes().as_ptr();
        t.map_in_place::<i64>(|v| v * 10).unwrap();
        assert_eq!(t.as_bytes().as_ptr(), before);
        assert_eq!(t.to_vec::<i64>().unwrap(), vec![10, -20, 30, -40]);
        assert!(t.map_in_place::<f32>(|v| v).is_err());
    }

    #[test]
    fn test_overflowing_shapes_are_errors() {
        let err = Tensor::zeros(DatumType::F32, vec![usize::MAX, 2]).unwrap_err();
        assert!(matches!(err, IrError::Tensor(_)));
        // volume fits, byte count does not
        assert!(Tensor::zeros(DatumType::F64, vec![usize::MAX / 4]).is_err());
        assert!(Tensor::from_bytes(DatumType::F32, vec![1 << 62, 4], vec![]).is_err());
        assert!(Tensor::from_bytes(DatumType::Blob, vec![0, usize::MAX, 2], vec![]).is_err());
        assert!(Tensor::from_vec(vec![usize::MAX, 2], Vec::<f32>::new()).is_err());
        let t = Tensor::from_vec(vec![0], Vec::<f32>::new()).unwrap();
        assert!(t.into_shape(vec![0, usize::MAX, 2]).is_err());
    }

    #[test]
    fn test_assign_and_reshape() {
        let mut t = Tensor::zeros(DatumType::F32, vec![2, 2]).unwrap();
        t.assign(&[1f32, 2.0, 3.0, 4.0]).unwrap();
        let t = t.into_shape(vec![4]).unwrap();
        assert_eq!(t.shape().dims(), &[4]);
        assert_eq!(t.to_vec::<f32>().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert!(t.into_shape(vec![3]).is_err());
    }

    #[test]
    fn test_debug_rendering() {
        let t = Tensor::from_vec(vec![2], vec![1u8, 2]).unwrap();
        assert_eq!(format!("{t:?}"), "[2],u8 [1, 2]");
        let b = Tensor::blob(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(format!("{b:?}"), "[],blob 0xdeadbeef");
        let big = Tensor::from_vec(vec![1000], (0..1000).collect::<Vec<i32>>()).unwrap();
        let text = format!("{big:?}");
        assert!(text.starts_with("[1000],i32 [0, 1, 2,"));
        assert!(text.ends_with("14, 15].."));
    }
}
