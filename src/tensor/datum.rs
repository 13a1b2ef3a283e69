use serde::{Deserialize, Serialize};

/// Element type of a [`crate::tensor::Tensor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatumType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    F64,
    /// Symbolic dimension.
    TDim,
    /// Opaque bytes.
    Blob,
    String,
}

impl DatumType {
    /// Width of one element in bytes, `None` for variable-width types.
    pub fn size_of(self) -> Option<usize> {
        use DatumType::*;
        match self {
            Bool | U8 | I8 => Some(1),
            U16 | I16 | F16 => Some(2),
            U32 | I32 | F32 => Some(4),
            U64 | I64 | F64 => Some(8),
            TDim | Blob | String => None,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DatumType::F16 | DatumType::F32 | DatumType::F64)
    }

    pub fn is_integer(self) -> bool {
        use DatumType::*;
        matches!(self, U8 | U16 | U32 | U64 | I8 | I16 | I32 | I64)
    }

    pub fn as_str(self) -> &'static str {
        use DatumType::*;
        match self {
            Bool => "bool",
            U8 => "u8",
            U16 => "u16",
            U32 => "u32",
            U64 => "u64",
            I8 => "i8",
            I16 => "i16",
            I32 => "i32",
            I64 => "i64",
            F16 => "f16",
            F32 => "f32",
            F64 => "f64",
            TDim => "tdim",
            Blob => "blob",
            String => "string",
        }
    }
}

/// Fixed-width element types with a little-endian byte encoding.
pub trait Datum: Copy + Default + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    const DATUM_TYPE: DatumType;

    fn write_le(&self, out: &mut Vec<u8>);

    /// Overwrites `bytes`, which holds exactly `DATUM_TYPE.size_of()` bytes.
    fn store_le(&self, bytes: &mut [u8]);

    /// `bytes` holds exactly `DATUM_TYPE.size_of()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_datum {
    ($($t:ty => $dt:ident),* $(,)?) => {
        $(
            impl Datum for $t {
                const DATUM_TYPE: DatumType = DatumType::$dt;

                fn write_le(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn store_le(&self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(bytes);
                    <$t>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_datum!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
);

impl Datum for bool {
    const DATUM_TYPE: DatumType = DatumType::Bool;

    fn write_le(&self, out: &mut Vec<u8>) {
        out.push(*self as u8);
    }

    fn store_le(&self, bytes: &mut [u8]) {
        bytes[0] = *self as u8;
    }

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(DatumType::F32.size_of(), Some(4));
        assert_eq!(DatumType::Bool.size_of(), Some(1));
        assert_eq!(DatumType::String.size_of(), None);
        assert!(DatumType::F16.is_float());
        assert!(DatumType::U64.is_integer());
        assert!(!DatumType::Blob.is_integer());
    }

    #[test]
    fn test_le_encoding() {
        let mut out = vec![];
        (-2i16).write_le(&mut out);
        assert_eq!(out, vec![0xfe, 0xff]);
        assert_eq!(i16::read_le(&out), -2);
        assert_eq!(f32::DATUM_TYPE.size_of(), Some(std::mem::size_of::<f32>()));

        let mut slot = [0u8; 4];
        7u32.store_le(&mut slot);
        assert_eq!(slot, [7, 0, 0, 0]);
        let mut flag = [0u8];
        true.store_le(&mut flag);
        assert!(bool::read_le(&flag));
    }
}
