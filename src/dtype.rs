//! Element types and the process-wide default dtype.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Scalar type of tensor elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DType {
    Bool,
    U8,
    I8,
    I16,
    I32,
    I64,
    F16,
    BF16,
    F32,
    F64,
}

impl DType {
    const ALL: [DType; 10] = [
        DType::Bool,
        DType::U8,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::F16,
        DType::BF16,
        DType::F32,
        DType::F64,
    ];

    /// Width of one element in bytes.
    pub fn size_in_bytes(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::I16 | DType::F16 | DType::BF16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    pub fn is_floating_point(self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
    }

    /// The dtype for a Rust scalar type.
    pub fn of<T: Element>() -> Self {
        T::DTYPE
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::U8 => "uint8",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::F16 => "float16",
            DType::BF16 => "bfloat16",
            DType::F32 => "float32",
            DType::F64 => "float64",
        };
        f.write_str(name)
    }
}

/// Rust scalar types with a matching [`DType`].
pub trait Element: Copy + Send + Sync + 'static {
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),+ $(,)?) => {
        $(impl Element for $ty {
            const DTYPE: DType = DType::$dtype;
        })+
    };
}

impl_element! {
    bool => Bool,
    u8 => U8,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
}

static DEFAULT_DTYPE: AtomicU8 = AtomicU8::new(DType::F32 as u8);

/// The dtype used when a factory call does not name one.
pub fn default_dtype() -> DType {
    let raw = DEFAULT_DTYPE.load(Ordering::Relaxed);
    DType::ALL
        .into_iter()
        .find(|dtype| *dtype as u8 == raw)
        .unwrap_or(DType::F32)
}

/// Changes the default dtype. Only floating point types are accepted; returns
/// `false` and leaves the default unchanged otherwise.
pub fn set_default_dtype(dtype: DType) -> bool {
    if !dtype.is_floating_point() {
        return false;
    }
    DEFAULT_DTYPE.store(dtype as u8, Ordering::Relaxed);
    true
}
