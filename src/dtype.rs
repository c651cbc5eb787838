//! Runtime scalar type information for wrapped values.

use num::complex::Complex;

/// Scalar type tags exposed to C callers.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum cbox_dtype_t {
    CBOX_DTYPE_UNDEFINED = 0,
    CBOX_DTYPE_F32 = 1,
    CBOX_DTYPE_F64 = 2,
    CBOX_DTYPE_C32 = 3,
    CBOX_DTYPE_C64 = 4,
    CBOX_DTYPE_U8 = 5,
    CBOX_DTYPE_U32 = 6,
    CBOX_DTYPE_U64 = 7,
    CBOX_DTYPE_I8 = 8,
    CBOX_DTYPE_I32 = 9,
    CBOX_DTYPE_I64 = 10,
}

impl cbox_dtype_t {
    pub(crate) fn is_real(self) -> bool {
        matches!(
            self,
            cbox_dtype_t::CBOX_DTYPE_F32
                | cbox_dtype_t::CBOX_DTYPE_F64
                | cbox_dtype_t::CBOX_DTYPE_U8
                | cbox_dtype_t::CBOX_DTYPE_U32
                | cbox_dtype_t::CBOX_DTYPE_U64
                | cbox_dtype_t::CBOX_DTYPE_I8
                | cbox_dtype_t::CBOX_DTYPE_I32
                | cbox_dtype_t::CBOX_DTYPE_I64
        )
    }

    pub(crate) fn is_complex(self) -> bool {
        matches!(
            self,
            cbox_dtype_t::CBOX_DTYPE_C32 | cbox_dtype_t::CBOX_DTYPE_C64
        )
    }

    pub(crate) fn real_type(self) -> cbox_dtype_t {
        match self {
            cbox_dtype_t::CBOX_DTYPE_C32 => cbox_dtype_t::CBOX_DTYPE_F32,
            cbox_dtype_t::CBOX_DTYPE_C64 => cbox_dtype_t::CBOX_DTYPE_F64,
            other => other,
        }
    }

    pub(crate) fn complex_type(self) -> cbox_dtype_t {
        match self {
            cbox_dtype_t::CBOX_DTYPE_F32 => cbox_dtype_t::CBOX_DTYPE_C32,
            cbox_dtype_t::CBOX_DTYPE_F64 => cbox_dtype_t::CBOX_DTYPE_C64,
            _ => cbox_dtype_t::CBOX_DTYPE_UNDEFINED,
        }
    }
}

/// Returns true if the dtype is a real scalar type.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_dtype_is_real(dtype: cbox_dtype_t) -> bool {
    dtype.is_real()
}

/// Returns true if the dtype is a complex scalar type.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_dtype_is_complex(dtype: cbox_dtype_t) -> bool {
    dtype.is_complex()
}

/// Returns the real dtype associated with a dtype.
///
/// Real dtypes map to themselves.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_dtype_real_type(dtype: cbox_dtype_t) -> cbox_dtype_t {
    dtype.real_type()
}

/// Returns the complex dtype associated with a dtype.
///
/// Yields `CBOX_DTYPE_UNDEFINED` when no complex counterpart exists.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_dtype_complex_type(dtype: cbox_dtype_t) -> cbox_dtype_t {
    dtype.complex_type()
}

/// Runtime dtype information for Rust scalar types storable in a value.
pub trait DTypeIdentifier {
    /// Returns the dtype tag for this type.
    fn dtype() -> cbox_dtype_t;
}

impl DTypeIdentifier for f32 {
    fn dtype() -> cbox_dtype_t {
        cbox_dtype_t::CBOX_DTYPE_F32
    }
}

impl DTypeIdentifier for f64 {
    fn dtype() -> cbox_dtype_t {
        cbox_dtype_t::CBOX_DTYPE_F64
    }
}

impl DTypeIdentifier for Complex<f32> {
    fn dtype() -> cbox_dtype_t {
        cbox_dtype_t::CBOX_DTYPE_C32
    }
}

impl DTypeIdentifier for Complex<f64> {
    fn dtype() -> cbox_dtype_t {
        cbox_dtype_t::CBOX_DTYPE_C64
    }
}

impl DTypeIdentifier for u8 {
    fn dtype() -> cbox_dtype_t {
        cbox_dtype_t::CBOX_DTYPE_U8
    }
}

impl DTypeIdentifier for u32 {
    fn dtype() -> cbox_dtype_t {
        cbox_dtype_t::CBOX_DTYPE_U32
    }
}

impl DTypeIdentifier for u64 {
    fn dtype() -> cbox_dtype_t {
        cbox_dtype_t::CBOX_DTYPE_U64
    }
}

impl DTypeIdentifier for i8 {
    fn dtype() -> cbox_dtype_t {
        cbox_dtype_t::CBOX_DTYPE_I8
    }
}

impl DTypeIdentifier for i32 {
    fn dtype() -> cbox_dtype_t {
        cbox_dtype_t::CBOX_DTYPE_I32
    }
}

impl DTypeIdentifier for i64 {
    fn dtype() -> cbox_dtype_t {
        cbox_dtype_t::CBOX_DTYPE_I64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_and_complex_predicates() {
        assert!(cbox_dtype_is_real(cbox_dtype_t::CBOX_DTYPE_F64));
        assert!(cbox_dtype_is_real(cbox_dtype_t::CBOX_DTYPE_U8));
        assert!(!cbox_dtype_is_real(cbox_dtype_t::CBOX_DTYPE_C32));
        assert!(!cbox_dtype_is_real(cbox_dtype_t::CBOX_DTYPE_UNDEFINED));

        assert!(cbox_dtype_is_complex(cbox_dtype_t::CBOX_DTYPE_C64));
        assert!(!cbox_dtype_is_complex(cbox_dtype_t::CBOX_DTYPE_I32));
    }

    #[test]
    fn real_and_complex_associations() {
        assert_eq!(
            cbox_dtype_real_type(cbox_dtype_t::CBOX_DTYPE_C32),
            cbox_dtype_t::CBOX_DTYPE_F32
        );
        assert_eq!(
            cbox_dtype_real_type(cbox_dtype_t::CBOX_DTYPE_I64),
            cbox_dtype_t::CBOX_DTYPE_I64
        );

        assert_eq!(
            cbox_dtype_complex_type(cbox_dtype_t::CBOX_DTYPE_F64),
            cbox_dtype_t::CBOX_DTYPE_C64
        );
        assert_eq!(
            cbox_dtype_complex_type(cbox_dtype_t::CBOX_DTYPE_U32),
            cbox_dtype_t::CBOX_DTYPE_UNDEFINED
        );
    }

    #[test]
    fn identifier_impls_match_tags() {
        assert_eq!(<f32 as DTypeIdentifier>::dtype(), cbox_dtype_t::CBOX_DTYPE_F32);
        assert_eq!(
            <Complex<f64> as DTypeIdentifier>::dtype(),
            cbox_dtype_t::CBOX_DTYPE_C64
        );
        assert_eq!(<i8 as DTypeIdentifier>::dtype(), cbox_dtype_t::CBOX_DTYPE_I8);
    }
}
