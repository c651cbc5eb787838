use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

/// Opaque error type for C callers.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct cbox_error_t;

/// Machine-readable classification of an error reported by cbox.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum cbox_error_code_t {
    CBOX_ERROR_CODE_INTERNAL = 0,
    CBOX_ERROR_CODE_INVALID_ARGUMENT = 1,
    CBOX_ERROR_CODE_NULL_HANDLE = 2,
    CBOX_ERROR_CODE_NOT_LIVE = 3,
    CBOX_ERROR_CODE_NO_CALLBACK = 4,
    CBOX_ERROR_CODE_PANIC = 5,
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("{0} was null")]
    NullArgument(&'static str),
    #[error("{0}")]
    InvalidArgument(String),
    #[error("value handle is not live")]
    NotLive,
    #[error("no invoke callback is registered for this value")]
    NoCallback,
    #[error("panic while {0}")]
    Panic(&'static str),
    #[error("{0}")]
    Internal(String),
}

impl Error {
    fn code(&self) -> cbox_error_code_t {
        match self {
            Error::NullArgument(_) => cbox_error_code_t::CBOX_ERROR_CODE_NULL_HANDLE,
            Error::InvalidArgument(_) => cbox_error_code_t::CBOX_ERROR_CODE_INVALID_ARGUMENT,
            Error::NotLive => cbox_error_code_t::CBOX_ERROR_CODE_NOT_LIVE,
            Error::NoCallback => cbox_error_code_t::CBOX_ERROR_CODE_NO_CALLBACK,
            Error::Panic(_) => cbox_error_code_t::CBOX_ERROR_CODE_PANIC,
            Error::Internal(_) => cbox_error_code_t::CBOX_ERROR_CODE_INTERNAL,
        }
    }
}

struct ErrorHandle {
    message: CString,
    code: cbox_error_code_t,
}

pub(crate) fn cstring_from_str_lossy(value: &str) -> CString {
    if value.as_bytes().contains(&0) {
        let sanitized: String = value.chars().map(|c| if c == '\0' { ' ' } else { c }).collect();
        CString::new(sanitized).unwrap_or_else(|_| CString::new("invalid utf-8").unwrap())
    } else {
        CString::new(value).unwrap_or_else(|_| CString::new("invalid utf-8").unwrap())
    }
}

pub(crate) fn clear_error(out_error: *mut *mut cbox_error_t) {
    if !out_error.is_null() {
        // Safety: caller provided a valid out_error pointer.
        unsafe {
            *out_error = ptr::null_mut();
        }
    }
}

pub(crate) fn write_error(out_error: *mut *mut cbox_error_t, error: Error) {
    if out_error.is_null() {
        return;
    }
    let handle = Box::new(ErrorHandle {
        message: cstring_from_str_lossy(&error.to_string()),
        code: error.code(),
    });
    // Safety: out_error is non-null and points to writable memory.
    unsafe {
        *out_error = Box::into_raw(handle) as *mut cbox_error_t;
    }
}

/// Returns the message for an error allocated by cbox.
///
/// The returned pointer is valid as long as the error handle is alive.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_error_message(error: *const cbox_error_t) -> *const c_char {
    if error.is_null() {
        return ptr::null();
    }
    // Safety: error must be a valid handle allocated by cbox.
    let handle = unsafe { &*(error as *const ErrorHandle) };
    handle.message.as_ptr()
}

/// Returns the classification code for an error allocated by cbox.
///
/// A null error yields `CBOX_ERROR_CODE_INTERNAL`.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_error_code(error: *const cbox_error_t) -> cbox_error_code_t {
    if error.is_null() {
        return cbox_error_code_t::CBOX_ERROR_CODE_INTERNAL;
    }
    // Safety: error must be a valid handle allocated by cbox.
    let handle = unsafe { &*(error as *const ErrorHandle) };
    handle.code
}

/// Frees an error returned by cbox.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_error_free(error: *mut cbox_error_t) {
    if error.is_null() {
        return;
    }
    // Safety: error must be a valid handle allocated by cbox.
    unsafe {
        drop(Box::from_raw(error as *mut ErrorHandle));
    }
}

/// Frees a string allocated by cbox.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_string_free(value: *mut c_char) {
    if value.is_null() {
        return;
    }
    // Safety: value must be a string allocated by cbox_string_free-compatible APIs.
    unsafe {
        drop(CString::from_raw(value));
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn lossy_cstring_replaces_interior_nul() {
        let value = cstring_from_str_lossy("bad\0byte");
        assert_eq!(value.to_str().unwrap(), "bad byte");
    }

    #[test]
    fn write_and_read_error() {
        let mut error: *mut cbox_error_t = ptr::null_mut();
        write_error(&mut error, Error::NotLive);
        assert!(!error.is_null());

        let message = cbox_error_message(error);
        // Safety: cbox_error_message returned a live NUL-terminated string.
        let message = unsafe { CStr::from_ptr(message) }.to_str().unwrap();
        assert_eq!(message, "value handle is not live");
        assert_eq!(
            cbox_error_code(error),
            cbox_error_code_t::CBOX_ERROR_CODE_NOT_LIVE
        );

        cbox_error_free(error);
    }

    #[test]
    fn null_error_accessors_are_defined() {
        assert!(cbox_error_message(ptr::null()).is_null());
        assert_eq!(
            cbox_error_code(ptr::null()),
            cbox_error_code_t::CBOX_ERROR_CODE_INTERNAL
        );
        cbox_error_free(ptr::null_mut());
        cbox_string_free(ptr::null_mut());
    }

    #[test]
    fn write_error_tolerates_null_out_pointer() {
        clear_error(ptr::null_mut());
        write_error(ptr::null_mut(), Error::NoCallback);
    }
}
