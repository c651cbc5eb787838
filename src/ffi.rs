//! Shared utilities for cbox's C FFI bindings.

use std::ffi::CStr;
use std::os::raw::c_char;

pub(crate) fn read_optional_cstr(value: *const c_char) -> Option<String> {
    if value.is_null() {
        return None;
    }
    // Safety: caller guarantees a valid, NUL-terminated C string.
    let cstr = unsafe { CStr::from_ptr(value) };
    Some(cstr.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use std::ffi::CString;
    use std::ptr;

    use super::*;

    #[test]
    fn optional_cstr_handles_null_and_values() {
        assert_eq!(read_optional_cstr(ptr::null()), None);

        let value = CString::new("cbox=debug").unwrap();
        assert_eq!(
            read_optional_cstr(value.as_ptr()),
            Some("cbox=debug".to_string())
        );
    }
}
