//! C FFI entry points for cbox.
//!
//! cbox exposes type-erased boxed Rust values to C callers behind opaque
//! handles: a value is created empty, optionally populated by an embedding
//! host through [`value_unwrap`], queried for its runtime dtype, and invoked
//! through a registered callback before being freed.

use std::os::raw::c_char;

mod dtype;
mod error;
mod ffi;
mod logging;
mod value;

pub use dtype::{
    DTypeIdentifier, cbox_dtype_complex_type, cbox_dtype_is_complex, cbox_dtype_is_real,
    cbox_dtype_real_type, cbox_dtype_t,
};
pub use error::{
    cbox_error_code, cbox_error_code_t, cbox_error_free, cbox_error_message, cbox_error_t,
    cbox_string_free,
};
pub use logging::{
    cbox_log_callback_t, cbox_log_config_init, cbox_log_config_t, cbox_log_init,
    cbox_log_level_t, cbox_log_record_t,
};
pub use value::{
    OwnedValue, cbox_invoke_callback_t, cbox_value_create, cbox_value_dtype, cbox_value_free,
    cbox_value_invoke, cbox_value_is_empty, cbox_value_live_count,
    cbox_value_set_invoke_callback, cbox_value_t, value_unwrap,
};

/// Returns a static `name version` string for cbox.
///
/// The returned pointer must not be freed.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_version() -> *const c_char {
    concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION"), "\0").as_ptr()
        as *const c_char
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn version_is_static_and_named() {
        let version = cbox_version();
        assert!(!version.is_null());
        // Safety: cbox_version returns a static NUL-terminated string.
        let version = unsafe { CStr::from_ptr(version) }.to_str().unwrap();
        assert!(version.starts_with("cbox "));
    }
}
