//! C bindings for opaque boxed values.

use std::any::Any;
use std::collections::HashSet;
use std::os::raw::c_void;
use std::ptr;
use std::sync::{Mutex, MutexGuard};

use num::complex::Complex;
use once_cell::sync::Lazy;

use crate::dtype::{DTypeIdentifier, cbox_dtype_t};
use crate::error::{Error, cbox_error_t, clear_error, write_error};

/// Opaque value handle for C callers.
#[allow(non_camel_case_types)]
#[repr(C)]
pub struct cbox_value_t;

/// Callback dispatched by `cbox_value_invoke`.
///
/// `value` is the live handle the invoke was issued on. `user_data` is
/// forwarded unchanged from callback registration. The callback may be
/// invoked from any thread that calls `cbox_value_invoke` on the value.
#[allow(non_camel_case_types)]
pub type cbox_invoke_callback_t =
    Option<extern "C" fn(value: *mut cbox_value_t, user_data: *mut c_void)>;

struct ValueHandle {
    payload: Box<dyn Any + Send>,
    callback: cbox_invoke_callback_t,
    user_data: usize,
}

// Addresses of every live handle. Release and invoke consult this table, so
// a released or foreign pointer is rejected instead of dereferenced.
static LIVE_VALUES: Lazy<Mutex<HashSet<usize>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn live_values() -> MutexGuard<'static, HashSet<usize>> {
    LIVE_VALUES.lock().unwrap_or_else(|err| err.into_inner())
}

fn register(value: *mut ValueHandle) {
    live_values().insert(value as usize);
}

fn deregister(value: *mut cbox_value_t) -> bool {
    live_values().remove(&(value as usize))
}

pub(crate) fn is_live(value: *const cbox_value_t) -> bool {
    live_values().contains(&(value as usize))
}

fn payload_dtype(payload: &(dyn Any + Send)) -> cbox_dtype_t {
    fn tag<T: DTypeIdentifier + 'static>(payload: &(dyn Any + Send)) -> Option<cbox_dtype_t> {
        payload.is::<T>().then(T::dtype)
    }

    tag::<f32>(payload)
        .or_else(|| tag::<f64>(payload))
        .or_else(|| tag::<Complex<f32>>(payload))
        .or_else(|| tag::<Complex<f64>>(payload))
        .or_else(|| tag::<u8>(payload))
        .or_else(|| tag::<u32>(payload))
        .or_else(|| tag::<u64>(payload))
        .or_else(|| tag::<i8>(payload))
        .or_else(|| tag::<i32>(payload))
        .or_else(|| tag::<i64>(payload))
        .unwrap_or(cbox_dtype_t::CBOX_DTYPE_UNDEFINED)
}

/// Creates a new empty value.
///
/// The returned handle must be released with `cbox_value_free`.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_value_create(out_error: *mut *mut cbox_error_t) -> *mut cbox_value_t {
    clear_error(out_error);
    let result = std::panic::catch_unwind(|| ValueHandle {
        payload: Box::new(()),
        callback: None,
        user_data: 0,
    });

    match result {
        Ok(handle) => {
            let value = Box::into_raw(Box::new(handle));
            register(value);
            value as *mut cbox_value_t
        }
        Err(_) => {
            write_error(out_error, Error::Panic("creating value"));
            ptr::null_mut()
        }
    }
}

/// Frees a value handle.
///
/// A null handle is a no-op. A handle that is not live (already freed, or
/// never allocated by cbox) is ignored and logged.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_value_free(value: *mut cbox_value_t) {
    if value.is_null() {
        return;
    }
    if !deregister(value) {
        log::warn!("cbox_value_free called with a handle that is not live; ignoring");
        return;
    }
    // Safety: the registry recorded value as allocated by cbox_value_create
    // and not yet freed.
    unsafe {
        drop(Box::from_raw(value as *mut ValueHandle));
    }
}

/// Invokes the callback registered on a live value.
///
/// Fails if the handle is not live or no callback has been registered.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_value_invoke(
    value: *mut cbox_value_t,
    out_error: *mut *mut cbox_error_t,
) -> bool {
    clear_error(out_error);
    if value.is_null() {
        write_error(out_error, Error::NullArgument("value"));
        return false;
    }
    if !is_live(value) {
        write_error(out_error, Error::NotLive);
        return false;
    }
    // Safety: value is live, so it points to a ValueHandle owned by cbox.
    let handle = unsafe { &*(value as *const ValueHandle) };
    let Some(callback) = handle.callback else {
        write_error(out_error, Error::NoCallback);
        return false;
    };
    callback(value, handle.user_data as *mut c_void);
    true
}

/// Registers the invoke callback for a live value.
///
/// Passing a null callback clears the registration. `user_data` is stored
/// alongside the callback and forwarded unchanged on every invoke.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_value_set_invoke_callback(
    value: *mut cbox_value_t,
    callback: cbox_invoke_callback_t,
    user_data: *mut c_void,
    out_error: *mut *mut cbox_error_t,
) -> bool {
    clear_error(out_error);
    if value.is_null() {
        write_error(out_error, Error::NullArgument("value"));
        return false;
    }
    if !is_live(value) {
        write_error(out_error, Error::NotLive);
        return false;
    }
    // Safety: value is live and the caller is its sole user during this call.
    let handle = unsafe { &mut *(value as *mut ValueHandle) };
    handle.callback = callback;
    handle.user_data = user_data as usize;
    true
}

/// Returns true if the value still holds the empty payload it was created
/// with, or if the handle is not live.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_value_is_empty(value: *const cbox_value_t) -> bool {
    if !is_live(value) {
        return true;
    }
    // Safety: value is live, so it points to a ValueHandle owned by cbox.
    let handle = unsafe { &*(value as *const ValueHandle) };
    handle.payload.is::<()>()
}

/// Returns the dtype of the value's payload.
///
/// Yields `CBOX_DTYPE_UNDEFINED` for empty or non-scalar payloads and for
/// handles that are not live.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_value_dtype(value: *const cbox_value_t) -> cbox_dtype_t {
    if !is_live(value) {
        return cbox_dtype_t::CBOX_DTYPE_UNDEFINED;
    }
    // Safety: value is live, so it points to a ValueHandle owned by cbox.
    let handle = unsafe { &*(value as *const ValueHandle) };
    payload_dtype(handle.payload.as_ref())
}

/// Returns the number of currently live value handles.
///
/// Intended for leak checks in embedding hosts and tests.
#[unsafe(no_mangle)]
pub extern "C" fn cbox_value_live_count() -> usize {
    live_values().len()
}

/// Returns a mutable reference to the boxed payload of a live value.
///
/// Not part of the C ABI. Embedders use this to install their own payloads
/// behind concrete entry points, replacing the `()` a fresh value holds.
/// Returns `None` if the handle is not live.
///
/// # Safety
/// The caller must be the handle's sole user for the lifetime of the
/// returned borrow, and must not free the handle while the borrow is held.
pub unsafe fn value_unwrap<'a>(value: *mut cbox_value_t) -> Option<&'a mut Box<dyn Any + Send>> {
    if !is_live(value) {
        return None;
    }
    // Safety: value is live and the caller guarantees exclusive access.
    let handle = unsafe { &mut *(value as *mut ValueHandle) };
    Some(&mut handle.payload)
}

/// Owned value handle for Rust embedders.
///
/// Frees the underlying handle when dropped, so the create/free pairing the
/// C surface requires never has to be written manually in Rust. `into_raw`
/// hands ownership to a C host; `from_raw` takes it back.
pub struct OwnedValue {
    raw: *mut cbox_value_t,
}

impl OwnedValue {
    /// Creates a new empty owned value, or `None` if creation failed.
    pub fn new() -> Option<Self> {
        let raw = cbox_value_create(ptr::null_mut());
        if raw.is_null() { None } else { Some(Self { raw }) }
    }

    /// Returns the raw handle without giving up ownership.
    pub fn as_ptr(&self) -> *mut cbox_value_t {
        self.raw
    }

    /// Returns a mutable reference to the boxed payload.
    pub fn payload_mut(&mut self) -> &mut Box<dyn Any + Send> {
        // Safety: self owns a live handle and holds the only borrow.
        unsafe { value_unwrap(self.raw) }.expect("owned value is live")
    }

    /// Releases ownership and returns the raw handle.
    ///
    /// The caller becomes responsible for passing it to `cbox_value_free`.
    pub fn into_raw(self) -> *mut cbox_value_t {
        let raw = self.raw;
        std::mem::forget(self);
        raw
    }

    /// Takes ownership of a raw handle.
    ///
    /// # Safety
    /// `raw` must be a live handle returned by `cbox_value_create` that no
    /// other owner will free.
    pub unsafe fn from_raw(raw: *mut cbox_value_t) -> Self {
        Self { raw }
    }
}

impl Drop for OwnedValue {
    fn drop(&mut self) {
        cbox_value_free(self.raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_store_query_free() {
        let value = cbox_value_create(ptr::null_mut());
        assert!(!value.is_null());
        assert!(cbox_value_is_empty(value));
        assert_eq!(cbox_value_dtype(value), cbox_dtype_t::CBOX_DTYPE_UNDEFINED);

        // Safety: value is live and not shared.
        let payload = unsafe { value_unwrap(value) }.unwrap();
        *payload = Box::new(5.0f64);
        assert!(!cbox_value_is_empty(value));
        assert_eq!(cbox_value_dtype(value), cbox_dtype_t::CBOX_DTYPE_F64);

        cbox_value_free(value);
        assert!(!is_live(value));
        assert!(unsafe { value_unwrap(value) }.is_none());
    }

    #[test]
    fn owned_value_frees_on_drop() {
        let mut owned = OwnedValue::new().unwrap();
        *owned.payload_mut() = Box::new(2.5f32);
        assert_eq!(cbox_value_dtype(owned.as_ptr()), cbox_dtype_t::CBOX_DTYPE_F32);

        let raw = owned.as_ptr();
        drop(owned);
        assert!(!is_live(raw));

        let owned = OwnedValue::new().unwrap();
        let raw = owned.into_raw();
        assert!(is_live(raw));
        cbox_value_free(raw);
    }

    #[test]
    fn payload_dtype_covers_scalars() {
        let payload: Box<dyn Any + Send> = Box::new(Complex::<f32>::new(1.0, 2.0));
        assert_eq!(
            payload_dtype(payload.as_ref()),
            cbox_dtype_t::CBOX_DTYPE_C32
        );

        let payload: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(
            payload_dtype(payload.as_ref()),
            cbox_dtype_t::CBOX_DTYPE_U32
        );

        let payload: Box<dyn Any + Send> = Box::new("not a scalar");
        assert_eq!(
            payload_dtype(payload.as_ref()),
            cbox_dtype_t::CBOX_DTYPE_UNDEFINED
        );
    }
}
