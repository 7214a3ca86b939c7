//! FFI bindings for commlog feature extraction
//!
//! C-compatible functions for computing features from other languages. Inputs
//! and outputs are null-terminated JSON strings; returned strings are allocated
//! here and must be freed by the caller using `cf_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::context::ExtractionContext;
use crate::ingest::parse_user_json;
use crate::pipeline::{user_json_to_features, FeatureExtractor};
use crate::registry::FeatureRegistry;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Caller must free the result with `cf_free_string`
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Read the `(user_json, user_id)` argument pair shared by the feature calls
unsafe fn user_args(json: *const c_char, user_id: *const c_char) -> Option<(String, String)> {
    let Some(json_str) = cstr_to_string(json) else {
        set_last_error("Invalid JSON string pointer");
        return None;
    };
    // A null user id is allowed and becomes an empty cell
    let id_str = if user_id.is_null() {
        String::new()
    } else {
        match cstr_to_string(user_id) {
            Some(s) => s,
            None => {
                set_last_error("Invalid user_id string pointer");
                return None;
            }
        }
    };
    Some((json_str, id_str))
}

// ============================================================================
// Stateless API
// ============================================================================

/// Compute the standard features for one user.
///
/// # Safety
/// - `json` must be a valid null-terminated C string holding one user document.
/// - `user_id` must be a valid null-terminated C string, or NULL.
/// - Returns a newly allocated JSON object string that must be freed with `cf_free_string`.
/// - Returns NULL on error; call `cf_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cf_user_features(
    json: *const c_char,
    user_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let Some((json_str, id_str)) = user_args(json, user_id) else {
        return ptr::null_mut();
    };

    match user_json_to_features(&json_str, &id_str) {
        Ok(row) => string_to_cstr(&row),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// List the standard feature names as a JSON array.
///
/// # Safety
/// - Returns a newly allocated string that must be freed with `cf_free_string`.
#[no_mangle]
pub unsafe extern "C" fn cf_feature_names() -> *mut c_char {
    clear_last_error();

    match serde_json::to_string(FeatureRegistry::standard().names()) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Configured Extractor API
// ============================================================================

/// Opaque handle to a FeatureExtractor
pub struct CfExtractorHandle {
    extractor: FeatureExtractor,
}

/// Create an extractor.
///
/// `experimental` non-zero adds the experimental features. `require_valid_datetime`
/// zero counts SMS without a valid timestamp in the daily SMS rate.
///
/// # Safety
/// - Returns a pointer to a newly allocated extractor.
/// - Must be freed with `cf_extractor_free`.
#[no_mangle]
pub unsafe extern "C" fn cf_extractor_new(
    experimental: i32,
    require_valid_datetime: i32,
) -> *mut CfExtractorHandle {
    clear_last_error();

    let registry = if experimental != 0 {
        FeatureRegistry::extended()
    } else {
        FeatureRegistry::standard()
    };
    let context =
        ExtractionContext::default().with_require_valid_datetime(require_valid_datetime != 0);

    Box::into_raw(Box::new(CfExtractorHandle {
        extractor: FeatureExtractor::new(registry, context),
    }))
}

/// Free an extractor.
///
/// # Safety
/// - `extractor` must be a valid pointer returned by `cf_extractor_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cf_extractor_free(extractor: *mut CfExtractorHandle) {
    if !extractor.is_null() {
        drop(Box::from_raw(extractor));
    }
}

/// Compute one user's features with a configured extractor.
///
/// # Safety
/// - `extractor` must be a valid pointer returned by `cf_extractor_new`.
/// - `json` must be a valid null-terminated C string; `user_id` may be NULL.
/// - Returns a newly allocated string that must be freed with `cf_free_string`.
/// - Returns NULL on error; call `cf_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cf_extractor_user_features(
    extractor: *mut CfExtractorHandle,
    json: *const c_char,
    user_id: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if extractor.is_null() {
        set_last_error("Null extractor pointer");
        return ptr::null_mut();
    }
    let handle = &*extractor;

    let Some((json_str, id_str)) = user_args(json, user_id) else {
        return ptr::null_mut();
    };

    let row = parse_user_json(&json_str)
        .map(|user| handle.extractor.extract_row(&id_str, &user))
        .and_then(|row| serde_json::to_string(&row).map_err(Into::into));
    match row {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by a `cf_` function.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a `cf_` function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cf_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The pointer is valid until the next `cf_` call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn cf_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn cf_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
