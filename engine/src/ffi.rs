//! FFI layer for host applications.
//!
//! This module provides C-compatible functions so a non-Rust editor (a web
//! view through WASM glue, a mobile shell) can reuse validation, unit
//! conversion and commit planning. All data crosses the boundary as JSON
//! strings.
//!
//! # Memory Management
//!
//! - Strings returned by `tally_*` functions are allocated by Rust
//! - Caller must free them with `tally_string_free`
//!
//! # Error Handling
//!
//! Functions return JSON with either:
//! - `{"ok": <result>}` on success
//! - `{"error": "<message>"}` on failure

use crate::{CommitPlan, Error, Item, Limits, UnitConverter, UpdatePolicy, Validator, Variant};
use serde::{de::DeserializeOwned, Deserialize};
use std::ffi::{c_char, CStr, CString};

/// Result wrapper for FFI responses.
#[derive(serde::Serialize)]
#[serde(untagged)]
enum FfiResult<T: serde::Serialize> {
    Ok { ok: T },
    Err { error: String },
}

impl<T: serde::Serialize> FfiResult<T> {
    fn ok(value: T) -> Self {
        FfiResult::Ok { ok: value }
    }

    fn err(message: impl Into<String>) -> Self {
        FfiResult::Err {
            error: message.into(),
        }
    }

    fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization failed: {}"}}"#, e))
    }
}

/// Convert a Rust string to a C string pointer.
/// Caller must free with `tally_string_free`.
fn to_c_string(s: String) -> *mut c_char {
    match CString::new(s) {
        Ok(cs) => cs.into_raw(),
        Err(_) => CString::new(r#"{"error":"string contained null bytes"}"#)
            .map(CString::into_raw)
            .unwrap_or(std::ptr::null_mut()),
    }
}

/// Convert a C string pointer to a Rust string.
/// Returns None if pointer is null or invalid UTF-8.
unsafe fn from_c_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Read and parse a JSON request argument.
unsafe fn parse_request<T: DeserializeOwned>(ptr: *const c_char) -> Result<T, Error> {
    let raw = from_c_string(ptr)
        .ok_or_else(|| Error::InvalidPayload("null or invalid string".into()))?;
    serde_json::from_str(&raw).map_err(|e| Error::InvalidPayload(e.to_string()))
}

fn respond<T: serde::Serialize>(result: Result<T, Error>) -> *mut c_char {
    match result {
        Ok(value) => to_c_string(FfiResult::ok(value).to_json()),
        Err(e) => to_c_string(FfiResult::<()>::err(e.to_string()).to_json()),
    }
}

/// Free a string allocated by the engine.
///
/// # Safety
/// - `s` must be a valid pointer from a `tally_*` function
/// - Must not be called twice on the same pointer
#[no_mangle]
pub unsafe extern "C" fn tally_string_free(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

// ============================================================================
// Validation
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateRequest {
    variant: Variant,
    items: Vec<Item>,
    #[serde(default)]
    limits: Option<Limits>,
}

/// Validate an ordered item list.
///
/// # Arguments
/// - `request_json`: `{"variant": "milestone", "items": [...], "limits": {...}?}`
///
/// # Returns
/// JSON string: `{"ok": ValidationReport}` or `{"error": "message"}`
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tally_string_free`
#[no_mangle]
pub unsafe extern "C" fn tally_validate(request_json: *const c_char) -> *mut c_char {
    respond(parse_request::<ValidateRequest>(request_json).map(|req| {
        let validator = match req.limits {
            Some(limits) => Validator::with_limits(req.variant, limits),
            None => Validator::new(req.variant),
        };
        validator.validate(&req.items)
    }))
}

// ============================================================================
// Unit Conversion
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToDisplayRequest {
    converter: UnitConverter,
    amount: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToCanonicalRequest {
    converter: UnitConverter,
    display: f64,
}

/// Convert a canonical amount to its display value.
///
/// # Arguments
/// - `request_json`: `{"converter": {"mode": "display", "rate": {...}}, "amount": 1000}`
///
/// # Returns
/// JSON string: `{"ok": 0.5}` or `{"error": "message"}`
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tally_string_free`
#[no_mangle]
pub unsafe extern "C" fn tally_to_display(request_json: *const c_char) -> *mut c_char {
    respond(
        parse_request::<ToDisplayRequest>(request_json)
            .map(|req| req.converter.to_display(req.amount)),
    )
}

/// Convert a display value to the canonical amount.
///
/// # Returns
/// JSON string: `{"ok": 1000}` or `{"error": "message"}`
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tally_string_free`
#[no_mangle]
pub unsafe extern "C" fn tally_to_canonical(request_json: *const c_char) -> *mut c_char {
    respond(
        parse_request::<ToCanonicalRequest>(request_json)
            .and_then(|req| req.converter.to_canonical(req.display)),
    )
}

// ============================================================================
// Commit Planning
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanRequest {
    variant: Variant,
    parent_id: u64,
    items: Vec<Item>,
    #[serde(default)]
    policy: UpdatePolicy,
    /// Seeded items, consulted under `changedOnly`
    #[serde(default)]
    baseline: Vec<Item>,
}

/// Plan the requests for committing an item list.
///
/// # Returns
/// JSON string: `{"ok": CommitPlan}` or `{"error": "message"}`
///
/// # Safety
/// - `request_json` must be a valid null-terminated C string or null
/// - Caller must free the returned string with `tally_string_free`
#[no_mangle]
pub unsafe extern "C" fn tally_plan_commit(request_json: *const c_char) -> *mut c_char {
    respond(parse_request::<PlanRequest>(request_json).map(|req| {
        CommitPlan::build(req.variant, req.parent_id, &req.items, req.policy, |id| {
            req.baseline.iter().find(|item| item.persisted_id() == Some(id))
        })
    }))
}
