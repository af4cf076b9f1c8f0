//! C-callable surface over the query driver, models, and error reporter.
//!
//! Every object is an opaque heap-allocated handle owned by the caller:
//! create/destroy pairs manage lifetime, all other calls borrow. No
//! panics or Rust errors cross the boundary; failures surface as a status
//! code plus a message on the owning handle's error reporter. There is no
//! hidden global state.
//!
//! Status codes mirror the error reporter: 0 OK, 1 warning, 2 error.

use std::ffi::{c_char, c_void, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;

use geogrid_common::reporter::report_error;
use geogrid_common::SharedReporter;
use geogrid_model::{Model, SquashSurface};
use geogrid_query::QueryDriver;

/// Status code for OK.
pub const GEOGRID_OK: i32 = 0;
/// Status code for a recorded warning.
pub const GEOGRID_WARNING: i32 = 1;
/// Status code for a recorded error.
pub const GEOGRID_ERROR: i32 = 2;

/// Squash reference surface codes.
pub const GEOGRID_SQUASH_TOP_SURFACE: i32 = 0;
pub const GEOGRID_SQUASH_TOPOGRAPHY_BATHYMETRY: i32 = 1;

struct ErrorHandlerHandle {
    reporter: SharedReporter,
}

struct QueryHandle {
    driver: QueryDriver,
    error_handler: Box<ErrorHandlerHandle>,
}

struct ModelHandle {
    model: Model,
}

/// Run a closure, converting panics into ERROR.
fn guarded<F: FnOnce() -> i32>(body: F) -> i32 {
    match catch_unwind(AssertUnwindSafe(body)) {
        Ok(status) => status,
        Err(_) => GEOGRID_ERROR,
    }
}

unsafe fn query_handle<'a>(handle: *mut c_void) -> Option<&'a mut QueryHandle> {
    (handle as *mut QueryHandle).as_mut()
}

unsafe fn error_handle<'a>(handle: *mut c_void) -> Option<&'a mut ErrorHandlerHandle> {
    (handle as *mut ErrorHandlerHandle).as_mut()
}

unsafe fn model_handle<'a>(handle: *mut c_void) -> Option<&'a ModelHandle> {
    (handle as *mut ModelHandle).as_ref()
}

unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

unsafe fn cstr_array(ptrs: *const *const c_char, len: usize) -> Option<Vec<String>> {
    if ptrs.is_null() {
        return None;
    }
    let mut out = Vec::with_capacity(len);
    for offset in 0..len {
        out.push(cstr_to_string(*ptrs.add(offset))?);
    }
    Some(out)
}

/// Copy a message into a caller buffer, NUL-terminated and truncated to
/// fit.
unsafe fn copy_message(message: &str, buffer: *mut c_char, buffer_len: usize) {
    if buffer.is_null() || buffer_len == 0 {
        return;
    }
    let bytes = message.as_bytes();
    let copy_len = bytes.len().min(buffer_len - 1);
    std::ptr::copy_nonoverlapping(bytes.as_ptr() as *const c_char, buffer, copy_len);
    *buffer.add(copy_len) = 0;
}

// ---------------------------------------------------------------------------
// Query driver
// ---------------------------------------------------------------------------

/// Create a query driver handle. Destroy with `geogrid_query_destroy`.
#[no_mangle]
pub extern "C" fn geogrid_query_create() -> *mut c_void {
    let driver = QueryDriver::new();
    let error_handler = Box::new(ErrorHandlerHandle {
        reporter: driver.reporter(),
    });
    Box::into_raw(Box::new(QueryHandle {
        driver,
        error_handler,
    })) as *mut c_void
}

/// Destroy a query driver handle.
///
/// # Safety
/// `handle` must come from `geogrid_query_create` and not be used again.
#[no_mangle]
pub unsafe extern "C" fn geogrid_query_destroy(handle: *mut c_void) {
    if !handle.is_null() {
        drop(Box::from_raw(handle as *mut QueryHandle));
    }
}

/// Error handler owned by the driver; valid while the driver lives.
///
/// # Safety
/// `handle` must be a live query handle.
#[no_mangle]
pub unsafe extern "C" fn geogrid_query_get_error_handler(handle: *mut c_void) -> *mut c_void {
    match query_handle(handle) {
        Some(query) => query.error_handler.as_mut() as *mut ErrorHandlerHandle as *mut c_void,
        None => std::ptr::null_mut(),
    }
}

/// Open models and declare the requested values.
///
/// # Safety
/// Pointer arguments must reference `num_models` / `num_values` valid
/// NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn geogrid_query_initialize(
    handle: *mut c_void,
    model_paths: *const *const c_char,
    num_models: usize,
    value_names: *const *const c_char,
    num_values: usize,
    input_crs: *const c_char,
) -> i32 {
    guarded(|| {
        let Some(query) = (unsafe { query_handle(handle) }) else {
            return GEOGRID_ERROR;
        };
        let parsed = unsafe {
            (
                cstr_array(model_paths, num_models),
                cstr_array(value_names, num_values),
                cstr_to_string(input_crs),
            )
        };
        let (Some(paths), Some(values), Some(crs)) = parsed else {
            report_error(&query.driver.reporter(), "null argument to initialize");
            return GEOGRID_ERROR;
        };
        let paths: Vec<PathBuf> = paths.into_iter().map(PathBuf::from).collect();
        match query.driver.initialize(&paths, &values, &crs) {
            Ok(()) => GEOGRID_OK,
            Err(_) => GEOGRID_ERROR,
        }
    })
}

/// Enable squashing above `min_elev`.
///
/// # Safety
/// `handle` must be a live query handle.
#[no_mangle]
pub unsafe extern "C" fn geogrid_query_set_squash_min_elev(
    handle: *mut c_void,
    min_elev: f64,
) -> i32 {
    guarded(|| {
        let Some(query) = (unsafe { query_handle(handle) }) else {
            return GEOGRID_ERROR;
        };
        query.driver.set_squash_min_elev(min_elev);
        GEOGRID_OK
    })
}

/// Select the squash reference surface (0 top, 1 topography/bathymetry).
///
/// # Safety
/// `handle` must be a live query handle.
#[no_mangle]
pub unsafe extern "C" fn geogrid_query_set_squash_surface(
    handle: *mut c_void,
    surface: i32,
) -> i32 {
    guarded(|| {
        let Some(query) = (unsafe { query_handle(handle) }) else {
            return GEOGRID_ERROR;
        };
        let surface = match surface {
            GEOGRID_SQUASH_TOP_SURFACE => SquashSurface::TopSurface,
            GEOGRID_SQUASH_TOPOGRAPHY_BATHYMETRY => SquashSurface::TopographyBathymetry,
            _ => {
                report_error(&query.driver.reporter(), "unknown squash surface code");
                return GEOGRID_ERROR;
            }
        };
        query.driver.set_squash_surface(surface);
        GEOGRID_OK
    })
}

/// Interpolate values at points.
///
/// `points` holds `num_points` xyz triples; `values` receives
/// `num_points * num_values` floats; `errors` one flag per point.
///
/// # Safety
/// Buffers must be valid for the documented lengths.
#[no_mangle]
pub unsafe extern "C" fn geogrid_query(
    handle: *mut c_void,
    values: *mut f32,
    errors: *mut u8,
    points: *const f64,
    num_points: usize,
) -> i32 {
    guarded(|| {
        let Some(query) = (unsafe { query_handle(handle) }) else {
            return GEOGRID_ERROR;
        };
        if values.is_null() || errors.is_null() || points.is_null() {
            report_error(&query.driver.reporter(), "null buffer passed to query");
            return GEOGRID_ERROR;
        }
        let point_slice =
            unsafe { std::slice::from_raw_parts(points as *const [f64; 3], num_points) };
        match query.driver.query(point_slice) {
            Ok((out_values, out_errors)) => {
                unsafe {
                    std::ptr::copy_nonoverlapping(out_values.as_ptr(), values, out_values.len());
                    std::ptr::copy_nonoverlapping(out_errors.as_ptr(), errors, out_errors.len());
                }
                if out_errors.iter().any(|&flag| flag != 0) {
                    GEOGRID_WARNING
                } else {
                    GEOGRID_OK
                }
            }
            Err(_) => GEOGRID_ERROR,
        }
    })
}

unsafe fn elevation_call(
    handle: *mut c_void,
    elevations: *mut f64,
    errors: *mut u8,
    points: *const f64,
    num_points: usize,
    topobathy: bool,
) -> i32 {
    guarded(|| {
        let Some(query) = (unsafe { query_handle(handle) }) else {
            return GEOGRID_ERROR;
        };
        if elevations.is_null() || errors.is_null() || points.is_null() {
            report_error(&query.driver.reporter(), "null buffer passed to query");
            return GEOGRID_ERROR;
        }
        let point_slice =
            unsafe { std::slice::from_raw_parts(points as *const [f64; 3], num_points) };
        let result = if topobathy {
            query.driver.query_topobathy_elevation(point_slice)
        } else {
            query.driver.query_top_elevation(point_slice)
        };
        match result {
            Ok((out_elevations, out_errors)) => {
                unsafe {
                    std::ptr::copy_nonoverlapping(
                        out_elevations.as_ptr(),
                        elevations,
                        out_elevations.len(),
                    );
                    std::ptr::copy_nonoverlapping(out_errors.as_ptr(), errors, out_errors.len());
                }
                GEOGRID_OK
            }
            Err(_) => GEOGRID_ERROR,
        }
    })
}

/// Top-surface elevations at points (z of each triple is ignored).
///
/// # Safety
/// Buffers must be valid for the documented lengths.
#[no_mangle]
pub unsafe extern "C" fn geogrid_query_top_elevation(
    handle: *mut c_void,
    elevations: *mut f64,
    errors: *mut u8,
    points: *const f64,
    num_points: usize,
) -> i32 {
    elevation_call(handle, elevations, errors, points, num_points, false)
}

/// Topography/bathymetry elevations at points.
///
/// # Safety
/// Buffers must be valid for the documented lengths.
#[no_mangle]
pub unsafe extern "C" fn geogrid_query_topobathy_elevation(
    handle: *mut c_void,
    elevations: *mut f64,
    errors: *mut u8,
    points: *const f64,
    num_points: usize,
) -> i32 {
    elevation_call(handle, elevations, errors, points, num_points, true)
}

/// Release models; the handle only accepts destroy afterwards.
///
/// # Safety
/// `handle` must be a live query handle.
#[no_mangle]
pub unsafe extern "C" fn geogrid_query_finalize(handle: *mut c_void) -> i32 {
    guarded(|| {
        let Some(query) = (unsafe { query_handle(handle) }) else {
            return GEOGRID_ERROR;
        };
        query.driver.finalize();
        GEOGRID_OK
    })
}

// ---------------------------------------------------------------------------
// Error handler
// ---------------------------------------------------------------------------

/// Current status code (0 OK, 1 warning, 2 error).
///
/// # Safety
/// `handle` must come from `geogrid_query_get_error_handler`.
#[no_mangle]
pub unsafe extern "C" fn geogrid_error_handler_get_status(handle: *mut c_void) -> i32 {
    guarded(|| {
        let Some(error_handler) = (unsafe { error_handle(handle) }) else {
            return GEOGRID_ERROR;
        };
        match error_handler.reporter.lock() {
            Ok(reporter) => reporter.status().code(),
            Err(_) => GEOGRID_ERROR,
        }
    })
}

/// Copy the current message into `buffer` (NUL-terminated, truncated).
///
/// # Safety
/// `buffer` must be writable for `buffer_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn geogrid_error_handler_get_message(
    handle: *mut c_void,
    buffer: *mut c_char,
    buffer_len: usize,
) -> i32 {
    guarded(|| {
        let Some(error_handler) = (unsafe { error_handle(handle) }) else {
            return GEOGRID_ERROR;
        };
        match error_handler.reporter.lock() {
            Ok(reporter) => {
                unsafe { copy_message(reporter.message(), buffer, buffer_len) };
                GEOGRID_OK
            }
            Err(_) => GEOGRID_ERROR,
        }
    })
}

/// Reset the status to OK.
///
/// # Safety
/// `handle` must come from `geogrid_query_get_error_handler`.
#[no_mangle]
pub unsafe extern "C" fn geogrid_error_handler_reset(handle: *mut c_void) -> i32 {
    guarded(|| {
        let Some(error_handler) = (unsafe { error_handle(handle) }) else {
            return GEOGRID_ERROR;
        };
        match error_handler.reporter.lock() {
            Ok(mut reporter) => {
                reporter.reset_status();
                GEOGRID_OK
            }
            Err(_) => GEOGRID_ERROR,
        }
    })
}

// ---------------------------------------------------------------------------
// Single model
// ---------------------------------------------------------------------------

/// Open one model read-only. Destroy with `geogrid_model_destroy`.
///
/// Returns null when the model cannot be opened.
///
/// # Safety
/// `path` and `input_crs` must be valid NUL-terminated strings.
#[no_mangle]
pub unsafe extern "C" fn geogrid_model_open(
    path: *const c_char,
    input_crs: *const c_char,
) -> *mut c_void {
    let result = catch_unwind(|| {
        let path = unsafe { cstr_to_string(path) }?;
        let crs = unsafe { cstr_to_string(input_crs) }?;
        match Model::open(&PathBuf::from(path), &crs) {
            Ok(model) => Some(Box::into_raw(Box::new(ModelHandle { model })) as *mut c_void),
            Err(err) => {
                tracing::error!(error = %err, "cannot open model");
                None
            }
        }
    });
    match result {
        Ok(Some(handle)) => handle,
        _ => std::ptr::null_mut(),
    }
}

/// Destroy a model handle.
///
/// # Safety
/// `handle` must come from `geogrid_model_open` and not be used again.
#[no_mangle]
pub unsafe extern "C" fn geogrid_model_destroy(handle: *mut c_void) {
    if !handle.is_null() {
        drop(Box::from_raw(handle as *mut ModelHandle));
    }
}

/// Whether the model contains an input-CRS point (1 yes, 0 no, -1 error).
///
/// # Safety
/// `handle` must be a live model handle.
#[no_mangle]
pub unsafe extern "C" fn geogrid_model_contains(
    handle: *mut c_void,
    x: f64,
    y: f64,
    z: f64,
) -> i32 {
    let result = catch_unwind(AssertUnwindSafe(|| {
        unsafe { model_handle(handle) }.map(|entry| entry.model.contains(x, y, z))
    }));
    match result {
        Ok(Some(true)) => 1,
        Ok(Some(false)) => 0,
        _ => -1,
    }
}

/// Copy the model's metadata as JSON into `buffer`.
///
/// # Safety
/// `buffer` must be writable for `buffer_len` bytes.
#[no_mangle]
pub unsafe extern "C" fn geogrid_model_metadata_json(
    handle: *mut c_void,
    buffer: *mut c_char,
    buffer_len: usize,
) -> i32 {
    guarded(|| {
        let Some(entry) = (unsafe { model_handle(handle) }) else {
            return GEOGRID_ERROR;
        };
        let json = serde_json::Value::Object(entry.model.metadata().to_attrs());
        unsafe { copy_message(&json.to_string(), buffer, buffer_len) };
        GEOGRID_OK
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn cstrings(items: &[&str]) -> (Vec<CString>, Vec<*const c_char>) {
        let owned: Vec<CString> = items.iter().map(|s| CString::new(*s).unwrap()).collect();
        let ptrs = owned.iter().map(|s| s.as_ptr()).collect();
        (owned, ptrs)
    }

    #[test]
    fn test_query_roundtrip_through_c_api() {
        let dir = tempfile::tempdir().unwrap();
        let model = geogrid_testing::build_one_block_flat(dir.path()).unwrap();
        let model_str = model.to_string_lossy().into_owned();

        unsafe {
            let handle = geogrid_query_create();
            assert!(!handle.is_null());

            let (_models_owned, model_ptrs) = cstrings(&[&model_str]);
            let (_values_owned, value_ptrs) = cstrings(&["one", "two"]);
            let crs = CString::new("EPSG:26910").unwrap();
            let status = geogrid_query_initialize(
                handle,
                model_ptrs.as_ptr(),
                1,
                value_ptrs.as_ptr(),
                2,
                crs.as_ptr(),
            );
            assert_eq!(status, GEOGRID_OK);

            let points = [16000.0f64, 20000.0, -2500.0];
            let mut values = [0.0f32; 2];
            let mut errors = [0u8; 1];
            let status = geogrid_query(
                handle,
                values.as_mut_ptr(),
                errors.as_mut_ptr(),
                points.as_ptr(),
                1,
            );
            assert_eq!(status, GEOGRID_OK);
            assert_eq!(errors[0], 0);
            assert!((values[0] - 24800.0).abs() < 0.05);
            assert!((values[1] - 8400.0).abs() < 0.05);

            let mut elevations = [0.0f64; 1];
            let status = geogrid_query_top_elevation(
                handle,
                elevations.as_mut_ptr(),
                errors.as_mut_ptr(),
                points.as_ptr(),
                1,
            );
            assert_eq!(status, GEOGRID_OK);
            assert_eq!(elevations[0], 0.0);

            assert_eq!(geogrid_query_finalize(handle), GEOGRID_OK);
            geogrid_query_destroy(handle);
        }
    }

    #[test]
    fn test_error_handler_reports_bad_model() {
        unsafe {
            let handle = geogrid_query_create();
            let error_handler = geogrid_query_get_error_handler(handle);
            assert!(!error_handler.is_null());
            assert_eq!(geogrid_error_handler_get_status(error_handler), 0);

            let (_models_owned, model_ptrs) = cstrings(&["/no/such/model.geogrid"]);
            let (_values_owned, value_ptrs) = cstrings(&["one"]);
            let crs = CString::new("EPSG:26910").unwrap();
            let status = geogrid_query_initialize(
                handle,
                model_ptrs.as_ptr(),
                1,
                value_ptrs.as_ptr(),
                1,
                crs.as_ptr(),
            );
            assert_eq!(status, GEOGRID_ERROR);
            assert_eq!(geogrid_error_handler_get_status(error_handler), 2);

            let mut buffer = [0 as c_char; 256];
            assert_eq!(
                geogrid_error_handler_get_message(error_handler, buffer.as_mut_ptr(), 256),
                GEOGRID_OK
            );
            let message = CStr::from_ptr(buffer.as_ptr()).to_string_lossy();
            assert!(!message.is_empty());

            assert_eq!(geogrid_error_handler_reset(error_handler), GEOGRID_OK);
            assert_eq!(geogrid_error_handler_get_status(error_handler), 0);
            geogrid_query_destroy(handle);
        }
    }

    #[test]
    fn test_model_handle() {
        let dir = tempfile::tempdir().unwrap();
        let model = geogrid_testing::build_one_block_flat(dir.path()).unwrap();
        let path = CString::new(model.to_string_lossy().into_owned()).unwrap();
        let crs = CString::new("EPSG:26910").unwrap();

        unsafe {
            let handle = geogrid_model_open(path.as_ptr(), crs.as_ptr());
            assert!(!handle.is_null());
            assert_eq!(geogrid_model_contains(handle, 16000.0, 20000.0, -2500.0), 1);
            assert_eq!(geogrid_model_contains(handle, -100.0, 20000.0, -2500.0), 0);

            let mut buffer = [0 as c_char; 4096];
            assert_eq!(
                geogrid_model_metadata_json(handle, buffer.as_mut_ptr(), 4096),
                GEOGRID_OK
            );
            let json = CStr::from_ptr(buffer.as_ptr()).to_string_lossy();
            assert!(json.contains("Fixture model"));
            geogrid_model_destroy(handle);
        }
    }

    #[test]
    fn test_null_handles_are_safe() {
        unsafe {
            assert_eq!(
                geogrid_query_initialize(
                    std::ptr::null_mut(),
                    std::ptr::null(),
                    0,
                    std::ptr::null(),
                    0,
                    std::ptr::null(),
                ),
                GEOGRID_ERROR
            );
            assert!(geogrid_query_get_error_handler(std::ptr::null_mut()).is_null());
            geogrid_query_destroy(std::ptr::null_mut());
            geogrid_model_destroy(std::ptr::null_mut());
            assert_eq!(geogrid_model_contains(std::ptr::null_mut(), 0.0, 0.0, 0.0), -1);
        }
    }
}
