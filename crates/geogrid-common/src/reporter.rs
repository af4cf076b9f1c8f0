//! Error reporter shared by the query driver and its models.

use std::sync::{Arc, Mutex};

/// Severity of the most recent reported condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Warning,
    Error,
}

impl Status {
    /// Numeric code used across the C boundary (0, 1, 2).
    pub fn code(self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Error => 2,
        }
    }
}

/// Holds the status and message of the most recent non-trivial operation.
///
/// The reporter itself is not thread-safe; share it through
/// [`SharedReporter`], which guards it with a mutex.
#[derive(Debug)]
pub struct ErrorReporter {
    status: Status,
    message: String,
}

impl ErrorReporter {
    /// Create a reporter with OK status.
    pub fn new() -> Self {
        Self {
            status: Status::Ok,
            message: String::new(),
        }
    }

    /// Record a condition, overwriting any previous one.
    pub fn set_status(&mut self, status: Status, message: impl Into<String>) {
        self.status = status;
        self.message = message.into();
        match self.status {
            Status::Ok => {}
            Status::Warning => tracing::warn!(message = %self.message, "reported warning"),
            Status::Error => tracing::error!(message = %self.message, "reported error"),
        }
    }

    /// Clear the status back to OK.
    pub fn reset_status(&mut self) {
        self.status = Status::Ok;
        self.message.clear();
    }

    /// Current status.
    pub fn status(&self) -> Status {
        self.status
    }

    /// Message associated with the current status.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Externally guarded handle to a reporter shared across owners.
pub type SharedReporter = Arc<Mutex<ErrorReporter>>;

/// Create a fresh shared reporter.
pub fn shared_reporter() -> SharedReporter {
    Arc::new(Mutex::new(ErrorReporter::new()))
}

/// Record an error on a shared reporter.
pub fn report_error(reporter: &SharedReporter, message: impl Into<String>) {
    if let Ok(mut guard) = reporter.lock() {
        guard.set_status(Status::Error, message);
    }
}

/// Record a warning on a shared reporter.
pub fn report_warning(reporter: &SharedReporter, message: impl Into<String>) {
    if let Ok(mut guard) = reporter.lock() {
        guard.set_status(Status::Warning, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        let mut reporter = ErrorReporter::new();
        assert_eq!(reporter.status(), Status::Ok);
        assert!(reporter.message().is_empty());

        reporter.set_status(Status::Error, "model file missing");
        assert_eq!(reporter.status(), Status::Error);
        assert_eq!(reporter.message(), "model file missing");

        reporter.reset_status();
        assert_eq!(reporter.status(), Status::Ok);
        assert!(reporter.message().is_empty());
    }

    #[test]
    fn test_shared_reporter() {
        let reporter = shared_reporter();
        report_warning(&reporter, "value not found in model");
        assert_eq!(reporter.lock().unwrap().status(), Status::Warning);
        report_error(&reporter, "worse");
        assert_eq!(reporter.lock().unwrap().status(), Status::Error);
        assert_eq!(reporter.lock().unwrap().message(), "worse");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Status::Ok.code(), 0);
        assert_eq!(Status::Warning.code(), 1);
        assert_eq!(Status::Error.code(), 2);
    }
}
