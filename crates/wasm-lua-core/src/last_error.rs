//! Process-wide last-error register.
//!
//! The register holds the message of the most recent failing engine call.
//! It has a single slot that every failure overwrites, and reading it with
//! [`take_last_error`] clears it. Engine entry points write it while holding
//! the engine lock; a reader that must attribute the message to its own call
//! holds [`lock_engine`](crate::lock_engine) across the call and the read.

use parking_lot::{Mutex, const_mutex};

use wasm_lua_common::RuntimeError;

static LAST_ERROR: Mutex<Option<String>> = const_mutex(None);

/// Overwrite the register with `error`'s message.
pub fn record(error: &RuntimeError) {
    *LAST_ERROR.lock() = Some(error.to_string());
}

/// Length in bytes of the pending message, 0 if there is none.
pub fn last_error_length() -> usize {
    LAST_ERROR.lock().as_ref().map_or(0, String::len)
}

/// Copy of the pending message without clearing it.
pub fn last_error_message() -> Option<String> {
    LAST_ERROR.lock().clone()
}

/// Take the pending message, leaving the register empty.
pub fn take_last_error() -> Option<String> {
    LAST_ERROR.lock().take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock_engine;

    #[test]
    fn test_most_recent_failure_wins() {
        let _guard = lock_engine();

        record(&RuntimeError::compilation_failed("first"));
        record(&RuntimeError::trap("second"));

        assert_eq!(last_error_message().as_deref(), Some("Wasm trap: second"));
        assert_eq!(last_error_length(), "Wasm trap: second".len());
        assert_eq!(take_last_error().as_deref(), Some("Wasm trap: second"));
    }

    #[test]
    fn test_read_once() {
        let _guard = lock_engine();

        record(&RuntimeError::InstanceBusy);

        assert!(take_last_error().is_some());
        assert!(take_last_error().is_none());
        assert_eq!(last_error_length(), 0);
    }
}
