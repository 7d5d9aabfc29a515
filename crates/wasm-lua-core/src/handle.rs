//! Owning handles with idempotent release.
//!
//! A [`Handle`] is the sole owner of one engine resource. The resource is
//! released exactly once: either by an explicit [`Handle::release`] or when
//! the handle is dropped (for Lua userdata, when the garbage collector
//! finalizes it). After release the handle holds an empty sentinel and every
//! further release is a no-op.

use tracing::trace;

use wasm_lua_common::RuntimeError;

/// Sole owner of an engine resource.
pub struct Handle<T> {
    kind: &'static str,
    resource: Option<T>,
}

impl<T> Handle<T> {
    /// Wrap a freshly created resource.
    pub fn new(kind: &'static str, resource: T) -> Self {
        Self {
            kind,
            resource: Some(resource),
        }
    }

    /// What this handle owns, e.g. `"module"`.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Borrow the live resource.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Released`] once the handle has been released.
    pub fn get(&self) -> Result<&T, RuntimeError> {
        self.resource
            .as_ref()
            .ok_or(RuntimeError::Released { kind: self.kind })
    }

    /// Release the resource.
    ///
    /// Returns `true` if a live resource was released by this call.
    pub fn release(&mut self) -> bool {
        match self.resource.take() {
            Some(resource) => {
                drop(resource);
                trace!(kind = self.kind, "Handle released");
                true
            }
            None => false,
        }
    }

    /// Returns `true` once the resource has been released.
    pub fn is_released(&self) -> bool {
        self.resource.is_none()
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("kind", &self.kind)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_get_live_resource() {
        let handle = Handle::new("module", 42);

        assert_eq!(*handle.get().unwrap(), 42);
        assert!(!handle.is_released());
        assert_eq!(handle.kind(), "module");
    }

    #[test]
    fn test_double_release_is_noop() {
        let resource = Rc::new(());
        let mut handle = Handle::new("instance", Rc::clone(&resource));

        assert!(handle.release());
        assert_eq!(Rc::strong_count(&resource), 1);
        assert!(!handle.release());
        assert!(handle.is_released());
    }

    #[test]
    fn test_use_after_release() {
        let mut handle = Handle::new("instance", ());
        handle.release();

        let err = handle.get().unwrap_err();
        assert_eq!(err.to_string(), "instance has been released");
    }

    #[test]
    fn test_drop_releases_once() {
        let resource = Rc::new(());
        let handle = Handle::new("module", Rc::clone(&resource));
        assert_eq!(Rc::strong_count(&resource), 2);

        drop(handle);
        assert_eq!(Rc::strong_count(&resource), 1);
    }

    #[test]
    fn test_drop_after_release() {
        let resource = Rc::new(());
        let mut handle = Handle::new("module", Rc::clone(&resource));
        handle.release();

        drop(handle);
        assert_eq!(Rc::strong_count(&resource), 1);
    }
}
