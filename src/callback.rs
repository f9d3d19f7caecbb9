//! Application callbacks and their outcomes.
//!
//! The entry point, the stop callback and the completion callback are all
//! plain closures. They may return `()` or any `Result<(), E>` whose error
//! converts into [`BoxError`]; both shapes go through [`IntoOutcome`].
//! Arguments are curried by the closures themselves.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::error;

/// Boxed error produced by a failing callback.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result of running a callback.
pub type Outcome = std::result::Result<(), BoxError>;

/// Conversion of a callback's return value into an [`Outcome`].
pub trait IntoOutcome {
    /// Convert into an outcome.
    ///
    /// # Errors
    ///
    /// Returns the callback's error, boxed.
    fn into_outcome(self) -> Outcome;
}

impl IntoOutcome for () {
    fn into_outcome(self) -> Outcome {
        Ok(())
    }
}

impl<E: Into<BoxError>> IntoOutcome for std::result::Result<(), E> {
    fn into_outcome(self) -> Outcome {
        self.map_err(Into::into)
    }
}

/// A callback that may be sent to the termination hook thread.
pub(crate) type Callback = Box<dyn FnOnce() -> Outcome + Send + 'static>;

/// Box a user closure into a [`Callback`].
pub(crate) fn boxed<F, R>(f: F) -> Callback
where
    F: FnOnce() -> R + Send + 'static,
    R: IntoOutcome,
{
    Box::new(move || f().into_outcome())
}

/// Run a callback, catching both returned errors and panics.
///
/// Failures are reported through `tracing` and swallowed. Returns `true`
/// when the callback succeeded.
pub(crate) fn invoke<F, R>(daemon: &str, callback: &'static str, f: F) -> bool
where
    F: FnOnce() -> R,
    R: IntoOutcome,
{
    match panic::catch_unwind(AssertUnwindSafe(|| f().into_outcome())) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!(daemon = %daemon, callback, error = %err, "Callback failed");
            false
        }
        Err(payload) => {
            error!(
                daemon = %daemon,
                callback,
                panic = panic_message(payload.as_ref()),
                "Callback panicked"
            );
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
