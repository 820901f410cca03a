//! Injected logging collaborator
//!
//! Interceptors receive a [`CallLogger`] at construction and emit every
//! record through its dispatcher instead of the process-wide default. Tests
//! hand in a recording subscriber; the service hands in the one it built at
//! startup.

use tracing::dispatcher::{self, Dispatch};

#[derive(Clone)]
pub struct CallLogger {
    dispatch: Dispatch,
}

impl CallLogger {
    pub fn new(dispatch: Dispatch) -> Self {
        Self { dispatch }
    }

    /// Capture the dispatcher active on the calling thread right now
    pub fn current() -> Self {
        Self {
            dispatch: dispatcher::get_default(Dispatch::clone),
        }
    }

    /// Logger that drops every record
    pub fn disabled() -> Self {
        Self {
            dispatch: Dispatch::none(),
        }
    }

    /// Run `f` with this logger's dispatcher as the default
    pub fn emit<R>(&self, f: impl FnOnce() -> R) -> R {
        dispatcher::with_default(&self.dispatch, f)
    }
}

impl std::fmt::Debug for CallLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallLogger").finish_non_exhaustive()
    }
}
