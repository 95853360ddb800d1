//! Lifetime of pool-stats callback registrations

use opentelemetry::metrics::CallbackRegistration;
use parking_lot::Mutex;

use crate::error::{ErrorHandler, MetricsError, Result};


enum State {
    Open(Vec<Box<dyn CallbackRegistration>>),
    Closed,
}

/// Registrations created for every node of one instrumented client
///
/// Starts open. [`close_and_drain_all`](Self::close_and_drain_all) moves it
/// to closed, which is terminal: every registration held is unregistered
/// once and nothing is appended afterwards.
pub struct RegistrationSet {
    state: Mutex<State>,
}

impl RegistrationSet {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::Open(Vec::new())),
        }
    }

    /// Run `register` and keep its registration, unless the set is closed
    ///
    /// `register` runs under the set's lock, so a concurrent close either
    /// waits for it to finish and then unregisters the result, or wins and
    /// `register` never runs. Returns `Ok(false)` when skipped.
    pub fn try_append<F>(&self, register: F) -> Result<bool>
    where
        F: FnOnce() -> Result<Box<dyn CallbackRegistration>>,
    {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed => Ok(false),
            State::Open(registrations) => {
                registrations.push(register()?);
                Ok(true)
            }
        }
    }

    /// Close the set and unregister everything it holds
    ///
    /// Unregistration failures do not stop the remaining registrations from
    /// being unregistered; they go to `error_handler` once the lock is
    /// released. Returns the number of registrations drained; calls after
    /// the first return 0.
    pub fn close_and_drain_all(&self, error_handler: &dyn ErrorHandler) -> usize {
        let (drained, failures) = {
            let mut state = self.state.lock();
            let State::Open(registrations) = std::mem::replace(&mut *state, State::Closed) else {
                return 0;
            };

            let drained = registrations.len();
            let failures: Vec<MetricsError> = registrations
                .into_iter()
                .filter_map(|mut registration| registration.unregister().err())
                .map(MetricsError::from)
                .collect();
            (drained, failures)
        };

        for err in failures {
            error_handler.handle(err);
        }
        drained
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.state.lock(), State::Closed)
    }

    /// Number of registrations held; always 0 once closed
    pub fn len(&self) -> usize {
        match &*self.state.lock() {
            State::Open(registrations) => registrations.len(),
            State::Closed => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RegistrationSet {
    fn default() -> Self {
        Self::new()
    }
}
