//! Cancellable regions around calls into script code.
//!
//! Every call that may run script-authored code is bracketed by an enter and
//! an exit callback supplied by the host. Together with the engine's own
//! termination flag they decide whether a call may start and whether its
//! result may be trusted:
//!
//! - entering fails if termination was already requested or the host
//!   refuses; the call must not start and the operation is `Terminated`;
//! - exiting fails if termination happened while the call was running; the
//!   produced value is discarded and the operation is `Terminated`.
//!
//! [`CancellableRegion`] is a scope guard, so the exit callback runs on every
//! path out of the region, including early returns.

use std::rc::Rc;

use crate::api::Failure;
use crate::engine::EngineInstance;

type RegionCallback = Rc<dyn Fn() -> bool>;

/// The pair of host callbacks bracketing calls into script code.
///
/// Shared by a prelude and every module and query derived from it.
#[derive(Clone)]
pub struct CancellationCoordinator {
    enter: RegionCallback,
    exit: RegionCallback,
}

impl Default for CancellationCoordinator {
    fn default() -> Self {
        Self::new(|| true, || true)
    }
}

impl CancellationCoordinator {
    pub fn new(enter: impl Fn() -> bool + 'static, exit: impl Fn() -> bool + 'static) -> Self {
        Self {
            enter: Rc::new(enter),
            exit: Rc::new(exit),
        }
    }

    /// Enter a region around a call into `instance`.
    pub fn enter<'a>(
        &'a self,
        instance: &'a EngineInstance,
    ) -> Result<CancellableRegion<'a>, Failure> {
        if instance.is_terminated() {
            tracing::trace!("region refused: instance already terminated");
            return Err(Failure::Terminated);
        }
        if !(self.enter)() {
            tracing::trace!("region refused by host");
            return Err(Failure::Terminated);
        }
        Ok(CancellableRegion {
            coordinator: self,
            instance,
            open: true,
        })
    }
}

/// An entered region. Dropping it without [`exit`](Self::exit) still runs
/// the host's exit callback.
#[must_use = "a region must be exited to learn whether termination occurred"]
pub struct CancellableRegion<'a> {
    coordinator: &'a CancellationCoordinator,
    instance: &'a EngineInstance,
    open: bool,
}

impl CancellableRegion<'_> {
    /// Leave the region. `Err(Terminated)` means the call was interrupted and
    /// whatever it produced must be discarded.
    pub fn exit(mut self) -> Result<(), Failure> {
        self.open = false;
        self.close()
    }

    fn close(&self) -> Result<(), Failure> {
        // Both checks run: the host must always see its exit callback.
        let host_allows = (self.coordinator.exit)();
        if host_allows && !self.instance.is_terminated() {
            Ok(())
        } else {
            Err(Failure::Terminated)
        }
    }
}

impl Drop for CancellableRegion<'_> {
    fn drop(&mut self) {
        if self.open {
            self.open = false;
            let _ = self.close();
        }
    }
}

#[cfg(test)]
#[path = "cancel_test.rs"]
mod cancel_test;
