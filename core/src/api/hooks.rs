//! Host callbacks, bundled per script kind.

use super::{ScriptHandle, ScriptHost};
use crate::cancel::CancellationCoordinator;
use crate::engine::TerminationHandle;
use crate::script::{HandlerHandle, QueryCallbacks};

/// Resolves `loadModule(name)` for a prelude.
///
/// Called synchronously from inside the running script with the host, the
/// requesting prelude, and the module name. A typical loader reads the
/// module source and calls [`ScriptHost::compile_module`] re-entrantly.
/// Returning `None` raises "cannot load module" into the script.
pub type ModuleLoaderHook = Box<dyn Fn(&ScriptHost, ScriptHandle, &str) -> Option<ScriptHandle>>;

/// Callbacks for a prelude and every script derived from it.
///
/// Hooks must not capture the [`ScriptHost`] itself; the loader receives it
/// as an argument instead. Unset hooks fall back to the script layer's
/// defaults.
#[derive(Default)]
pub struct PreludeHooks {
    pub(crate) load_module: Option<ModuleLoaderHook>,
    pub(crate) cancellation: CancellationCoordinator,
    pub(crate) log: Option<Box<dyn Fn(&str)>>,
    pub(crate) instance_created: Option<Box<dyn FnOnce(TerminationHandle)>>,
}

impl PreludeHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_module_loader(
        mut self,
        loader: impl Fn(&ScriptHost, ScriptHandle, &str) -> Option<ScriptHandle> + 'static,
    ) -> Self {
        self.load_module = Some(Box::new(loader));
        self
    }

    /// Install the enter/exit callbacks bracketing every call into script
    /// code. Returning `false` from either reports the call as terminated.
    pub fn with_cancellation(
        mut self,
        enter: impl Fn() -> bool + 'static,
        exit: impl Fn() -> bool + 'static,
    ) -> Self {
        self.cancellation = CancellationCoordinator::new(enter, exit);
        self
    }

    /// Sink for the `log` native.
    pub fn with_log(mut self, log: impl Fn(&str) + 'static) -> Self {
        self.log = Some(Box::new(log));
        self
    }

    /// Called once with the new engine instance's termination token, before
    /// any prelude code runs. Lets a watchdog cover the bootstrap itself.
    pub fn with_termination_handle(
        mut self,
        receive: impl FnOnce(TerminationHandle) + 'static,
    ) -> Self {
        self.instance_created = Some(Box::new(receive));
        self
    }
}

/// Callbacks for a query.
#[derive(Default)]
pub struct QueryHooks {
    register_handler: Option<Box<dyn Fn(&str, HandlerHandle)>>,
    reverse_command: Option<Box<dyn Fn(&str, &str)>>,
}

impl QueryHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called once per `on(name, fn)` with the handle to pass back to
    /// [`ScriptHost::execute_command_handler`].
    pub fn with_handler_registration(
        mut self,
        register: impl Fn(&str, HandlerHandle) + 'static,
    ) -> Self {
        self.register_handler = Some(Box::new(register));
        self
    }

    /// Called once per `notify(name, body)`.
    pub fn with_reverse_command(mut self, reverse: impl Fn(&str, &str) + 'static) -> Self {
        self.reverse_command = Some(Box::new(reverse));
        self
    }
}

impl From<QueryHooks> for QueryCallbacks {
    fn from(hooks: QueryHooks) -> Self {
        let defaults = QueryCallbacks::default();
        QueryCallbacks {
            register_handler: hooks.register_handler.unwrap_or(defaults.register_handler),
            reverse_command: hooks.reverse_command.unwrap_or(defaults.reverse_command),
        }
    }
}
