//! The handle-based host API.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{EngineOptions, Error, ErrorReport, Failure, PreludeHooks, QueryHooks, Status};
use crate::engine::{EngineInstance, InstanceWatch, TerminationHandle};
use crate::script::{
    CompiledScript, HandlerHandle, HandlerResult, ModuleLoader, ModuleScript, PreludeCallbacks,
    PreludeScript, QueryScript, ScriptKind, ScriptState,
};

/// Opaque reference to a script owned by a [`ScriptHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScriptHandle(u64);

impl fmt::Display for ScriptHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "script#{}", self.0)
    }
}

/// Opaque reference to a handler result held by a [`ScriptHost`] until
/// [`ScriptHost::free_result`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultHandle(u64);

impl fmt::Display for ResultHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "result#{}", self.0)
    }
}

/// Outcome of [`ScriptHost::execute_command_handler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResult {
    pub status: Status,
    /// Set exactly when `status` is [`Status::Ok`].
    pub result: Option<ResultHandle>,
}

impl CommandResult {
    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

#[derive(Clone)]
enum HostedScript {
    Prelude(Rc<PreludeScript>),
    Module(Rc<ModuleScript>),
    Query(Rc<QueryScript>),
}

impl HostedScript {
    fn as_script(&self) -> &dyn CompiledScript {
        match self {
            HostedScript::Prelude(script) => &**script,
            HostedScript::Module(script) => &**script,
            HostedScript::Query(script) => &**script,
        }
    }

    fn kind(&self) -> ScriptKind {
        self.as_script().base().kind()
    }
}

struct HostInner {
    options: EngineOptions,
    scripts: RefCell<HashMap<ScriptHandle, HostedScript>>,
    results: RefCell<HashMap<ResultHandle, HandlerResult>>,
    next_id: Cell<u64>,
}

/// Owns compiled scripts and handler results, and hands out handles to them.
///
/// Cloning a host is cheap and yields another reference to the same
/// registry. A host is confined to the thread that created it; use
/// [`termination_handle`](Self::termination_handle) to stop execution from
/// another thread.
///
/// Registries are only borrowed for the duration of a lookup, never across a
/// call into script code, so hooks may call back into the host.
#[derive(Clone)]
pub struct ScriptHost {
    inner: Rc<HostInner>,
}

impl Default for ScriptHost {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl ScriptHost {
    /// Create a host whose engine instances use `options`.
    pub fn new(options: EngineOptions) -> Self {
        Self {
            inner: Rc::new(HostInner {
                options,
                scripts: RefCell::new(HashMap::new()),
                results: RefCell::new(HashMap::new()),
                next_id: Cell::new(1),
            }),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    /// Create a prelude with a fresh engine instance, then compile and run it.
    ///
    /// Returns `None` iff the initial run was terminated; the prelude is then
    /// already disposed. A compile or runtime error still yields a handle,
    /// with details available from [`report_errors`](Self::report_errors).
    pub fn compile_prelude(
        &self,
        source: &str,
        file_name: &str,
        hooks: PreludeHooks,
    ) -> Result<Option<ScriptHandle>, Error> {
        let handle = ScriptHandle(self.next_id());
        let PreludeHooks {
            load_module,
            cancellation,
            log,
            instance_created,
        } = hooks;

        let defaults = PreludeCallbacks::default();
        let loader: ModuleLoader = match load_module {
            Some(load_module) => {
                let host = Rc::downgrade(&self.inner);
                Box::new(move |_: &Rc<PreludeScript>, name: &str| {
                    let host = ScriptHost::upgrade(&host)?;
                    let module = load_module(&host, handle, name)?;
                    match host.lookup(module) {
                        Ok(HostedScript::Module(module)) => Some(module),
                        _ => {
                            tracing::warn!(prelude = %handle, %module, "module loader returned a non-module handle");
                            None
                        }
                    }
                })
            }
            None => defaults.load_module,
        };
        let prelude = PreludeScript::new(
            &self.inner.options,
            cancellation,
            PreludeCallbacks {
                load_module: loader,
                log: log.unwrap_or(defaults.log),
            },
        )?;
        if let Some(instance_created) = instance_created {
            instance_created(prelude.base().instance().termination_handle());
        }

        // Registered before running so modules loaded during bootstrap can
        // resolve their prelude.
        self.insert(handle, HostedScript::Prelude(Rc::clone(&prelude)));
        let status = Status::from(&prelude.compile_and_run(source, file_name));
        tracing::debug!(script = %handle, file = file_name, %status, "prelude compiled");

        if status == Status::Terminated {
            self.remove(handle);
            return Ok(None);
        }
        Ok(Some(handle))
    }

    /// Compile and run a module against `prelude`'s template.
    ///
    /// Returns `None` iff execution was terminated.
    pub fn compile_module(
        &self,
        prelude: ScriptHandle,
        source: &str,
        file_name: &str,
    ) -> Result<Option<ScriptHandle>, Error> {
        let parent = self.prelude(prelude)?;
        let module = ModuleScript::new(&parent);
        let status = Status::from(&module.compile_and_run(source, file_name));
        if status == Status::Terminated {
            tracing::debug!(%prelude, file = file_name, "module terminated");
            return Ok(None);
        }

        let handle = ScriptHandle(self.next_id());
        tracing::debug!(script = %handle, %prelude, file = file_name, %status, "module compiled");
        self.insert(handle, HostedScript::Module(module));
        Ok(Some(handle))
    }

    /// Compile and run a query against `prelude`'s template, registering its
    /// event handlers through `hooks`.
    ///
    /// Returns `None` iff execution was terminated.
    pub fn compile_query(
        &self,
        prelude: ScriptHandle,
        source: &str,
        file_name: &str,
        hooks: QueryHooks,
    ) -> Result<Option<ScriptHandle>, Error> {
        let parent = self.prelude(prelude)?;
        let query = QueryScript::new(
            &parent,
            hooks.into(),
            self.inner.options.max_handler_arguments,
        );
        let status = Status::from(&query.compile_and_run(source, file_name));
        if status == Status::Terminated {
            tracing::debug!(%prelude, file = file_name, "query terminated");
            return Ok(None);
        }

        let handle = ScriptHandle(self.next_id());
        tracing::debug!(
            script = %handle,
            %prelude,
            file = file_name,
            %status,
            handlers = query.handler_count(),
            "query compiled"
        );
        self.insert(handle, HostedScript::Query(query));
        Ok(Some(handle))
    }

    /// Dispose a script, releasing its reference to the engine instance.
    ///
    /// The instance is destroyed with the last script referencing it.
    pub fn dispose_script(&self, handle: ScriptHandle) -> Result<(), Error> {
        let Some(script) = self.remove(handle) else {
            return Err(unknown_script(handle));
        };
        let instance = script.as_script().base().instance();
        tracing::debug!(
            script = %handle,
            kind = %script.kind(),
            remaining = EngineInstance::reference_count(instance) - 1,
            "script disposed"
        );
        drop(script);
        Ok(())
    }

    /// Call a query's event handler with `primary` followed by `auxiliary`.
    ///
    /// On success the results are held until [`free_result`](Self::free_result).
    pub fn execute_command_handler(
        &self,
        script: ScriptHandle,
        handler: HandlerHandle,
        primary: &str,
        auxiliary: &[&str],
    ) -> Result<CommandResult, Error> {
        let query = self.query(script)?;
        match query.execute_handler(handler, primary, auxiliary) {
            Ok(result) => {
                let handle = ResultHandle(self.next_id());
                self.inner.results.borrow_mut().insert(handle, result);
                Ok(CommandResult {
                    status: Status::Ok,
                    result: Some(handle),
                })
            }
            Err(failure) => {
                tracing::debug!(%script, %handler, status = %Status::from(failure), "handler failed");
                Ok(failure.into())
            }
        }
    }

    /// The results behind `handle`, if it has not been freed.
    pub fn result(&self, handle: ResultHandle) -> Option<HandlerResult> {
        self.inner.results.borrow().get(&handle).cloned()
    }

    /// Release a handler result.
    pub fn free_result(&self, handle: ResultHandle) -> Result<(), Error> {
        match self.inner.results.borrow_mut().remove(&handle) {
            Some(_) => Ok(()),
            None => Err(Error::Api(format!("unknown result handle {handle}"))),
        }
    }

    /// Number of handler results not yet freed.
    pub fn pending_results(&self) -> usize {
        self.inner.results.borrow().len()
    }

    /// Abort in-flight execution in the script's engine instance.
    ///
    /// One-shot: every script sharing the instance becomes unusable.
    pub fn terminate_execution(&self, handle: ScriptHandle) -> Result<(), Error> {
        self.lookup(handle)?.as_script().request_termination();
        Ok(())
    }

    /// A `Send + Sync` token that terminates the script's engine instance
    /// from any thread.
    pub fn termination_handle(&self, handle: ScriptHandle) -> Result<TerminationHandle, Error> {
        Ok(self
            .lookup(handle)?
            .as_script()
            .base()
            .instance()
            .termination_handle())
    }

    /// Report the script's errors to `sink`.
    ///
    /// A terminated engine is reported once as [`ErrorCode::EngineTerminated`](super::ErrorCode::EngineTerminated)
    /// with no message. Otherwise each captured error is reported as
    /// [`ErrorCode::ScriptException`](super::ErrorCode::ScriptException); for
    /// a query that is its own error followed by its prelude's. Reporting
    /// does not clear anything.
    pub fn report_errors(
        &self,
        handle: ScriptHandle,
        mut sink: impl FnMut(ErrorReport),
    ) -> Result<(), Error> {
        let script = self.lookup(handle)?;
        script.as_script().report_errors(&mut sink);
        Ok(())
    }

    /// [`report_errors`](Self::report_errors) collected into a vector.
    pub fn errors(&self, handle: ScriptHandle) -> Result<Vec<ErrorReport>, Error> {
        let mut reports = Vec::new();
        self.report_errors(handle, |report| reports.push(report))?;
        Ok(reports)
    }

    pub fn script_kind(&self, handle: ScriptHandle) -> Option<ScriptKind> {
        self.lookup(handle).ok().map(|script| script.kind())
    }

    pub fn script_state(&self, handle: ScriptHandle) -> Result<ScriptState, Error> {
        Ok(self.lookup(handle)?.as_script().state())
    }

    /// Number of scripts currently owned by this host.
    pub fn script_count(&self) -> usize {
        self.inner.scripts.borrow().len()
    }

    /// Number of event handlers a query registered.
    pub fn handler_count(&self, query: ScriptHandle) -> Result<usize, Error> {
        Ok(self.query(query)?.handler_count())
    }

    /// Event names a query registered, in registration order.
    pub fn handler_names(&self, query: ScriptHandle) -> Result<Vec<String>, Error> {
        Ok(self.query(query)?.handler_names())
    }

    /// Observe the script's engine instance without keeping it alive.
    pub fn instance_watch(&self, handle: ScriptHandle) -> Result<InstanceWatch, Error> {
        Ok(EngineInstance::watch(
            self.lookup(handle)?.as_script().base().instance(),
        ))
    }

    fn upgrade(inner: &Weak<HostInner>) -> Option<ScriptHost> {
        inner.upgrade().map(|inner| ScriptHost { inner })
    }

    fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    fn insert(&self, handle: ScriptHandle, script: HostedScript) {
        self.inner.scripts.borrow_mut().insert(handle, script);
    }

    fn remove(&self, handle: ScriptHandle) -> Option<HostedScript> {
        self.inner.scripts.borrow_mut().remove(&handle)
    }

    fn lookup(&self, handle: ScriptHandle) -> Result<HostedScript, Error> {
        self.inner
            .scripts
            .borrow()
            .get(&handle)
            .cloned()
            .ok_or_else(|| unknown_script(handle))
    }

    fn prelude(&self, handle: ScriptHandle) -> Result<Rc<PreludeScript>, Error> {
        match self.lookup(handle)? {
            HostedScript::Prelude(prelude) => Ok(prelude),
            other => Err(wrong_kind(handle, ScriptKind::Prelude, other.kind())),
        }
    }

    fn query(&self, handle: ScriptHandle) -> Result<Rc<QueryScript>, Error> {
        match self.lookup(handle)? {
            HostedScript::Query(query) => Ok(query),
            other => Err(wrong_kind(handle, ScriptKind::Query, other.kind())),
        }
    }
}

fn unknown_script(handle: ScriptHandle) -> Error {
    Error::Api(format!("unknown script handle {handle}"))
}

fn wrong_kind(handle: ScriptHandle, expected: ScriptKind, actual: ScriptKind) -> Error {
    Error::Api(format!("{handle} is a {actual} script, expected a {expected} script"))
}

impl From<Failure> for CommandResult {
    fn from(failure: Failure) -> Self {
        CommandResult {
            status: failure.into(),
            result: None,
        }
    }
}

#[cfg(test)]
#[path = "host_test.rs"]
mod host_test;
