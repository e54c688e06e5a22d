//! Compiled scripts: the shared base and the three script kinds.
//!
//! [`ScriptBase`] owns what every script has: one compiled chunk, one
//! execution context, one captured-error slot, and a reference to the engine
//! instance. [`CompiledScript`] is the polymorphic surface; each kind supplies
//! its own global template and its own result contract for `run`.
//!
//! ```text
//! Uncompiled --compile--> Compiled --run--> Ran
//!      \                     \               \
//!       +------ Faulted <-----+-------<-------+   (recompile, or a successful call, to recover)
//!       +------ Terminated (dispose; the instance is unusable)
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::api::{CapturedError, ErrorKind, ErrorReport, Failure};
use crate::cancel::CancellationCoordinator;
use crate::engine::{
    EngineInstance, ExecutionContext, Function, MultiValue, Template, Value, describe_error,
};

mod module;
mod prelude;
mod query;

pub use module::ModuleScript;
pub use prelude::{ModuleLoader, PreludeCallbacks, PreludeScript};
pub use query::{
    EventHandlerEntry, HandlerHandle, HandlerResult, QueryCallbacks, QueryScript,
};

/// Which variant a compiled script is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    Prelude,
    Module,
    Query,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScriptKind::Prelude => write!(f, "prelude"),
            ScriptKind::Module => write!(f, "module"),
            ScriptKind::Query => write!(f, "query"),
        }
    }
}

/// Lifecycle state of one script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    Uncompiled,
    Compiled,
    Ran,
    /// An error is captured. A later successful call or a recompile
    /// recovers.
    Faulted,
    /// Termination was observed; results are indeterminate.
    Terminated,
}

/// State and behaviour shared by every script kind.
pub struct ScriptBase {
    kind: ScriptKind,
    name: RefCell<String>,
    chunk: RefCell<Option<Function>>,
    context: RefCell<Option<ExecutionContext>>,
    captured: RefCell<Option<CapturedError>>,
    state: Cell<ScriptState>,
    cancellation: CancellationCoordinator,
    // Engine values above are released before this reference.
    instance: Rc<EngineInstance>,
}

impl ScriptBase {
    pub fn new(
        kind: ScriptKind,
        instance: Rc<EngineInstance>,
        cancellation: CancellationCoordinator,
    ) -> Self {
        Self {
            kind,
            name: RefCell::new(String::new()),
            chunk: RefCell::new(None),
            context: RefCell::new(None),
            captured: RefCell::new(None),
            state: Cell::new(ScriptState::Uncompiled),
            cancellation,
            instance,
        }
    }

    pub fn kind(&self) -> ScriptKind {
        self.kind
    }

    /// Source name given to the last `compile`.
    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn state(&self) -> ScriptState {
        self.state.get()
    }

    pub fn instance(&self) -> &Rc<EngineInstance> {
        &self.instance
    }

    pub fn cancellation(&self) -> &CancellationCoordinator {
        &self.cancellation
    }

    /// The currently captured error, if any. Reading does not consume it.
    pub fn captured_error(&self) -> Option<CapturedError> {
        self.captured.borrow().clone()
    }

    /// Look up a global visible to this script's execution context.
    pub fn context_binding(&self, name: &str) -> Option<Value> {
        self.context.borrow().as_ref().and_then(|c| c.binding(name))
    }

    /// Capture `message` and move to `Faulted`.
    pub fn fault(&self, kind: ErrorKind, message: impl Into<String>) -> Failure {
        let error = CapturedError::new(kind, message);
        tracing::debug!(script = %self.name.borrow(), kind = %self.kind, error = %error, "script faulted");
        *self.captured.borrow_mut() = Some(error);
        self.state.set(ScriptState::Faulted);
        Failure::Error
    }

    pub(crate) fn fault_from_engine(&self, kind: ErrorKind, error: &mlua::Error) -> Failure {
        if self.instance.is_terminated() {
            return self.mark_terminated();
        }
        self.fault(kind, describe_error(error))
    }

    pub fn mark_terminated(&self) -> Failure {
        tracing::debug!(script = %self.name.borrow(), kind = %self.kind, "script terminated");
        self.state.set(ScriptState::Terminated);
        Failure::Terminated
    }

    pub(crate) fn set_state(&self, state: ScriptState) {
        self.state.set(state);
    }

    fn clear_error(&self) {
        self.captured.borrow_mut().take();
    }

    /// Parse `source` in a fresh context built from `template`, replacing any
    /// previously compiled chunk.
    pub fn compile_with(&self, template: &Template, source: &str, name: &str) -> Result<(), Failure> {
        let context = match self.instance.new_context(template) {
            Ok(context) => context,
            Err(err) => return Err(self.fault_from_engine(ErrorKind::Compile, &err)),
        };
        let chunk = match self.instance.compile(&context, source, name) {
            Ok(chunk) => chunk,
            Err(err) => return Err(self.fault_from_engine(ErrorKind::Compile, &err)),
        };

        *self.context.borrow_mut() = Some(context);
        *self.chunk.borrow_mut() = Some(chunk);
        self.clear_error();
        self.state.set(ScriptState::Compiled);
        tracing::debug!(script = name, kind = %self.kind, bindings = template.len(), "script compiled");
        Ok(())
    }

    /// Drop the compiled chunk and its context ahead of a recompile.
    pub(crate) fn discard(&self, name: &str) {
        self.chunk.borrow_mut().take();
        self.context.borrow_mut().take();
        *self.name.borrow_mut() = name.to_string();
        self.state.set(ScriptState::Uncompiled);
    }

    /// Execute the compiled chunk once, inside a cancellable region.
    pub fn run_compiled(&self) -> Result<MultiValue, Failure> {
        let chunk = self.chunk.borrow().clone();
        let Some(chunk) = chunk else {
            return Err(self.fault(ErrorKind::Runtime, "script is not compiled"));
        };
        self.call_in_region(&chunk, MultiValue::new())
    }

    /// Call `function` inside a cancellable region, capturing any error into
    /// this script. Success clears the captured error and leaves `Faulted`.
    pub fn call_in_region(&self, function: &Function, args: MultiValue) -> Result<MultiValue, Failure> {
        let region = match self.cancellation.enter(&self.instance) {
            Ok(region) => region,
            Err(_) => return Err(self.mark_terminated()),
        };
        let result = self.instance.call(function, args);
        if region.exit().is_err() {
            return Err(self.mark_terminated());
        }

        match result {
            Ok(values) => {
                self.clear_error();
                if self.state.get() == ScriptState::Faulted {
                    self.state.set(ScriptState::Ran);
                }
                Ok(values)
            }
            Err(err) => Err(self.fault_from_engine(ErrorKind::Runtime, &err)),
        }
    }

    /// Report the engine-dead condition or the captured error.
    ///
    /// Returns `true` if the engine is dead, in which case nothing else about
    /// this instance should be reported.
    pub fn report_errors(&self, sink: &mut dyn FnMut(ErrorReport)) -> bool {
        if self.instance.is_terminated() {
            sink(ErrorReport::terminated());
            return true;
        }
        self.report_captured(sink);
        false
    }

    pub fn report_captured(&self, sink: &mut dyn FnMut(ErrorReport)) {
        if let Some(error) = self.captured.borrow().as_ref() {
            sink(ErrorReport::exception(error));
        }
    }
}

/// The polymorphic script surface.
pub trait CompiledScript {
    fn base(&self) -> &ScriptBase;

    /// Build the global template the next compile will use.
    ///
    /// Implementations capture their own errors before returning `Err`.
    fn build_template(&self) -> Result<Template, Failure>;

    /// Run the compiled chunk and enforce this kind's result contract.
    fn run(&self) -> Result<(), Failure>;

    /// Drop whatever an earlier `run` produced.
    fn discard_results(&self) {}

    /// Compile `source`, fully replacing any earlier compilation.
    fn compile(&self, source: &str, name: &str) -> Result<(), Failure> {
        let base = self.base();
        self.discard_results();
        base.discard(name);
        let template = self.build_template()?;
        base.compile_with(&template, source, name)
    }

    fn compile_and_run(&self, source: &str, name: &str) -> Result<(), Failure> {
        self.compile(source, name)?;
        self.run()
    }

    fn report_errors(&self, sink: &mut dyn FnMut(ErrorReport)) {
        self.base().report_errors(sink);
    }

    /// Ask the engine instance to abort in-flight execution.
    fn request_termination(&self) {
        self.base().instance().terminate();
    }

    fn state(&self) -> ScriptState {
        self.base().state()
    }

    fn captured_error(&self) -> Option<CapturedError> {
        self.base().captured_error()
    }
}

/// First value of a call's results, `nil` when there were none.
pub(crate) fn first_value(values: MultiValue) -> Value {
    values.into_iter().next().unwrap_or(Value::Nil)
}

/// Build a template through `prelude`'s factory on behalf of `base`.
///
/// The prelude keeps its own copy of any factory error; `base` captures a
/// compile error that quotes it.
pub(crate) fn derive_template(
    base: &ScriptBase,
    prelude: &Weak<PreludeScript>,
    args: MultiValue,
) -> Result<Template, Failure> {
    let Some(prelude) = prelude.upgrade() else {
        return Err(base.fault(ErrorKind::Compile, "prelude script has been disposed"));
    };
    match prelude.get_template(args) {
        Ok(template) => Ok(template),
        Err(Failure::Terminated) => Err(base.mark_terminated()),
        Err(Failure::Error) => {
            let reason = prelude
                .base()
                .captured_error()
                .map(|error| error.message)
                .unwrap_or_default();
            Err(base.fault(
                ErrorKind::Compile,
                format!("cannot build global template: {reason}"),
            ))
        }
    }
}

#[cfg(test)]
#[path = "script_test.rs"]
mod script_test;
