//! The bootstrap script and its template factory.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use super::{CompiledScript, ModuleScript, ScriptBase, ScriptKind, ScriptState, first_value};
use crate::api::{EngineOptions, Error, ErrorKind, Failure};
use crate::cancel::CancellationCoordinator;
use crate::engine::{
    EngineInstance, Function, MultiValue, NativeError, Template, Value, display_scalar,
    host_string,
};

/// Resolves a `loadModule(name)` call to a compiled, run module.
///
/// Runs synchronously inside the calling script. The loader is expected to
/// compile the module against the prelude it is given.
pub type ModuleLoader = Box<dyn Fn(&Rc<PreludeScript>, &str) -> Option<Rc<ModuleScript>>>;

/// Host callbacks used by a prelude's natives.
pub struct PreludeCallbacks {
    pub load_module: ModuleLoader,
    pub log: Box<dyn Fn(&str)>,
}

impl Default for PreludeCallbacks {
    fn default() -> Self {
        Self {
            load_module: Box::new(|_, name| {
                tracing::warn!(module = name, "no module loader installed");
                None
            }),
            log: Box::new(|message| tracing::info!(target: "script", "{message}")),
        }
    }
}

/// The bootstrap script. Its run yields the template factory every module
/// and query derives its globals from.
pub struct PreludeScript {
    callbacks: PreludeCallbacks,
    factory: RefCell<Option<Function>>,
    // Nesting depth of the prelude's own code: its run and factory calls.
    active: Cell<u32>,
    this: Weak<PreludeScript>,
    base: ScriptBase,
}

impl PreludeScript {
    /// Create a prelude together with the engine instance it owns.
    pub fn new(
        options: &EngineOptions,
        cancellation: CancellationCoordinator,
        callbacks: PreludeCallbacks,
    ) -> Result<Rc<Self>, Error> {
        let instance = EngineInstance::new(options)?;
        Ok(Rc::new_cyclic(|this| Self {
            callbacks,
            factory: RefCell::new(None),
            active: Cell::new(0),
            this: this.clone(),
            base: ScriptBase::new(ScriptKind::Prelude, instance, cancellation),
        }))
    }

    /// Whether a run has produced a template factory.
    pub fn is_initialized(&self) -> bool {
        self.factory.borrow().is_some()
    }

    /// Whether the prelude's own code is on the stack, either its initial run
    /// or a template factory call. Modules loaded from there cannot derive a
    /// template yet and get an empty one.
    pub fn is_bootstrapping(&self) -> bool {
        self.active.get() > 0
    }

    fn run_active<T>(&self, f: impl FnOnce() -> T) -> T {
        self.active.set(self.active.get() + 1);
        let result = f();
        self.active.set(self.active.get() - 1);
        result
    }

    /// Call the template factory with `args` and turn every string key of
    /// the object it returns into a binding.
    ///
    /// Failures are captured in the prelude.
    pub fn get_template(&self, args: MultiValue) -> Result<Template, Failure> {
        let factory = self.factory.borrow().clone();
        let Some(factory) = factory else {
            return Err(self
                .base
                .fault(ErrorKind::Compile, "prelude script has no template factory"));
        };

        let produced = self.run_active(|| self.base.call_in_region(&factory, args));
        let produced = first_value(produced?);
        let Value::Table(object) = produced else {
            return Err(self.base.fault(
                ErrorKind::Compile,
                "prelude template factory must return an object",
            ));
        };

        let mut template = Template::new();
        let collected = object.for_each(|key: Value, value: Value| {
            match host_string(&key) {
                Some(name) => {
                    template.bind(name, value);
                }
                None => tracing::trace!(key = key.type_name(), "skipping non-string template key"),
            }
            Ok(())
        });
        if let Err(err) = collected {
            return Err(self.base.fault_from_engine(ErrorKind::Compile, &err));
        }

        tracing::trace!(bindings = ?template, "template derived from prelude");
        Ok(template)
    }

    fn log_native(&self, args: Vec<Value>) -> Result<Value, NativeError> {
        let [message] = args.as_slice() else {
            return Err(format!("expected 1 argument, got {}", args.len()));
        };
        let Some(text) = display_scalar(message) else {
            return Err(format!(
                "expected a string, number or boolean, got {}",
                message.type_name()
            ));
        };
        (self.callbacks.log)(&text);
        Ok(Value::Nil)
    }

    fn load_module_native(&self, args: Vec<Value>) -> Result<Value, NativeError> {
        let [name] = args.as_slice() else {
            return Err(format!("expected 1 argument, got {}", args.len()));
        };
        let name = match host_string(name) {
            Some(name) if !name.is_empty() => name,
            _ => return Err("module name must be a non-empty string".to_string()),
        };
        let Some(this) = self.this.upgrade() else {
            return Err("prelude script has been disposed".to_string());
        };

        tracing::debug!(module = %name, "loading module");
        let Some(module) = (self.callbacks.load_module)(&this, &name) else {
            return Err(format!("cannot load module '{name}'"));
        };
        match module.exports() {
            Some(exports) => Ok(Value::Table(exports)),
            None => {
                let reason = module
                    .base()
                    .captured_error()
                    .map(|error| format!(": {error}"))
                    .unwrap_or_default();
                Err(format!("cannot load module '{name}'{reason}"))
            }
        }
    }
}

impl CompiledScript for PreludeScript {
    fn base(&self) -> &ScriptBase {
        &self.base
    }

    fn build_template(&self) -> Result<Template, Failure> {
        let instance = self.base.instance();
        let log = {
            let this = self.this.clone();
            instance.create_native("log", move |args| match this.upgrade() {
                Some(prelude) => prelude.log_native(args),
                None => Err("prelude script has been disposed".to_string()),
            })
        };
        let load_module = {
            let this = self.this.clone();
            instance.create_native("loadModule", move |args| match this.upgrade() {
                Some(prelude) => prelude.load_module_native(args),
                None => Err("prelude script has been disposed".to_string()),
            })
        };

        match (log, load_module) {
            (Ok(log), Ok(load_module)) => {
                let mut template = Template::new();
                template.bind("log", Value::Function(log));
                template.bind("loadModule", Value::Function(load_module));
                Ok(template)
            }
            (Err(err), _) | (_, Err(err)) => {
                Err(self.base.fault_from_engine(ErrorKind::Compile, &err))
            }
        }
    }

    fn run(&self) -> Result<(), Failure> {
        let result = self.run_active(|| self.base.run_compiled());
        match first_value(result?) {
            Value::Function(factory) => {
                *self.factory.borrow_mut() = Some(factory);
                self.base.set_state(ScriptState::Ran);
                Ok(())
            }
            _ => Err(self
                .base
                .fault(ErrorKind::Compile, "prelude script must return a function")),
        }
    }

    fn discard_results(&self) {
        self.factory.borrow_mut().take();
    }
}
