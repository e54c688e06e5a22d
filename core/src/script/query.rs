//! Top-level scripts that register event handlers.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use super::{CompiledScript, PreludeScript, ScriptBase, ScriptKind, ScriptState, derive_template};
use crate::api::{ErrorKind, ErrorReport, Failure};
use crate::engine::{EngineInstance, Function, MultiValue, NativeError, Template, Value, host_string};

/// Opaque reference to one registered event handler of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerHandle(pub(crate) usize);

impl HandlerHandle {
    /// Rebuild a handle from [`index`](Self::index), e.g. after it crossed a
    /// process boundary.
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for HandlerHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The two results of a handler call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerResult {
    pub result_a: Option<String>,
    pub result_b: Option<String>,
}

/// A handler registered through `on(name, fn)`.
pub struct EventHandlerEntry {
    pub name: String,
    function: Function,
}

/// Host callbacks used by a query's natives.
pub struct QueryCallbacks {
    pub register_handler: Box<dyn Fn(&str, HandlerHandle)>,
    pub reverse_command: Box<dyn Fn(&str, &str)>,
}

impl Default for QueryCallbacks {
    fn default() -> Self {
        Self {
            register_handler: Box::new(|name, handle| {
                tracing::debug!(event = name, %handle, "handler registered");
            }),
            reverse_command: Box::new(|name, body| {
                tracing::info!(target: "script", command = name, body, "reverse command");
            }),
        }
    }
}

/// A query script and its handler registry.
pub struct QueryScript {
    prelude: Weak<PreludeScript>,
    callbacks: QueryCallbacks,
    handlers: RefCell<Vec<EventHandlerEntry>>,
    max_arguments: usize,
    this: Weak<QueryScript>,
    base: ScriptBase,
}

impl QueryScript {
    /// `max_arguments` caps the positional arguments passed to a handler.
    pub fn new(
        prelude: &Rc<PreludeScript>,
        callbacks: QueryCallbacks,
        max_arguments: usize,
    ) -> Rc<Self> {
        let parent = prelude.base();
        let instance = EngineInstance::acquire(parent.instance());
        let cancellation = parent.cancellation().clone();
        Rc::new_cyclic(|this| Self {
            prelude: Rc::downgrade(prelude),
            callbacks,
            handlers: RefCell::new(Vec::new()),
            max_arguments,
            this: this.clone(),
            base: ScriptBase::new(ScriptKind::Query, instance, cancellation),
        })
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Event name a handler was registered under.
    pub fn handler_name(&self, handle: HandlerHandle) -> Option<String> {
        self.handlers
            .borrow()
            .get(handle.0)
            .map(|entry| entry.name.clone())
    }

    /// Registered event names in registration order.
    pub fn handler_names(&self) -> Vec<String> {
        self.handlers
            .borrow()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Call a registered handler with `primary` followed by `auxiliary` as
    /// positional arguments.
    ///
    /// The handler may return nothing, a single value, two values, or a
    /// two-element table; each element must be a string or `nil`.
    pub fn execute_handler(
        &self,
        handle: HandlerHandle,
        primary: &str,
        auxiliary: &[&str],
    ) -> Result<HandlerResult, Failure> {
        if self.base.instance().is_terminated() {
            return Err(self.base.mark_terminated());
        }

        let function = self
            .handlers
            .borrow()
            .get(handle.0)
            .map(|entry| entry.function.clone());
        let Some(function) = function else {
            return Err(self
                .base
                .fault(ErrorKind::Runtime, format!("unknown event handler {handle}")));
        };

        let count = 1 + auxiliary.len();
        if count > self.max_arguments {
            return Err(self.base.fault(
                ErrorKind::Runtime,
                format!(
                    "handlers accept at most {} arguments, got {count}",
                    self.max_arguments
                ),
            ));
        }

        let instance = self.base.instance();
        let args = std::iter::once(primary)
            .chain(auxiliary.iter().copied())
            .map(|payload| instance.create_string(payload))
            .collect::<mlua::Result<Vec<_>>>();
        let args = match args {
            Ok(args) => MultiValue::from_vec(args),
            Err(err) => return Err(self.base.fault_from_engine(ErrorKind::Runtime, &err)),
        };

        let values = self.base.call_in_region(&function, args)?;
        interpret_result(values).map_err(|message| self.base.fault(ErrorKind::Runtime, message))
    }

    fn on_native(&self, args: Vec<Value>) -> Result<Value, NativeError> {
        let [name, handler] = args.as_slice() else {
            return Err(format!("expected 2 arguments, got {}", args.len()));
        };
        let name = match text_argument(name, "event name")? {
            Some(name) if !name.is_empty() => name,
            _ => return Err("event name must be a non-empty string".to_string()),
        };
        let Value::Function(function) = handler else {
            return Err(format!(
                "handler for '{name}' must be a function, got {}",
                handler.type_name()
            ));
        };

        let handle = {
            let mut handlers = self.handlers.borrow_mut();
            handlers.push(EventHandlerEntry {
                name: name.clone(),
                function: function.clone(),
            });
            HandlerHandle(handlers.len() - 1)
        };
        tracing::debug!(script = %self.base.name(), event = %name, %handle, "event handler registered");
        (self.callbacks.register_handler)(&name, handle);
        Ok(Value::Nil)
    }

    fn notify_native(&self, args: Vec<Value>) -> Result<Value, NativeError> {
        let [name, body] = args.as_slice() else {
            return Err(format!("expected 2 arguments, got {}", args.len()));
        };
        let name = match text_argument(name, "command name")? {
            Some(name) if !name.is_empty() => name,
            _ => return Err("command name must be a non-empty string".to_string()),
        };
        let Some(body) = text_argument(body, "command body")? else {
            return Err(format!(
                "command body must be a string, got {}",
                body.type_name()
            ));
        };
        (self.callbacks.reverse_command)(&name, &body);
        Ok(Value::Nil)
    }

    fn natives(&self) -> mlua::Result<(Function, Function)> {
        let instance = self.base.instance();
        let this = self.this.clone();
        let on = instance.create_native("on", move |args| match this.upgrade() {
            Some(query) => query.on_native(args),
            None => Err("query script has been disposed".to_string()),
        })?;
        let this = self.this.clone();
        let notify = instance.create_native("notify", move |args| match this.upgrade() {
            Some(query) => query.notify_native(args),
            None => Err("query script has been disposed".to_string()),
        })?;
        Ok((on, notify))
    }
}

impl CompiledScript for QueryScript {
    fn base(&self) -> &ScriptBase {
        &self.base
    }

    fn build_template(&self) -> Result<Template, Failure> {
        let (on, notify) = self
            .natives()
            .map_err(|err| self.base.fault_from_engine(ErrorKind::Compile, &err))?;

        let args = MultiValue::from_vec(vec![
            Value::Function(on.clone()),
            Value::Function(notify.clone()),
        ]);
        let mut template = derive_template(&self.base, &self.prelude, args)?;
        for (name, native) in [("on", on), ("notify", notify)] {
            if template.bind(name, Value::Function(native)) {
                tracing::warn!(binding = name, "prelude binding shadowed by query native");
            }
        }
        Ok(template)
    }

    fn run(&self) -> Result<(), Failure> {
        self.base.run_compiled()?;
        self.base.set_state(ScriptState::Ran);
        Ok(())
    }

    fn discard_results(&self) {
        self.handlers.borrow_mut().clear();
    }

    /// The query's own error first, then the prelude's. A dead engine is
    /// reported once for both.
    fn report_errors(&self, sink: &mut dyn FnMut(ErrorReport)) {
        if self.base.report_errors(sink) {
            return;
        }
        if let Some(prelude) = self.prelude.upgrade() {
            prelude.base().report_captured(sink);
        }
    }
}

/// Map a handler's return values onto the two host results.
fn interpret_result(values: MultiValue) -> Result<HandlerResult, String> {
    let mut values = values.into_iter();
    let (a, b) = match (values.next(), values.next(), values.next()) {
        (None, _, _) => (Value::Nil, Value::Nil),
        (Some(_), Some(_), Some(_)) => {
            return Err("handler must return at most two values".to_string());
        }
        (Some(a), Some(b), None) => (a, b),
        (Some(Value::Table(pair)), None, _) if pair.raw_len() == 2 => {
            let a = pair.raw_get::<Value>(1).map_err(|err| err.to_string())?;
            let b = pair.raw_get::<Value>(2).map_err(|err| err.to_string())?;
            (a, b)
        }
        (Some(single), _, _) => (single, Value::Nil),
    };
    Ok(HandlerResult {
        result_a: result_string(&a)?,
        result_b: result_string(&b)?,
    })
}

fn result_string(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Nil => Ok(None),
        Value::String(_) => match host_string(value) {
            Some(text) => Ok(Some(text)),
            None => Err("handler must return string data or null".to_string()),
        },
        _ => Err("handler must return string data or null".to_string()),
    }
}

/// A string argument of a native, or `None` when `value` is not a string.
fn text_argument(value: &Value, what: &str) -> Result<Option<String>, NativeError> {
    match value {
        Value::String(_) => host_string(value)
            .map(Some)
            .ok_or_else(|| format!("{what} must be valid UTF-8")),
        _ => Ok(None),
    }
}
