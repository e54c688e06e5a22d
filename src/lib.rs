//! Scriptvisor - a supervisor for sandboxed, event-driven scripts
//!
//! # Overview
//!
//! Scriptvisor hosts small Lua programs inside a sandbox and keeps the host in
//! control of them. A host compiles three kinds of script against one engine
//! instance:
//!
//! - a **prelude** that bootstraps the instance and returns a template factory
//! - **modules**, libraries the prelude loads by name
//! - a **query** that registers event handlers with `on(name, fn)` and sends
//!   commands back with `notify(name, body)`
//!
//! Script failures never unwind into the host. Every operation reports a
//! [`Status`] and the captured error can be pulled with
//! [`ScriptHost::report_errors`].
//!
//! # Quick Start
//!
//! ```
//! use scriptvisor::{PreludeHooks, QueryHooks, ScriptHost, Status};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let host = ScriptHost::default();
//! let prelude = host
//!     .compile_prelude(
//!         "return function(on, notify) return { greeting = 'hi ' } end",
//!         "prelude.lua",
//!         PreludeHooks::default(),
//!     )
//!     .unwrap()
//!     .unwrap();
//!
//! let commands = Rc::new(RefCell::new(Vec::new()));
//! let handlers = Rc::new(RefCell::new(Vec::new()));
//! let hooks = QueryHooks::new()
//!     .with_handler_registration({
//!         let handlers = Rc::clone(&handlers);
//!         move |_, handle| handlers.borrow_mut().push(handle)
//!     })
//!     .with_reverse_command({
//!         let commands = Rc::clone(&commands);
//!         move |name, body| commands.borrow_mut().push(format!("{name} {body}"))
//!     });
//! let query = host
//!     .compile_query(
//!         prelude,
//!         "on('Greet', function(who) notify('Seen', who); return greeting .. who, 'done' end)",
//!         "query.lua",
//!         hooks,
//!     )
//!     .unwrap()
//!     .unwrap();
//!
//! let greet = handlers.borrow()[0];
//! let outcome = host.execute_command_handler(query, greet, "bob", &[]).unwrap();
//! assert_eq!(outcome.status, Status::Ok);
//!
//! let result = host.result(outcome.result.unwrap()).unwrap();
//! assert_eq!(result.result_a.as_deref(), Some("hi bob"));
//! assert_eq!(result.result_b.as_deref(), Some("done"));
//! assert_eq!(*commands.borrow(), vec!["Seen bob".to_string()]);
//! ```
//!
//! # Errors
//!
//! Reports can be rendered for humans with [`render_error_to`], which points
//! at the offending line when the report names the rendered file.

// Error rendering utilities
pub mod error_renderer;
pub use error_renderer::{CharSet, RenderConfig, render_error, render_error_to};

pub use scriptvisor_core::api::{
    CommandResult, EngineOptions, EngineOptionsOverride, Error, ErrorCode, ErrorReport,
    ModuleLoaderHook, PreludeHooks, QueryHooks, ResultHandle, ScriptHandle, ScriptHost, Status,
};
pub use scriptvisor_core::{
    HandlerHandle, HandlerResult, InstanceWatch, ScriptKind, ScriptState, TerminationHandle,
};
