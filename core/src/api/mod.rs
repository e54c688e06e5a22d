//! Public API for hosting sandboxed scripts.
//!
//! Everything a host needs goes through [`ScriptHost`]: it owns compiled
//! scripts behind opaque handles, and every compile, run, or call reports a
//! tri-state [`Status`] instead of unwinding script errors into the host.
//!
//! 1. **Prelude**: bootstraps an engine instance and yields the template
//!    factory (`compile_prelude`)
//! 2. **Modules**: table-valued libraries loaded by name (`compile_module`)
//! 3. **Query**: registers event handlers the host then invokes
//!    (`compile_query`, `execute_command_handler`)
//!
//! # Example
//!
//! ```
//! use scriptvisor_core::api::{PreludeHooks, QueryHooks, ScriptHost};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let host = ScriptHost::default();
//! let prelude = host
//!     .compile_prelude(
//!         "return function(on, notify) return { suffix = '!' } end",
//!         "prelude.lua",
//!         PreludeHooks::default(),
//!     )
//!     .unwrap()
//!     .expect("prelude was not terminated");
//!
//! let handlers = Rc::new(RefCell::new(Vec::new()));
//! let registered = Rc::clone(&handlers);
//! let query = host
//!     .compile_query(
//!         prelude,
//!         "on('Shout', function(s) return s:upper() .. suffix end)",
//!         "query.lua",
//!         QueryHooks::new().with_handler_registration(move |name, handle| {
//!             registered.borrow_mut().push((name.to_string(), handle));
//!         }),
//!     )
//!     .unwrap()
//!     .expect("query was not terminated");
//!
//! let (_, shout) = handlers.borrow()[0].clone();
//! let outcome = host
//!     .execute_command_handler(query, shout, "hello", &[])
//!     .unwrap();
//! let result = host.result(outcome.result.unwrap()).unwrap();
//! assert_eq!(result.result_a.as_deref(), Some("HELLO!"));
//! assert_eq!(result.result_b, None);
//! ```

pub mod error;
pub mod hooks;
pub mod host;
pub mod options;

pub use error::{CapturedError, Error, ErrorCode, ErrorKind, ErrorReport, Failure, Status};
pub use hooks::{ModuleLoaderHook, PreludeHooks, QueryHooks};
pub use host::{CommandResult, ResultHandle, ScriptHandle, ScriptHost};
pub use options::{EngineOptions, EngineOptionsOverride};
