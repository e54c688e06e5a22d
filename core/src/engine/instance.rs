//! Engine instances, their ownership, and termination.

use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mlua::{ChunkMode, HookTriggers, Lua, LuaOptions, StdLib, VmState};

use super::exception::TERMINATION_MESSAGE;
use super::{ExecutionContext, Function, MultiValue, NativeError, Template, Value};
use crate::api::{EngineOptions, Error};

/// Globals removed from the base library: they reach the file system.
const UNSAFE_GLOBALS: &[&str] = &["dofile", "loadfile"];

fn sandbox_libraries() -> StdLib {
    StdLib::COROUTINE | StdLib::TABLE | StdLib::STRING | StdLib::UTF8 | StdLib::MATH
}

/// Replaces every global that can catch an error so that nothing caught
/// after termination is handed back to the script.
///
/// Written in Lua so wrapped calls stay yieldable.
const TERMINATION_GUARD: &str = r#"
local terminated, message = ...
local G, error, pcall, xpcall = _G, error, pcall, xpcall
local create, resume, close = coroutine.create, coroutine.resume, coroutine.close

local function guard(...)
    if terminated() then
        error(message, 0)
    end
    return ...
end

local function unwrap(co, ok, ...)
    if ok then
        return ...
    end
    close(co)
    error((...), 0)
end

G.pcall = function(...) return guard(pcall(...)) end
G.xpcall = function(...) return guard(xpcall(...)) end
coroutine.resume = function(...) return guard(resume(...)) end
coroutine.wrap = function(f)
    local co = create(f)
    return function(...) return unwrap(co, guard(resume(co, ...))) end
end
"#;

fn install_termination_guard(lua: &Lua, terminated: &Arc<AtomicBool>) -> mlua::Result<()> {
    let flag = Arc::clone(terminated);
    let is_terminated = lua.create_function(move |_, ()| Ok(flag.load(Ordering::Acquire)))?;
    lua.load(TERMINATION_GUARD)
        .set_name("=termination guard")
        .call::<()>((is_terminated, TERMINATION_MESSAGE))
}

/// One isolated engine state.
///
/// Instances are shared through `Rc`: every script that runs in an instance
/// holds a strong reference, and the state is destroyed when the last one is
/// released. Natives installed into the instance only ever hold weak
/// references back into the script layer, so no reference cycle can keep an
/// instance alive.
pub struct EngineInstance {
    lua: Lua,
    terminated: Arc<AtomicBool>,
}

impl EngineInstance {
    /// Create a sandboxed instance with a termination hook installed.
    pub fn new(options: &EngineOptions) -> Result<Rc<Self>, Error> {
        let lua = Lua::new_with(sandbox_libraries(), LuaOptions::default())?;

        let globals = lua.globals();
        for name in UNSAFE_GLOBALS {
            globals.raw_set(*name, Value::Nil)?;
        }

        let terminated = Arc::new(AtomicBool::new(false));
        install_termination_guard(&lua, &terminated)?;

        if let Some(limit) = options.memory_limit {
            lua.set_memory_limit(limit)?;
        }

        let flag = Arc::clone(&terminated);
        // The hook keeps failing once the flag is set. Errors caught by a
        // protected call are re-raised by the guard installed above.
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(options.instruction_hook_interval.max(1)),
            move |_lua, _debug| {
                if flag.load(Ordering::Acquire) {
                    Err(mlua::Error::RuntimeError(TERMINATION_MESSAGE.to_string()))
                } else {
                    Ok(VmState::Continue)
                }
            },
        );

        tracing::debug!(memory_limit = ?options.memory_limit, "engine instance created");
        Ok(Rc::new(Self { lua, terminated }))
    }

    /// Take another shared reference to this instance.
    pub fn acquire(this: &Rc<Self>) -> Rc<Self> {
        let acquired = Rc::clone(this);
        tracing::trace!(references = Rc::strong_count(this), "engine instance acquired");
        acquired
    }

    /// Number of live references to this instance.
    pub fn reference_count(this: &Rc<Self>) -> usize {
        Rc::strong_count(this)
    }

    /// Observe this instance without keeping it alive.
    pub fn watch(this: &Rc<Self>) -> InstanceWatch {
        InstanceWatch(Rc::downgrade(this))
    }

    /// A thread-safe token that can terminate this instance from anywhere.
    pub fn termination_handle(&self) -> TerminationHandle {
        TerminationHandle(Arc::clone(&self.terminated))
    }

    /// Abort any in-flight execution. One-shot: the instance stays unusable.
    pub fn terminate(&self) {
        self.termination_handle().terminate();
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Build a fresh execution context seeded with `template`'s bindings.
    pub fn new_context(&self, template: &Template) -> mlua::Result<ExecutionContext> {
        let env = self.lua.create_table()?;
        self.lua
            .globals()
            .for_each(|name: Value, value: Value| env.raw_set(name, value))?;
        // Writes to `_G` must stay inside this context.
        env.raw_set("_G", env.clone())?;
        for (name, value) in template.bindings() {
            env.raw_set(name, value.clone())?;
        }
        Ok(ExecutionContext { env })
    }

    /// Parse `source` inside `context` without executing it.
    pub fn compile(
        &self,
        context: &ExecutionContext,
        source: &str,
        name: &str,
    ) -> mlua::Result<Function> {
        self.lua
            .load(source)
            .set_name(format!("@{name}"))
            .set_mode(ChunkMode::Text)
            .set_environment(context.env().clone())
            .into_function()
    }

    /// Call a compiled chunk or any other function value.
    pub fn call(&self, function: &Function, args: MultiValue) -> mlua::Result<MultiValue> {
        function.call::<MultiValue>(args)
    }

    /// Wrap a host closure as a function callable from scripts.
    ///
    /// An `Err` returned by the closure is raised into the calling script as
    /// an ordinary runtime error, prefixed with the native's name.
    pub fn create_native<F>(&self, name: &'static str, native: F) -> mlua::Result<Function>
    where
        F: Fn(Vec<Value>) -> Result<Value, NativeError> + 'static,
    {
        self.lua.create_function(move |_, args: MultiValue| {
            native(args.into_iter().collect())
                .map_err(|message| mlua::Error::RuntimeError(format!("{name}: {message}")))
        })
    }

    pub fn create_string(&self, text: &str) -> mlua::Result<Value> {
        self.lua.create_string(text).map(Value::String)
    }
}

impl Drop for EngineInstance {
    fn drop(&mut self) {
        tracing::debug!(terminated = self.is_terminated(), "engine instance destroyed");
    }
}

/// Cross-thread termination token for one engine instance.
#[derive(Debug, Clone)]
pub struct TerminationHandle(Arc<AtomicBool>);

static_assertions::assert_impl_all!(TerminationHandle: Send, Sync);

impl TerminationHandle {
    /// Request termination. The running script is interrupted at its next
    /// instruction-hook tick and every later region boundary observes it.
    pub fn terminate(&self) {
        if !self.0.swap(true, Ordering::AcqRel) {
            tracing::debug!("engine termination requested");
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Weak observer of an engine instance's lifetime.
#[derive(Clone)]
pub struct InstanceWatch(Weak<EngineInstance>);

impl InstanceWatch {
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    /// Live references to the instance; zero once it has been destroyed.
    pub fn reference_count(&self) -> usize {
        self.0.strong_count()
    }
}
