//! Host setup shared by the commands: module resolution, reverse commands,
//! and error rendering against the right source file.

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use scriptvisor::{
    CharSet, EngineOptions, EngineOptionsOverride, HandlerHandle, PreludeHooks, QueryHooks,
    RenderConfig, ScriptHandle, ScriptHost, TerminationHandle, render_error_to,
};

use super::CliResult;
use super::input::{module_path, read_input};
use crate::cli::ScriptArgs;

/// A script file known to the session.
#[derive(Debug, Clone)]
pub struct ScriptFile {
    pub name: String,
    pub source: String,
    /// `None` until the host hands out a handle for it.
    pub handle: Option<ScriptHandle>,
}

/// A [`ScriptHost`] plus the sources of every script compiled through it.
pub struct Session {
    pub host: ScriptHost,
    files: Rc<RefCell<Vec<ScriptFile>>>,
    modules: Option<PathBuf>,
    no_color: bool,
}

impl Session {
    pub fn new(args: &ScriptArgs, no_color: bool) -> Self {
        let mut options = EngineOptions::default();
        options.override_with(&EngineOptionsOverride {
            memory_limit: args.memory_limit,
            ..Default::default()
        });
        Self {
            host: ScriptHost::new(options),
            files: Rc::default(),
            modules: args.modules.clone(),
            no_color,
        }
    }

    /// Every file compiled so far, in load order.
    pub fn files(&self) -> Vec<ScriptFile> {
        self.files.borrow().clone()
    }

    /// Compile the prelude at `path`. `Ok(None)` means it was terminated.
    ///
    /// `on_instance` receives the engine's termination token before any
    /// prelude code runs.
    pub fn compile_prelude(
        &self,
        path: &str,
        on_instance: impl FnOnce(TerminationHandle) + 'static,
    ) -> CliResult<Option<ScriptHandle>> {
        let (source, name) = read_input(path)?;
        let index = self.record(&name, &source);

        let hooks = PreludeHooks::new()
            .with_module_loader(self.module_loader())
            .with_log(|message| eprintln!("log: {message}"))
            .with_termination_handle(on_instance);
        let handle = self.host.compile_prelude(&source, &name, hooks)?;
        self.files.borrow_mut()[index].handle = handle;
        Ok(handle)
    }

    /// Compile the query at `path`. Registered handlers are appended to
    /// `handlers`; reverse commands are printed to stdout.
    pub fn compile_query(
        &self,
        prelude: ScriptHandle,
        path: &str,
        handlers: Rc<RefCell<Vec<(String, HandlerHandle)>>>,
    ) -> CliResult<Option<ScriptHandle>> {
        let (source, name) = read_input(path)?;
        let index = self.record(&name, &source);

        let hooks = QueryHooks::new()
            .with_handler_registration(move |event, handle| {
                handlers.borrow_mut().push((event.to_string(), handle));
            })
            .with_reverse_command(|command, body| println!("notify {command} {body}"));
        let handle = self.host.compile_query(prelude, &source, &name, hooks)?;
        self.files.borrow_mut()[index].handle = handle;
        Ok(handle)
    }

    /// Render the errors of `handle` to stderr. Returns false if there were
    /// none.
    pub fn render_errors(&self, handle: ScriptHandle) -> CliResult<bool> {
        let reports = self.host.errors(handle)?;
        let files = self.files.borrow();
        let own = files.iter().find(|file| file.handle == Some(handle));

        let mut stderr = std::io::stderr();
        for report in &reports {
            // A query also reports its prelude's error, so pick the file the
            // message points at.
            let located = report.message.as_deref().and_then(|message| {
                files
                    .iter()
                    .find(|file| message.starts_with(&format!("{}:", file.name)))
            });
            let file = located.or(own);
            let config = RenderConfig {
                color: !self.no_color,
                filename: file.map(|file| file.name.as_str()),
                charset: if self.no_color {
                    CharSet::Ascii
                } else {
                    CharSet::Unicode
                },
            };
            let source = file.map_or("", |file| file.source.as_str());
            render_error_to(report, source, &mut stderr, &config).ok();
        }
        Ok(!reports.is_empty())
    }

    fn record(&self, name: &str, source: &str) -> usize {
        record(&self.files, name, source)
    }

    fn module_loader(
        &self,
    ) -> impl Fn(&ScriptHost, ScriptHandle, &str) -> Option<ScriptHandle> + 'static {
        let files = Rc::clone(&self.files);
        let modules = self.modules.clone();
        move |host, prelude, name| {
            let Some(dir) = modules.as_deref() else {
                tracing::warn!(module = name, "no module directory configured");
                return None;
            };
            let Some(path) = module_path(dir, name) else {
                tracing::warn!(module = name, "invalid module name");
                return None;
            };
            let path = path.to_string_lossy().into_owned();
            let (source, file_name) = match read_input(&path) {
                Ok(input) => input,
                Err(err) => {
                    tracing::warn!(module = name, error = %err, "cannot read module");
                    return None;
                }
            };
            tracing::debug!(module = name, path = %file_name, "loading module");

            let index = record(&files, &file_name, &source);
            let handle = host
                .compile_module(prelude, &source, &file_name)
                .ok()
                .flatten();
            files.borrow_mut()[index].handle = handle;
            handle
        }
    }
}

fn record(files: &RefCell<Vec<ScriptFile>>, name: &str, source: &str) -> usize {
    let mut files = files.borrow_mut();
    files.push(ScriptFile {
        name: name.to_string(),
        source: source.to_string(),
        handle: None,
    });
    files.len() - 1
}
