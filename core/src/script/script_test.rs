//! Tests for the three script kinds.

use super::*;
use crate::api::{EngineOptions, ErrorCode};
use crate::engine::host_string;
use pretty_assertions::assert_eq;
use std::cell::RefCell;

fn new_prelude(callbacks: PreludeCallbacks) -> Rc<PreludeScript> {
    crate::test_utils::init_test_logging();
    PreludeScript::new(
        &EngineOptions::default(),
        CancellationCoordinator::default(),
        callbacks,
    )
    .expect("engine instance should be created")
}

fn bootstrap(source: &str) -> Rc<PreludeScript> {
    let prelude = new_prelude(PreludeCallbacks::default());
    prelude
        .compile_and_run(source, "prelude.lua")
        .expect("prelude should bootstrap");
    prelude
}

fn query(prelude: &Rc<PreludeScript>, source: &str) -> Rc<QueryScript> {
    let query = QueryScript::new(prelude, QueryCallbacks::default(), 10);
    query
        .compile_and_run(source, "query.lua")
        .expect("query should run");
    query
}

fn reports(script: &dyn CompiledScript) -> Vec<ErrorReport> {
    let mut reports = Vec::new();
    script.report_errors(&mut |report| reports.push(report));
    reports
}

fn binding_string(template: &Template, name: &str) -> Option<String> {
    template.get(name).and_then(host_string)
}

const PRELUDE: &str = "return function(on, notify) return { greeting = 'hi' } end";

#[test]
fn test_prelude_must_return_function() {
    let prelude = new_prelude(PreludeCallbacks::default());

    let result = prelude.compile_and_run("return 42", "prelude.lua");

    assert_eq!(result, Err(Failure::Error));
    assert_eq!(prelude.state(), ScriptState::Faulted);
    assert!(!prelude.is_initialized());
    assert_eq!(
        prelude.captured_error(),
        Some(CapturedError::new(
            ErrorKind::Compile,
            "prelude script must return a function"
        ))
    );
}

#[test]
fn test_prelude_syntax_error_is_captured() {
    let prelude = new_prelude(PreludeCallbacks::default());

    assert_eq!(prelude.compile("return = ", "prelude.lua"), Err(Failure::Error));

    let error = prelude.captured_error().expect("error should be captured");
    assert_eq!(error.kind, ErrorKind::Compile);
    assert!(error.message.starts_with("prelude.lua:1:"), "got: {error}");
}

#[test]
fn test_template_mirrors_factory_object() {
    let prelude = bootstrap(
        "return function() return { answer = 42, greeting = 'hi', [1] = 'skipped' } end",
    );

    let template = prelude.get_template(MultiValue::new()).unwrap();

    let mut names: Vec<_> = template.names().collect();
    names.sort();
    assert_eq!(names, vec!["answer", "greeting"]);
    assert_eq!(binding_string(&template, "greeting").as_deref(), Some("hi"));
}

#[test]
fn test_factory_must_return_object() {
    let prelude = bootstrap("return function() return 'nope' end");

    assert_eq!(prelude.get_template(MultiValue::new()).err(), Some(Failure::Error));
    assert_eq!(
        prelude.captured_error().map(|e| e.message),
        Some("prelude template factory must return an object".to_string())
    );
}

#[test]
fn test_log_native_forwards_to_sink() {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let prelude = new_prelude(PreludeCallbacks {
        log: {
            let lines = Rc::clone(&lines);
            Box::new(move |line| lines.borrow_mut().push(line.to_string()))
        },
        ..Default::default()
    });

    let result = prelude.compile_and_run(
        indoc::indoc! {"
            log('starting')
            log(3)
            local ok = pcall(log, 'a', 'b')
            log(tostring(ok))
            return function() return {} end
        "},
        "prelude.lua",
    );

    assert_eq!(result, Ok(()));
    assert_eq!(*lines.borrow(), vec!["starting", "3", "false"]);
}

#[test]
fn test_modules_loaded_during_bootstrap_get_empty_template() {
    let prelude = new_prelude(PreludeCallbacks {
        load_module: Box::new(|prelude, name| {
            let module = ModuleScript::new(prelude);
            let source = format!("return {{ name = '{name}', has_log = log ~= nil }}");
            module.compile_and_run(&source, name).ok()?;
            Some(module)
        }),
        ..Default::default()
    });

    let result = prelude.compile_and_run(
        indoc::indoc! {"
            local util = loadModule('util')
            return function() return { util_name = util.name, util_has_log = util.has_log } end
        "},
        "prelude.lua",
    );
    assert_eq!(result, Ok(()));

    let template = prelude.get_template(MultiValue::new()).unwrap();
    assert_eq!(binding_string(&template, "util_name").as_deref(), Some("util"));
    assert!(matches!(template.get("util_has_log"), Some(Value::Boolean(false))));
}

#[test]
fn test_failed_module_load_raises_into_script() {
    let prelude = new_prelude(PreludeCallbacks {
        load_module: Box::new(|prelude, name| {
            if name == "missing" {
                return None;
            }
            let module = ModuleScript::new(prelude);
            let _ = module.compile_and_run("return 'not a table'", name);
            Some(module)
        }),
        ..Default::default()
    });

    prelude
        .compile_and_run(
            indoc::indoc! {"
                local _, missing = pcall(loadModule, 'missing')
                local _, broken = pcall(loadModule, 'broken')
                local _, unnamed = pcall(loadModule, '')
                return function()
                    return { missing = tostring(missing), broken = tostring(broken), unnamed = tostring(unnamed) }
                end
            "},
            "prelude.lua",
        )
        .unwrap();

    let template = prelude.get_template(MultiValue::new()).unwrap();
    let missing = binding_string(&template, "missing").unwrap();
    let broken = binding_string(&template, "broken").unwrap();
    let unnamed = binding_string(&template, "unnamed").unwrap();
    assert!(missing.contains("cannot load module 'missing'"), "got: {missing}");
    assert!(
        broken.contains("cannot load module 'broken': module script must return an object"),
        "got: {broken}"
    );
    assert!(unnamed.contains("module name must be a non-empty string"), "got: {unnamed}");
}

#[test]
fn test_module_exports_and_template() {
    let prelude = bootstrap("return function() return { base = 40 } end");
    let module = ModuleScript::new(&prelude);

    let result = module.compile_and_run("return { value = base + 2 }", "math.lua");

    assert_eq!(result, Ok(()));
    assert_eq!(module.state(), ScriptState::Ran);
    let exports = module.exports().expect("exports should be kept");
    assert_eq!(exports.get::<i64>("value").unwrap(), 42);
    // Exports are retrievable repeatedly without re-running.
    assert!(module.exports().is_some());
    assert_eq!(EngineInstance::reference_count(prelude.base().instance()), 2);
}

#[test]
fn test_module_must_return_object() {
    let prelude = bootstrap(PRELUDE);
    let module = ModuleScript::new(&prelude);

    assert_eq!(module.compile_and_run("return 5", "five.lua"), Err(Failure::Error));
    assert!(module.exports().is_none());

    let reports = reports(&*module);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].code, ErrorCode::ScriptException);
    assert!(reports[0].message.as_deref().unwrap().contains("must return an object"));
}

#[test]
fn test_query_sees_prelude_bindings_and_natives() {
    let prelude = bootstrap(PRELUDE);
    let commands = Rc::new(RefCell::new(Vec::new()));
    let registered = Rc::new(RefCell::new(Vec::new()));
    let callbacks = QueryCallbacks {
        register_handler: {
            let registered = Rc::clone(&registered);
            Box::new(move |name, handle| registered.borrow_mut().push((name.to_string(), handle)))
        },
        reverse_command: {
            let commands = Rc::clone(&commands);
            Box::new(move |name, body| {
                commands
                    .borrow_mut()
                    .push((name.to_string(), body.to_string()))
            })
        },
    };
    let query = QueryScript::new(&prelude, callbacks, 10);

    let result = query.compile_and_run(
        indoc::indoc! {"
            notify('Hello', greeting)
            on('Foo', function(s) return s end)
            on('Bar', function(s) notify('Seen', s) end)
        "},
        "query.lua",
    );

    assert_eq!(result, Ok(()));
    assert_eq!(
        *registered.borrow(),
        vec![
            ("Foo".to_string(), HandlerHandle(0)),
            ("Bar".to_string(), HandlerHandle(1)),
        ]
    );
    assert_eq!(query.handler_names(), vec!["Foo", "Bar"]);

    query.execute_handler(HandlerHandle(1), "payload", &[]).unwrap();
    assert_eq!(
        *commands.borrow(),
        vec![
            ("Hello".to_string(), "hi".to_string()),
            ("Seen".to_string(), "payload".to_string()),
        ]
    );
}

#[test]
fn test_invalid_registrations_leave_registry_unchanged() {
    let prelude = bootstrap(PRELUDE);
    let query = query(
        &prelude,
        indoc::indoc! {"
            failures = {}
            failures[1] = select(2, pcall(on))
            failures[2] = select(2, pcall(on, 'Foo'))
            failures[3] = select(2, pcall(on, 42, function() end))
            failures[4] = select(2, pcall(on, 'Foo', 'not a function'))
            failures[5] = select(2, pcall(on, '', function() end))
            failures[6] = select(2, pcall(on, 'Foo', nil))
        "},
    );

    assert_eq!(query.handler_count(), 0);
    assert_eq!(query.state(), ScriptState::Ran);
}

#[test]
fn test_notify_validates_arguments() {
    let prelude = bootstrap(PRELUDE);
    let query = QueryScript::new(&prelude, QueryCallbacks::default(), 10);

    let result = query.compile_and_run("notify('only-name')", "query.lua");

    assert_eq!(result, Err(Failure::Error));
    let message = query.captured_error().unwrap().message;
    assert!(message.contains("notify: expected 2 arguments, got 1"), "got: {message}");
}

const HANDLERS: &str = indoc::indoc! {"
    on('nil', function() return nil end)
    on('pair', function() return { 'a', 'b' } end)
    on('multi', function(p, x) return p, x end)
    on('number', function() return 42 end)
    on('throw', function() error('boom') end)
    on('count', function(...) return tostring(select('#', ...)) end)
    on('triple', function() return 'a', 'b', 'c' end)
    on('bytes', function() return '\\xff\\xfe' end)
"};

#[test]
fn test_handler_result_shapes() {
    let prelude = bootstrap(PRELUDE);
    let query = query(&prelude, HANDLERS);

    assert_eq!(
        query.execute_handler(HandlerHandle(0), "x", &[]),
        Ok(HandlerResult::default())
    );
    assert_eq!(
        query.execute_handler(HandlerHandle(1), "x", &[]),
        Ok(HandlerResult {
            result_a: Some("a".to_string()),
            result_b: Some("b".to_string()),
        })
    );
    assert_eq!(
        query.execute_handler(HandlerHandle(2), "p", &["x"]),
        Ok(HandlerResult {
            result_a: Some("p".to_string()),
            result_b: Some("x".to_string()),
        })
    );
}

#[test]
fn test_non_string_result_is_error() {
    let prelude = bootstrap(PRELUDE);
    let query = query(&prelude, HANDLERS);

    assert_eq!(
        query.execute_handler(HandlerHandle(3), "x", &[]),
        Err(Failure::Error)
    );
    assert_eq!(
        query.captured_error().map(|e| e.message),
        Some("handler must return string data or null".to_string())
    );
}

#[test]
fn test_more_than_two_results_is_error() {
    let prelude = bootstrap(PRELUDE);
    let query = query(&prelude, HANDLERS);

    assert_eq!(
        query.execute_handler(HandlerHandle(6), "x", &[]),
        Err(Failure::Error)
    );
    assert_eq!(
        query.captured_error().map(|e| e.message),
        Some("handler must return at most two values".to_string())
    );
}

#[test]
fn test_invalid_utf8_result_is_error() {
    let prelude = bootstrap(PRELUDE);
    let query = query(&prelude, HANDLERS);

    assert_eq!(
        query.execute_handler(HandlerHandle(7), "x", &[]),
        Err(Failure::Error)
    );
    assert_eq!(
        query.captured_error().map(|e| e.message),
        Some("handler must return string data or null".to_string())
    );
}

#[test]
fn test_natives_reject_invalid_utf8() {
    let prelude = bootstrap(PRELUDE);
    let query = query(
        &prelude,
        indoc::indoc! {"
            failures = {}
            failures[1] = select(2, pcall(on, '\\xff', function() end))
            failures[2] = select(2, pcall(notify, '\\xff', 'body'))
            failures[3] = select(2, pcall(notify, 'Name', '\\xfe'))
        "},
    );
    let failures: Vec<String> = match query.base().context_binding("failures") {
        Some(Value::Table(failures)) => failures
            .sequence_values::<String>()
            .collect::<mlua::Result<_>>()
            .unwrap(),
        other => panic!("expected a table, got {other:?}"),
    };

    assert_eq!(query.handler_count(), 0);
    assert_eq!(failures.len(), 3);
    assert!(failures[0].contains("on: event name must be valid UTF-8"), "got: {}", failures[0]);
    assert!(failures[1].contains("notify: command name must be valid UTF-8"), "got: {}", failures[1]);
    assert!(failures[2].contains("notify: command body must be valid UTF-8"), "got: {}", failures[2]);
}

#[test]
fn test_thrown_error_is_captured_and_cleared_by_success() {
    let prelude = bootstrap(PRELUDE);
    let query = query(&prelude, HANDLERS);

    assert_eq!(
        query.execute_handler(HandlerHandle(4), "x", &[]),
        Err(Failure::Error)
    );
    let error = query.captured_error().unwrap();
    assert_eq!(error.kind, ErrorKind::Runtime);
    assert!(error.message.contains("query.lua:5: boom"), "got: {error}");
    assert_eq!(query.state(), ScriptState::Faulted);

    assert!(query.execute_handler(HandlerHandle(0), "x", &[]).is_ok());
    assert_eq!(query.captured_error(), None);
    assert_eq!(query.state(), ScriptState::Ran);
    assert_eq!(reports(&*query), Vec::<ErrorReport>::new());
}

#[test]
fn test_handler_argument_ceiling() {
    let prelude = bootstrap(PRELUDE);
    let query = query(&prelude, HANDLERS);
    let nine = ["aux"; 9];
    let ten = ["aux"; 10];

    assert_eq!(
        query
            .execute_handler(HandlerHandle(5), "p", &nine)
            .map(|r| r.result_a),
        Ok(Some("10".to_string()))
    );
    assert_eq!(
        query.execute_handler(HandlerHandle(5), "p", &ten),
        Err(Failure::Error)
    );
    assert!(query.captured_error().unwrap().message.contains("at most 10 arguments"));
}

#[test]
fn test_unknown_handler_is_error() {
    let prelude = bootstrap(PRELUDE);
    let query = query(&prelude, HANDLERS);

    assert_eq!(
        query.execute_handler(HandlerHandle(99), "x", &[]),
        Err(Failure::Error)
    );
}

#[test]
fn test_recompile_replaces_handlers() {
    let prelude = bootstrap(PRELUDE);
    let query = query(&prelude, HANDLERS);
    assert_eq!(query.handler_count(), 6);

    query
        .compile_and_run("on('Only', function() end)", "query.lua")
        .unwrap();

    assert_eq!(query.handler_names(), vec!["Only"]);
}

#[test]
fn test_query_reports_own_error_then_prelude_error() {
    let prelude = bootstrap("return function(on) if on then error('no queries') end return {} end");
    let query = QueryScript::new(&prelude, QueryCallbacks::default(), 10);

    assert_eq!(query.compile("on('Foo', print)", "query.lua"), Err(Failure::Error));

    let messages: Vec<_> = reports(&*query)
        .into_iter()
        .map(|report| report.message.unwrap_or_default())
        .collect();
    assert_eq!(
        messages,
        vec![
            "cannot build global template: prelude.lua:1: no queries".to_string(),
            "prelude.lua:1: no queries".to_string(),
        ]
    );
}

#[test]
fn test_terminated_engine_reports_once_without_message() {
    let prelude = bootstrap(PRELUDE);
    let query = query(&prelude, HANDLERS);
    let _ = query.execute_handler(HandlerHandle(4), "x", &[]);

    query.request_termination();

    assert_eq!(
        reports(&*query),
        vec![ErrorReport {
            code: ErrorCode::EngineTerminated,
            message: None,
        }]
    );
    assert_eq!(
        query.execute_handler(HandlerHandle(0), "x", &[]),
        Err(Failure::Terminated)
    );
    assert_eq!(query.state(), ScriptState::Terminated);
}
