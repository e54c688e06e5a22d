//! The `check` command - compile scripts without invoking any handler.

use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;

use nu_ansi_term::Color;
use scriptvisor::Status;

use crate::cli::CheckArgs;
use crate::common::CliResult;
use crate::common::error::exit_code;
use crate::common::host::Session;

/// Run the check command.
pub fn run(args: CheckArgs, no_color: bool) -> CliResult<ExitCode> {
    let session = Session::new(&args.scripts, no_color);
    let ok = |name: &str| {
        if args.quiet {
            return;
        }
        if no_color {
            println!("{name}: OK");
        } else {
            println!("{name}: {}", Color::Green.paint("OK"));
        }
    };

    let Some(prelude) = session.compile_prelude(&args.scripts.prelude, |_| {})? else {
        eprintln!("error: script execution was terminated");
        return Ok(exit_code(Status::Terminated));
    };

    // The prelude and every module it loaded while bootstrapping.
    let mut failed = false;
    for file in session.files() {
        let Some(handle) = file.handle else {
            continue;
        };
        if session.render_errors(handle)? {
            failed = true;
        } else {
            ok(&file.name);
        }
    }
    if failed {
        return Ok(exit_code(Status::Error));
    }

    let Some(path) = args.query.as_deref() else {
        return Ok(ExitCode::SUCCESS);
    };
    let handlers = Rc::new(RefCell::new(Vec::new()));
    let Some(query) = session.compile_query(prelude, path, Rc::clone(&handlers))? else {
        eprintln!("error: script execution was terminated");
        return Ok(exit_code(Status::Terminated));
    };
    if session.render_errors(query)? {
        return Ok(exit_code(Status::Error));
    }

    let name = session
        .files()
        .into_iter()
        .find(|file| file.handle == Some(query))
        .map_or_else(|| path.to_string(), |file| file.name);
    ok(&name);
    if !args.quiet {
        for (event, _) in handlers.borrow().iter() {
            println!("  on {event}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
