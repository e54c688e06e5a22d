//! Panic handler for user-friendly crash reporting.

use std::panic::PanicHookInfo;

/// Install the custom panic handler.
///
/// This should be called early in main() before any other initialization.
pub fn install_handler() {
    std::panic::set_hook(Box::new(panic_hook));
}

fn panic_hook(info: &PanicHookInfo<'_>) {
    eprintln!("\nscriptvisor crashed unexpectedly!\n");
    eprintln!("{info}");

    let command_line: Vec<String> = std::env::args().skip(1).collect();
    if let Some(command) = format_command_line(&command_line) {
        eprintln!("\nTo reproduce, run:");
        eprintln!("  {command}");
    }
    eprintln!("\nversion {} on {}-{}", env!("CARGO_PKG_VERSION"), std::env::consts::OS, std::env::consts::ARCH);
}

/// Format command line arguments for display, properly shell-escaped.
pub fn format_command_line(args: &[String]) -> Option<String> {
    if args.is_empty() {
        return None;
    }
    Some(format!(
        "scriptvisor {}",
        shlex::try_join(args.iter().map(|s| s.as_str())).ok()?
    ))
}
