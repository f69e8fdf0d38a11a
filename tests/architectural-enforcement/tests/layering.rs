//! Integration Test: Layering
//!
//! **Policy**: `ragchat-core` is headless. It owns protocol, state and timing;
//! the front-end owns the terminal. The core must not depend on terminal or
//! CLI crates, must not print, and must not block the runtime with sleeps.
//! **Exceptions**: test code (`#[cfg(test)]` modules, `tests/` directories)

use architectural_enforcement::{dependency_names, find_violations};

const CORE_SRC: &str = "chat/core/src";
const CLI_SRC: &str = "chat/cli/src";

fn report(title: &str, violations: &[String]) {
    if violations.is_empty() {
        return;
    }
    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    panic!("\nFound {} violation(s).\nFix these before merging!", violations.len());
}

/// Test that the core crate has no front-end dependencies
#[test]
fn test_core_has_no_ui_dependencies() {
    let forbidden = ["crossterm", "ratatui", "clap", "tracing-subscriber"];
    let violations: Vec<String> = dependency_names("chat/core/Cargo.toml")
        .into_iter()
        .filter(|name| forbidden.contains(&name.as_str()))
        .map(|name| format!("chat/core/Cargo.toml depends on {name}"))
        .collect();
    report("Front-end dependency in the core crate", &violations);

    let imports = find_violations(CORE_SRC, &["crossterm::", "ratatui::", "clap::"]);
    report("Front-end import in the core crate", &imports);
}

/// Test that the core never writes to stdout/stderr directly
#[test]
fn test_core_does_not_print() {
    let violations = find_violations(
        CORE_SRC,
        &["println!", "print!(", "eprintln!", "eprint!(", "dbg!("],
    );
    report(
        "Direct output in the core crate (log with tracing, render through RenderSink)",
        &violations,
    );
}

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = find_violations(CORE_SRC, &["::sleep(", ".sleep("]);
    violations.extend(find_violations(CLI_SRC, &["::sleep(", ".sleep("]));
    report(
        "Sleep calls in production code (wait on I/O or a deadline instead)",
        &violations,
    );
}

/// Test that the core propagates errors instead of panicking
#[test]
fn test_no_unwrap_in_core_production_code() {
    let violations = find_violations(CORE_SRC, &[".unwrap()", ".expect("]);
    report("unwrap()/expect() in core production code", &violations);
}

/// Test that blocking std sleeps never appear anywhere in the workspace
/// sources, tests included
#[test]
fn test_no_thread_sleep() {
    let mut violations = find_violations(CORE_SRC, &["std::thread::sleep", "thread::sleep("]);
    violations.extend(find_violations(CLI_SRC, &["std::thread::sleep", "thread::sleep("]));
    report("Blocking thread sleep", &violations);
}
