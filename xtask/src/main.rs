//! Development automation tasks for the Authlane workspace.
//!
//! Run with: `cargo xtask <command>`
//!
//! This is a CLI tool for developers, so `println!` and `eprintln!` are
//! intentionally used for user-facing output rather than structured logging.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::env;
use std::process::{Command, ExitCode};

use anyhow::{anyhow, Context};

mod features;

fn main() -> ExitCode {
    let task = env::args().nth(1);

    let result = match task.as_deref() {
        Some("ci") => run_ci(),
        Some("fmt") => run_fmt(),
        Some("clippy") => run_clippy(),
        Some("test") => run_test(),
        Some("test-features") => features::test_feature_matrix(),
        Some("deny") => run_deny(),
        Some("audit") => run_audit(),
        Some("help") | None => {
            print_help();
            Ok(())
        }
        Some(unknown) => {
            eprintln!("Unknown task: {unknown}");
            eprintln!();
            print_help();
            Err(anyhow!("Unknown task"))
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Task failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_help() {
    println!("Authlane Development Tasks");
    println!();
    println!("USAGE:");
    println!("    cargo xtask <TASK>");
    println!();
    println!("TASKS:");
    println!(
        "    ci             Run all CI checks (fmt, clippy, test-features, test, deny, audit)"
    );
    println!("    fmt            Check Rust code formatting");
    println!("    clippy         Run Clippy lints");
    println!("    test           Run all tests, including the core test doubles");
    println!("    test-features  Verify each crate's feature combinations compile");
    println!("    deny           Check dependencies with cargo-deny");
    println!("    audit          Audit dependencies for security vulnerabilities");
    println!("    help           Show this help message");
}

/// Run all CI checks in sequence
fn run_ci() -> anyhow::Result<()> {
    let steps: [(&str, fn() -> anyhow::Result<()>); 6] = [
        ("Checking Rust format", run_fmt),
        ("Running Clippy", run_clippy),
        ("Checking feature combinations", features::test_feature_matrix),
        ("Running tests", run_test),
        ("Checking dependencies", run_deny),
        ("Auditing dependencies", run_audit),
    ];

    println!("==> Running CI checks...\n");
    for (index, (label, step)) in steps.iter().enumerate() {
        println!("\n==> Step {}/{}: {label}...", index + 1, steps.len());
        step()?;
    }

    println!("\n✓ All CI checks passed!");
    Ok(())
}

fn run_fmt() -> anyhow::Result<()> {
    cargo(&["fmt", "--all", "--", "--check"])
        .map_err(|_| anyhow!("Format check failed. Run 'cargo fmt --all' to fix."))
}

fn run_clippy() -> anyhow::Result<()> {
    cargo(&["clippy", "--workspace", "--all-targets", "--all-features", "--", "-D", "warnings"])
        .map_err(|_| anyhow!("Clippy run failed. See output above."))
}

fn run_test() -> anyhow::Result<()> {
    cargo(&["test", "--workspace", "--all-features"]).map_err(|_| anyhow!("Tests failed"))
}

fn run_deny() -> anyhow::Result<()> {
    require_subcommand("deny", "cargo-deny")?;
    cargo(&["deny", "check"]).map_err(|_| anyhow!("cargo-deny found issues"))
}

fn run_audit() -> anyhow::Result<()> {
    require_subcommand("audit", "cargo-audit")?;
    cargo(&["audit"]).map_err(|_| anyhow!("cargo-audit found vulnerabilities"))
}

/// Run `cargo` with `args`, failing on a non-zero exit.
fn cargo(args: &[&str]) -> anyhow::Result<()> {
    let status = Command::new("cargo")
        .args(args)
        .status()
        .with_context(|| format!("Failed to run cargo {}", args.join(" ")))?;

    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("cargo {} exited with {status}", args.join(" ")))
    }
}

fn require_subcommand(subcommand: &str, tool: &str) -> anyhow::Result<()> {
    let installed = Command::new("cargo")
        .args([subcommand, "--version"])
        .output()
        .is_ok_and(|output| output.status.success());

    if !installed {
        eprintln!("{tool} is not installed.");
        eprintln!("Install it with: cargo install {tool}");
        anyhow::bail!("{tool} not found");
    }
    Ok(())
}
