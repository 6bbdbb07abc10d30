use std::process::Command;

use anyhow::{Context, Result};

/// Package and feature list pairs that must each compile on their own.
const FEATURE_COMBINATIONS: &[(&str, &[&str])] = &[
    ("authlane-common", &[]),
    ("authlane-common", &["foundation"]),
    ("authlane-domain", &[]),
    ("authlane-core", &[]),
    ("authlane-core", &["test-utils"]),
    ("authlane-infra", &[]),
];

/// Check that every feature combination compiles.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} crate feature combinations...", FEATURE_COMBINATIONS.len());

    for (index, (package, features)) in FEATURE_COMBINATIONS.iter().enumerate() {
        let joined = features.join(",");
        let label = if features.is_empty() {
            format!("{package} (default)")
        } else {
            format!("{package} [{joined}]")
        };

        println!("\n[{}/{}] cargo check -p {label}", index + 1, FEATURE_COMBINATIONS.len());

        let mut command = Command::new("cargo");
        command.args(["check", "--all-targets", "-p", *package]);
        if !features.is_empty() {
            command.arg("--features").arg(&joined);
        }

        let status = command
            .status()
            .with_context(|| format!("Failed to run cargo check for {label}"))?;
        if !status.success() {
            anyhow::bail!("Feature combination {label} failed to compile");
        }

        println!("✅ {label} compiled successfully");
    }

    println!("\n✅ All {} feature combinations compile successfully!", FEATURE_COMBINATIONS.len());
    Ok(())
}
