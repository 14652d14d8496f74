//! The pip collaborator seam.
//!
//! [`PipDriver`] is the trait boundary the reconciler talks through, so the
//! diff and dispatch logic can be tested without a real package index.
//! [`PipCli`] is the production implementation shelling out to the pip CLI.

use std::process::Command;

use anyhow::{Context, Result, bail};
use log::debug;
use serde::Deserialize;

/// One installed distribution as reported by `pip list --format=json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

/// Operations the reconciler needs from the package manager.
#[cfg_attr(test, mockall::automock)]
pub trait PipDriver {
    /// Snapshot of the installed distributions. Read-only; must not trigger
    /// any installation side effects.
    fn installed_packages(&self) -> Result<Vec<InstalledPackage>>;

    /// Install `name==version`, optionally forcing a reinstall over an
    /// already-installed copy. Returns whether pip exited successfully; an
    /// `Err` means pip could not be invoked at all.
    fn install(&self, name: &str, version: &str, force: bool) -> Result<bool>;
}

/// Driver invoking a real pip executable.
pub struct PipCli {
    program: String,
}

impl PipCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl PipDriver for PipCli {
    #[tracing::instrument(skip(self))]
    fn installed_packages(&self) -> Result<Vec<InstalledPackage>> {
        let output = Command::new(&self.program)
            .args(["list", "--format=json", "--disable-pip-version-check"])
            .output()
            .with_context(|| format!("Failed to run '{} list'", self.program))?;

        if !output.status.success() {
            bail!(
                "'{} list' exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Failed to parse '{} list' output as JSON", self.program))
    }

    #[tracing::instrument(skip(self))]
    fn install(&self, name: &str, version: &str, force: bool) -> Result<bool> {
        let requirement = format!("{}=={}", name, version);
        let mut command = Command::new(&self.program);
        command.arg("install");
        if force {
            command.arg("--force-reinstall");
        }
        command.arg(&requirement);

        debug!("Running {:?}", command);
        // pip's own output streams through to the console; only the exit
        // status is captured.
        let status = command
            .status()
            .with_context(|| format!("Failed to run '{} install {}'", self.program, requirement))?;
        Ok(status.success())
    }
}
