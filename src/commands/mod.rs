//! CLI-facing entry points: `sync` reconciles, `check` only reports.

use std::path::Path;

use anyhow::{Result, bail};
use log::debug;

use crate::ignore::IgnoreRules;
use crate::pip::PipDriver;
use crate::reference::{self, ReferenceSet};
use crate::sync::{Action, InstalledSet, apply, plan};

/// Reconcile the installed environment against the reference file: install
/// what is missing, force mismatched versions, report extras. Fails if the
/// reference cannot be loaded, if the environment cannot be queried, or if
/// any install action failed.
#[tracing::instrument(skip(pip, ignores))]
pub fn sync<P: PipDriver>(pip: &P, reference_path: &Path, ignores: &IgnoreRules) -> Result<()> {
    let (reference, installed) = load_sets(pip, reference_path, ignores)?;
    let actions = plan(&reference, &installed);
    let report = apply(pip, &actions)?;

    println!(
        "      synced {} pinned, {} action(s), {} extra(s)",
        reference.len(),
        report.results.len(),
        report.extras
    );

    let failed: Vec<_> = report.failures().collect();
    if !failed.is_empty() {
        for result in &failed {
            eprintln!("      failed {}=={}", result.name, result.version);
        }
        bail!("{} install action(s) failed", failed.len());
    }
    Ok(())
}

/// Print what `sync` would do without mutating anything. Fails when the
/// environment differs from the reference, so the exit code is usable in
/// scripts.
#[tracing::instrument(skip(pip, ignores))]
pub fn check<P: PipDriver>(pip: &P, reference_path: &Path, ignores: &IgnoreRules) -> Result<()> {
    let (reference, installed) = load_sets(pip, reference_path, ignores)?;
    let actions = plan(&reference, &installed);

    let mut drift = 0;
    for action in &actions {
        match action {
            Action::Install { name, version } => {
                drift += 1;
                println!("     missing {}=={}", name, version);
            }
            Action::Reinstall {
                name,
                installed,
                version,
            } => {
                drift += 1;
                println!("    mismatch {} {} -> {}", name, installed, version);
            }
            Action::Extra { name, version } => {
                println!("       extra {} {} (keeping)", name, version);
            }
        }
    }

    if drift > 0 {
        bail!("Environment differs from reference in {} package(s)", drift);
    }
    println!("     in sync {} pinned package(s)", reference.len());
    Ok(())
}

/// Build both sets for one run. The snapshot is taken once; it is not
/// re-queried after actions mutate the environment.
fn load_sets<P: PipDriver>(
    pip: &P,
    reference_path: &Path,
    ignores: &IgnoreRules,
) -> Result<(ReferenceSet, InstalledSet)> {
    let reference = reference::load(reference_path, ignores)?;
    debug!("Loaded {} pin(s) from {:?}", reference.len(), reference_path);

    let installed = InstalledSet::from_packages(pip.installed_packages()?, ignores);
    debug!("Snapshot has {} installed package(s)", installed.len());

    Ok((reference, installed))
}
