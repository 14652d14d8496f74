//! Diffing the reference against the installed snapshot, and executing the
//! resulting actions.
//!
//! The diff is pure: [`plan`] turns the two sets into an action list without
//! touching the environment, and [`apply`] dispatches it sequentially through
//! a [`PipDriver`]. Nothing here ever removes a package.

use std::collections::BTreeMap;

use anyhow::Result;
use log::warn;

use crate::ignore::IgnoreRules;
use crate::pip::{InstalledPackage, PipDriver};
use crate::reference::ReferenceSet;

/// Snapshot of the installed environment after ignore-filtering and name
/// normalization. Taken once at run start and never re-queried.
#[derive(Debug, Clone, Default)]
pub struct InstalledSet {
    packages: BTreeMap<String, String>,
}

impl InstalledSet {
    pub fn from_packages(packages: Vec<InstalledPackage>, ignores: &IgnoreRules) -> Self {
        let mut map = BTreeMap::new();
        for package in packages {
            let name = package.name.to_lowercase();
            if ignores.is_ignored(&name) {
                continue;
            }
            map.insert(name, package.version);
        }
        Self { packages: map }
    }

    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.packages.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// One step of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Package is pinned but not installed.
    Install { name: String, version: String },
    /// Installed version differs from the pin; force the exact version.
    /// Covers both upgrade and downgrade.
    Reinstall {
        name: String,
        installed: String,
        version: String,
    },
    /// Installed but not pinned. Reported, never removed.
    Extra { name: String, version: String },
}

impl Action {
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Action::Extra { .. })
    }
}

/// Compute the actions for one run: mutations in reference order, then one
/// report-only entry per installed package absent from the reference (sorted
/// by name).
pub fn plan(reference: &ReferenceSet, installed: &InstalledSet) -> Vec<Action> {
    let mut actions = Vec::new();

    for pin in reference.iter() {
        match installed.version_of(&pin.name) {
            None => actions.push(Action::Install {
                name: pin.name.clone(),
                version: pin.version.clone(),
            }),
            Some(current) if current != pin.version => actions.push(Action::Reinstall {
                name: pin.name.clone(),
                installed: current.to_string(),
                version: pin.version.clone(),
            }),
            Some(_) => {}
        }
    }

    for (name, version) in installed.iter() {
        if !reference.contains(name) {
            actions.push(Action::Extra {
                name: name.clone(),
                version: version.clone(),
            });
        }
    }

    actions
}

/// Outcome of one mutating action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    pub name: String,
    pub version: String,
    pub forced: bool,
    pub success: bool,
}

/// What happened over a whole run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub results: Vec<ActionResult>,
    pub extras: usize,
}

impl SyncReport {
    pub fn failures(&self) -> impl Iterator<Item = &ActionResult> {
        self.results.iter().filter(|r| !r.success)
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }
}

/// Execute an action list strictly sequentially. Each pip invocation blocks
/// until it completes; a failed install is recorded and the run continues
/// with the next action. An `Err` is only returned when pip itself cannot be
/// invoked.
pub fn apply<P: PipDriver>(pip: &P, actions: &[Action]) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    for action in actions {
        match action {
            Action::Install { name, version } => {
                println!("  installing {}=={}", name, version);
                let success = pip.install(name, version, false)?;
                if !success {
                    warn!("pip failed to install {}=={}", name, version);
                }
                report.results.push(ActionResult {
                    name: name.clone(),
                    version: version.clone(),
                    forced: false,
                    success,
                });
            }
            Action::Reinstall {
                name,
                installed,
                version,
            } => {
                println!("reinstalling {} {} -> {}", name, installed, version);
                let success = pip.install(name, version, true)?;
                if !success {
                    warn!("pip failed to reinstall {}=={}", name, version);
                }
                report.results.push(ActionResult {
                    name: name.clone(),
                    version: version.clone(),
                    forced: true,
                    success,
                });
            }
            Action::Extra { name, version } => {
                println!("       extra {} {} (keeping)", name, version);
                report.extras += 1;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pip::MockPipDriver;
    use crate::reference;

    fn reference_of(text: &str) -> ReferenceSet {
        reference::parse(text, &IgnoreRules::empty()).unwrap()
    }

    fn installed_of(packages: &[(&str, &str)], ignores: &IgnoreRules) -> InstalledSet {
        InstalledSet::from_packages(
            packages
                .iter()
                .map(|(name, version)| InstalledPackage {
                    name: (*name).into(),
                    version: (*version).into(),
                })
                .collect(),
            ignores,
        )
    }

    #[test]
    fn test_plan_installs_missing_packages() {
        let reference = reference_of("foo==1.0\nbar==2.0\n");
        let installed = installed_of(&[("foo", "1.0"), ("baz", "3.0")], &IgnoreRules::empty());

        let actions = plan(&reference, &installed);
        assert_eq!(
            actions,
            vec![
                Action::Install {
                    name: "bar".into(),
                    version: "2.0".into()
                },
                Action::Extra {
                    name: "baz".into(),
                    version: "3.0".into()
                },
            ]
        );
    }

    #[test]
    fn test_plan_reinstalls_with_reference_version() {
        let reference = reference_of("foo==1.0\n");
        let installed = installed_of(&[("foo", "2.0")], &IgnoreRules::empty());

        let actions = plan(&reference, &installed);
        assert_eq!(
            actions,
            vec![Action::Reinstall {
                name: "foo".into(),
                installed: "2.0".into(),
                version: "1.0".into(),
            }]
        );
    }

    #[test]
    fn test_plan_no_action_on_exact_match() {
        let reference = reference_of("foo==1.0\n");
        let installed = installed_of(&[("foo", "1.0")], &IgnoreRules::empty());
        assert!(plan(&reference, &installed).is_empty());
    }

    #[test]
    fn test_plan_ignored_package_never_appears() {
        // torch is pinned at a mismatching version but ignored on both sides
        let ignores = IgnoreRules::builtin();
        let reference = reference::parse("torch==9.9\nfoo==1.0\n", &ignores).unwrap();
        let installed = installed_of(&[("foo", "2.0"), ("torch-extra", "0.1")], &ignores);

        let actions = plan(&reference, &installed);
        assert_eq!(
            actions,
            vec![Action::Reinstall {
                name: "foo".into(),
                installed: "2.0".into(),
                version: "1.0".into(),
            }]
        );
    }

    #[test]
    fn test_plan_empty_reference_reports_all_installed() {
        let reference = reference_of("");
        let installed = installed_of(&[("foo", "1.0"), ("bar", "2.0")], &IgnoreRules::empty());

        let actions = plan(&reference, &installed);
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| !a.is_mutation()));
    }

    #[test]
    fn test_plan_mutations_in_reference_order_extras_after() {
        let reference = reference_of("zzz==1\naaa==2\n");
        let installed = installed_of(&[("mmm", "3")], &IgnoreRules::empty());

        let actions = plan(&reference, &installed);
        assert_eq!(actions.len(), 3);
        assert!(matches!(&actions[0], Action::Install { name, .. } if name == "zzz"));
        assert!(matches!(&actions[1], Action::Install { name, .. } if name == "aaa"));
        assert!(matches!(&actions[2], Action::Extra { name, .. } if name == "mmm"));
    }

    #[test]
    fn test_plan_idempotent_after_successful_run() {
        let reference = reference_of("foo==1.0\nbar==2.0\n");
        let installed = installed_of(&[("baz", "3.0")], &IgnoreRules::empty());

        // Pretend the first run's installs succeeded
        let after_first_run = installed_of(
            &[("foo", "1.0"), ("bar", "2.0"), ("baz", "3.0")],
            &IgnoreRules::empty(),
        );

        assert_eq!(plan(&reference, &installed).len(), 3);
        let second = plan(&reference, &after_first_run);
        assert!(second.iter().all(|a| !a.is_mutation()));
    }

    #[test]
    fn test_installed_set_lowercases_and_filters() {
        let installed = installed_of(&[("Foo", "1.0"), ("torch", "2.0")], &IgnoreRules::builtin());
        assert_eq!(installed.len(), 1);
        assert_eq!(installed.version_of("foo"), Some("1.0"));
        assert_eq!(installed.version_of("torch"), None);
    }

    #[test]
    fn test_apply_dispatches_in_order() {
        let actions = vec![
            Action::Install {
                name: "bar".into(),
                version: "2.0".into(),
            },
            Action::Reinstall {
                name: "foo".into(),
                installed: "2.0".into(),
                version: "1.0".into(),
            },
            Action::Extra {
                name: "baz".into(),
                version: "3.0".into(),
            },
        ];

        let mut pip = MockPipDriver::new();
        let mut seq = mockall::Sequence::new();
        pip.expect_install()
            .withf(|name, version, force| name == "bar" && version == "2.0" && !*force)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(true));
        pip.expect_install()
            .withf(|name, version, force| name == "foo" && version == "1.0" && *force)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(true));

        let report = apply(&pip, &actions).unwrap();
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.extras, 1);
        assert_eq!(report.failed_count(), 0);
    }

    #[test]
    fn test_apply_extras_never_invoke_pip() {
        let actions = vec![Action::Extra {
            name: "baz".into(),
            version: "3.0".into(),
        }];

        // No expect_install: any invocation would panic the mock
        let pip = MockPipDriver::new();
        let report = apply(&pip, &actions).unwrap();
        assert!(report.results.is_empty());
        assert_eq!(report.extras, 1);
    }

    #[test]
    fn test_apply_continues_past_failed_install() {
        let actions = vec![
            Action::Install {
                name: "bad".into(),
                version: "1.0".into(),
            },
            Action::Install {
                name: "good".into(),
                version: "2.0".into(),
            },
        ];

        let mut pip = MockPipDriver::new();
        pip.expect_install()
            .withf(|name, _, _| name == "bad")
            .times(1)
            .returning(|_, _, _| Ok(false));
        pip.expect_install()
            .withf(|name, _, _| name == "good")
            .times(1)
            .returning(|_, _, _| Ok(true));

        let report = apply(&pip, &actions).unwrap();
        assert_eq!(report.failed_count(), 1);
        let failed: Vec<_> = report.failures().collect();
        assert_eq!(failed[0].name, "bad");
    }

    #[test]
    fn test_apply_propagates_unrunnable_pip() {
        let actions = vec![Action::Install {
            name: "foo".into(),
            version: "1.0".into(),
        }];

        let mut pip = MockPipDriver::new();
        pip.expect_install()
            .returning(|_, _, _| Err(anyhow::anyhow!("pip not found")));

        assert!(apply(&pip, &actions).is_err());
    }
}
