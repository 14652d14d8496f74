//! Reference file loading: one `name==version` pin per line.
//!
//! Lines without `==` are skipped, which allows blank lines and free-form
//! comments. Names are lowercased and filtered through the ignore rules
//! before they enter the set.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result, bail};
use log::debug;

use crate::ignore::IgnoreRules;

/// A single pinned requirement from the reference file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pin {
    pub name: String,
    pub version: String,
}

/// The pinned reference, immutable after load. Iteration follows file order,
/// which is also the order actions are executed in.
#[derive(Debug, Clone, Default)]
pub struct ReferenceSet {
    pins: Vec<Pin>,
}

impl ReferenceSet {
    pub fn iter(&self) -> impl Iterator<Item = &Pin> {
        self.pins.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.pins.iter().any(|p| p.name == name)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

/// Read and parse a reference file. Unreadable files and malformed pins are
/// fatal; there are no partial-application semantics.
#[tracing::instrument(skip(ignores))]
pub fn load(path: &Path, ignores: &IgnoreRules) -> Result<ReferenceSet> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read reference file {:?}", path))?;
    parse(&text, ignores).with_context(|| format!("Failed to parse reference file {:?}", path))
}

/// Parse reference text into a [`ReferenceSet`].
///
/// A line with more than one `==` is malformed and fatal. Duplicate package
/// names are fatal rather than last-wins, so a conflicting reference file is
/// caught before any action runs.
pub fn parse(text: &str, ignores: &IgnoreRules) -> Result<ReferenceSet> {
    let mut pins = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if !line.contains("==") {
            if !line.is_empty() {
                debug!("Skipping line {} without '==': {}", idx + 1, line);
            }
            continue;
        }

        let mut parts = line.split("==");
        let (name, version) = match (parts.next(), parts.next(), parts.next()) {
            (Some(name), Some(version), None) => (name, version),
            _ => bail!("Malformed pin on line {}: {}", idx + 1, line),
        };

        let name = name.to_lowercase();
        if ignores.is_ignored(&name) {
            debug!("Ignoring pinned package {} (line {})", name, idx + 1);
            continue;
        }
        if !seen.insert(name.clone()) {
            bail!("Duplicate package '{}' on line {}", name, idx + 1);
        }

        pins.push(Pin {
            name,
            version: version.to_string(),
        });
    }

    Ok(ReferenceSet { pins })
}
