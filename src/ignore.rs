//! Ignore rules applied to both sides of the reconciliation.
//!
//! The same rules filter the reference set and the installed snapshot, so an
//! ignored package never appears in either and is invisible to the diff.

use std::collections::HashSet;

/// Packages excluded from reconciliation: a set of exact names plus a set of
/// name prefixes. Names are compared after lowercasing.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    exact: HashSet<String>,
    prefixes: Vec<String>,
}

impl IgnoreRules {
    /// The built-in rules: the packaging toolchain itself, plus the
    /// CUDA/PyTorch stack, whose pins are managed outside the reference file.
    pub fn builtin() -> Self {
        Self::default()
            .with_exact(["pip", "setuptools", "wheel"])
            .with_prefixes(["torch", "torchaudio", "torchvision", "triton", "nvidia-"])
    }

    /// No rules at all; every package participates in the diff.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add exact package names to ignore.
    pub fn with_exact<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.exact
            .extend(names.into_iter().map(|n| n.as_ref().to_lowercase()));
        self
    }

    /// Add package name prefixes to ignore.
    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.prefixes
            .extend(prefixes.into_iter().map(|p| p.as_ref().to_lowercase()));
        self
    }

    /// Whether a package is excluded. `name` must already be lowercased.
    pub fn is_ignored(&self, name: &str) -> bool {
        self.exact.contains(name) || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_exact_names() {
        let rules = IgnoreRules::builtin();
        assert!(rules.is_ignored("pip"));
        assert!(rules.is_ignored("setuptools"));
        assert!(rules.is_ignored("wheel"));
    }

    #[test]
    fn test_builtin_prefixes() {
        let rules = IgnoreRules::builtin();
        assert!(rules.is_ignored("torch"));
        assert!(rules.is_ignored("torch-extra"));
        assert!(rules.is_ignored("torchvision"));
        assert!(rules.is_ignored("nvidia-cudnn-cu12"));
    }

    #[test]
    fn test_exact_is_not_a_prefix() {
        let rules = IgnoreRules::builtin();
        // "pip" is an exact rule, not a prefix rule
        assert!(!rules.is_ignored("pipenv"));
        assert!(!rules.is_ignored("wheelhouse"));
    }

    #[test]
    fn test_empty_ignores_nothing() {
        let rules = IgnoreRules::empty();
        assert!(!rules.is_ignored("pip"));
        assert!(!rules.is_ignored("torch"));
    }

    #[test]
    fn test_extension_lowercases_input() {
        let rules = IgnoreRules::empty()
            .with_exact(["MyPkg"])
            .with_prefixes(["Internal-"]);
        assert!(rules.is_ignored("mypkg"));
        assert!(rules.is_ignored("internal-tool"));
        assert!(!rules.is_ignored("other"));
    }
}
