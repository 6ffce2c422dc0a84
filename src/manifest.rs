//! Cross-phase persistence of the matched rule sets.
//!
//! Setup writes the manifest once; every interceptor invocation reads it
//! back and filters it to its own compile unit.

use crate::{
    config::BuildPaths,
    error::Result,
    rules::RuleSet,
    utils,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Bumped whenever the schema changes; the schema is private to the tool.
const MANIFEST_FORMAT_VERSION: &str = "otel-weave-matched-1";

/// The persisted list of matched rule sets, ordered by module path.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct MatchedManifest {
    #[serde(rename = "_format")]
    pub format: String,
    pub rule_sets: Vec<RuleSet>,
}

impl MatchedManifest {
    pub fn new(rule_sets: Vec<RuleSet>) -> Self {
        Self { format: MANIFEST_FORMAT_VERSION.to_string(), rule_sets }
    }

    pub fn read(path: &Path) -> Result<Self> {
        trace!("reading matched manifest at {}", path.display());
        let manifest: MatchedManifest = utils::read_json_file(path)?;
        trace!("read manifest with {} rule sets", manifest.rule_sets.len());
        Ok(manifest)
    }

    pub fn read_from(paths: &BuildPaths) -> Result<Self> {
        Self::read(&paths.matched_manifest())
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        utils::ensure_parent_dir(path)?;
        utils::write_json_file(self, path)?;
        trace!("wrote manifest with {} rule sets to {}", self.rule_sets.len(), path.display());
        Ok(())
    }

    /// The rule set for a compile unit, identified by its import path.
    pub fn find(&self, import_path: &str) -> Option<&RuleSet> {
        self.rule_sets.iter().find(|set| set.module_path == import_path)
    }

    pub fn is_empty(&self) -> bool {
        self.rule_sets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{FuncRule, RuleBase, RuleSet};

    fn sample_set() -> RuleSet {
        let mut set = RuleSet::new("github.com/demo/pkg");
        set.package_name = "pkg".into();
        set.bucket_mut(Path::new("/mod/pkg/a.go")).func_rules.push(FuncRule {
            base: RuleBase {
                name: "demo".into(),
                target: "github.com/demo/pkg".into(),
                version: "v1.0.0,v2.0.0".into(),
            },
            func: "Example".into(),
            recv: None,
            before: Some("B".into()),
            after: None,
            path: "otel/hooks/demo".into(),
        });
        set
    }

    #[test]
    fn round_trips_structurally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matched.json");
        let manifest = MatchedManifest::new(vec![sample_set()]);
        manifest.write(&path).unwrap();
        let loaded = MatchedManifest::read(&path).unwrap();
        assert_eq!(manifest, loaded);
        assert_eq!(loaded.format, MANIFEST_FORMAT_VERSION);
    }

    #[test]
    fn finds_by_import_path() {
        let manifest = MatchedManifest::new(vec![sample_set()]);
        assert!(manifest.find("github.com/demo/pkg").is_some());
        assert!(manifest.find("github.com/other").is_none());
    }
}
