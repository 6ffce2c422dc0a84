//! Declarative instrumentation rules and the per-compile-unit rule sets
//! the matcher produces from them.

use crate::error::{Result, VersionRange, WeaveError};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod parse;
pub use parse::{index_by_target, load_builtin, load_rules_file};

/// Fields shared by every rule variant.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RuleBase {
    /// Unique rule name.
    pub name: String,
    /// Import path of the package the rule instruments.
    pub target: String,
    /// Version range: empty, a bare minimum, or `"<inclusive>,<exclusive>"`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl RuleBase {
    pub fn version_range(&self) -> Result<VersionRange> {
        VersionRange::parse(&self.version)
    }
}

/// Injects before/after hooks at entry and exit of a function.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FuncRule {
    #[serde(flatten)]
    pub base: RuleBase,
    pub func: String,
    /// Receiver pattern (`*T`), matched on the unqualified base name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Import path of the hook library inside the staged hook tree.
    pub path: String,
}

impl FuncRule {
    /// Stable per-rule suffix used to keep generated names unique per
    /// (target, rule) pair.
    pub fn suffix(&self) -> String {
        rule_suffix(self)
    }
}

/// Appends fields to a struct type declaration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StructRule {
    #[serde(flatten)]
    pub base: RuleBase,
    #[serde(rename = "struct")]
    pub struct_name: String,
    pub new_fields: Vec<NewField>,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewField {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// Splices a source-level snippet at a function's entry.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RawRule {
    #[serde(flatten)]
    pub base: RuleBase,
    pub func: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recv: Option<String>,
    pub raw: String,
}

/// Introduces a whole new source file into the target package.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileRule {
    #[serde(flatten)]
    pub base: RuleBase,
    pub file: String,
    /// Import path of the hook library the file is resolved in.
    pub path: String,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rule {
    Func(FuncRule),
    Struct(StructRule),
    Raw(RawRule),
    File(FileRule),
}

impl Rule {
    pub fn base(&self) -> &RuleBase {
        match self {
            Rule::Func(r) => &r.base,
            Rule::Struct(r) => &r.base,
            Rule::Raw(r) => &r.base,
            Rule::File(r) => &r.base,
        }
    }

    pub fn name(&self) -> &str {
        &self.base().name
    }

    pub fn target(&self) -> &str {
        &self.base().target
    }

    /// Checks the fields that can be validated without looking at the
    /// target sources.
    pub fn validate(&self) -> Result<()> {
        let base = self.base();
        if base.name.is_empty() {
            return Err(WeaveError::msg("rule without a name"));
        }
        if base.target.is_empty() {
            return Err(WeaveError::msg(format!("rule {}: empty target", base.name)));
        }
        base.version_range()?;
        match self {
            Rule::Func(r) => {
                if r.func.is_empty() {
                    return Err(WeaveError::msg(format!("rule {}: empty func", base.name)));
                }
                if r.before.is_none() && r.after.is_none() {
                    return Err(WeaveError::msg(format!(
                        "rule {}: needs at least one of before/after",
                        base.name
                    )));
                }
                if r.path.is_empty() {
                    return Err(WeaveError::msg(format!("rule {}: empty hook path", base.name)));
                }
            }
            Rule::Struct(r) => {
                if r.struct_name.is_empty() || r.new_fields.is_empty() {
                    return Err(WeaveError::msg(format!(
                        "rule {}: struct rule needs a struct and new fields",
                        base.name
                    )));
                }
            }
            Rule::Raw(r) => {
                if r.func.is_empty() || r.raw.is_empty() {
                    return Err(WeaveError::msg(format!(
                        "rule {}: raw rule needs func and raw",
                        base.name
                    )));
                }
            }
            Rule::File(r) => {
                if r.file.is_empty() || r.path.is_empty() {
                    return Err(WeaveError::msg(format!(
                        "rule {}: file rule needs file and path",
                        base.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Hash of a rule's serialized form, truncated for readability. Stable
/// across runs so generated names are reproducible.
fn rule_suffix<T: Serialize>(rule: &T) -> String {
    let serialized = serde_json::to_string(rule).expect("rules always serialize");
    let digest = Md5::digest(serialized.as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// All rules matched for one compile unit, bucketed per source file.
///
/// Buckets keep insertion order; it determines the order rules are applied
/// in and, for chained jump-ifs, the before/after call order observed at
/// runtime.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Import path of the compile unit.
    pub module_path: String,
    /// Package name, filled on first parse of any source file.
    #[serde(default)]
    pub package_name: String,
    pub files: Vec<FileBucket>,
    pub file_rules: Vec<FileRule>,
}

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct FileBucket {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub func_rules: Vec<FuncRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub struct_rules: Vec<StructRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_rules: Vec<RawRule>,
}

impl FileBucket {
    pub fn is_empty(&self) -> bool {
        self.func_rules.is_empty() && self.struct_rules.is_empty() && self.raw_rules.is_empty()
    }
}

impl RuleSet {
    pub fn new(module_path: impl Into<String>) -> Self {
        Self { module_path: module_path.into(), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.file_rules.is_empty() && self.files.iter().all(|b| b.is_empty())
    }

    /// Bucket for a source file, created in insertion order on first use.
    pub fn bucket_mut(&mut self, path: &Path) -> &mut FileBucket {
        if let Some(idx) = self.files.iter().position(|b| b.path == path) {
            return &mut self.files[idx];
        }
        self.files.push(FileBucket { path: path.to_path_buf(), ..Default::default() });
        self.files.last_mut().expect("just pushed")
    }
}
