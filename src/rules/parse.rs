//! Rule loading: the YAML bundled with the tool plus any user-provided
//! file, validated and keyed by target import path.

use super::Rule;
use crate::error::{Result, WeaveError};
use serde::Deserialize;
use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

/// Rules bundled with the tool.
const BUILTIN_RULES: &str = include_str!("builtin.yaml");

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<Rule>,
}

pub fn load_builtin() -> Result<Vec<Rule>> {
    parse_rules(BUILTIN_RULES)
}

pub fn load_rules_file(path: &Path) -> Result<Vec<Rule>> {
    let content = crate::utils::read_to_string(path)?;
    parse_rules(&content)
}

fn parse_rules(content: &str) -> Result<Vec<Rule>> {
    let file: RuleFile = serde_yaml::from_str(content)?;
    for rule in &file.rules {
        rule.validate()?;
    }
    Ok(file.rules)
}

/// Loads builtin + user rules and enforces name uniqueness across both.
pub fn load_all(user_rules: Option<&Path>) -> Result<Vec<Rule>> {
    let mut rules = load_builtin()?;
    if let Some(path) = user_rules {
        debug!("loading user rules from {}", path.display());
        rules.extend(load_rules_file(path)?);
    }
    let mut seen = HashSet::new();
    for rule in &rules {
        if !seen.insert(rule.name()) {
            return Err(WeaveError::msg(format!("duplicate rule name {:?}", rule.name())));
        }
    }
    trace!("loaded {} rules", rules.len());
    Ok(rules)
}

/// Keys rules by their target import path for O(1) bucket lookup during
/// matching.
pub fn index_by_target(rules: Vec<Rule>) -> HashMap<String, Vec<Rule>> {
    let mut index: HashMap<String, Vec<Rule>> = HashMap::new();
    for rule in rules {
        index.entry(rule.target().to_string()).or_default().push(rule);
    }
    index
}
