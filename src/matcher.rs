//! Matches loaded rules against discovered dependencies at the AST level.

use crate::{
    ast::{self, ParseMode},
    resolver::Dependency,
    rules::{Rule, RuleSet},
};
use rayon::prelude::*;
use std::{collections::HashMap, sync::Mutex};

/// Matches every dependency against the rule index, one task per
/// dependency on a pool sized to the available hardware concurrency.
///
/// The resulting list is ordered by module path so the persisted manifest
/// is deterministic regardless of scheduling.
pub fn match_dependencies(
    rules: &HashMap<String, Vec<Rule>>,
    deps: &[Dependency],
) -> Vec<RuleSet> {
    let results = Mutex::new(Vec::new());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_cpus::get())
        .build()
        .expect("failed to build matcher pool");
    pool.install(|| {
        deps.par_iter().for_each(|dep| {
            let set = match_dependency(rules, dep);
            if !set.is_empty() {
                results.lock().expect("matcher mutex poisoned").push(set);
            }
        });
    });
    let mut sets = results.into_inner().expect("matcher mutex poisoned");
    sets.sort_by(|a, b| a.module_path.cmp(&b.module_path));
    sets
}

/// Matches one dependency: version-filter the rule bucket, attach file
/// rules, then probe each source file for the declarations the remaining
/// rules target.
fn match_dependency(rules: &HashMap<String, Vec<Rule>>, dep: &Dependency) -> RuleSet {
    let mut set = RuleSet::new(&dep.import_path);
    let Some(bucket) = rules.get(&dep.import_path) else {
        return set;
    };

    let applicable: Vec<&Rule> = bucket
        .iter()
        .filter(|rule| {
            // ranges were validated at load time
            let range = match rule.base().version_range() {
                Ok(range) => range,
                Err(_) => return false,
            };
            let ok = range.matches(dep.version.as_ref());
            if !ok {
                debug!(
                    "rule {} skipped for {} {:?}: version out of range",
                    rule.name(),
                    dep.import_path,
                    dep.version
                );
            }
            ok
        })
        .collect();
    if applicable.is_empty() {
        return set;
    }

    let mut decl_rules = Vec::new();
    for rule in applicable {
        match rule {
            Rule::File(r) => set.file_rules.push(r.clone()),
            other => decl_rules.push(other),
        }
    }

    for source in &dep.sources {
        if !decl_rules.is_empty() {
            let file = match ast::parser::parse_file(source, ParseMode::Declarations) {
                Ok(file) => file,
                Err(err) => {
                    warn!("skipping {}: {err}", source.display());
                    continue;
                }
            };
            if set.package_name.is_empty() {
                set.package_name = file.package.data.clone();
            }
            for rule in &decl_rules {
                match rule {
                    Rule::Func(r) => {
                        if file.find_func_decl(&r.func, r.recv.as_deref()).is_some() {
                            trace!("rule {} matched {}", r.base.name, source.display());
                            set.bucket_mut(source).func_rules.push(r.clone());
                        }
                    }
                    Rule::Raw(r) => {
                        if file.find_func_decl(&r.func, r.recv.as_deref()).is_some() {
                            set.bucket_mut(source).raw_rules.push(r.clone());
                        }
                    }
                    Rule::Struct(r) => {
                        if file.find_struct_decl(&r.struct_name).is_some() {
                            set.bucket_mut(source).struct_rules.push(r.clone());
                        }
                    }
                    Rule::File(_) => unreachable!("file rules were split off"),
                }
            }
        } else if set.package_name.is_empty() {
            // file-rule-only set still wants the package name
            if let Ok(file) = ast::parser::parse_file(source, ParseMode::PackageOnly) {
                set.package_name = file.package.data.clone();
            }
        }
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{FileRule, FuncRule, RuleBase, StructRule};
    use semver::Version;
    use std::{fs, path::PathBuf};

    const DEP_SRC: &str = r#"package dep

type Conn struct {
	addr string
}

func Dial(addr string) (*Conn, error) {
	return &Conn{addr: addr}, nil
}

func (c *Conn) Close() error {
	return nil
}
"#;

    fn base(name: &str, target: &str, version: &str) -> RuleBase {
        RuleBase { name: name.into(), target: target.into(), version: version.into() }
    }

    fn func_rule(name: &str, version: &str, func: &str, recv: Option<&str>) -> Rule {
        Rule::Func(FuncRule {
            base: base(name, "github.com/demo/dep", version),
            func: func.into(),
            recv: recv.map(Into::into),
            before: Some("Before".into()),
            after: Some("After".into()),
            path: "otel/hooks/demo".into(),
        })
    }

    fn write_dep(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("dep.go");
        fs::write(&path, DEP_SRC).unwrap();
        path
    }

    fn dep(source: PathBuf, version: &str) -> Dependency {
        Dependency {
            import_path: "github.com/demo/dep".into(),
            version: Some(Version::parse(version).unwrap()),
            sources: vec![source],
            cgo_sources: Default::default(),
        }
    }

    #[test]
    fn matches_function_and_method_rules() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dep(&dir);
        let rules = crate::rules::index_by_target(vec![
            func_rule("dial", "", "Dial", None),
            func_rule("close", "", "Close", Some("*Conn")),
            func_rule("close-by-value", "", "Close", Some("Conn")),
            func_rule("missing", "", "Absent", None),
        ]);
        let sets = match_dependencies(&rules, &[dep(source.clone(), "1.2.3")]);
        assert_eq!(sets.len(), 1);
        let set = &sets[0];
        assert_eq!(set.package_name, "dep");
        assert_eq!(set.files.len(), 1);
        assert_eq!(set.files[0].path, source);
        let names: Vec<_> =
            set.files[0].func_rules.iter().map(|r| r.base.name.as_str()).collect();
        assert_eq!(names, vec!["dial", "close"]);
    }

    #[test]
    fn version_filter_applies() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dep(&dir);
        let rules = crate::rules::index_by_target(vec![
            func_rule("in-range", "v1.0.0,v2.0.0", "Dial", None),
            func_rule("below", "v1.3.0", "Dial", None),
            func_rule("above", "v0.1.0,v1.0.0", "Dial", None),
        ]);
        let sets = match_dependencies(&rules, &[dep(source, "1.2.3")]);
        assert_eq!(sets.len(), 1);
        let names: Vec<_> =
            sets[0].files[0].func_rules.iter().map(|r| r.base.name.as_str()).collect();
        assert_eq!(names, vec!["in-range"]);
    }

    #[test]
    fn struct_and_file_rules_attach() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dep(&dir);
        let rules = crate::rules::index_by_target(vec![
            Rule::Struct(StructRule {
                base: base("field", "github.com/demo/dep", ""),
                struct_name: "Conn".into(),
                new_fields: vec![crate::rules::NewField {
                    name: "NewField".into(),
                    ty: "string".into(),
                }],
            }),
            Rule::File(FileRule {
                base: base("file", "github.com/demo/dep", ""),
                file: "setup.go".into(),
                path: "otel/hooks/demo".into(),
            }),
        ]);
        let sets = match_dependencies(&rules, &[dep(source, "1.2.3")]);
        assert_eq!(sets[0].file_rules.len(), 1);
        assert_eq!(sets[0].files[0].struct_rules.len(), 1);
        assert_eq!(sets[0].package_name, "dep");
    }

    #[test]
    fn unrelated_dependency_matches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dep(&dir);
        let rules = crate::rules::index_by_target(vec![func_rule("dial", "", "Dial", None)]);
        let other = Dependency {
            import_path: "github.com/other/pkg".into(),
            version: None,
            sources: vec![source],
            cgo_sources: Default::default(),
        };
        assert!(match_dependencies(&rules, &[other]).is_empty());
    }

    #[test]
    fn output_is_sorted_by_module_path() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_dep(&dir);
        let mut rule_b = func_rule("b", "", "Dial", None);
        if let Rule::Func(r) = &mut rule_b {
            r.base.target = "b/pkg".into();
        }
        let mut rule_a = func_rule("a", "", "Dial", None);
        if let Rule::Func(r) = &mut rule_a {
            r.base.target = "a/pkg".into();
        }
        let rules = crate::rules::index_by_target(vec![rule_a, rule_b]);
        let mk = |path: &str| Dependency {
            import_path: path.into(),
            version: None,
            sources: vec![source.clone()],
            cgo_sources: Default::default(),
        };
        let sets = match_dependencies(&rules, &[mk("b/pkg"), mk("a/pkg")]);
        let paths: Vec<_> = sets.iter().map(|s| s.module_path.as_str()).collect();
        assert_eq!(paths, vec!["a/pkg", "b/pkg"]);
    }
}
