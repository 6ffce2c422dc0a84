//! End-to-end rewrite scenarios, driven through the public interceptor
//! surface: a manifest on disk, a compile command line in, adjusted
//! arguments and rewritten sources out.

use otel_weave::{
    config::{BuildPaths, WeaveContext},
    instrument::GLOBALS_FILE,
    interceptor,
    manifest::MatchedManifest,
    rules::{FileRule, FuncRule, NewField, RuleBase, RuleSet, StructRule},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

const DEMO_SRC: &str = r#"package demo

type T struct {
	name string
}

func Example() {
	println("body")
}

func (t *T) M(s string, n int) (float32, error) {
	return 0, nil
}

func Foo(x int) int {
	return x
}

func Transform[V any](v V) V {
	return v
}
"#;

struct Project {
    _dir: tempfile::TempDir,
    ctx: WeaveContext,
    module_dir: PathBuf,
    work_dir: PathBuf,
}

impl Project {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("app");
        fs::create_dir_all(&root).unwrap();
        let ctx = WeaveContext::new(&root).unwrap();
        ctx.paths.create_all().unwrap();

        let module_dir = dir.path().join("mod").join("pkg@v1.2.3");
        fs::create_dir_all(&module_dir).unwrap();
        fs::write(module_dir.join("demo.go"), DEMO_SRC).unwrap();

        let work_dir = dir.path().join("go-work").join("b002");
        fs::create_dir_all(&work_dir).unwrap();
        Self { ctx, module_dir, work_dir, _dir: dir }
    }

    fn source(&self) -> PathBuf {
        self.module_dir.join("demo.go")
    }

    fn write_manifest(&self, set: RuleSet) {
        MatchedManifest::new(vec![set])
            .write(&self.ctx.paths.matched_manifest())
            .unwrap();
    }

    fn compile_args(&self) -> Vec<String> {
        [
            "/tool/compile",
            "-o",
            &format!("{}/_pkg_.a", self.work_dir.display()),
            "-p",
            "github.com/demo/pkg",
            "-complete",
            "-buildid",
            "abc/abc",
            &self.source().display().to_string(),
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn rewritten(&self) -> String {
        fs::read_to_string(self.work_dir.join("demo.go")).unwrap()
    }
}

fn base(name: &str) -> RuleBase {
    RuleBase { name: name.into(), target: "github.com/demo/pkg".into(), version: String::new() }
}

fn func_rule(
    name: &str,
    func: &str,
    recv: Option<&str>,
    before: Option<&str>,
    after: Option<&str>,
) -> FuncRule {
    FuncRule {
        base: base(name),
        func: func.into(),
        recv: recv.map(Into::into),
        before: before.map(Into::into),
        after: after.map(Into::into),
        path: "otel/hooks/demo".into(),
    }
}

fn set_with(project: &Project, rules: Vec<FuncRule>) -> RuleSet {
    let mut set = RuleSet::new("github.com/demo/pkg");
    set.package_name = "demo".into();
    for rule in rules {
        set.bucket_mut(&project.source()).func_rules.push(rule);
    }
    set
}

#[test]
fn before_and_after_hooks_on_plain_function() {
    let project = Project::new();
    let rule = func_rule("h1", "Example", None, Some("H1Before"), Some("H1After"));
    let suffix = rule.suffix();
    project.write_manifest(set_with(&project, vec![rule]));

    let args = project.compile_args();
    let out = interceptor::adjusted_args(&project.ctx, &args).unwrap();

    // flag discipline: -complete stripped, globals appended exactly once
    assert!(!out.contains(&"-complete".to_string()));
    assert_eq!(out.iter().filter(|a| a.ends_with(GLOBALS_FILE)).count(), 1);
    // the original module-cache source was substituted
    assert!(!out.contains(&project.source().display().to_string()));

    let content = project.rewritten();
    assert!(content.contains(&format!(
        "if ctx, skip := before_trampoline_Example_{suffix}(); skip {{"
    )));
    assert!(content.contains(&format!("defer after_trampoline_Example_{suffix}(ctx)")));
    assert!(content.contains("println(\"body\")"));

    let globals_path = out.iter().find(|a| a.ends_with(GLOBALS_FILE)).unwrap();
    let globals = fs::read_to_string(globals_path).unwrap();
    assert!(globals.contains("otel/hooks/demo.H1Before"));
    assert!(globals.contains("otel/hooks/demo.H1After"));
    assert!(globals.contains("type HookContext interface {"));

    // debug copies were mirrored under the build-temp tree
    assert!(project
        .ctx
        .paths
        .debug_copy("github.com/demo/pkg", "demo.go")
        .is_file());
}

#[test]
fn receiver_pointer_target_with_struct_rule() {
    let project = Project::new();
    let rule = func_rule("m", "M", Some("*T"), Some("MBefore"), Some("MAfter"));
    let suffix = rule.suffix();
    let mut set = set_with(&project, vec![rule]);
    set.bucket_mut(&project.source()).struct_rules.push(StructRule {
        base: base("field"),
        struct_name: "T".into(),
        new_fields: vec![NewField { name: "NewField".into(), ty: "string".into() }],
    });
    project.write_manifest(set);

    let args = project.compile_args();
    interceptor::adjusted_args(&project.ctx, &args).unwrap();
    let content = project.rewritten();

    // the receiver is the first forwarded value
    assert!(content
        .contains(&format!("before_trampoline_T_M_{suffix}(&t, &s, &n); skip {{")));
    // the relay takes every forwarded value by address; dereferenced, the
    // hook sees `*T` as its first post-context parameter
    assert!(content.contains(&format!(
        "func before_trampoline_T_M_{suffix}(param0 **T, param1 *string, param2 *int) (HookContext, bool)"
    )));
    let globals_path = project
        .ctx
        .paths
        .debug_copy("github.com/demo/pkg", GLOBALS_FILE);
    let globals = fs::read_to_string(globals_path).unwrap();
    assert!(globals.contains("func(ctx HookContext, p0 *T, p1 string, p2 int)"));
    // the struct rule landed on the same type
    assert!(content.contains("\tNewField string\n"));
}

#[test]
fn multiple_rules_nest_outer_first() {
    let project = Project::new();
    let outer = func_rule("outer", "Foo", None, Some("OuterBefore"), Some("OuterAfter"));
    let inner = func_rule("inner", "Foo", None, Some("InnerBefore"), Some("InnerAfter"));
    let (outer_suffix, inner_suffix) = (outer.suffix(), inner.suffix());
    project.write_manifest(set_with(&project, vec![outer, inner]));

    interceptor::adjusted_args(&project.ctx, &project.compile_args()).unwrap();
    let content = project.rewritten();

    // outer rule's before dispatch appears first; its defer wraps the
    // inner jump-if, so its after hook runs last
    let outer_at = content.find(&format!("before_trampoline_Foo_{outer_suffix}")).unwrap();
    let inner_at = content.find(&format!("before_trampoline_Foo_{inner_suffix}")).unwrap();
    assert!(outer_at < inner_at);
    let outer_defer =
        content.find(&format!("defer after_trampoline_Foo_{outer_suffix}")).unwrap();
    assert!(outer_defer < inner_at);
}

#[test]
fn generic_function_target() {
    let project = Project::new();
    let rule = func_rule("g", "Transform", None, Some("GBefore"), Some("GAfter"));
    let suffix = rule.suffix();
    project.write_manifest(set_with(&project, vec![rule]));

    interceptor::adjusted_args(&project.ctx, &project.compile_args()).unwrap();
    let content = project.rewritten();

    // relays are emitted with the target's type parameters and the jump
    // site instantiates them explicitly
    assert!(content.contains(&format!(
        "func before_trampoline_Transform_{suffix}[V any](param0 *V) (HookContext, bool)"
    )));
    assert!(content.contains(&format!("before_trampoline_Transform_{suffix}[V](&v)")));
    assert!(content.contains("panic(\"SetParam is unsupported for generic functions\")"));
    assert!(content.contains("panic(\"SetReturnVal is unsupported for generic functions\")"));
}

#[test]
fn file_rule_injects_new_source() {
    let project = Project::new();
    let lib = project.ctx.paths.resolve_hook_lib("otel/hooks/demo");
    fs::create_dir_all(&lib).unwrap();
    fs::write(
        lib.join("setup.go"),
        "package hooks\n\nfunc OtelSetup() string {\n\treturn \"ready\"\n}\n",
    )
    .unwrap();

    let mut set = RuleSet::new("github.com/demo/pkg");
    set.package_name = "demo".into();
    set.file_rules.push(FileRule {
        base: base("file"),
        file: "setup.go".into(),
        path: "otel/hooks/demo".into(),
    });
    project.write_manifest(set);

    let out = interceptor::adjusted_args(&project.ctx, &project.compile_args()).unwrap();
    let injected = out.iter().find(|a| a.ends_with("otel.setup.go")).unwrap();
    let content = fs::read_to_string(injected).unwrap();
    assert!(content.starts_with("package demo\n"));
    assert!(content.contains("func OtelSetup() string"));
    // no function rule fired, so -complete survives and no globals appear
    assert!(out.contains(&"-complete".to_string()));
    assert!(!out.iter().any(|a| a.ends_with(GLOBALS_FILE)));
}

#[test]
fn no_after_optimization_elides_dispatch() {
    let project = Project::new();
    let rule = func_rule("b", "Foo", None, Some("H"), None);
    let suffix = rule.suffix();
    project.write_manifest(set_with(&project, vec![rule]));

    interceptor::adjusted_args(&project.ctx, &project.compile_args()).unwrap();
    let content = project.rewritten();
    assert!(!content.contains("defer"));
    assert!(!content.contains(&format!("after_trampoline_Foo_{suffix}")));
    assert!(content.contains(&format!("before_trampoline_Foo_{suffix}(&x); skip {{")));
}

#[test]
fn non_compile_commands_pass_through() {
    let project = Project::new();
    project.write_manifest(set_with(
        &project,
        vec![func_rule("h1", "Example", None, Some("B"), None)],
    ));

    let link: Vec<String> = ["/tool/link", "-o", "/out/app", "-buildid", "x/x"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(interceptor::adjusted_args(&project.ctx, &link).unwrap(), link);

    let asm: Vec<String> =
        ["/tool/asm", "-p", "demo", "-o", "x.o", "a.s"].iter().map(|s| s.to_string()).collect();
    assert_eq!(interceptor::adjusted_args(&project.ctx, &asm).unwrap(), asm);
}

#[test]
fn unmatched_compile_unit_passes_through() {
    let project = Project::new();
    project.write_manifest(RuleSet::new("github.com/other/pkg"));
    let args = project.compile_args();
    assert_eq!(interceptor::adjusted_args(&project.ctx, &args).unwrap(), args);
}

#[test]
fn rewritten_output_is_reproducible() {
    let project = Project::new();
    let rule = func_rule("h1", "Example", None, Some("B"), Some("A"));
    project.write_manifest(set_with(&project, vec![rule]));

    interceptor::adjusted_args(&project.ctx, &project.compile_args()).unwrap();
    let first = project.rewritten();
    interceptor::adjusted_args(&project.ctx, &project.compile_args()).unwrap();
    let second = project.rewritten();
    similar_asserts::assert_eq!(first, second);
}

#[test]
fn interceptor_requires_work_dir_env() {
    // the interceptor locates the manifest through OTEL_WORK_DIR; nothing
    // else identifies the project from inside the build's scratch dirs
    let paths = BuildPaths::new(Path::new("/tmp/demo"));
    assert_eq!(paths.matched_manifest(), Path::new("/tmp/demo/.otel-build/matched.json"));
}
