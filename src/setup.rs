//! Setup phase and the instrumented-build driver.
//!
//! Setup discovers the build's dependency graph, matches rules against it
//! and flushes the matched manifest; the `go` driver wraps a real build
//! with module-file backups, the injected `-toolexec` hook and an isolated
//! build cache.

use crate::{
    config::{WeaveContext, WORK_DIR_ENV},
    error::{Result, WeaveError},
    manifest::MatchedManifest,
    matcher, resolver,
    rules::{self, Rule},
    utils,
};
use std::{path::PathBuf, process::Command};

/// Module files snapshotted before setup mutates anything and restored at
/// driver teardown.
const MODULE_FILES: &[&str] = &["go.mod", "go.sum"];

#[derive(Clone, Debug, Default)]
pub struct SetupOptions {
    /// Additional user rule file, merged with the bundled rules.
    pub rules_file: Option<PathBuf>,
    /// Arguments forwarded to the dry build (package patterns etc.).
    pub build_args: Vec<String>,
}

/// Runs the setup phase: discover dependencies, match rules, persist the
/// manifest. Returns the manifest for callers that want to inspect it.
pub fn run_setup(ctx: &WeaveContext, opts: &SetupOptions) -> Result<MatchedManifest> {
    ctx.paths.create_all()?;

    let rules = rules::parse::load_all(opts.rules_file.as_deref())?;
    validate_hook_staging(ctx, &rules)?;
    let index = rules::index_by_target(rules);

    let deps = resolver::discover(ctx, &opts.build_args)?;
    let sets = matcher::match_dependencies(&index, &deps);
    info!("matched {} compile units", sets.len());

    let manifest = MatchedManifest::new(sets);
    manifest.write(&ctx.paths.matched_manifest())?;
    Ok(manifest)
}

/// Every hook library a rule references must be present in the staged hook
/// tree; anything else is a configuration error.
fn validate_hook_staging(ctx: &WeaveContext, rules: &[Rule]) -> Result<()> {
    for rule in rules {
        let hook_path = match rule {
            Rule::Func(r) => Some(&r.path),
            Rule::File(r) => Some(&r.path),
            _ => None,
        };
        if let Some(hook_path) = hook_path {
            let staged = ctx.paths.resolve_hook_lib(hook_path);
            if !staged.is_dir() {
                return Err(WeaveError::msg(format!(
                    "rule {}: hook library {hook_path} is not staged under {}",
                    rule.name(),
                    ctx.paths.hook_dir().display()
                )));
            }
        }
    }
    Ok(())
}

/// Wraps `go build`: back up module files, run setup, run the real build
/// with this executable injected as the toolexec hook, restore the module
/// files unconditionally.
pub fn run_go(ctx: &WeaveContext, opts: &SetupOptions) -> Result<i32> {
    ctx.paths.create_all()?;
    backup_module_files(ctx)?;
    let outcome = setup_and_build(ctx, opts);
    restore_module_files(ctx);
    outcome
}

fn setup_and_build(ctx: &WeaveContext, opts: &SetupOptions) -> Result<i32> {
    run_setup(ctx, opts)?;

    let toolexec = format!("{} toolexec", ctx.self_exe.display());
    let mut cmd = Command::new(&ctx.go_bin);
    cmd.arg("build")
        .arg(format!("-toolexec={toolexec}"))
        .args(["-a", "-work"])
        .args(&opts.build_args)
        .current_dir(&ctx.paths.work_dir)
        .env(WORK_DIR_ENV, &ctx.paths.work_dir)
        // instrumented artifacts must not pollute the global cache
        .env("GOCACHE", ctx.paths.go_cache());
    debug!("running instrumented build: {cmd:?}");
    let status = cmd
        .status()
        .map_err(|err| WeaveError::io(err, &ctx.go_bin))?;
    if !status.success() {
        return Err(WeaveError::msg(format!("instrumented build failed: {status}")));
    }
    Ok(status.code().unwrap_or(0))
}

fn backup_module_files(ctx: &WeaveContext) -> Result<()> {
    let backup = ctx.paths.backup_dir();
    for name in MODULE_FILES {
        let source = ctx.paths.work_dir.join(name);
        if source.is_file() {
            utils::copy_file(&source, &backup.join(name))?;
            trace!("backed up {name}");
        }
    }
    Ok(())
}

/// Restores whatever was backed up. Runs on both success and failure.
fn restore_module_files(ctx: &WeaveContext) {
    let backup = ctx.paths.backup_dir();
    for name in MODULE_FILES {
        let saved = backup.join(name);
        if saved.is_file() {
            if let Err(err) = utils::copy_file(&saved, &ctx.paths.work_dir.join(name)) {
                error!("failed to restore {name}: {err}");
            }
        }
    }
}

/// Build metadata for `version`, stamped at compile time when available.
pub fn version_line(verbose: bool, ctx: &WeaveContext) -> String {
    let mut line = format!(
        "otel-weave {} (commit {}, built {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("OTEL_WEAVE_COMMIT").unwrap_or("unknown"),
        option_env!("OTEL_WEAVE_BUILD_TIME").unwrap_or("unknown"),
    );
    if verbose {
        let toolchain = Command::new(&ctx.go_bin)
            .arg("version")
            .output()
            .ok()
            .and_then(|out| String::from_utf8(out.stdout).ok())
            .and_then(|out| {
                utils::RE_GO_VERSION
                    .captures(&out)
                    .and_then(|cap| cap.name("version").map(|m| m.as_str().to_string()))
            })
            .unwrap_or_else(|| "unknown".to_string());
        line.push_str(&format!("\ntoolchain: {toolchain}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};

    fn ctx(dir: &Path) -> WeaveContext {
        WeaveContext::new(dir).unwrap()
    }

    #[test]
    fn backs_up_and_restores_module_files() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        ctx.paths.create_all().unwrap();
        fs::write(dir.path().join("go.mod"), "module demo\n").unwrap();

        backup_module_files(&ctx).unwrap();
        assert!(ctx.paths.backup_dir().join("go.mod").is_file());
        assert!(!ctx.paths.backup_dir().join("go.sum").exists());

        // simulate a setup mutation, then teardown
        fs::write(dir.path().join("go.mod"), "module demo\nreplace x => y\n").unwrap();
        restore_module_files(&ctx);
        let restored = fs::read_to_string(dir.path().join("go.mod")).unwrap();
        assert_eq!(restored, "module demo\n");
    }

    #[test]
    fn missing_hook_staging_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        ctx.paths.create_all().unwrap();
        let rules = vec![Rule::Func(crate::rules::FuncRule {
            base: crate::rules::RuleBase {
                name: "demo".into(),
                target: "github.com/demo/pkg".into(),
                version: String::new(),
            },
            func: "Example".into(),
            recv: None,
            before: Some("B".into()),
            after: None,
            path: "otel/hooks/demo".into(),
        })];
        assert!(validate_hook_staging(&ctx, &rules).is_err());

        fs::create_dir_all(ctx.paths.resolve_hook_lib("otel/hooks/demo")).unwrap();
        assert!(validate_hook_staging(&ctx, &rules).is_ok());
    }

    #[test]
    fn version_line_mentions_package_version() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(dir.path());
        let line = version_line(false, &ctx);
        assert!(line.contains(env!("CARGO_PKG_VERSION")));
    }
}
