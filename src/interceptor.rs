//! Toolexec interceptor entry.
//!
//! Invoked once per subprocess the build driver spawns. Compile commands
//! for rule targets are rewritten and re-issued with adjusted arguments;
//! everything else passes through untouched.

use crate::{
    config::WeaveContext,
    error::{Result, WeaveError},
    instrument::{RewriteResult, UnitRewriter},
    manifest::MatchedManifest,
    resolver,
    utils,
};
use std::{
    path::PathBuf,
    process::Command,
};

/// A compile unit reconstructed from the subprocess argument list. Not a
/// stored entity; it lives for one interception.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompileUnit {
    pub import_path: String,
    pub output: PathBuf,
    /// The build driver's scratch directory for this unit, inferred from
    /// the output path. Rewritten files are placed here.
    pub work_dir: PathBuf,
    pub sources: Vec<PathBuf>,
}

impl CompileUnit {
    /// Reconstructs the unit from a classified compile command line.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let words: Vec<&str> = args.iter().map(String::as_str).collect();
        let import_path = resolver::flag_value(&words, "-p")
            .ok_or_else(|| WeaveError::msg("compile command without -p"))?
            .to_string();
        let output = PathBuf::from(
            resolver::flag_value(&words, "-o")
                .ok_or_else(|| WeaveError::msg("compile command without -o"))?,
        );
        let work_dir = output
            .parent()
            .ok_or_else(|| WeaveError::msg("compile output has no parent directory"))?
            .to_path_buf();
        let sources = args
            .iter()
            .filter(|arg| arg.ends_with(".go"))
            .map(PathBuf::from)
            .collect();
        Ok(Self { import_path, output, work_dir, sources })
    }
}

/// Runs the interceptor on a toolexec command line and returns the child's
/// exit code.
pub fn run(ctx: &WeaveContext, args: &[String]) -> Result<i32> {
    if args.is_empty() {
        return Err(WeaveError::msg("toolexec invoked without a command"));
    }
    let adjusted = adjusted_args(ctx, args)?;
    exec(&adjusted)
}

/// Computes the outgoing argument list: identical to the input for
/// non-compile commands and units without matched rules.
pub fn adjusted_args(ctx: &WeaveContext, args: &[String]) -> Result<Vec<String>> {
    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    if !resolver::is_compile_command(&words) {
        trace!("pass-through: {}", words.first().unwrap_or(&""));
        return Ok(args.to_vec());
    }

    let unit = CompileUnit::from_args(args)?;
    let manifest = MatchedManifest::read_from(&ctx.paths)?;
    let Some(set) = manifest.find(&unit.import_path) else {
        trace!("no rules for {}", unit.import_path);
        return Ok(args.to_vec());
    };
    debug!("instrumenting {} ({} source files)", unit.import_path, unit.sources.len());

    let rewriter = UnitRewriter::new(
        &ctx.paths,
        set,
        &unit.import_path,
        unit.sources.clone(),
        &unit.work_dir,
    )?;
    let result = rewriter.rewrite()?;
    Ok(apply_result(args, &result))
}

/// Splices a rewrite outcome into the argument list: path substitutions in
/// place, injected files appended, `-complete` stripped once function
/// rules fired (the globals file carries body-less declarations).
fn apply_result(args: &[String], result: &RewriteResult) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len() + result.additions.len());
    for arg in args {
        if result.fired && arg == "-complete" {
            continue;
        }
        let replaced = result
            .replacements
            .iter()
            .find(|(original, _)| original.as_os_str() == arg.as_str())
            .map(|(_, new)| new.to_string_lossy().into_owned());
        out.push(replaced.unwrap_or_else(|| arg.clone()));
    }
    out.extend(result.additions.iter().map(|p| p.to_string_lossy().into_owned()));
    out
}

/// Re-execs the (possibly adjusted) subprocess, inheriting stdio.
fn exec(args: &[String]) -> Result<i32> {
    let program = &args[0];
    trace!("exec {:?}", args);
    let status = Command::new(program)
        .args(&args[1..])
        .status()
        .map_err(|err| WeaveError::io(err, utils::canonicalized(program)))?;
    Ok(status.code().unwrap_or(1))
}
