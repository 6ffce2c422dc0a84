//! Struct-field injection, raw-code splices and whole-file injection.

use crate::{
    ast::{self, GoFile, ParseMode},
    error::{Result, WeaveError},
    rules::{FileRule, RawRule, StructRule},
    utils,
};
use std::path::{Path, PathBuf};

/// Computes the splice appending the rule's fields to the target struct's
/// field list.
pub fn struct_insertion(file: &GoFile, rule: &StructRule) -> Result<(usize, usize, String)> {
    let Some(decl) = file.find_struct_decl(&rule.struct_name) else {
        return Err(WeaveError::TargetNotFound {
            rule: rule.base.name.clone(),
            kind: "struct",
            name: rule.struct_name.clone(),
            path: file.path.clone(),
        });
    };
    let body = decl.struct_body.clone().expect("struct decls always carry a body span");
    // insert right before the closing brace
    let at = body.end - 1;
    let mut text = String::new();
    if !file.src[body.start..at].ends_with('\n') {
        text.push('\n');
    }
    for field in &rule.new_fields {
        text.push('\t');
        text.push_str(&ast::node::struct_field(&field.name, &field.ty));
        text.push('\n');
    }
    Ok((at, at, text))
}

/// Computes the splice prepending a validated snippet to the target
/// function's body. The caller has already renamed anonymous return
/// values so the snippet can reference them.
pub fn raw_insertion(rule: &RawRule, body_start: usize) -> Result<(usize, usize, String)> {
    ast::check_stmt_snippet(&rule.raw).map_err(|err| {
        WeaveError::msg(format!("rule {}: invalid raw snippet: {err}", rule.base.name))
    })?;
    // no trailing newline: the original body text after the brace starts
    // with one
    let at = body_start + 1;
    let text = rule
        .raw
        .trim_end()
        .lines()
        .map(|line| format!("\n\t{line}"))
        .collect::<String>();
    Ok((at, at, text))
}

/// Resolves a file rule inside the staged hook tree, rewrites its package
/// clause to the target package and writes it under `out_dir` as
/// `otel.<stem>.go`. Returns the written path.
pub fn inject_file(
    staged_lib: &Path,
    rule: &FileRule,
    package_name: &str,
    out_dir: &Path,
) -> Result<PathBuf> {
    let source = staged_lib.join(&rule.file);
    if !source.is_file() {
        return Err(WeaveError::TargetNotFound {
            rule: rule.base.name.clone(),
            kind: "file",
            name: rule.file.clone(),
            path: staged_lib.to_path_buf(),
        });
    }
    let file = ast::parser::parse_file(&source, ParseMode::PackageOnly)?;
    let updates = vec![(
        file.package.span.start,
        file.package.span.end,
        package_name.to_string(),
    )];
    let content = utils::apply_updates(&file.src, updates);

    let stem = Path::new(&rule.file)
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| WeaveError::msg(format!("rule {}: bad file name", rule.base.name)))?;
    let out_path = out_dir.join(format!("otel.{stem}.go"));
    utils::write_file(&out_path, &content)?;
    debug!("injected {} as {}", rule.file, out_path.display());
    Ok(out_path)
}
