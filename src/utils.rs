//! Utility functions

use crate::error::{Result, WeaveError, WeaveIoError};
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

/// A regex that matches the `@vX.Y.Z(-pre)?/` segment the module cache embeds
/// in dependency source paths, with the named group "version".
pub static RE_MODULE_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@v(?P<version>\d+\.\d+\.\d+(?:-[0-9A-Za-z.-]+)?)[/\\]").unwrap()
});

/// A regex that matches a go toolchain version line, e.g.
/// `go version go1.22.4 linux/amd64` with the named group "version".
pub static RE_GO_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"go version (?P<version>go\S+)").unwrap());

/// Extension acceptable by the go compiler.
pub const GO_EXTENSION: &str = "go";

/// Suffix of the generated files cgo resolves back from.
pub const CGO_GEN_SUFFIX: &str = ".cgo1.go";

/// Extracts the module version embedded in a module-cache source path.
///
/// `/go/pkg/mod/github.com/x/y@v1.2.3/file.go` -> `1.2.3`
pub fn module_version(path: &Path) -> Option<Version> {
    let path = path.to_string_lossy();
    let cap = RE_MODULE_VERSION.captures(&path)?;
    Version::parse(cap.name("version")?.as_str()).ok()
}

/// Returns `true` if the path has a `.go` extension.
pub fn is_go_source(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == GO_EXTENSION)
}

/// Best-effort stable form of a path, used when comparing manifest entries
/// against compile arguments and when anchoring the build-temp area.
///
/// Existing paths get symlinks and `.`/`..` segments resolved (without the
/// `\\?\` prefix on Windows); a path that does not exist on this machine
/// comes back lexically unchanged, so both sides of a comparison keep the
/// spelling they started with.
pub fn canonicalized(path: impl Into<PathBuf>) -> PathBuf {
    let path = path.into();
    match dunce::canonicalize(&path) {
        Ok(resolved) => resolved,
        Err(_) => path,
    }
}

pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|err| WeaveError::io(err, path))
}

pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read_to_string(path)?;
    serde_json::from_str(&content).map_err(Into::into)
}

/// Serializes the provided value to JSON and writes it to a file.
pub fn write_json_file<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let file = fs::File::create(path).map_err(|err| WeaveError::io(err, path))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush().map_err(|e| WeaveError::io(e, path))
}

/// Makes sure the directory a file is about to land in exists. A bare file
/// name has no parent to create.
pub fn ensure_parent_dir(file: &Path) -> Result<()> {
    let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    fs::create_dir_all(parent).map_err(|err| WeaveError::io(err, parent))
}

pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    ensure_parent_dir(path)?;
    fs::write(path, contents).map_err(|err| WeaveError::io(err, path))
}

pub fn copy_file(from: &Path, to: &Path) -> Result<(), WeaveIoError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|err| WeaveIoError::new(err, parent))?;
    }
    fs::copy(from, to).map_err(|err| WeaveIoError::new(err, to))?;
    Ok(())
}

/// Replaces every character that cannot appear in a Go identifier with `_`.
pub fn sanitize_ident(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' }).collect()
}

/// Applies `(start, end, replacement)` splices to `content`.
///
/// Edits must not overlap; they are applied back to front so earlier offsets
/// stay valid.
pub fn apply_updates(content: &str, mut updates: Vec<(usize, usize, String)>) -> String {
    updates.sort_by_key(|(start, end, _)| (*start, *end));
    let mut out = content.to_string();
    for (start, end, value) in updates.into_iter().rev() {
        out.replace_range(start..end, &value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_module_version() {
        let path = Path::new("/home/u/go/pkg/mod/github.com/gin-gonic/gin@v1.9.1/gin.go");
        assert_eq!(module_version(path), Some(Version::new(1, 9, 1)));

        let pre = Path::new("/go/pkg/mod/golang.org/x/tools@v0.1.0-rc.2/cover/cover.go");
        assert_eq!(module_version(pre), Some(Version::parse("0.1.0-rc.2").unwrap()));

        assert_eq!(module_version(Path::new("/src/demo/main.go")), None);
    }

    #[test]
    fn sanitizes_idents() {
        assert_eq!(sanitize_ident("*T"), "_T");
        assert_eq!(sanitize_ident("net/http.Get"), "net_http_Get");
    }

    #[test]
    fn ensure_parent_dir_handles_nesting_and_bare_names() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("c.json");
        ensure_parent_dir(&nested).unwrap();
        assert!(nested.parent().unwrap().is_dir());
        // a bare file name is written into the current directory as-is
        ensure_parent_dir(Path::new("bare.go")).unwrap();
    }

    #[test]
    fn canonicalized_leaves_missing_paths_alone() {
        let missing = Path::new("/definitely/not/here.go");
        assert_eq!(canonicalized(missing), missing);

        let dir = tempfile::tempdir().unwrap();
        assert!(canonicalized(dir.path().join(".")).is_dir());
    }

    #[test]
    fn applies_updates_in_reverse() {
        let content = "package demo";
        let updates =
            vec![(0, 7, "pkg".to_string()), (8, 12, "x".to_string())];
        assert_eq!(apply_updates(content, updates), "pkg x");
    }
}
