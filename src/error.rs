use semver::Version;
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;

pub type Result<T, E = WeaveError> = std::result::Result<T, E>;

/// Various error types
#[derive(Debug, Error)]
pub enum WeaveError {
    /// Errors related to the Go toolchain executable itself
    #[error("go exited with {0}\n{1}")]
    GoError(std::process::ExitStatus, String),
    #[error("invalid UTF-8 in go output")]
    InvalidUtf8,
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    SerdeYaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    SemverError(#[from] semver::Error),
    #[error("invalid version range {0:?}")]
    VersionRange(String),
    #[error("failed to parse {}:{line}: {message}", .path.display())]
    Parse { path: PathBuf, line: u32, message: String },
    /// A rule referenced a declaration the target package does not contain.
    #[error("rule {rule}: no {kind} named {name:?} in {}", .path.display())]
    TargetNotFound { rule: String, kind: &'static str, name: String, path: PathBuf },
    /// The hook's signature is incompatible with the target function.
    #[error("hook {hook} does not match {target}: {message}")]
    HookMismatch { hook: String, target: String, message: String },
    #[error(transparent)]
    Io(#[from] WeaveIoError),
    /// General purpose message
    #[error("{0}")]
    Message(String),
}

impl WeaveError {
    pub fn io(err: io::Error, path: impl Into<PathBuf>) -> Self {
        WeaveIoError::new(err, path).into()
    }

    pub fn msg(msg: impl std::fmt::Display) -> Self {
        WeaveError::Message(msg.to_string())
    }

    /// Create an error from the Go toolchain's output, preferring stderr.
    pub(crate) fn go_output(output: &std::process::Output) -> Self {
        let mut msg = String::from_utf8_lossy(&output.stderr);
        let mut trimmed = msg.trim();
        if trimmed.is_empty() {
            msg = String::from_utf8_lossy(&output.stdout);
            trimmed = msg.trim();
            if trimmed.is_empty() {
                trimmed = "<empty output>";
            }
        }
        WeaveError::GoError(output.status, trimmed.into())
    }

    pub(crate) fn parse(path: &Path, line: u32, message: impl Into<String>) -> Self {
        WeaveError::Parse { path: path.to_path_buf(), line, message: message.into() }
    }
}

#[derive(Debug, Error)]
#[error("\"{}\": {io}", self.path.display())]
pub struct WeaveIoError {
    io: io::Error,
    path: PathBuf,
}

impl WeaveIoError {
    pub fn new(io: io::Error, path: impl Into<PathBuf>) -> Self {
        Self { io, path: path.into() }
    }

    /// The path at which the error occurred
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying `io::Error`
    pub fn source(&self) -> &io::Error {
        &self.io
    }
}

impl From<WeaveIoError> for io::Error {
    fn from(err: WeaveIoError) -> Self {
        err.io
    }
}

/// A version range attached to a rule.
///
/// Either empty (matches everything), a bare minimum version, or an
/// `"<inclusive>,<exclusive>"` pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VersionRange {
    Any,
    AtLeast(Version),
    Between(Version, Version),
}

impl VersionRange {
    /// Parses a rule version string, accepting a leading `v` on each bound.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(VersionRange::Any);
        }
        let parse_one = |v: &str| -> Result<Version> {
            Version::parse(v.trim().trim_start_matches('v')).map_err(Into::into)
        };
        match s.split_once(',') {
            None => Ok(VersionRange::AtLeast(parse_one(s)?)),
            Some((lo, hi)) => {
                if hi.contains(',') {
                    return Err(WeaveError::VersionRange(s.to_string()));
                }
                Ok(VersionRange::Between(parse_one(lo)?, parse_one(hi)?))
            }
        }
    }

    /// Whether a dependency version satisfies this range.
    ///
    /// A constrained range never matches an unknown version.
    pub fn matches(&self, version: Option<&Version>) -> bool {
        match self {
            VersionRange::Any => true,
            VersionRange::AtLeast(lo) => version.map_or(false, |v| v >= lo),
            VersionRange::Between(lo, hi) => version.map_or(false, |v| v >= lo && v < hi),
        }
    }
}
