use crate::error::{Result, WeaveError};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Name of the build-temp directory created under the working directory.
pub const BUILD_TEMP_DIR: &str = ".otel-build";

/// Environment variable the interceptor uses to locate the working directory.
pub const WORK_DIR_ENV: &str = "OTEL_WORK_DIR";

/// The layout of the build-temp area.
///
/// All paths are derived from the working directory:
///
/// ```text
/// .otel-build/
///   debug.log       textual log, created in setup/go phases
///   build-plan.log  dry-run command stream
///   backup/         pre-setup module-file snapshot
///   matched.json    matched rule sets, cross-phase
///   pkg/            staged hook library sources
///   gocache/        isolated build cache
///   debug/<pkg>/    copies of every file we wrote
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildPaths {
    /// Project working directory (where `go.mod` lives).
    pub work_dir: PathBuf,
    /// Root of the build-temp area.
    pub build_temp: PathBuf,
}

impl BuildPaths {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = crate::utils::canonicalized(work_dir.into());
        let build_temp = work_dir.join(BUILD_TEMP_DIR);
        Self { work_dir, build_temp }
    }

    /// Resolves the working directory from [`WORK_DIR_ENV`].
    ///
    /// The interceptor runs from the build driver's scratch directories, so
    /// the environment is the only way back to the project.
    pub fn from_env() -> Result<Self> {
        let dir = env::var(WORK_DIR_ENV)
            .map_err(|_| WeaveError::msg(format!("{WORK_DIR_ENV} is not set")))?;
        Ok(Self::new(dir))
    }

    pub fn debug_log(&self) -> PathBuf {
        self.build_temp.join("debug.log")
    }

    pub fn build_plan_log(&self) -> PathBuf {
        self.build_temp.join("build-plan.log")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.build_temp.join("backup")
    }

    pub fn matched_manifest(&self) -> PathBuf {
        self.build_temp.join("matched.json")
    }

    /// Root of the staged hook library tree. A rule's `path` is resolved
    /// relative to this directory.
    pub fn hook_dir(&self) -> PathBuf {
        self.build_temp.join("pkg")
    }

    pub fn go_cache(&self) -> PathBuf {
        self.build_temp.join("gocache")
    }

    /// Debug-copy destination for a file written on behalf of `import_path`.
    pub fn debug_copy(&self, import_path: &str, file_name: &str) -> PathBuf {
        let mut dir = self.build_temp.join("debug");
        for part in import_path.split('/') {
            dir.push(part);
        }
        dir.join(file_name)
    }

    /// Creates the build-temp skeleton.
    pub fn create_all(&self) -> Result<()> {
        for dir in [&self.build_temp, &self.backup_dir(), &self.hook_dir(), &self.go_cache()] {
            fs::create_dir_all(dir).map_err(|err| WeaveError::io(err, dir))?;
        }
        Ok(())
    }

    /// Resolves a rule's hook library path inside the staged tree.
    pub fn resolve_hook_lib(&self, rule_path: &str) -> PathBuf {
        let mut dir = self.hook_dir();
        for part in rule_path.split('/') {
            dir.push(part);
        }
        dir
    }
}

/// Process-wide state, constructed once in the driver and threaded through
/// every entry point.
#[derive(Clone, Debug)]
pub struct WeaveContext {
    pub paths: BuildPaths,
    /// Path to the running `otel-weave` executable, used when injecting
    /// `-toolexec` into the build command line.
    pub self_exe: PathBuf,
    /// The Go toolchain executable.
    pub go_bin: PathBuf,
}

impl WeaveContext {
    pub fn new(work_dir: impl Into<PathBuf>) -> Result<Self> {
        let self_exe = env::current_exe()
            .map_err(|err| WeaveError::io(err, Path::new("current_exe")))?;
        Ok(Self { paths: BuildPaths::new(work_dir), self_exe, go_bin: PathBuf::from("go") })
    }

    pub fn from_env() -> Result<Self> {
        let self_exe = env::current_exe()
            .map_err(|err| WeaveError::io(err, Path::new("current_exe")))?;
        Ok(Self { paths: BuildPaths::from_env()?, self_exe, go_bin: PathBuf::from("go") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_temp_layout() {
        let paths = BuildPaths::new("/tmp/demo");
        assert!(paths.debug_log().ends_with(".otel-build/debug.log"));
        assert!(paths.matched_manifest().ends_with(".otel-build/matched.json"));
        assert!(paths
            .debug_copy("github.com/demo/pkg", "otel.globals.go")
            .ends_with(".otel-build/debug/github.com/demo/pkg/otel.globals.go"));
        assert!(paths
            .resolve_hook_lib("otel/hooks/demo")
            .ends_with(".otel-build/pkg/otel/hooks/demo"));
    }
}
