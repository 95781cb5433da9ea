//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test project context
///
/// Creates a temporary directory holding a `pkg_defs` tree and provides
/// utilities for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a package description under `pkg_defs/<dir>/meta.yaml`
    pub fn create_package(&self, dir: &str, content: &str) {
        self.create_file(&format!("pkg_defs/{dir}/meta.yaml"), content);
    }

    /// Create a minimal package whose name equals its directory
    pub fn create_simple_package(&self, name: &str) {
        self.create_package(name, &format!("package:\n  name: {name}\n  version: 1.0\n"));
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Command running the ska-builder binary inside the project
    ///
    /// The config directory points into the project so user configuration
    /// never leaks into tests.
    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ska-builder"));
        cmd.current_dir(self.path());
        cmd.env("SKA_BUILDER_CONFIG_DIR", self.path().join("config"));
        cmd.env_remove("RUST_LOG");
        cmd.args(args);
        cmd
    }

    /// Run ska-builder with arguments
    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .output()
            .expect("Failed to execute ska-builder")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Stand-in for `conda` that records every invocation
///
/// Appends `<recipe dir name> <args>` to `$STUB_CONDA_LOG`, copies the
/// recipe's `meta.yaml` to `$STUB_CONDA_CAPTURE` when set, records
/// `$SKA_PKG_VERSION` and exits 3 for recipe directories named in
/// `$STUB_CONDA_FAIL`.
pub const STUB_CONDA: &str = r#"#!/bin/sh
recipe="$2"
name=$(basename "$recipe")
echo "$name $*" >> "$STUB_CONDA_LOG"
if [ -n "$STUB_CONDA_CAPTURE" ]; then
    cat "$recipe/meta.yaml" >> "$STUB_CONDA_CAPTURE"
fi
if [ -n "$SKA_PKG_VERSION" ]; then
    echo "version $SKA_PKG_VERSION" >> "$STUB_CONDA_LOG"
fi
case " $STUB_CONDA_FAIL " in
    *" $name "*) exit 3 ;;
esac
exit 0
"#;

/// Install the stub conda into the project and return its path
#[cfg(unix)]
pub fn install_stub_conda(project: &TestProject) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    project.create_file("bin/conda", STUB_CONDA);
    let path = project.path().join("bin/conda");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make stub executable");
    path
}

/// Recipe directory names in the order the stub saw them
pub fn built_packages(project: &TestProject) -> Vec<String> {
    if !project.file_exists("conda.log") {
        return Vec::new();
    }
    project
        .read_file("conda.log")
        .lines()
        .filter(|line| !line.starts_with("version "))
        .filter_map(|line| line.split_whitespace().next())
        .map(ToString::to_string)
        .collect()
}

/// Sample meta-package description pinning other Ska packages
pub const SAMPLE_META_PACKAGE: &str = "package:
  name: ska3-flight
  version: 2024.1rc1

requirements:
  run:
    - ska3-core ==2024.1rc1
    - numpy ==2024.1rc1
    - xija ==4.30.1
";

/// Run git with a fixed identity inside `dir`
pub fn git(dir: &std::path::Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Builder", "-c", "user.email=builder@example.org"])
        .args(["-c", "init.defaultBranch=master", "-c", "commit.gpgsign=false"])
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Local upstream repository under `upstream/` with tag `1.0` on its first
/// commit and an untagged second commit; `None` when git is unavailable
pub fn create_upstream(project: &TestProject) -> Option<PathBuf> {
    if which::which("git").is_err() {
        return None;
    }
    project.create_file("upstream/setup.py", "version = 1\n");
    let upstream = project.path().join("upstream");
    git(&upstream, &["init", "--quiet"]);
    git(&upstream, &["add", "setup.py"]);
    git(&upstream, &["commit", "--quiet", "-m", "first"]);
    git(&upstream, &["tag", "-a", "1.0", "-m", "release 1.0"]);
    project.create_file("upstream/setup.py", "version = 2\n");
    git(&upstream, &["commit", "--quiet", "-am", "second"]);
    Some(upstream)
}

/// Description of a package whose source comes from `upstream`
pub fn sourced_package(name: &str, upstream: &std::path::Path) -> String {
    format!(
        "package:\n  name: {name}\n  version: {{{{ SKA_PKG_VERSION }}}}\nsource:\n  path: {{{{ SKA_TOP_SRC_DIR }}}}/{name}\nabout:\n  home: file://{}\n",
        upstream.display()
    )
}

/// Stand-in for the python interpreter used to derive versions
///
/// Prints the first line of `setup.py` in the checkout, for example
/// `version = 1`, so the derived version is its last token.
pub const STUB_PYTHON: &str = r#"#!/bin/sh
[ "$1 $2" = "-m setuptools_scm" ] || exit 2
head -n 1 setup.py
"#;

/// Install the stub python and point the config file at it
#[cfg(unix)]
pub fn install_stub_python(project: &TestProject) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    project.create_file("bin/python", STUB_PYTHON);
    let path = project.path().join("bin/python");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make stub executable");
    project.create_file(
        "config/config.toml",
        &format!("[source]\npython = \"{}\"\n", path.display()),
    );
    path
}
