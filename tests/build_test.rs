//! Integration tests for `ska-builder build`
//!
//! Runs the binary against a stub conda script that records each
//! invocation.

#![cfg(unix)]

mod common;

use common::{
    built_packages, create_upstream, git, install_stub_conda, install_stub_python,
    sourced_package, TestProject, SAMPLE_META_PACKAGE,
};
use std::process::Output;

/// Run `ska-builder build` with the stub conda and extra environment
fn run_build(project: &TestProject, args: &[&str], env: &[(&str, &str)]) -> Output {
    let conda = install_stub_conda(project);
    let conda = conda.to_str().unwrap();
    let mut argv = vec!["build", "--conda", conda];
    argv.extend_from_slice(args);

    let mut cmd = project.command(&argv);
    cmd.env("STUB_CONDA_LOG", project.path().join("conda.log"));
    cmd.env_remove("STUB_CONDA_FAIL");
    cmd.env_remove("STUB_CONDA_CAPTURE");
    cmd.env_remove("SKA_PKG_VERSION");
    for (key, value) in env {
        cmd.env(key, value);
    }
    cmd.output().expect("Failed to execute ska-builder build")
}

fn abc_project() -> TestProject {
    let project = TestProject::new();
    for name in ["a", "b", "c"] {
        project.create_simple_package(name);
    }
    project
}

#[test]
fn test_build_packages_in_order() {
    let project = abc_project();
    let output = run_build(&project, &["c", "a", "b"], &[]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(built_packages(&project), vec!["c", "a", "b"]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✓ a"));
    assert!(stdout.contains("3 succeeded, 0 failed, 0 skipped"));
}

#[test]
fn test_build_passes_options_to_conda() {
    let project = abc_project();
    let output = run_build(
        &project,
        &["--python", "3.12", "-c", "flight", "--override-channels", "a", "--", "--quiet"],
        &[],
    );
    assert!(output.status.success());

    let log = project.read_file("conda.log");
    let line = log.lines().next().unwrap();
    let croot = project.path().join("builds");
    assert!(line.contains(&format!("--croot {}", croot.display())), "line: {line}");
    assert!(line.contains("--old-build-string --no-anaconda-upload"), "line: {line}");
    assert!(line.contains("--python 3.12"));
    assert!(line.contains("--perl 5.26.2"));
    assert!(line.contains("--no-test"));
    assert!(line.contains("--skip-existing"));
    assert!(line.contains("-c flight --override-channels --quiet"));
}

#[test]
fn test_build_failure_continues_and_aggregates() {
    let project = abc_project();
    let output = run_build(&project, &["a", "b", "c"], &[("STUB_CONDA_FAIL", "b")]);

    assert!(!output.status.success());
    assert_eq!(built_packages(&project), vec!["a", "b", "c"]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("1 package(s) failed to build: b"),
        "stderr: {stderr}"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✗ b"));
    assert!(stdout.contains("2 succeeded, 1 failed, 0 skipped"));
}

#[test]
fn test_build_stop_on_error() {
    let project = abc_project();
    let output = run_build(
        &project,
        &["--stop-on-error", "a", "b", "c"],
        &[("STUB_CONDA_FAIL", "b")],
    );

    assert!(!output.status.success());
    assert_eq!(built_packages(&project), vec!["a", "b"]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Build of 'b' failed, stopping"), "stderr: {stderr}");
    assert!(stderr.contains("exited with status 3"), "stderr: {stderr}");
    assert!(!stderr.contains("package(s) failed to build"));
}

#[test]
fn test_build_unknown_package_builds_nothing() {
    let project = abc_project();
    let output = run_build(&project, &["a", "nope"], &[]);

    assert!(!output.status.success());
    assert!(built_packages(&project).is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Package 'nope' not found"), "stderr: {stderr}");
}

#[test]
fn test_build_missing_pkg_defs() {
    let project = TestProject::new();
    let output = run_build(&project, &["a"], &[]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Package definitions directory not found"));
}

#[test]
fn test_build_exclude_and_noarch_filters() {
    let project = TestProject::new();
    project.create_simple_package("ska_sun");
    project.create_simple_package("xija");
    project.create_package("pure", "package:\n  name: pure\nbuild:\n  noarch: python\n");

    let output = run_build(
        &project,
        &["--exclude", "ska_*", "--arch-specific", "ska_sun", "pure", "xija"],
        &[],
    );

    assert!(output.status.success());
    assert_eq!(built_packages(&project), vec!["xija"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("ska_sun (skipped: excluded)"));
    assert!(stdout.contains("pure (skipped: noarch)"));
}

#[test]
fn test_build_reads_build_order_file() {
    let project = abc_project();
    project.create_file("pkg_defs/build_order.txt", "# core\nb\n\n  # later\na\n");

    let output = run_build(&project, &[], &[]);
    assert!(output.status.success());
    assert_eq!(built_packages(&project), vec!["b", "a"]);
}

#[test]
fn test_build_perl_pin() {
    let project = abc_project();
    let output = run_build(&project, &["--perl", "5.32.1", "a"], &[]);
    assert!(output.status.success());
    assert!(project.read_file("conda.log").contains("--perl 5.32.1"));
}

#[test]
fn test_build_defaults_to_every_package_dir() {
    let project = TestProject::new();
    for name in ["xija", "ska_sun", "chandra_aca"] {
        project.create_simple_package(name);
    }
    project.create_file("pkg_defs/README.md", "not a package");

    let output = run_build(&project, &[], &[]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert_eq!(built_packages(&project), vec!["chandra_aca", "ska_sun", "xija"]);
}

#[test]
fn test_build_without_pkg_defs_or_packages() {
    let project = TestProject::new();
    let output = run_build(&project, &[], &[]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Package definitions directory not found"), "stderr: {stderr}");
}

#[test]
fn test_build_custom_build_list() {
    let project = abc_project();
    project.create_file("order.txt", "c\nb\n");

    let output = run_build(&project, &["--build-list", "order.txt"], &[]);
    assert!(output.status.success());
    assert_eq!(built_packages(&project), vec!["c", "b"]);
}

#[test]
fn test_build_overwrite_version_uses_staged_copy() {
    let project = TestProject::new();
    project.create_package("ska3-flight", SAMPLE_META_PACKAGE);
    project.create_package("xija", "package:\n  name: xija\n  version: 2024.1rc1\n");
    let capture = project.path().join("captured.yaml");

    let output = run_build(
        &project,
        &["--overwrite-version", "2024.1rc1:2024.1", "ska3-flight", "xija"],
        &[("STUB_CONDA_CAPTURE", capture.to_str().unwrap())],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let captured = project.read_file("captured.yaml");
    assert!(captured.contains("  version: 2024.1\n"));
    assert!(captured.contains("- ska3-core ==2024.1\n"));
    assert!(captured.contains("- numpy ==2024.1rc1\n"));
    // xija is not a meta-package
    assert!(captured.contains("name: xija\n  version: 2024.1rc1"));

    assert_eq!(
        project.read_file("pkg_defs/ska3-flight/meta.yaml"),
        SAMPLE_META_PACKAGE
    );
}

#[test]
fn test_build_single_overwrite_version_derives_release() {
    let project = TestProject::new();
    project.create_package(
        "ska3-flight",
        "package:\n  name: ska3-flight\n  version: 2024.1\nrequirements:\n  run:\n    - ska3-core ==2024.1\n",
    );
    let capture = project.path().join("captured.yaml");

    let output = run_build(
        &project,
        &["--overwrite-version", "2024.1rc2", "ska3-flight"],
        &[("STUB_CONDA_CAPTURE", capture.to_str().unwrap())],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let captured = project.read_file("captured.yaml");
    assert!(captured.contains("  version: 2024.1rc2\n"));
    assert!(captured.contains("- ska3-core ==2024.1rc2\n"));
}

#[test]
fn test_build_invalid_overwrite_version() {
    let project = abc_project();
    let output = run_build(&project, &["--overwrite-version", "2024.1", "a"], &[]);

    assert!(!output.status.success());
    assert!(built_packages(&project).is_empty());
}

#[test]
fn test_build_json_report() {
    let project = abc_project();
    let output = run_build(
        &project,
        &["--json", "--exclude", "c", "a", "b", "c"],
        &[("STUB_CONDA_FAIL", "a")],
    );

    assert!(!output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let outcomes = report["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0]["status"], "failed");
    assert!(outcomes[0]["error"].as_str().unwrap().contains("status 3"));
    assert_eq!(outcomes[1]["status"], "succeeded");
    assert_eq!(outcomes[2]["status"], "skipped_excluded");
}

#[test]
fn test_build_missing_conda() {
    let project = abc_project();
    let output = project.run(&["build", "--conda", "/nonexistent/conda", "a"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not found"), "stderr: {stderr}");
}

#[test]
fn test_build_config_file_settings() {
    let project = abc_project();
    project.create_file(
        "config/config.toml",
        "[build]\npython = \"3.9\"\n\n[filter]\nexclude = [\"b\"]\n",
    );

    let output = run_build(&project, &["a", "b"], &[]);
    assert!(output.status.success());
    assert_eq!(built_packages(&project), vec!["a"]);
    assert!(project.read_file("conda.log").contains("--python 3.9"));
}

#[test]
fn test_build_force_purges_cached_artifacts() {
    let project = abc_project();
    project.create_file("builds/linux-64/.cache/pkgs/a-1.0-0.tar.bz2", "stale");
    project.create_file("builds/linux-64/.cache/pkgs/b-1.0-0.tar.bz2", "keep");

    let output = run_build(&project, &["a"], &[]);
    assert!(output.status.success());
    assert!(project.file_exists("builds/linux-64/.cache/pkgs/a-1.0-0.tar.bz2"));

    let output = run_build(&project, &["--force", "a"], &[]);
    assert!(output.status.success());
    assert!(!project.file_exists("builds/linux-64/.cache/pkgs/a-1.0-0.tar.bz2"));
    assert!(project.file_exists("builds/linux-64/.cache/pkgs/b-1.0-0.tar.bz2"));
    assert!(!project.read_file("conda.log").lines().last().unwrap().contains("--skip-existing"));
}

#[test]
fn test_build_checks_out_latest_tag_and_derives_version() {
    let project = TestProject::new();
    let Some(upstream) = create_upstream(&project) else {
        return;
    };
    install_stub_python(&project);
    project.create_package("pkg", &sourced_package("pkg", &upstream));

    let output = run_build(&project, &["pkg"], &[]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(project.read_file("conda.log").contains("version 1\n"));
}

#[test]
fn test_build_checks_out_commit_into_new_src_dir() {
    let project = TestProject::new();
    let Some(upstream) = create_upstream(&project) else {
        return;
    };
    install_stub_python(&project);
    project.create_package("pkg", &sourced_package("pkg", &upstream));
    let head = git(&upstream, &["rev-parse", "HEAD"]);

    // Neither the source root nor its parent exists yet
    let output = run_build(
        &project,
        &["--src-dir", "work/checkouts", "--ref", &head, "pkg"],
        &[],
    );
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(project.read_file("conda.log").contains("version 2\n"));
    assert_eq!(project.read_file("work/checkouts/pkg/setup.py"), "version = 2\n");
}

#[test]
fn test_build_never_deletes_existing_source_dir() {
    let project = TestProject::new();
    let Some(upstream) = create_upstream(&project) else {
        return;
    };
    install_stub_python(&project);
    project.create_package("pkg", &sourced_package("pkg", &upstream));
    project.create_simple_package("other");
    project.create_file("mine/pkg/precious.txt", "keep me");

    let output = run_build(&project, &["--src-dir", "mine", "pkg", "other"], &[]);
    assert!(!output.status.success());
    assert_eq!(project.read_file("mine/pkg/precious.txt"), "keep me");
    assert!(!project.file_exists("mine/pkg/setup.py"));
    assert_eq!(built_packages(&project), vec!["other"]);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("1 package(s) failed to build: pkg"), "stderr: {stderr}");
}

#[test]
fn test_build_unknown_ref_fails_the_package_only() {
    let project = TestProject::new();
    let Some(upstream) = create_upstream(&project) else {
        return;
    };
    install_stub_python(&project);
    project.create_package("pkg", &sourced_package("pkg", &upstream));
    project.create_simple_package("other");

    let output = run_build(&project, &["--ref", "0123456789abcdef", "pkg", "other"], &[]);
    assert!(!output.status.success());
    assert_eq!(built_packages(&project), vec!["other"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✗ pkg"), "stdout: {stdout}");
}
