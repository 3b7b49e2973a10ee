use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn bin(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("icelab-assets").unwrap();
    cmd.current_dir(dir)
        .env_remove("CI")
        .env_remove("NODE_ENV")
        .env_remove("ASSETS_APP_SOURCE")
        .env_remove("ASSETS_BUILD_PATH")
        .env_remove("ASSETS_PUBLIC_PATH")
        .env("NO_COLOR", "1");
    cmd
}

fn touch(root: &Path, rel: &str) {
    let p = root.join(rel);
    fs::create_dir_all(p.parent().unwrap()).unwrap();
    fs::write(p, "// entry\n").unwrap();
}

#[test]
fn create_entry_scaffolds_new_directory() {
    let tmp = TempDir::new().unwrap();
    bin(tmp.path())
        .args(["create-entry", "apps/site/targets/main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Success! Created entry at:"));
    assert!(tmp.path().join("apps/site/targets/main/target.js").is_file());
}

#[test]
fn create_entry_refuses_non_empty_directory() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "apps/site/main/existing.js");
    bin(tmp.path())
        .args(["create-entry", "apps/site/main"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("as it contains existing files"));
    assert!(!tmp.path().join("apps/site/main/target.js").exists());
}

#[test]
fn create_entry_reports_missing_template() {
    let tmp = TempDir::new().unwrap();
    bin(tmp.path())
        .args(["create-entry", "apps/site/main", "--template", "no-such-template"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Could not locate supplied template"));
}

#[test]
fn inspect_lists_discovered_entries() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "src/admin/targets/main/target.js");
    touch(tmp.path(), "src/admin/targets/inline/target.js");
    let out = bin(tmp.path())
        .args(["inspect", "--mode", "production", "--app-source", "src"])
        .env("ASSETS_FLAVOUR", "blue")
        .env("UNRELATED_VAR", "x")
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    let entries: Vec<&str> = v["options"]["entry"].as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(entries, vec!["admin__inline", "admin__main"]);
    assert_eq!(v["define"]["process.env.ASSETS_FLAVOUR"], "\"blue\"");
    assert_eq!(v["define"]["process.env.NODE_ENV"], "\"production\"");
    assert!(v["define"].get("process.env.UNRELATED_VAR").is_none());
    assert_eq!(v["options"]["output"]["publicPath"], "/assets/");
    assert!(v["options"].get("define").is_none());
}

#[test]
fn inspect_development_points_at_dev_server() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "apps/site/main/target.js");
    let out = bin(tmp.path())
        .args(["inspect"])
        .env("ASSETS_HOST", "assets.test")
        .env("ASSETS_PORT", "3000")
        .env_remove("ASSETS_HTTPS")
        .output()
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["options"]["output"]["publicPath"], "http://assets.test:3000/assets/");
    assert_eq!(v["options"]["performance"]["hints"], false);
    assert_eq!(v["options"]["entry"]["site__main"].as_array().unwrap().len(), 2);
}

#[test]
fn duplicate_entries_are_an_error() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "apps/site/a/main/target.js");
    touch(tmp.path(), "apps/site/b/main/target.js");
    bin(tmp.path())
        .args(["inspect"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("duplicate entry `site__main`"));
}

#[cfg(unix)]
mod with_fake_bundler {
    use super::*;

    fn project(stats: &str) -> TempDir {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "apps/site/main/target.js");
        touch(tmp.path(), "public/assets/stale.js");
        let script = format!(
            "mkdir -p public/assets && echo 'var a=1;' > public/assets/site__main.js && echo '{}'",
            stats
        );
        let yaml = format!(
            "bundler:\n  program: sh\n  args:\n    - \"-c\"\n    - {}\n",
            serde_json::to_string(&script).unwrap()
        );
        fs::write(tmp.path().join("assets.yaml"), yaml).unwrap();
        tmp
    }

    #[test]
    fn build_succeeds_and_reports_sizes() {
        let tmp = project(r#"{"errors":[],"warnings":[]}"#);
        bin(tmp.path())
            .arg("build")
            .assert()
            .success()
            .stdout(predicate::str::contains("Compiled successfully."))
            .stdout(predicate::str::contains("File sizes after gzip:"))
            .stdout(predicate::str::contains("site__main.js"))
            .stdout(predicate::str::contains("Build complete in public/assets"));
        assert!(!tmp.path().join("public/assets/stale.js").exists());
    }

    #[test]
    fn build_refuses_to_empty_the_project() {
        let tmp = project(r#"{"errors":[],"warnings":[]}"#);
        bin(tmp.path())
            .args(["build", "--build-path", "."])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("refusing to empty build path"));
        assert!(tmp.path().join("apps/site/main/target.js").is_file());
    }

    #[test]
    fn build_fails_when_bundler_exits_non_zero() {
        let tmp = project(r#"{"errors":[],"warnings":[]}"#);
        let yaml = "bundler:\n  program: sh\n  args:\n    - \"-c\"\n    - \"echo '{}'; exit 1\"\n";
        fs::write(tmp.path().join("assets.yaml"), yaml).unwrap();
        bin(tmp.path())
            .arg("build")
            .assert()
            .code(1)
            .stdout(predicate::str::contains("bundler exited with"));
    }

    #[test]
    fn build_fails_on_errors() {
        let tmp = project(r#"{"errors":["Module not found"],"warnings":[]}"#);
        bin(tmp.path())
            .arg("build")
            .assert()
            .code(1)
            .stdout(predicate::str::contains("Failed to compile."))
            .stdout(predicate::str::contains("Module not found"));
    }

    #[test]
    fn warnings_fail_only_under_ci() {
        let tmp = project(r#"{"errors":[],"warnings":["asset size limit"]}"#);
        bin(tmp.path())
            .arg("build")
            .assert()
            .success()
            .stdout(predicate::str::contains("Compiled with warnings."));
        bin(tmp.path())
            .arg("build")
            .env("CI", "true")
            .assert()
            .code(1)
            .stdout(predicate::str::contains("warnings are treated as failures"));
    }
}
