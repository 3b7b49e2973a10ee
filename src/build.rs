//! 生产构建流程：
//! - 记录旧产物体积并清空输出目录（保留目录本身）
//! - 生成生产配置并调用打包器
//! - 打印结果与 gzip 体积；编译错误或 CI 下的警告视为失败

use anyhow::{bail, Context, Result};
use console::style;
use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info};

use crate::{
    bundle_config::{BundleConfig, Mode},
    bundler::{print_errors, Bundler, Verdict, FAILED_TO_COMPILE},
    env::ClientEnvironment,
    paths::Paths,
    sizes::{measure_before, print_report, report_after},
};

pub(crate) const PROD_CONFIG_STEM: &str = "bundler.config.prod";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuildOutcome {
    Succeeded,
    Failed,
}

/// 执行生产构建
pub(crate) fn build(
    paths: &Paths,
    env: &ClientEnvironment,
    bundler: &Bundler,
    extensions: &[String],
    ci: bool,
) -> Result<BuildOutcome> {
    if paths.app_entries.is_empty() {
        println!(
            "{}",
            style(format!(
                "No entries found: expected {}/<app>/**/target.js",
                paths.app_src.display()
            ))
            .yellow()
        );
    }

    debug!(vars = ?env.raw().keys().collect::<Vec<_>>(), "injecting client environment");

    check_build_dir(paths)?;
    // 先记录旧体积，再清空
    let previous = measure_before(&paths.app_build)?;
    empty_dir(&paths.app_build)?;

    println!("Creating an optimized production build...");
    let config = BundleConfig::production(paths, env, extensions);
    let config_path = config.write_to(&paths.cache_dir(), PROD_CONFIG_STEM)?;
    info!(config = %config_path.display(), entries = config.entry.len(), "wrote production config");

    let stats = match bundler.run(&config_path, Mode::Production, env.node_env()) {
        Ok(s) => s,
        Err(e) => {
            print_errors(FAILED_TO_COMPILE, &[format!("{:#}", e)]);
            return Ok(BuildOutcome::Failed);
        }
    };

    match stats.verdict(ci) {
        Verdict::Failed { summary, messages } => {
            print_errors(summary, &messages);
            Ok(BuildOutcome::Failed)
        }
        Verdict::Success { warnings } => {
            if warnings.is_empty() {
                println!("{}", style("Compiled successfully.").green());
                println!();
            } else {
                println!("{}", style("Compiled with warnings.").yellow());
                println!();
                for w in &warnings {
                    println!("{}", w);
                    println!();
                }
            }

            println!("File sizes after gzip:");
            println!();
            let lines = report_after(&paths.app_build, &previous)?;
            print_report(&lines, &paths.display_build());
            println!();

            println!(
                "Build complete in {} assuming they'll be served from {}.",
                style(paths.display_build()).green(),
                style(paths.served_path()).green()
            );
            println!();
            Ok(BuildOutcome::Succeeded)
        }
    }
}

/// 输出目录不能是项目根，也不能包含源码目录
pub(crate) fn check_build_dir(paths: &Paths) -> Result<()> {
    let build = lexical(&paths.app_build);
    if build == lexical(&paths.app_path) || lexical(&paths.app_src).starts_with(&build) {
        bail!(
            "refusing to empty build path {}: it contains the project sources {}",
            paths.app_build.display(),
            paths.app_src.display()
        );
    }
    Ok(())
}

// 只按字面处理 `.` 与 `..`，不访问文件系统
fn lexical(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// 清空目录内容但保留目录；不存在则创建
pub(crate) fn empty_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return fs::create_dir_all(dir).with_context(|| format!("failed to create directory: {}", dir.display()));
    }
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))? {
        let entry = entry?;
        let p = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&p).with_context(|| format!("failed to remove {}", p.display()))?;
        } else {
            fs::remove_file(&p).with_context(|| format!("failed to remove {}", p.display()))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::BundlerSettings, paths::PathInputs};
    use tempfile::TempDir;

    fn project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("apps/site/main/target.js");
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        fs::write(target, "console.log('hi');").unwrap();
        let stale = tmp.path().join("public/assets/old/stale.js");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(stale, "old").unwrap();
        tmp
    }

    fn sh(script: &str) -> BundlerSettings {
        BundlerSettings { program: "sh".into(), args: vec!["-c".into(), script.into()] }
    }

    fn exts() -> Vec<String> {
        vec![".js".into()]
    }

    #[test]
    fn empty_dir_keeps_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("out");
        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("a.js"), "a").unwrap();
        fs::write(dir.join("nested/b.js"), "b").unwrap();
        empty_dir(&dir).unwrap();
        assert!(dir.is_dir());
        assert!(fs::read_dir(&dir).unwrap().next().is_none());

        let fresh = tmp.path().join("fresh");
        empty_dir(&fresh).unwrap();
        assert!(fresh.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn successful_build_clears_old_output_and_writes_config() {
        let tmp = project();
        let paths = Paths::resolve(tmp.path(), PathInputs::default()).unwrap();
        let env = ClientEnvironment::from_vars(Vec::new(), Some("production"));
        let bundler = Bundler::new(
            &sh("echo 'var x=1;' > public/assets/site__main.js; echo '{\"errors\":[],\"warnings\":[]}'"),
            &paths.app_path,
        );

        let outcome = build(&paths, &env, &bundler, &exts(), false).unwrap();
        assert_eq!(outcome, BuildOutcome::Succeeded);
        assert!(!paths.app_build.join("old").exists());
        assert!(paths.app_build.join("site__main.js").is_file());

        let written = fs::read_to_string(paths.cache_dir().join("bundler.config.prod.json")).unwrap();
        let v: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert!(v["entry"]["site__main"].is_array());
        let loader = fs::read_to_string(paths.cache_dir().join("bundler.config.prod.js")).unwrap();
        assert!(loader.contains(r#""process.env.NODE_ENV":"\"production\"""#));
    }

    #[test]
    fn refuses_to_empty_project_or_source_ancestors() {
        let tmp = project();
        let env = ClientEnvironment::from_vars(Vec::new(), Some("production"));
        let bundler = Bundler::new(&sh("echo '{}'"), tmp.path());
        for build_path in [".", "apps/..", ".."] {
            let inputs = PathInputs { build_path: Some(build_path.into()), ..PathInputs::default() };
            let paths = Paths::resolve(tmp.path(), inputs).unwrap();
            let err = build(&paths, &env, &bundler, &exts(), false).unwrap_err();
            assert!(format!("{:#}", err).contains("refusing to empty build path"));
        }
        assert!(tmp.path().join("apps/site/main/target.js").is_file());

        let inputs = PathInputs {
            app_source: Some("src/apps".into()),
            build_path: Some("src".into()),
            ..PathInputs::default()
        };
        assert!(check_build_dir(&Paths::resolve(tmp.path(), inputs).unwrap()).is_err());

        let paths = Paths::resolve(tmp.path(), PathInputs::default()).unwrap();
        assert!(check_build_dir(&paths).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn compile_errors_fail_the_build() {
        let tmp = project();
        let paths = Paths::resolve(tmp.path(), PathInputs::default()).unwrap();
        let env = ClientEnvironment::from_vars(Vec::new(), Some("production"));
        let bundler = Bundler::new(&sh("echo '{\"errors\":[\"boom\"],\"warnings\":[]}'"), &paths.app_path);
        assert_eq!(build(&paths, &env, &bundler, &exts(), false).unwrap(), BuildOutcome::Failed);
    }

    #[cfg(unix)]
    #[test]
    fn warnings_fail_only_under_ci() {
        let tmp = project();
        let paths = Paths::resolve(tmp.path(), PathInputs::default()).unwrap();
        let env = ClientEnvironment::from_vars(Vec::new(), Some("production"));
        let bundler = Bundler::new(&sh("echo '{\"errors\":[],\"warnings\":[\"big\"]}'"), &paths.app_path);
        assert_eq!(build(&paths, &env, &bundler, &exts(), false).unwrap(), BuildOutcome::Succeeded);
        assert_eq!(build(&paths, &env, &bundler, &exts(), true).unwrap(), BuildOutcome::Failed);
    }

    #[test]
    fn unstartable_bundler_fails_the_build() {
        let tmp = project();
        let paths = Paths::resolve(tmp.path(), PathInputs::default()).unwrap();
        let env = ClientEnvironment::from_vars(Vec::new(), Some("production"));
        let settings = BundlerSettings { program: "icelab-assets-no-such-bundler".into(), args: vec![] };
        let bundler = Bundler::new(&settings, &paths.app_path);
        assert_eq!(build(&paths, &env, &bundler, &exts(), false).unwrap(), BuildOutcome::Failed);
    }
}
