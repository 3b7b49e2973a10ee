//! 外部打包器调用模块：
//! - 按配置拼装命令行（替换 `{config}` / `{mode}`）
//! - 解析 stdout 中的 stats JSON（errors / warnings）
//! - 根据错误、警告与 CI 标记给出构建结论

use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use anyhow::{Context, Result};
use console::style;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{bundle_config::Mode, config::BundlerSettings, niceties::is_dev_server_noise};

pub(crate) const FAILED_TO_COMPILE: &str = "Failed to compile.";
pub(crate) const FAILED_UNDER_CI: &str = "Failed to compile. When process.env.CI = true, warnings are treated as failures. Most CI servers set this automatically.";

/// stats 中的一条错误/警告：字符串或带 message 的对象
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub(crate) enum StatsMessage {
    Text(String),
    Detailed {
        message: String,
        #[serde(default, rename = "moduleName")]
        module_name: Option<String>,
    },
}

impl StatsMessage {
    pub(crate) fn render(&self) -> String {
        match self {
            StatsMessage::Text(s) => s.clone(),
            StatsMessage::Detailed { message, module_name: Some(m) } => format!("{}\n{}", m, message),
            StatsMessage::Detailed { message, module_name: None } => message.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub(crate) struct Stats {
    #[serde(default)]
    pub(crate) errors: Vec<StatsMessage>,
    #[serde(default)]
    pub(crate) warnings: Vec<StatsMessage>,
}

/// 构建结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Success { warnings: Vec<String> },
    Failed { summary: &'static str, messages: Vec<String> },
}

impl Stats {
    /// 从打包器 stdout 解析：取第一个能完整解析的 JSON 对象，前后的其它输出都忽略
    pub(crate) fn parse(stdout: &str) -> Option<Self> {
        stdout.match_indices('{').find_map(|(i, _)| {
            serde_json::Deserializer::from_str(&stdout[i..])
                .into_iter::<Stats>()
                .next()
                .and_then(|r| r.ok())
        })
    }

    pub(crate) fn compile_error(message: String) -> Self {
        Self { errors: vec![StatsMessage::Text(message)], warnings: Vec::new() }
    }

    /// 有错误即失败；CI 下有警告也失败
    pub(crate) fn verdict(&self, ci: bool) -> Verdict {
        let render = |list: &[StatsMessage]| list.iter().map(StatsMessage::render).collect::<Vec<_>>();
        if !self.errors.is_empty() {
            return Verdict::Failed { summary: FAILED_TO_COMPILE, messages: render(&self.errors) };
        }
        if ci && !self.warnings.is_empty() {
            return Verdict::Failed { summary: FAILED_UNDER_CI, messages: render(&self.warnings) };
        }
        Verdict::Success { warnings: render(&self.warnings) }
    }
}

/// 打印红色摘要与每条消息
pub(crate) fn print_errors(summary: &str, messages: &[String]) {
    println!("{}", style(summary).red());
    println!();
    for m in messages {
        println!("{}", m);
        println!();
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Bundler {
    program: String,
    args: Vec<String>,
    cwd: PathBuf,
}

impl Bundler {
    pub(crate) fn new(settings: &BundlerSettings, cwd: &Path) -> Self {
        Self { program: settings.program.clone(), args: settings.args.clone(), cwd: cwd.to_path_buf() }
    }

    pub(crate) fn command_args(&self, config_path: &Path, mode: Mode) -> Vec<String> {
        let config = config_path.display().to_string();
        self.args
            .iter()
            .map(|a| a.replace("{config}", &config).replace("{mode}", mode.as_str()))
            .collect()
    }

    /// 运行一次打包；无法启动进程视为错误，无法解析输出视为编译错误
    pub(crate) fn run(&self, config_path: &Path, mode: Mode, node_env: &str) -> Result<Stats> {
        let args = self.command_args(config_path, mode);
        info!(program = %self.program, args = ?args, "running bundler");
        let output = Command::new(&self.program)
            .args(&args)
            .current_dir(&self.cwd)
            .env("NODE_ENV", node_env)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to start bundler `{}`", self.program))?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines().filter(|l| !is_dev_server_noise(l)) {
            eprintln!("{}", line);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(status = ?output.status.code(), bytes = stdout.len(), "bundler finished");
        let mut stats = match Stats::parse(&stdout) {
            Some(stats) => stats,
            None => {
                let text = stdout.trim();
                let message = if text.is_empty() {
                    format!("bundler exited with {} and produced no stats", output.status)
                } else {
                    text.to_string()
                };
                Stats::compile_error(message)
            }
        };
        // 非零退出但没有报告错误时，退出状态本身就是错误
        if !output.status.success() && stats.errors.is_empty() {
            stats.errors.push(StatsMessage::Text(format!("bundler exited with {}", output.status)));
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_and_object_messages() {
        let stats = Stats::parse(
            r#"{"errors":[{"message":"Module not found","moduleName":"./apps/x/target.js","loc":"1:0"}],"warnings":["size limit"],"assets":[]}"#,
        )
        .unwrap();
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.errors[0].render(), "./apps/x/target.js\nModule not found");
        assert_eq!(stats.warnings[0].render(), "size limit");
    }

    #[test]
    fn parses_after_leading_noise() {
        let stats = Stats::parse("npx: installed 1 in 0.5s\n{\"errors\":[],\"warnings\":[]}").unwrap();
        assert_eq!(stats, Stats::default());
        assert!(Stats::parse("not json at all").is_none());

        let stats = Stats::parse("npm notice {update available}\n{\"errors\":[],\"warnings\":[\"w\"]}").unwrap();
        assert_eq!(stats.warnings, vec![StatsMessage::Text("w".into())]);
    }

    #[test]
    fn ignores_output_after_stats() {
        let stats = Stats::parse(
            "{\"errors\":[],\"warnings\":[]}\nwebpack 5.90.0 compiled successfully in 120 ms\n{ plugin: 1 }\n",
        )
        .unwrap();
        assert_eq!(stats, Stats::default());
    }

    #[test]
    fn verdict_exit_rules() {
        let clean = Stats::default();
        assert_eq!(clean.verdict(false), Verdict::Success { warnings: vec![] });
        assert_eq!(clean.verdict(true), Verdict::Success { warnings: vec![] });

        let warned = Stats { errors: vec![], warnings: vec![StatsMessage::Text("w".into())] };
        assert_eq!(warned.verdict(false), Verdict::Success { warnings: vec!["w".into()] });
        assert_eq!(
            warned.verdict(true),
            Verdict::Failed { summary: FAILED_UNDER_CI, messages: vec!["w".into()] }
        );

        let broken = Stats {
            errors: vec![StatsMessage::Text("e".into())],
            warnings: vec![StatsMessage::Text("w".into())],
        };
        for ci in [false, true] {
            assert_eq!(
                broken.verdict(ci),
                Verdict::Failed { summary: FAILED_TO_COMPILE, messages: vec!["e".into()] }
            );
        }
    }

    #[test]
    fn placeholders_substituted() {
        let bundler = Bundler::new(&BundlerSettings::default(), Path::new("/project"));
        let args = bundler.command_args(Path::new("/tmp/cfg.json"), Mode::Production);
        assert_eq!(args, vec!["webpack", "--config", "/tmp/cfg.json", "--mode", "production", "--json"]);
    }

    #[cfg(unix)]
    #[test]
    fn run_reads_stats_from_stdout() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = BundlerSettings {
            program: "sh".into(),
            args: vec![
                "-c".into(),
                "echo '[HMR] noise' >&2; printf '{\"errors\":[],\"warnings\":[\"%s\"]}' \"$NODE_ENV\"".into(),
            ],
        };
        let stats = Bundler::new(&settings, tmp.path())
            .run(Path::new("unused.json"), Mode::Production, "production")
            .unwrap();
        assert_eq!(stats.warnings, vec![StatsMessage::Text("production".into())]);
    }

    #[cfg(unix)]
    #[test]
    fn unparsable_output_becomes_compile_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = BundlerSettings { program: "sh".into(), args: vec!["-c".into(), "exit 2".into()] };
        let stats = Bundler::new(&settings, tmp.path())
            .run(Path::new("unused.json"), Mode::Development, "development")
            .unwrap();
        assert_eq!(stats.errors.len(), 1);
        assert!(matches!(stats.verdict(false), Verdict::Failed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn failing_exit_status_is_a_compile_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        for script in ["echo '{\"errors\":[],\"warnings\":[]}'; exit 2", "echo '{}'; exit 1"] {
            let settings = BundlerSettings { program: "sh".into(), args: vec!["-c".into(), script.into()] };
            let stats = Bundler::new(&settings, tmp.path())
                .run(Path::new("unused.json"), Mode::Production, "production")
                .unwrap();
            assert_eq!(stats.errors.len(), 1, "{}", script);
            assert!(stats.errors[0].render().starts_with("bundler exited with"));
            assert!(matches!(stats.verdict(false), Verdict::Failed { .. }));
        }

        // 已有错误时不再追加
        let settings = BundlerSettings {
            program: "sh".into(),
            args: vec!["-c".into(), "echo '{\"errors\":[\"boom\"]}'; exit 1".into()],
        };
        let stats = Bundler::new(&settings, tmp.path())
            .run(Path::new("unused.json"), Mode::Production, "production")
            .unwrap();
        assert_eq!(stats.errors, vec![StatsMessage::Text("boom".into())]);
    }

    #[test]
    fn missing_program_is_error() {
        let settings = BundlerSettings {
            program: "icelab-assets-no-such-bundler".into(),
            args: vec![],
        };
        let res = Bundler::new(&settings, Path::new(".")).run(Path::new("c.json"), Mode::Production, "production");
        assert!(res.is_err());
    }
}
