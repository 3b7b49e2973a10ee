//! 配置与加载模块：
//! - 定义 `Settings`（可选的 assets.yaml）
//! - 提供 `load_settings`：显式路径 > 自动发现 > 内置默认
//! - 暴露配置来源信息，便于日志打印

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// 默认的打包器调用方式（webpack CLI，stats 以 JSON 输出到 stdout）
pub(crate) const DEFAULT_BUNDLER_PROGRAM: &str = "npx";
pub(crate) const DEFAULT_BUNDLER_ARGS: &[&str] =
    &["webpack", "--config", "{config}", "--mode", "{mode}", "--json"];
pub(crate) const DEFAULT_EXTENSIONS: &[&str] = &[".js", ".json", ".jsx"];

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct Settings {
    /// 源码根目录（相对项目根）
    #[serde(default)]
    pub(crate) app_source: Option<PathBuf>,
    /// 构建输出目录（相对项目根）
    #[serde(default)]
    pub(crate) build_path: Option<PathBuf>,
    /// 资源对外服务路径
    #[serde(default)]
    pub(crate) public_path: Option<String>,
    #[serde(default)]
    pub(crate) bundler: BundlerSettings,
    #[serde(default)]
    pub(crate) resolve: ResolveSettings,
    /// create-entry 使用的磁盘模板目录（缺省使用内置模板）
    #[serde(default)]
    pub(crate) template_dir: Option<PathBuf>,
}

/// 外部打包器命令；`{config}` 与 `{mode}` 会被替换
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct BundlerSettings {
    #[serde(default = "default_program")]
    pub(crate) program: String,
    #[serde(default = "default_args")]
    pub(crate) args: Vec<String>,
}

impl Default for BundlerSettings {
    fn default() -> Self {
        Self { program: default_program(), args: default_args() }
    }
}

fn default_program() -> String {
    DEFAULT_BUNDLER_PROGRAM.to_string()
}

fn default_args() -> Vec<String> {
    DEFAULT_BUNDLER_ARGS.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub(crate) struct ResolveSettings {
    #[serde(default = "default_extensions")]
    pub(crate) extensions: Vec<String>,
}

impl Default for ResolveSettings {
    fn default() -> Self {
        Self { extensions: default_extensions() }
    }
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

/// 配置来源（用于打印和调试）
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SettingsSource {
    LocalExplicit(PathBuf),
    LocalAuto(PathBuf),
    Defaults,
}

/// 加载后的配置及其来源
#[derive(Debug, Clone)]
pub(crate) struct LoadedSettings {
    pub(crate) settings: Settings,
    pub(crate) source: SettingsSource,
}

/// 人类可读的来源描述
pub(crate) fn describe_source(src: &SettingsSource) -> String {
    match src {
        SettingsSource::LocalExplicit(p) => format!("file: {}", p.display()),
        SettingsSource::LocalAuto(p) => format!("file (auto-discovered): {}", p.display()),
        SettingsSource::Defaults => "built-in defaults".to_string(),
    }
}

// 自动发现：assets.yaml / assets.yml / .assets.yaml
fn resolve_local_settings_path(root: &Path) -> Option<PathBuf> {
    ["assets.yaml", "assets.yml", ".assets.yaml"]
        .iter()
        .map(|cand| root.join(cand))
        .find(|p| p.is_file())
}

/// 加载配置：显式路径必须存在；否则在 `root` 下自动查找，找不到使用默认值
pub(crate) fn load_settings(explicit: Option<&Path>, root: &Path) -> Result<LoadedSettings> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("config file not found: {}", path.display());
        }
        let settings = parse_settings_file(path)?;
        return Ok(LoadedSettings { settings, source: SettingsSource::LocalExplicit(path.to_path_buf()) });
    }
    if let Some(path) = resolve_local_settings_path(root) {
        let settings = parse_settings_file(&path)?;
        return Ok(LoadedSettings { settings, source: SettingsSource::LocalAuto(path) });
    }
    Ok(LoadedSettings { settings: Settings::default(), source: SettingsSource::Defaults })
}

fn parse_settings_file(path: &Path) -> Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    // 空文件等价于全部默认
    if raw.trim().is_empty() {
        return Ok(Settings::default());
    }
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse YAML: {}", path.display()))
}
