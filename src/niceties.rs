//! 开发辅助：
//! - 过滤打包器输出中 [HMR] / [WDS] 开头的噪声行
//! - 渲染注入到开发入口的浏览器脚本（静默噪声日志、样式热替换）

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tera::{Context as TContext, Tera};

const CLIENT_TEMPLATE: &str = include_str!("assets/devNiceties.js");
pub(crate) const CLIENT_FILE: &str = "devNiceties.js";

/// 开发服务器的版本轮询路径
pub(crate) const VERSION_PATH: &str = "/__assets__/version";

pub(crate) fn is_dev_server_noise(line: &str) -> bool {
    line.starts_with("[HMR]") || line.starts_with("[WDS]")
}

pub(crate) fn render_client(server_base: &str) -> Result<String> {
    let mut ctx = TContext::new();
    ctx.insert("server_base", server_base);
    ctx.insert("version_path", VERSION_PATH);
    Tera::one_off(CLIENT_TEMPLATE, &ctx, false).context("failed to render dev client script")
}

/// 写出浏览器脚本，返回其路径
pub(crate) fn write_client(cache_dir: &Path, server_base: &str) -> Result<PathBuf> {
    fs::create_dir_all(cache_dir)
        .with_context(|| format!("failed to create directory: {}", cache_dir.display()))?;
    let path = cache_dir.join(CLIENT_FILE);
    fs::write(&path, render_client(server_base)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}
