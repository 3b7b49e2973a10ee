//! 新入口脚手架：
//! - 目标目录不存在则创建
//! - 仅当目录为空时写出模板（内置模板或指定的磁盘目录），绝不覆盖已有文件

use anyhow::{bail, Context, Result};
use include_dir::{include_dir, Dir};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

static ENTRY_TEMPLATE_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/template");

/// 脚手架结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ScaffoldOutcome {
    Created,
    /// 目标目录已有内容，未做任何修改
    NotEmpty,
    /// 指定的模板目录不存在
    TemplateMissing(PathBuf),
}

pub(crate) fn create_entry(entry_path: &Path, template: Option<&Path>) -> Result<ScaffoldOutcome> {
    if entry_path.exists() && !entry_path.is_dir() {
        bail!("{} exists and is not a directory", entry_path.display());
    }
    if !entry_path.exists() {
        fs::create_dir_all(entry_path)
            .with_context(|| format!("failed to create directory: {}", entry_path.display()))?;
    }
    if !is_empty_dir(entry_path)? {
        return Ok(ScaffoldOutcome::NotEmpty);
    }
    match template {
        Some(dir) => {
            if !dir.is_dir() {
                return Ok(ScaffoldOutcome::TemplateMissing(dir.to_path_buf()));
            }
            debug!(template = %dir.display(), "copying template from disk");
            copy_dir_all(dir, entry_path)?;
        }
        None => write_builtin_template(entry_path)?,
    }
    Ok(ScaffoldOutcome::Created)
}

fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut rd = fs::read_dir(dir).with_context(|| format!("failed to read directory: {}", dir.display()))?;
    Ok(rd.next().is_none())
}

/// 递归复制目录
pub(crate) fn copy_dir_all(from: &Path, to: &Path) -> Result<()> {
    if !from.is_dir() {
        bail!("{} is not a directory", from.display());
    }
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let fpath = entry.path();
        let tpath = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            if !tpath.exists() {
                fs::create_dir_all(&tpath)?;
            }
            copy_dir_all(&fpath, &tpath)?;
        } else {
            fs::copy(&fpath, &tpath)
                .with_context(|| format!("copy failed: {} -> {}", fpath.display(), tpath.display()))?;
        }
    }
    Ok(())
}

/// 将内置模板写出到指定目录
fn write_builtin_template(target_dir: &Path) -> Result<()> {
    write_dir(&ENTRY_TEMPLATE_DIR, target_dir)
}

fn write_dir(dir: &Dir<'_>, target_dir: &Path) -> Result<()> {
    for f in dir.files() {
        let out_path = target_dir.join(f.path());
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&out_path, f.contents())
            .with_context(|| format!("failed to write template file: {}", out_path.display()))?;
    }
    for sub in dir.dirs() {
        write_dir(sub, target_dir)?;
    }
    Ok(())
}
