//! 产物体积报告：构建前记录各 js/css 的 gzip 体积，构建后打印体积及变化

use std::{
    collections::BTreeMap,
    fs,
    io::Write,
    path::Path,
    sync::OnceLock,
};

use anyhow::{Context, Result};
use console::style;
use flate2::{write::GzEncoder, Compression};
use regex::Regex;
use walkdir::WalkDir;

use crate::utils::human_size;

/// 超过该增量（字节）标红
const LARGE_GROWTH: i64 = 50 * 1024;

/// 去掉内容哈希后的相对路径 -> gzip 体积
pub(crate) type FileSizes = BTreeMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SizeLine {
    /// 输出目录内的相对路径
    pub(crate) name: String,
    pub(crate) gzip_size: u64,
    /// 与上次构建的差值；上次不存在该文件时为 None
    pub(crate) difference: Option<i64>,
}

fn hash_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.+?)\.[0-9a-f]{8}(\.chunk)?(\.js|\.css)$").expect("static regex"))
}

/// `main.0123abcd.js` -> `main.js`
pub(crate) fn remove_file_hash(name: &str) -> String {
    hash_pattern().replace(name, "$1$2$3").into_owned()
}

pub(crate) fn gzip_size(bytes: &[u8]) -> Result<u64> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(bytes)?;
    Ok(enc.finish()?.len() as u64)
}

fn is_reported(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("js" | "css"))
}

// 遍历输出目录，得到 (相对路径, gzip 体积)
fn scan(build_dir: &Path) -> Result<Vec<(String, u64)>> {
    if !build_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for item in WalkDir::new(build_dir).sort_by_file_name() {
        let item = item.with_context(|| format!("failed to scan {}", build_dir.display()))?;
        if !item.file_type().is_file() || !is_reported(item.path()) {
            continue;
        }
        let rel = item
            .path()
            .strip_prefix(build_dir)
            .unwrap_or(item.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let bytes = fs::read(item.path()).with_context(|| format!("failed to read {}", item.path().display()))?;
        out.push((rel, gzip_size(&bytes)?));
    }
    Ok(out)
}

pub(crate) fn measure_before(build_dir: &Path) -> Result<FileSizes> {
    Ok(scan(build_dir)?
        .into_iter()
        .map(|(name, size)| (remove_file_hash(&name), size))
        .collect())
}

/// 构建后的体积列表，按 gzip 体积降序
pub(crate) fn report_after(build_dir: &Path, previous: &FileSizes) -> Result<Vec<SizeLine>> {
    let mut lines: Vec<SizeLine> = scan(build_dir)?
        .into_iter()
        .map(|(name, gzip_size)| {
            let difference = previous
                .get(&remove_file_hash(&name))
                .map(|before| gzip_size as i64 - *before as i64);
            SizeLine { name, gzip_size, difference }
        })
        .collect();
    lines.sort_by(|a, b| b.gzip_size.cmp(&a.gzip_size).then_with(|| a.name.cmp(&b.name)));
    Ok(lines)
}

fn difference_label(diff: Option<i64>) -> String {
    match diff {
        Some(d) if d >= LARGE_GROWTH => style(format!("+{}", human_size(d as u64))).red().to_string(),
        Some(d) if d > 0 => style(format!("+{}", human_size(d as u64))).yellow().to_string(),
        Some(d) if d < 0 => style(format!("-{}", human_size(d.unsigned_abs()))).green().to_string(),
        _ => String::new(),
    }
}

pub(crate) fn print_report(lines: &[SizeLine], build_display: &str) {
    let labels: Vec<String> = lines
        .iter()
        .map(|l| {
            let diff = difference_label(l.difference);
            if diff.is_empty() {
                human_size(l.gzip_size)
            } else {
                format!("{} ({})", human_size(l.gzip_size), diff)
            }
        })
        .collect();
    let width = labels.iter().map(|l| console::measure_text_width(l)).max().unwrap_or(0);
    for (line, label) in lines.iter().zip(labels) {
        let pad = width - console::measure_text_width(&label);
        println!(
            "  {}{}  {}{}",
            label,
            " ".repeat(pad),
            style(format!("{}/", build_display)).dim(),
            style(&line.name).cyan()
        );
    }
}
