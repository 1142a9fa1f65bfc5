use super::transport::ApiResponse;
use percent_encoding::percent_decode_str;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// 二进制下载结果
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Download {
    /// 文件名取自 `Content-Disposition`，缺失时用 `default_name`
    pub fn from_response(resp: ApiResponse, default_name: &str) -> Self {
        let file_name = resp
            .content_disposition
            .as_deref()
            .and_then(filename_from_disposition)
            .map(|n| sanitize_file_name(&n))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_name.to_string());
        Self {
            file_name,
            bytes: resp.body,
        }
    }

    pub async fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.file_name);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

fn disposition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)filename\*\s*=\s*(?:UTF-8'[^']*')?([^;]+)|filename\s*=\s*"([^"]*)"|filename\s*=\s*([^;]+)"#)
            .expect("valid regex")
    })
}

/// 解析 `attachment; filename="x.xlsx"` 或 RFC 5987 的 `filename*=UTF-8''x.xlsx`
pub fn filename_from_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    for caps in disposition_re().captures_iter(header) {
        if let Some(ext) = caps.get(1) {
            let decoded = percent_decode_str(ext.as_str().trim().trim_matches('"'))
                .decode_utf8_lossy()
                .to_string();
            return Some(decoded);
        }
        if plain.is_none() {
            plain = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map(|m| m.as_str().trim().to_string());
        }
    }
    plain
}

/// 只保留文件名部分，防止路径穿越
fn sanitize_file_name(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim()
        .trim_start_matches('.')
        .to_string()
}
