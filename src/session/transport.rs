use crate::error::ApiError;
use crate::session::urls::encode_component;
use async_trait::async_trait;
use log::{info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;

/// 请求描述：路径 + 有序查询参数
///
/// 相同的输入总是得到相同的参数顺序，因此可以直接按字符串比较去重。
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RequestDescriptor {
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl RequestDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            params: Vec::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.params.push((key.into(), value.to_string()));
    }

    /// 仅在值去掉空白后非空时追加
    pub fn push_non_empty(&mut self, key: impl Into<String>, value: Option<&str>) {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.params.push((key.into(), v.to_string()));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn query_string(&self) -> String {
        self.params
            .iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// `path?query`，没有参数时只有 path
    pub fn to_url_path(&self) -> String {
        if self.params.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.query_string())
        }
    }
}

impl std::fmt::Display for RequestDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_url_path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        })
    }
}

/// multipart 上传的单个文件
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path, mime: &str) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(file_name, mime, bytes))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    /// 以 `file` 字段上传
    File(UploadFile),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub target: RequestDescriptor,
    pub body: RequestBody,
    pub bearer_token: Option<String>,
    /// 网络错误或服务端未给出 `error` 时展示的文本
    pub fallback: String,
}

impl ApiRequest {
    pub fn new(method: Method, target: RequestDescriptor, fallback: impl Into<String>) -> Self {
        Self {
            method,
            target,
            body: RequestBody::Empty,
            bearer_token: None,
            fallback: fallback.into(),
        }
    }

    pub fn get(target: RequestDescriptor, fallback: impl Into<String>) -> Self {
        Self::new(Method::Get, target, fallback)
    }

    pub fn post(target: RequestDescriptor, fallback: impl Into<String>) -> Self {
        Self::new(Method::Post, target, fallback)
    }

    pub fn delete(target: RequestDescriptor, fallback: impl Into<String>) -> Self {
        Self::new(Method::Delete, target, fallback)
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    pub fn file(mut self, file: UploadFile) -> Self {
        self.body = RequestBody::File(file);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body).map_err(|e| ApiError::Parse(e.to_string()))
    }

    /// 响应体中的 `{error}` 字段
    pub fn error_message(&self) -> Option<String> {
        let v: serde_json::Value = serde_json::from_slice(&self.body).ok()?;
        v.get("error")
            .and_then(|e| e.as_str())
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty())
    }

    /// 非 2xx 转成 `ApiError::Server`
    pub fn into_success(self, fallback: &str) -> Result<ApiResponse, ApiError> {
        if self.is_success() {
            return Ok(self);
        }
        let message = self.error_message().unwrap_or_else(|| fallback.to_string());
        Err(ApiError::Server {
            status: self.status,
            message,
        })
    }
}

/// 传输层抽象；真实实现基于 reqwest，测试里换成脚本化实现
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

/// reqwest 实现
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .user_agent("formulary/0.1")
            .build()
            .map_err(|e| ApiError::network("Failed to create HTTP client", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, target: &RequestDescriptor) -> String {
        format!("{}{}", self.base_url, target.to_url_path())
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = self.url_for(&request.target);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::File(file) => {
                let part = Part::bytes(file.bytes)
                    .file_name(file.file_name)
                    .mime_str(&file.mime)
                    .map_err(|e| ApiError::network(request.fallback.clone(), e))?;
                builder.multipart(Form::new().part("file", part))
            }
        };

        let resp = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("{} {} [{}] 请求失败: {}", self, request.method, url, e);
                return Err(ApiError::network(request.fallback, e));
            }
        };

        let status = resp.status();
        let header_str = |name: header::HeaderName| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };
        let content_type = header_str(header::CONTENT_TYPE);
        let content_disposition = header_str(header::CONTENT_DISPOSITION);
        let body = resp
            .bytes()
            .await
            .map_err(|e| ApiError::network(request.fallback.clone(), e))?
            .to_vec();

        if status == StatusCode::UNAUTHORIZED {
            warn!("{} {} [{}] 未授权", self, request.method, url);
        }
        info!(
            "{} {} [{}] -> {} ({} bytes)",
            self,
            request.method,
            url,
            status.as_u16(),
            body.len()
        );

        Ok(ApiResponse {
            status: status.as_u16(),
            content_type,
            content_disposition,
            body,
        })
    }
}

impl std::fmt::Display for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<HttpTransport [{}]>", self.base_url)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_renders_in_insertion_order() {
        let mut d = RequestDescriptor::new("/formulas").param("page", 2).param("per_page", 20);
        d.push_non_empty("brand", Some("Acme & Co"));
        d.push_non_empty("category", Some("   "));
        d.push_non_empty("lifecycle_phase", None);
        assert_eq!(
            d.to_url_path(),
            "/formulas?page=2&per_page=20&brand=Acme%20%26%20Co"
        );
        assert_eq!(d.get("brand"), Some("Acme & Co"));
        assert_eq!(RequestDescriptor::new("/database-status").to_url_path(), "/database-status");
    }

    #[test]
    fn error_body_becomes_server_error() {
        let resp = ApiResponse {
            status: 400,
            body: br#"{"error":"No selected file"}"#.to_vec(),
            ..Default::default()
        };
        assert_eq!(
            resp.into_success("Failed to upload database"),
            Err(ApiError::Server {
                status: 400,
                message: "No selected file".to_string()
            })
        );
    }

    #[test]
    fn non_json_error_uses_fallback() {
        let resp = ApiResponse {
            status: 502,
            body: b"<html>Bad gateway</html>".to_vec(),
            ..Default::default()
        };
        let err = resp.into_success("Failed to fetch formulas").unwrap_err();
        assert_eq!(err.user_message(), "Failed to fetch formulas");
    }

    #[test]
    fn invalid_json_on_success_is_parse_error() {
        let resp = ApiResponse {
            status: 200,
            body: b"<html>oops</html>".to_vec(),
            ..Default::default()
        };
        let err = resp.json::<serde_json::Value>().unwrap_err();
        assert_eq!(err.user_message(), crate::error::INVALID_RESPONSE);
    }
}
