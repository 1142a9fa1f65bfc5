use super::auth_gate::AuthGate;
use super::transport::{ApiRequest, ApiResponse, ApiTransport};
use crate::error::ApiError;
use async_trait::async_trait;
use log::warn;
use std::sync::Arc;

/// 自动认证会话
///
/// 包装任意传输层：每个请求发出前通过登录闸门获取 Bearer 令牌。
/// 未配置闸门时原样透传。401 只记日志，不自动重试。
pub struct AutoAuthSession {
    inner: Arc<dyn ApiTransport>,
    gate: Option<Arc<AuthGate>>,
}

impl AutoAuthSession {
    pub fn new(inner: Arc<dyn ApiTransport>, gate: Option<Arc<AuthGate>>) -> Self {
        Self { inner, gate }
    }
}

#[async_trait]
impl ApiTransport for AutoAuthSession {
    async fn execute(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        if let Some(gate) = &self.gate {
            request.bearer_token = gate.bearer_token().await;
        }
        let had_token = request.bearer_token.is_some();
        let target = request.target.to_url_path();
        let resp = self.inner.execute(request).await?;
        if resp.status == 401 {
            warn!(
                "{} request(...) [{}] 返回 401 (携带令牌: {})",
                self, target, had_token
            );
        }
        Ok(resp)
    }
}

impl std::fmt::Display for AutoAuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<AutoAuthSession [{}]>",
            if self.gate.is_some() { "auth" } else { "open" }
        )
    }
}

impl std::fmt::Debug for AutoAuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}
