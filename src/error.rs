/// 客户端错误分类
///
/// 所有网络调用的失败都会被转换成这里的某一种，由发起调用的组件
/// 转成本地状态（消息/错误文本），不会继续向上传播。
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    /// 客户端校验失败，请求不会发出
    #[error("{0}")]
    Validation(String),
    /// 传输层失败（连接、超时等），`fallback` 是面向用户的通用文本
    #[error("{fallback} ({detail})")]
    Network { fallback: String, detail: String },
    /// 非 2xx 响应，`message` 取自响应体的 `error` 字段，缺失时为通用文本
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },
    /// 期望 JSON 但解析失败
    #[error("invalid response: {0}")]
    Parse(String),
}

pub const INVALID_RESPONSE: &str = "Invalid server response";

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ApiError::Validation(msg.into())
    }

    pub fn network(fallback: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        ApiError::Network {
            fallback: fallback.into(),
            detail: detail.to_string(),
        }
    }

    /// 展示给用户的文本
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Network { fallback, .. } => fallback.clone(),
            ApiError::Server { message, .. } => message.clone(),
            ApiError::Parse(_) => INVALID_RESPONSE.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_prefers_server_text() {
        let err = ApiError::Server {
            status: 409,
            message: "Alias already exists".to_string(),
        };
        assert_eq!(err.user_message(), "Alias already exists");
    }

    #[test]
    fn network_and_parse_errors_use_generic_text() {
        let err = ApiError::network("Failed to fetch formulas", "connection refused");
        assert_eq!(err.user_message(), "Failed to fetch formulas");
        assert_eq!(
            ApiError::Parse("expected value".into()).user_message(),
            INVALID_RESPONSE
        );
    }
}
