/// 破坏性操作的确认闸门
#[derive(Debug, Clone, PartialEq)]
pub enum Gate<T> {
    /// 已确认，可以发请求
    Proceed(T),
    /// 需要用户确认，携带警告文本
    NeedsConfirmation(String),
}

impl<T> Gate<T> {
    pub fn check(confirmed: bool, warning: impl Into<String>, value: T) -> Self {
        if confirmed {
            Gate::Proceed(value)
        } else {
            Gate::NeedsConfirmation(warning.into())
        }
    }
}
