use crate::error::ApiError;
use log::debug;

/// 请求序号，单调递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Ready,
    Failed,
}

/// 一次拉取的结果状态
///
/// 每次 [`ResultView::begin`] 发一个新序号，只有最新序号的响应会被采纳；
/// 失败时保留上一次成功的数据。
#[derive(Debug, Clone)]
pub struct ResultView<T> {
    data: Option<T>,
    phase: Phase,
    error: Option<String>,
    issued: u64,
    awaiting: Option<Ticket>,
}

impl<T> Default for ResultView<T> {
    fn default() -> Self {
        Self {
            data: None,
            phase: Phase::Idle,
            error: None,
            issued: 0,
            awaiting: None,
        }
    }
}

impl<T> ResultView<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) -> Ticket {
        self.issued += 1;
        let ticket = Ticket(self.issued);
        self.awaiting = Some(ticket);
        self.phase = Phase::Loading;
        ticket
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.awaiting == Some(ticket)
    }

    /// 采纳响应；被取代或已放弃的响应返回 false 且不改变状态
    pub fn complete(&mut self, ticket: Ticket, result: Result<T, ApiError>) -> bool {
        if !self.is_current(ticket) {
            debug!("丢弃过期响应 {} (当前 {:?})", ticket, self.awaiting);
            return false;
        }
        self.awaiting = None;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.error = None;
                self.phase = Phase::Ready;
            }
            Err(e) => {
                self.error = Some(e.user_message());
                self.phase = Phase::Failed;
            }
        }
        true
    }

    /// 放弃所有在途请求
    pub fn abandon(&mut self) {
        self.awaiting = None;
        if self.phase == Phase::Loading {
            self.phase = if self.data.is_some() {
                Phase::Ready
            } else {
                Phase::Idle
            };
        }
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn data_mut(&mut self) -> Option<&mut T> {
        self.data.as_mut()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn later_request_wins_regardless_of_arrival() {
        let mut view: ResultView<&str> = ResultView::new();
        let a = view.begin();
        let b = view.begin();
        assert!(view.complete(b, Ok("B")));
        assert!(!view.complete(a, Ok("A")));
        assert_eq!(view.data(), Some(&"B"));
        assert_eq!(view.phase(), Phase::Ready);
    }

    #[test]
    fn older_response_arriving_first_is_dropped() {
        let mut view: ResultView<&str> = ResultView::new();
        let a = view.begin();
        let b = view.begin();
        assert!(!view.complete(a, Ok("A")));
        assert!(view.is_loading());
        assert_eq!(view.data(), None);
        assert!(view.complete(b, Ok("B")));
        assert_eq!(view.data(), Some(&"B"));
    }

    #[test]
    fn error_keeps_previous_data() {
        let mut view: ResultView<u32> = ResultView::new();
        let t = view.begin();
        view.complete(t, Ok(1));
        let t = view.begin();
        view.complete(t, Err(ApiError::network("Failed to fetch formulas", "timeout")));
        assert_eq!(view.data(), Some(&1));
        assert_eq!(view.error(), Some("Failed to fetch formulas"));
        assert_eq!(view.phase(), Phase::Failed);

        let t = view.begin();
        view.complete(t, Ok(2));
        assert_eq!(view.error(), None);
    }

    #[test]
    fn abandoned_responses_are_noops() {
        let mut view: ResultView<u32> = ResultView::new();
        let t = view.begin();
        view.abandon();
        assert_eq!(view.phase(), Phase::Idle);
        assert!(!view.complete(t, Err(ApiError::validation("late"))));
        assert_eq!(view.error(), None);
    }
}
