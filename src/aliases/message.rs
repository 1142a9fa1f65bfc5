use std::time::{Duration, Instant};

/// 成功提示的展示时长
pub const MESSAGE_TTL: Duration = Duration::from_millis(3000);

/// 一次展示的编号，定时清除时用来确认清的还是同一条
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(u64);

/// 会自动过期的提示文本
///
/// 时间由调用方传入，方便测试；真实的定时器只负责在到期后调用 [`TransientMessage::expire`]。
#[derive(Debug, Clone, Default)]
pub struct TransientMessage {
    current: Option<(MessageId, String, Instant)>,
    next_id: u64,
}

impl TransientMessage {
    pub fn show(&mut self, text: impl Into<String>, now: Instant) -> MessageId {
        self.next_id += 1;
        let id = MessageId(self.next_id);
        self.current = Some((id, text.into(), now));
        id
    }

    /// 当前仍可见的文本
    pub fn text_at(&self, now: Instant) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|(_, _, shown)| now.saturating_duration_since(*shown) < MESSAGE_TTL)
            .map(|(_, text, _)| text.as_str())
    }

    /// 到期回调：只清除同一条提示，之后显示的新提示不受影响
    pub fn expire(&mut self, id: MessageId) -> bool {
        if matches!(&self.current, Some((cur, _, _)) if *cur == id) {
            self.current = None;
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
