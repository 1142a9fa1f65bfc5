use super::confirm::Gate;
use super::message::{MessageId, TransientMessage};
use crate::error::ApiError;
use crate::search::result_view::{ResultView, Ticket};
use crate::session::dto::{ServerBackup, ServerBackupCreated, ServerRestoreResult};
use std::time::Instant;

pub const RESTORE_CLEAR_WARNING: &str =
    "This will DELETE all existing aliases and replace them with the backup. Continue?";
pub const RESTORE_MERGE_WARNING: &str =
    "This will merge the backup into the existing aliases; duplicates are skipped. Continue?";
pub const DELETE_BACKUP_WARNING: &str = "Are you sure you want to delete this backup?";

pub fn restore_warning(clear_existing: bool) -> &'static str {
    if clear_existing {
        RESTORE_CLEAR_WARNING
    } else {
        RESTORE_MERGE_WARNING
    }
}

/// 服务端别名备份面板
#[derive(Debug, Default)]
pub struct BackupPanel {
    backups: ResultView<Vec<ServerBackup>>,
    message: TransientMessage,
    error: Option<String>,
}

impl BackupPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backups(&self) -> &[ServerBackup] {
        self.backups.data().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn message_at(&self, now: Instant) -> Option<&str> {
        self.message.text_at(now)
    }

    pub fn load(&mut self) -> Ticket {
        self.backups.begin()
    }

    pub fn complete_list(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<ServerBackup>, ApiError>,
    ) -> bool {
        let accepted = self.backups.complete(ticket, result);
        if accepted {
            self.error = self.backups.error().map(str::to_string);
        }
        accepted
    }

    pub fn apply_created(&mut self, created: &ServerBackupCreated, now: Instant) -> MessageId {
        self.error = None;
        let text = match created.aliases_count {
            Some(n) => format!("Backup created successfully ({} aliases)", n),
            None => "Backup created successfully".to_string(),
        };
        self.message.show(text, now)
    }

    /// 恢复前确认，清空与合并的警告文本不同
    pub fn prepare_restore(
        &self,
        id: &str,
        clear_existing: bool,
        confirmed: bool,
    ) -> Gate<(String, bool)> {
        Gate::check(
            confirmed,
            restore_warning(clear_existing),
            (id.to_string(), clear_existing),
        )
    }

    /// 提示中给出实际恢复的数量
    pub fn apply_restored(&mut self, result: &ServerRestoreResult, now: Instant) -> MessageId {
        self.error = None;
        self.message.show(
            format!("Restored {} aliases successfully", result.aliases_restored),
            now,
        )
    }

    pub fn prepare_delete(&self, id: &str, confirmed: bool) -> Gate<String> {
        Gate::check(confirmed, DELETE_BACKUP_WARNING, id.to_string())
    }

    pub fn apply_deleted(&mut self, id: &str, now: Instant) -> MessageId {
        self.error = None;
        if let Some(list) = self.backups.data_mut() {
            list.retain(|b| b.id != id);
        }
        self.message.show("Backup deleted successfully", now)
    }

    pub fn expire(&mut self, id: MessageId) -> bool {
        self.message.expire(id)
    }

    pub fn fail(&mut self, err: &ApiError) {
        self.error = Some(err.user_message());
    }
}
