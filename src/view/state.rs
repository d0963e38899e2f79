use std::sync::Arc;

use crate::result::RecordSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// The single message shown to the user. A new one replaces the old.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NotificationKind::Error
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// An operation began: clears the notification, raises the loading flag.
    Started,
    Finished,
    Records(Arc<RecordSet>),
    Notify(Notification),
    ClearNotification,
}

/// What a session displays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    records: Option<Arc<RecordSet>>,
    notification: Option<Notification>,
    loading: bool,
}

impl ViewState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::Started => {
                self.notification = None;
                self.loading = true;
            }
            Action::Finished => self.loading = false,
            Action::Records(records) => self.records = Some(records),
            Action::Notify(notification) => self.notification = Some(notification),
            Action::ClearNotification => self.notification = None,
        }
    }

    pub fn records(&self) -> Option<&RecordSet> {
        self.records.as_deref()
    }

    pub fn shared_records(&self) -> Option<Arc<RecordSet>> {
        self.records.clone()
    }

    pub fn notification(&self) -> Option<&Notification> {
        self.notification.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}
