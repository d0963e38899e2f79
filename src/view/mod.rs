pub mod state;

pub use state::{Action, Notification, NotificationKind, ViewState};
