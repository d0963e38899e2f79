pub mod display;
pub mod record_set;

pub use display::{TableView, display_value, titlecase};
pub use record_set::{RecordSet, Row};
