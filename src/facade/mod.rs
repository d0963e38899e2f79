pub mod handle;

pub use handle::{DatabaseHandle, HandleState};
