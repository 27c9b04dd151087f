pub mod poll;
pub mod preview;

pub use preview::{environment_name, PreviewEngine};
