mod controller;
mod notice;

pub use controller::{ThreadController, ThreadError};
pub use notice::ThreadNotice;
