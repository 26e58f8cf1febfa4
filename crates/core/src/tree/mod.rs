mod forest;
mod path;

pub(crate) use forest::dedup_subtree;
pub use forest::{Forest, Position, Removed};
pub use path::NodePath;
