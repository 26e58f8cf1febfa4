pub mod api;
pub mod cache;
pub mod domain;
pub mod error;
pub mod tree;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;
