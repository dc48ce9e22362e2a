pub mod api;
pub mod join;

pub use join::{resolve_join_target, ResolveError};
