//! Configuration
//!
//! Typed settings for planning, follow-ups, the action queue, AI drafting,
//! storage and channels, resolved by [`ConfigLoader`].

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
