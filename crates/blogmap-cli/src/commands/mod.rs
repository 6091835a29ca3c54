//! Command implementations for the blogmap CLI

mod classify;
mod discover;
mod preview;

pub use classify::execute as classify;
pub use discover::execute as discover;
pub use preview::execute as preview;
