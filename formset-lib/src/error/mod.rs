//! Error types

mod bind;
mod evaluate;

pub use bind::*;
pub use evaluate::*;
