#![doc = include_str!("../README.md")]

mod config;
mod error;
pub mod fanin;
pub mod handoff;
mod pipeline;
mod rule;
pub mod stage;
mod store;

pub use config::*;
pub use error::*;
pub use pipeline::*;
pub use rule::*;
pub use store::*;

/// The value type flowing through every stage.
pub type Item = i64;
