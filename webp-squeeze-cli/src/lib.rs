//! webp-squeeze CLI library

pub mod commands;
pub mod runtime;

pub use runtime::{GlobalOptions, Runtime};
