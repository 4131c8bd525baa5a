//! Built-in processor types

pub mod bypass;

pub use bypass::{Bypass, BYPASS_NAME};
