//! Media frames
//!
//! - [`Frame`]: up to four planes in one aligned slab plus timing metadata
//! - [`SampleFormat`]: tag describing how plane bytes are interpreted

pub mod frame;
pub mod sample_fmt;

pub use frame::{Frame, PlaneLayout, ALIGNMENT, MAX_HEIGHT, MAX_PLANES, MAX_WIDTH, NO_TIMESTAMP};
pub use sample_fmt::SampleFormat;
