//! Internal utility functions and helpers.
//!
//! # Modules
//!
//! - [`bitops`] - Power-of-two sizing and index masks
//! - [`cache_detect`] - Runtime cache line size detection

pub mod bitops;
pub mod cache_detect;

pub use bitops::{index_mask, is_power_of_two, next_power_of_two};
pub use cache_detect::{detect_cache_line_size, CACHE_LINE_SIZE};
