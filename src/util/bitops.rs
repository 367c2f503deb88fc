//! Bit manipulation helpers for power-of-two sizing.
//!
//! Both the unit store and the stripe table are sized in powers of two so
//! that "index modulo size" reduces to a single AND with a mask. These helpers
//! are `const` so they can back compile-time checks as well as runtime
//! validation.
//!
//! # Usage
//!
//! - Validating `unit_count` and `stripe_count`
//! - Deriving the index masks (`size - 1`)
//! - Suggesting the nearest valid size in error messages

#![allow(clippy::cast_possible_truncation)]

/// Check if a number is a power of two.
///
/// This is a constant-time operation that compiles to just a few instructions.
///
/// # Examples
///
/// ```
/// use stripebench::util::bitops::is_power_of_two;
///
/// assert!(is_power_of_two(1));
/// assert!(is_power_of_two(1024));
///
/// assert!(!is_power_of_two(0));
/// assert!(!is_power_of_two(1000));
/// ```
#[inline(always)]
#[must_use]
pub const fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// Find the next power of two greater than or equal to the given number.
///
/// If the input is already a power of two, it returns the input unchanged.
/// If the input is 0, returns 1.
///
/// # Examples
///
/// ```
/// use stripebench::util::bitops::next_power_of_two;
///
/// assert_eq!(next_power_of_two(0), 1);
/// assert_eq!(next_power_of_two(1000), 1024);
/// assert_eq!(next_power_of_two(1024), 1024);
/// ```
#[inline]
#[must_use]
pub const fn next_power_of_two(n: usize) -> usize {
    if n == 0 {
        return 1;
    }

    if n & (n - 1) == 0 {
        return n;
    }

    1 << (usize::BITS - (n - 1).leading_zeros())
}

/// Mask that reduces an index into `[0, size)` for a power-of-two `size`.
///
/// `index & index_mask(size)` equals `index % size` whenever `size` is a
/// power of two. The result is meaningless for other sizes; callers validate
/// first.
///
/// # Examples
///
/// ```
/// use stripebench::util::bitops::index_mask;
///
/// assert_eq!(index_mask(1024), 1023);
/// assert_eq!(1500 & index_mask(1024), 1500 % 1024);
/// ```
#[inline(always)]
#[must_use]
pub const fn index_mask(size: usize) -> usize {
    debug_assert!(is_power_of_two(size));
    size - 1
}
