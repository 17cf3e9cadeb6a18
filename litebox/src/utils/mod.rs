// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Miscellaneous "kitchen sink" shared by the LiteBox crates.
//!
//! These do not come with the API stability guarantees of the rest of LiteBox's modules.

/// An extension trait that adds `truncate` to truncate integers to a specific size of the same
/// signedness.
pub trait TruncateExt<To> {
    /// Truncate `self` to `To`, taking only lower-order bits.
    fn truncate(self) -> To;
}

macro_rules! impl_truncate {
    ($from:ty, $to:ty) => {
        impl TruncateExt<$to> for $from {
            #[inline(always)]
            #[allow(clippy::cast_possible_truncation)]
            fn truncate(self) -> $to {
                self as $to
            }
        }
    };
}

impl_truncate! { usize, u32 }
impl_truncate! { usize, u16 }
impl_truncate! { usize, u8 }
impl_truncate! { u64, u32 }
impl_truncate! { u32, u16 }
impl_truncate! { u32, u8 }
impl_truncate! { i64, i32 }
impl_truncate! { i32, i8 }

/// An extension trait that adds `reinterpret_as_signed` to unsigned integers.
pub trait ReinterpretSignedExt {
    type Signed;
    /// Reinterpret the bits of `self` as the signed type of the same width.
    fn reinterpret_as_signed(self) -> Self::Signed;
}

/// An extension trait that adds `reinterpret_as_unsigned` to signed integers.
pub trait ReinterpretUnsignedExt {
    type Unsigned;
    /// Reinterpret the bits of `self` as the unsigned type of the same width.
    fn reinterpret_as_unsigned(self) -> Self::Unsigned;
}

macro_rules! impl_reinterpret {
    ($unsigned:ty, $signed:ty) => {
        impl ReinterpretSignedExt for $unsigned {
            type Signed = $signed;
            #[inline(always)]
            fn reinterpret_as_signed(self) -> $signed {
                <$signed>::from_ne_bytes(self.to_ne_bytes())
            }
        }
        impl ReinterpretUnsignedExt for $signed {
            type Unsigned = $unsigned;
            #[inline(always)]
            fn reinterpret_as_unsigned(self) -> $unsigned {
                <$unsigned>::from_ne_bytes(self.to_ne_bytes())
            }
        }
    };
}

impl_reinterpret! { usize, isize }
impl_reinterpret! { u64, i64 }
impl_reinterpret! { u32, i32 }
impl_reinterpret! { u8, i8 }

/// An object that will run a closure when it goes out of scope.
pub struct Defer<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Drop for Defer<F> {
    fn drop(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

/// Returns an object that will run `f` when it goes out of scope.
///
/// Used to restore invariants on every exit path of a function, including early returns through
/// `?`.
///
/// Caution: the returned object must be bound to a variable to ensure the closure runs at scope
/// end. Binding to `_` drops it immediately; use a name starting with `_` (e.g., `_defer`).
///
/// # Example
/// ```rust
/// let n = core::cell::Cell::new(0);
/// {
///     n.set(1);
///     let _reset = litebox::utils::defer(|| n.set(0));
///     assert_eq!(n.get(), 1);
/// }
/// assert_eq!(n.get(), 0);
/// ```
#[must_use = "Must be bound to a variable to defer until scope end; variable name cannot be just '_' (but '_foo' is fine)."]
pub fn defer(f: impl FnOnce()) -> Defer<impl FnOnce()> {
    Defer(Some(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_low_bits() {
        let v: u16 = 0x1_2345_u32.truncate();
        assert_eq!(v, 0x2345);
        let v: i32 = (-1i64).truncate();
        assert_eq!(v, -1);
    }

    #[test]
    fn reinterpret_round_trips_bits() {
        assert_eq!(u32::MAX.reinterpret_as_signed(), -1);
        assert_eq!((-2i32).reinterpret_as_unsigned(), 0xffff_fffe);
    }

    #[test]
    fn defer_runs_on_early_return() {
        fn body(flag: &core::cell::Cell<bool>) -> Result<(), ()> {
            let _set = defer(|| flag.set(true));
            Err(())?;
            Ok(())
        }
        let flag = core::cell::Cell::new(false);
        assert!(body(&flag).is_err());
        assert!(flag.get());
    }
}
