//! Plain `u32`/`u8` newtype bit sets.

/// Declares a copyable bit-set newtype with named single-bit constants and the usual
/// set operators.
macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident: $bits:ty {
            $(
                $(#[$flag_meta:meta])*
                const $flag:ident = $value:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(transparent)]
        $vis struct $name($bits);

        impl $name {
            $(
                $(#[$flag_meta])*
                pub const $flag: Self = Self($value);
            )*

            #[inline]
            pub const fn empty() -> Self {
                Self(0)
            }

            #[inline]
            pub const fn bits(&self) -> $bits {
                self.0
            }

            #[inline]
            pub const fn is_empty(&self) -> bool {
                self.0 == 0
            }

            /// Whether every bit of `other` is set in `self`.
            #[inline]
            pub const fn contains(&self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            #[inline]
            pub fn insert(&mut self, other: Self) {
                self.0 |= other.0;
            }

            #[inline]
            pub fn remove(&mut self, other: Self) {
                self.0 &= !other.0;
            }
        }

        impl ::std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl ::std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }

        impl ::std::ops::BitAnd for $name {
            type Output = Self;

            fn bitand(self, rhs: Self) -> Self {
                Self(self.0 & rhs.0)
            }
        }
    };
}

pub(crate) use flag_set;

#[cfg(test)]
mod tests {
    flag_set! {
        struct Sample: u8 {
            const A = 1 << 0;
            const B = 1 << 1;
        }
    }

    #[test]
    fn contains_requires_every_bit() {
        let both = Sample::A | Sample::B;
        assert!(both.contains(Sample::A));
        assert!(both.contains(Sample::A | Sample::B));
        assert!(!Sample::A.contains(both));
        assert!(Sample::A.contains(Sample::empty()));
    }

    #[test]
    fn insert_and_remove_toggle_single_bits() {
        let mut set = Sample::empty();
        set.insert(Sample::B);
        assert_eq!(set.bits(), 2);
        set |= Sample::A;
        set.remove(Sample::B);
        assert_eq!(set, Sample::A);
        assert!((set & Sample::B).is_empty());
    }
}
