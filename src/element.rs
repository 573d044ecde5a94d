//! Element kinds a ring can carry
//!
//! A ring is generic over its element type, so width and kind are fixed at
//! compile time. [`ElementSlice`] carries the kind at runtime for callers that
//! only learn it dynamically (e.g. data decoded from another context).

use std::fmt;

/// The numeric element kinds a ring can be built for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ElementKind {
    #[default]
    U8,
    U8Clamped,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl ElementKind {
    /// Width of one element in bytes
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            ElementKind::U8 | ElementKind::U8Clamped | ElementKind::I8 => 1,
            ElementKind::U16 | ElementKind::I16 => 2,
            ElementKind::U32 | ElementKind::I32 | ElementKind::F32 => 4,
            ElementKind::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ElementKind::U8 => "u8",
            ElementKind::U8Clamped => "u8-clamped",
            ElementKind::I8 => "i8",
            ElementKind::U16 => "u16",
            ElementKind::I16 => "i16",
            ElementKind::U32 => "u32",
            ElementKind::I32 => "i32",
            ElementKind::F32 => "f32",
            ElementKind::F64 => "f64",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A byte tagged as clamped; a distinct kind from plain `u8`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ClampedU8(pub u8);

impl From<u8> for ClampedU8 {
    fn from(value: u8) -> Self {
        ClampedU8(value)
    }
}

impl From<ClampedU8> for u8 {
    fn from(value: ClampedU8) -> Self {
        value.0
    }
}

/// A borrowed run of elements tagged with its kind
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementSlice<'a> {
    U8(&'a [u8]),
    U8Clamped(&'a [ClampedU8]),
    I8(&'a [i8]),
    U16(&'a [u16]),
    I16(&'a [i16]),
    U32(&'a [u32]),
    I32(&'a [i32]),
    F32(&'a [f32]),
    F64(&'a [f64]),
}

impl<'a> ElementSlice<'a> {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementSlice::U8(_) => ElementKind::U8,
            ElementSlice::U8Clamped(_) => ElementKind::U8Clamped,
            ElementSlice::I8(_) => ElementKind::I8,
            ElementSlice::U16(_) => ElementKind::U16,
            ElementSlice::I16(_) => ElementKind::I16,
            ElementSlice::U32(_) => ElementKind::U32,
            ElementSlice::I32(_) => ElementKind::I32,
            ElementSlice::F32(_) => ElementKind::F32,
            ElementSlice::F64(_) => ElementKind::F64,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            ElementSlice::U8(s) => s.len(),
            ElementSlice::U8Clamped(s) => s.len(),
            ElementSlice::I8(s) => s.len(),
            ElementSlice::U16(s) => s.len(),
            ElementSlice::I16(s) => s.len(),
            ElementSlice::U32(s) => s.len(),
            ElementSlice::I32(s) => s.len(),
            ElementSlice::F32(s) => s.len(),
            ElementSlice::F64(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A fixed-width plain value that can live in a ring's data zone.
///
/// # Safety
/// Implementors must be `Copy`, contain no padding and no pointers, and
/// accept every bit pattern of their width as a valid value. The trait is
/// sealed; only the nine numeric kinds implement it.
pub unsafe trait Element: sealed::Sealed + Copy + Default + Send + Sync + 'static {
    /// Kind tag of this element type
    const KIND: ElementKind;

    /// Width in bytes
    const WIDTH: usize = std::mem::size_of::<Self>();

    /// View a tagged slice as `&[Self]` if the kinds match
    fn from_element_slice(slice: ElementSlice<'_>) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            unsafe impl Element for $ty {
                const KIND: ElementKind = ElementKind::$variant;

                #[inline]
                fn from_element_slice(slice: ElementSlice<'_>) -> Option<&[Self]> {
                    match slice {
                        ElementSlice::$variant(s) => Some(s),
                        _ => None,
                    }
                }
            }

            impl<'a> From<&'a [$ty]> for ElementSlice<'a> {
                fn from(slice: &'a [$ty]) -> Self {
                    ElementSlice::$variant(slice)
                }
            }
        )*
    };
}

impl_element! {
    u8 => U8,
    ClampedU8 => U8Clamped,
    i8 => I8,
    u16 => U16,
    i16 => I16,
    u32 => U32,
    i32 => I32,
    f32 => F32,
    f64 => F64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths_match_types() {
        assert_eq!(u8::WIDTH, ElementKind::U8.width());
        assert_eq!(ClampedU8::WIDTH, ElementKind::U8Clamped.width());
        assert_eq!(i8::WIDTH, ElementKind::I8.width());
        assert_eq!(u16::WIDTH, ElementKind::U16.width());
        assert_eq!(i16::WIDTH, ElementKind::I16.width());
        assert_eq!(u32::WIDTH, ElementKind::U32.width());
        assert_eq!(i32::WIDTH, ElementKind::I32.width());
        assert_eq!(f32::WIDTH, ElementKind::F32.width());
        assert_eq!(f64::WIDTH, ElementKind::F64.width());
    }

    #[test]
    fn test_slice_downcast() {
        let data = [1u16, 2, 3];
        let tagged = ElementSlice::from(&data[..]);
        assert_eq!(tagged.kind(), ElementKind::U16);
        assert_eq!(tagged.len(), 3);
        assert_eq!(u16::from_element_slice(tagged), Some(&data[..]));
        assert_eq!(i16::from_element_slice(tagged), None);
    }
}
