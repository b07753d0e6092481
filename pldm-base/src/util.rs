// SPDX-License-Identifier: MIT OR Apache-2.0
/*
 * Copyright (c) 2024 Code Construct
 */

//! Helper functions

#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Holds either an allocated `Vec` or borrowed slice.
///
/// Can be constructed using `.into()` on a `Vec` (`alloc` feature) or `&[u8]`
/// (always)
#[derive(Debug)]
pub enum VecOrSlice<'a, V> {
    /// An allocated `Vec` buffer
    #[cfg(feature = "alloc")]
    Owned(Vec<V>),
    /// A borrowed slice
    Borrowed(&'a [V]),
}

impl<V> core::ops::Deref for VecOrSlice<'_, V> {
    type Target = [V];
    fn deref(&self) -> &[V] {
        self.as_ref()
    }
}

impl<V> AsRef<[V]> for VecOrSlice<'_, V> {
    fn as_ref(&self) -> &[V] {
        match self {
            #[cfg(feature = "alloc")]
            Self::Owned(v) => v.as_slice(),
            Self::Borrowed(s) => s,
        }
    }
}

#[cfg(feature = "alloc")]
impl<V> From<Vec<V>> for VecOrSlice<'static, V> {
    fn from(v: Vec<V>) -> Self {
        Self::Owned(v)
    }
}

impl<'a, V> From<&'a [V]> for VecOrSlice<'a, V> {
    fn from(v: &'a [V]) -> Self {
        Self::Borrowed(v)
    }
}

impl<'a, V> From<&'a mut [V]> for VecOrSlice<'a, V> {
    fn from(v: &'a mut [V]) -> Self {
        Self::Borrowed(v)
    }
}

/// Writes into a borrowed mutable output buffer
///
/// Push methods return `Some(usize)` length on success, `None` on failure.
pub struct SliceWriter<'a> {
    s: &'a mut [u8],
    pos: usize,
}

impl<'a> SliceWriter<'a> {
    /// Constructs a new `SliceWriter`
    pub fn new(s: &'a mut [u8]) -> Self {
        Self { s, pos: 0 }
    }

    /// Returns the number of bytes written
    pub fn written(&self) -> usize {
        debug_assert!(self.pos <= self.s.len());
        self.pos
    }

    /// Consumes the writer, returning the written buffer
    pub fn done(self) -> &'a mut [u8] {
        &mut self.s[..self.pos]
    }

    /// Pushes the provided slice into the output buffer
    #[must_use]
    pub fn push(&mut self, s: &[u8]) -> Option<usize> {
        let out = self.s.get_mut(self.pos..self.pos + s.len())?;
        out.copy_from_slice(s);
        self.pos += s.len();
        Some(s.len())
    }

    /// Pushes an integer into the output buffer, little-endian
    ///
    /// Returns the length written or `None` on insufficient space.
    #[must_use]
    pub fn push_le<S>(&mut self, v: S) -> Option<usize>
    where
        S: num_traits::ToBytes,
    {
        self.push(v.to_le_bytes().as_ref())
    }

    /// Pushes a `u32` into the output buffer, little-endian
    ///
    /// Returns the length written or `None` on insufficient space.
    #[inline]
    #[must_use]
    pub fn push_le32(&mut self, v: u32) -> Option<usize> {
        self.push_le(v)
    }

    /// Pushes a `u16` into the output buffer, little-endian
    ///
    /// Returns the length written or `None` on insufficient space.
    #[inline]
    #[must_use]
    pub fn push_le16(&mut self, v: u16) -> Option<usize> {
        self.push_le(v)
    }

    /// Pushes a `u8` into the output buffer
    ///
    /// Returns the length written or `None` on insufficient space.
    #[inline]
    #[must_use]
    pub fn push_le8(&mut self, v: u8) -> Option<usize> {
        self.push_le(v)
    }
}

/// Helper for converting `Option::None` to `PldmError::NoSpace`
///
/// `SliceWriter` returns `None` on failure. This trait converts
/// that failure to a `PldmError::NoSpace` for brevity.
pub trait NoneNoSpace<S> {
    /// Returns `PldmError::NoSpace` on failure
    fn space(self) -> crate::Result<S>;
}

impl<S> NoneNoSpace<S> for Option<S> {
    fn space(self) -> crate::Result<S> {
        self.ok_or(crate::PldmError::NoSpace)
    }
}
