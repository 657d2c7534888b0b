use std::ops::{Deref, DerefMut};

/// Per-atom storage with one extra trailing element.
///
/// Vectorized kernels may read (never write) one element past the logical end, so a
/// non-empty vector always owns `len + 1` elements. An empty vector owns none. The
/// padding slot is never exposed through [`Deref`]: the slice view covers exactly the
/// logical elements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PaddedVector<T> {
    data: Vec<T>,
    len: usize,
}

impl<T: Clone + Default> PaddedVector<T> {
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            len: 0,
        }
    }

    /// Creates a vector of `len` default-valued elements plus the padding slot.
    pub fn zeroed(len: usize) -> Self {
        let mut v = Self::new();
        v.reset(len);
        v
    }

    /// Discards the contents and reallocates `len` default-valued elements.
    pub fn reset(&mut self, len: usize) {
        self.data.clear();
        self.data.resize(Self::storage_len(len), T::default());
        self.len = len;
    }

    /// Changes the logical length, keeping the leading elements and
    /// default-filling new ones.
    pub fn resize(&mut self, len: usize) {
        self.data.truncate(len);
        self.data.resize(Self::storage_len(len), T::default());
        self.len = len;
    }

    /// Number of elements actually allocated, including the padding slot.
    pub fn padded_len(&self) -> usize {
        self.data.len()
    }

    fn storage_len(len: usize) -> usize {
        if len > 0 { len + 1 } else { 0 }
    }
}

impl<T> Deref for PaddedVector<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data[..self.len]
    }
}

impl<T> DerefMut for PaddedVector<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data[..self.len]
    }
}

impl<T: Clone + Default> From<Vec<T>> for PaddedVector<T> {
    fn from(values: Vec<T>) -> Self {
        let len = values.len();
        let mut data = values;
        if len > 0 {
            data.push(T::default());
        }
        Self { data, len }
    }
}
