use std::sync::Arc;

/// Immutable validity bitmap, one bit per row, least-significant bit first.
///
/// Cloning and slicing share the underlying bytes.
#[derive(Clone, Debug)]
pub struct Bitmap {
    bytes: Arc<[u8]>,
    offset: usize,
    len: usize,
}

pub(crate) fn bytes_required(bits: usize) -> usize {
    (bits + 7) / 8
}

impl Bitmap {
    pub(crate) fn from_bytes(bytes: Vec<u8>, len: usize) -> Self {
        debug_assert!(bytes.len() >= bytes_required(len));
        Self {
            bytes: bytes.into(),
            offset: 0,
            len,
        }
    }

    pub(crate) fn all_set(len: usize) -> Self {
        let mut builder = BitmapBuilder::with_capacity(len);
        for _ in 0..len {
            builder.append(true);
        }
        builder.finish()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        if index < self.len {
            let bit = self.offset + index;
            let mask = 1u8 << (bit % 8);
            Some(self.bytes[bit / 8] & mask > 0)
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i).unwrap_or(false))
    }

    pub fn count_unset(&self) -> usize {
        self.iter().filter(|is_set| !is_set).count()
    }

    pub(crate) fn slice(&self, offset: usize, len: usize) -> Self {
        debug_assert!(offset + len <= self.len);
        Self {
            bytes: Arc::clone(&self.bytes),
            offset: self.offset + offset,
            len,
        }
    }

    /// Packs the visible bits starting at bit zero, with trailing bits cleared.
    pub(crate) fn to_packed(&self) -> Vec<u8> {
        let mut builder = BitmapBuilder::with_capacity(self.len);
        for is_set in self.iter() {
            builder.append(is_set);
        }
        builder.bytes
    }
}

impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.iter().eq(other.iter())
    }
}

#[derive(Debug, Default)]
pub(crate) struct BitmapBuilder {
    bytes: Vec<u8>,
    len: usize,
}

impl BitmapBuilder {
    pub(crate) fn with_capacity(bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes_required(bits)),
            len: 0,
        }
    }

    pub(crate) fn append(&mut self, is_set: bool) {
        let mask = 1u8 << (self.len % 8);
        if mask == 1 {
            self.bytes.push(0);
        }
        if is_set {
            if let Some(last) = self.bytes.last_mut() {
                *last |= mask;
            }
        }
        self.len += 1;
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Freezes the accumulated bits and leaves the builder empty.
    pub(crate) fn finish(&mut self) -> Bitmap {
        let len = std::mem::take(&mut self.len);
        Bitmap::from_bytes(std::mem::take(&mut self.bytes), len)
    }
}
