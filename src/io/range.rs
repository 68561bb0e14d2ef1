use std::fmt;

/// A closed interval `[first, last]` of absolute byte offsets.
///
/// Both bounds are inclusive and `first <= last` always holds, so a range
/// is never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ByteRange {
    first: u64,
    last: u64,
}

impl ByteRange {
    /// Create a range from inclusive bounds. Returns `None` if `first > last`.
    pub fn new(first: u64, last: u64) -> Option<Self> {
        (first <= last).then_some(Self { first, last })
    }

    /// The range covering `len` bytes starting at `offset`.
    ///
    /// Returns `None` for a zero length. The end saturates at `u64::MAX`.
    pub fn from_offset(offset: u64, len: u64) -> Option<Self> {
        if len == 0 {
            return None;
        }
        Some(Self {
            first: offset,
            last: offset.saturating_add(len - 1),
        })
    }

    pub fn first(&self) -> u64 {
        self.first
    }

    pub fn last(&self) -> u64 {
        self.last
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.last - self.first + 1
    }

    /// A range always covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Clamp the range so it ends at most at the last byte of an object of
    /// `size` bytes. Returns `None` when nothing of the range lies inside the
    /// object.
    pub fn clamp_to_size(self, size: u64) -> Option<Self> {
        if size == 0 || self.first >= size {
            return None;
        }
        Some(Self {
            first: self.first,
            last: self.last.min(size - 1),
        })
    }

    /// Whether `other` lies entirely inside this range.
    pub fn contains(&self, other: &ByteRange) -> bool {
        self.first <= other.first && other.last <= self.last
    }

    /// The value of the `Range` request header for this range.
    pub fn to_header(&self) -> String {
        format!("bytes={}-{}", self.first, self.last)
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.first, self.last)
    }
}
