//! Chain position arithmetic
//!
//! A block is addressed either by its *index* (0-based, the number of blocks
//! preceding it) or by its *height* (1-based). [`BlockHeight`] stores the
//! height and reserves the native value `0` for [`BlockHeight::NULL`].
//! Arithmetic that would leave `[min, max]` yields NULL instead of wrapping.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Signed distance between two chain positions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockOffset(i64);

impl BlockOffset {
    pub const ZERO: BlockOffset = BlockOffset(0);

    pub const fn from_native(native: i64) -> Self {
        BlockOffset(native)
    }

    pub const fn native(self) -> i64 {
        self.0
    }
}

impl Add for BlockOffset {
    type Output = BlockOffset;

    fn add(self, rhs: BlockOffset) -> BlockOffset {
        BlockOffset(self.0.saturating_add(rhs.0))
    }
}

impl Sub for BlockOffset {
    type Output = BlockOffset;

    fn sub(self, rhs: BlockOffset) -> BlockOffset {
        BlockOffset(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for BlockOffset {
    type Output = BlockOffset;

    fn neg(self) -> BlockOffset {
        BlockOffset(self.0.saturating_neg())
    }
}

impl fmt::Display for BlockOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// BlockHeight: ℍ = {NULL} ∪ [1, 2³² − 2]
///
/// NULL orders before every valid height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BlockHeight(u32);

impl BlockHeight {
    pub const NULL: BlockHeight = BlockHeight(0);
    pub const GENESIS: BlockHeight = BlockHeight(1);

    const MIN_NATIVE: u32 = 1;
    const MAX_NATIVE: u32 = u32::MAX - 1;

    pub const fn min() -> Self {
        BlockHeight(Self::MIN_NATIVE)
    }

    pub const fn max() -> Self {
        BlockHeight(Self::MAX_NATIVE)
    }

    /// Height of the block with the given 0-based index
    ///
    /// NULL when `index + 1` leaves the valid range, so `u32::MAX` and
    /// `u32::MAX - 1` both map to NULL.
    pub fn from_index(index: u32) -> Self {
        match index.checked_add(1) {
            Some(native) => Self::from_native(native),
            None => Self::NULL,
        }
    }

    /// NULL if `native` lies outside `[min, max]`
    pub fn from_native(native: u32) -> Self {
        if (Self::MIN_NATIVE..=Self::MAX_NATIVE).contains(&native) {
            BlockHeight(native)
        } else {
            Self::NULL
        }
    }

    /// Height of a chain holding `size` blocks
    pub fn from_size(size: usize) -> Self {
        u32::try_from(size).map(Self::from_native).unwrap_or(Self::NULL)
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw height, `0` for NULL
    pub const fn native(self) -> u32 {
        self.0
    }

    pub fn index(self) -> Option<u32> {
        if self.is_null() {
            None
        } else {
            Some(self.0 - 1)
        }
    }

    /// 0-based index of a non-null height
    ///
    /// Panics on NULL: asking NULL for its index is a caller bug.
    pub fn to_index(self) -> u32 {
        assert!(!self.is_null(), "to_index called on a NULL block height");
        self.0 - 1
    }

    /// Number of blocks in a chain whose top has this height
    pub fn to_size(self) -> usize {
        self.0 as usize
    }

    /// Moves forward by `count` blocks, collapsing to NULL past `max()`
    pub fn advance(&mut self, count: usize) {
        *self = self.next(count);
    }

    /// Moves by a signed offset, collapsing to NULL outside `[min, max]`
    pub fn displace(&mut self, offset: i64) {
        *self = self.shift(offset);
    }

    pub fn next(self, count: usize) -> Self {
        if self.is_null() {
            return Self::NULL;
        }
        match u64::try_from(count) {
            Ok(count) => self.offset_by(i128::from(count)),
            Err(_) => Self::NULL,
        }
    }

    pub fn shift(self, offset: i64) -> Self {
        if self.is_null() {
            return Self::NULL;
        }
        self.offset_by(i128::from(offset))
    }

    /// Distance `self - other`, None if either side is NULL
    pub fn offset_from(self, other: BlockHeight) -> Option<BlockOffset> {
        if self.is_null() || other.is_null() {
            return None;
        }
        Some(BlockOffset(i64::from(self.0) - i64::from(other.0)))
    }

    fn offset_by(self, delta: i128) -> Self {
        let target = i128::from(self.0) + delta;
        if target < i128::from(Self::MIN_NATIVE) || target > i128::from(Self::MAX_NATIVE) {
            Self::NULL
        } else {
            BlockHeight(target as u32)
        }
    }
}

impl Sub for BlockHeight {
    type Output = Option<BlockOffset>;

    fn sub(self, rhs: BlockHeight) -> Option<BlockOffset> {
        self.offset_from(rhs)
    }
}

impl Add<BlockOffset> for BlockHeight {
    type Output = BlockHeight;

    fn add(self, rhs: BlockOffset) -> BlockHeight {
        self.shift(rhs.0)
    }
}

impl Sub<BlockOffset> for BlockHeight {
    type Output = BlockHeight;

    fn sub(self, rhs: BlockOffset) -> BlockHeight {
        match rhs.0.checked_neg() {
            Some(negated) => self.shift(negated),
            None => BlockHeight::NULL,
        }
    }
}

impl AddAssign<BlockOffset> for BlockHeight {
    fn add_assign(&mut self, rhs: BlockOffset) {
        *self = *self + rhs;
    }
}

impl SubAssign<BlockOffset> for BlockHeight {
    fn sub_assign(&mut self, rhs: BlockOffset) {
        *self = *self - rhs;
    }
}

impl TryFrom<u32> for BlockHeight {
    type Error = crate::error::DecodeError;

    /// Wire form: `0` is NULL, anything else must be a valid height
    fn try_from(wire: u32) -> Result<Self, Self::Error> {
        if wire == 0 {
            return Ok(BlockHeight::NULL);
        }
        let height = BlockHeight::from_native(wire);
        if height.is_null() {
            Err(crate::error::DecodeError::HeightOutOfRange(u64::from(wire)))
        } else {
            Ok(height)
        }
    }
}

impl From<BlockHeight> for u32 {
    fn from(height: BlockHeight) -> u32 {
        height.0
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "null")
        } else {
            write!(f, "{}", self.0)
        }
    }
}
