use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{ShardIdParseError, TonAddress};

/// Longest shard prefix the network splits to.
pub const MAX_SHARD_PREFIX_LEN: u32 = 60;

/// 64-bit shard identifier: the meaningful prefix bits, then a single separator bit,
/// then zeros.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ShardId(u64);

/// Two's complement negation of the lowest set bit shifted left by one:
/// the mask of the prefix bits.
fn prefix_mask(lower_bit: u64) -> u64 {
    lower_bit.wrapping_neg() << 1
}

impl ShardId {
    pub const ROOT: ShardId = ShardId(1 << 63);

    pub fn root() -> ShardId {
        ShardId::ROOT
    }

    pub fn new(value: u64) -> Result<ShardId, ShardIdParseError> {
        if value == 0 {
            return Err(ShardIdParseError::new(value, "Shard id must have a separator bit"));
        }
        if value.trailing_zeros() < 63 - MAX_SHARD_PREFIX_LEN {
            return Err(ShardIdParseError::new(
                format!("{:016x}", value),
                format!("Prefix is longer than {} bits", MAX_SHARD_PREFIX_LEN),
            ));
        }
        Ok(ShardId(value))
    }

    /// Accepts an optional `0x` prefix.
    pub fn from_hex(value: &str) -> Result<ShardId, ShardIdParseError> {
        let digits = value.strip_prefix("0x").unwrap_or(value);
        if digits.is_empty() || digits.len() > 16 {
            return Err(ShardIdParseError::new(value, "Expected 1 to 16 hex digits"));
        }
        let parsed = u64::from_str_radix(digits, 16)
            .map_err(|e| ShardIdParseError::new(value, e))?;
        ShardId::new(parsed)
    }

    /// Signed decimal as reported by the network API, the two's complement of the
    /// shard value. `-9223372036854775808` is the root.
    pub fn from_decimal(value: &str) -> Result<ShardId, ShardIdParseError> {
        let parsed = value
            .trim()
            .parse::<i64>()
            .map_err(|e| ShardIdParseError::new(value, e))?;
        ShardId::new(parsed as u64)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The value as the signed 64-bit integer used on the wire.
    pub fn as_i64(&self) -> i64 {
        self.0 as i64
    }

    fn lower_bit(&self) -> u64 {
        self.0 & self.0.wrapping_neg()
    }

    pub fn is_root(&self) -> bool {
        *self == ShardId::ROOT
    }

    pub fn prefix_len(&self) -> u32 {
        63 - self.0.trailing_zeros()
    }

    /// Prefix bits as hex, empty for the root shard.
    pub fn prefix_string(&self) -> String {
        match self.prefix_len() {
            0 => String::new(),
            len => format!("{:x}", self.0 >> (64 - len)),
        }
    }

    pub fn to_hex(&self) -> String {
        format!("{:016x}", self.0)
    }

    pub fn is_right_child(&self) -> bool {
        self.0 & (self.lower_bit() << 1) != 0
    }

    pub fn is_left_child(&self) -> bool {
        !self.is_root() && !self.is_right_child()
    }

    /// `None` for the root shard.
    pub fn parent(&self) -> Option<ShardId> {
        if self.is_root() {
            return None;
        }
        let x = self.lower_bit();
        Some(ShardId((self.0 - x) | (x << 1)))
    }

    /// `None` when the shard already has the longest allowed prefix.
    pub fn child(&self, is_left: bool) -> Option<ShardId> {
        if self.prefix_len() >= MAX_SHARD_PREFIX_LEN {
            return None;
        }
        let x = self.lower_bit() >> 1;
        Some(ShardId(if is_left { self.0 - x } else { self.0 + x }))
    }

    pub fn is_parent_of(&self, child: &ShardId) -> bool {
        child.parent() == Some(*self)
    }

    /// `None` for the root shard.
    pub fn sibling(&self) -> Option<ShardId> {
        if self.is_root() {
            return None;
        }
        Some(ShardId(self.0 ^ (self.lower_bit() << 1)))
    }

    pub fn is_sibling(&self, other: &ShardId) -> bool {
        let diff = self.0 ^ other.0;
        diff != 0 && diff == self.lower_bit() << 1
    }

    /// True when `other` equals this shard or lies below it.
    pub fn is_ancestor_of(&self, other: &ShardId) -> bool {
        let x = self.lower_bit();
        x >= other.lower_bit() && (self.0 ^ other.0) & prefix_mask(x) == 0
    }

    pub fn intersects(&self, other: &ShardId) -> bool {
        let z = self.lower_bit().max(other.lower_bit());
        (self.0 ^ other.0) & prefix_mask(z) == 0
    }

    /// The more specific of two intersecting shards, `None` if they are disjoint.
    pub fn intersection(&self, other: &ShardId) -> Option<ShardId> {
        if !self.intersects(other) {
            return None;
        }
        if self.lower_bit() < other.lower_bit() {
            Some(*self)
        } else {
            Some(*other)
        }
    }

    /// Deepest shard containing both: the prefix shared up to the first differing bit.
    pub fn common_ancestor(&self, other: &ShardId) -> ShardId {
        if self.intersects(other) {
            return if self.lower_bit() > other.lower_bit() {
                *self
            } else {
                *other
            };
        }
        let common_len = (self.0 ^ other.0).leading_zeros();
        let separator = 1u64 << (63 - common_len);
        ShardId((self.0 & prefix_mask(separator)) | separator)
    }

    /// True when the first `prefix_len` bits of the account id match the prefix.
    pub fn contains(&self, address: &TonAddress) -> bool {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&address.hash_part()[..8]);
        let account_prefix = u64::from_be_bytes(prefix);
        (self.0 ^ account_prefix) & prefix_mask(self.lower_bit()) == 0
    }
}

impl Default for ShardId {
    fn default() -> Self {
        ShardId::ROOT
    }
}

impl Display for ShardId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ShardId {
    type Err = ShardIdParseError;

    /// Hex with up to 16 digits, otherwise signed decimal. A decimal value with no more
    /// than 16 digits is read as hex.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let is_long_decimal = s.len() > 16 && s.bytes().all(|b| b.is_ascii_digit());
        if s.starts_with('-') || is_long_decimal {
            ShardId::from_decimal(s)
        } else {
            ShardId::from_hex(s)
        }
    }
}

impl Serialize for ShardId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ShardId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
