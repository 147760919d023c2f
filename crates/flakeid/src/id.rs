use core::fmt;

use crate::error::Error;

/// Largest timestamp delta (ms since the epoch) the 41-bit field can hold.
pub const MAX_TIMESTAMP: u64 = (1 << 41) - 1;

/// Largest node identifier the 8-bit field can hold.
pub const MAX_NODE_ID: u64 = (1 << 8) - 1;

/// Largest per-millisecond sequence number the 14-bit field can hold.
pub const MAX_SEQUENCE: u64 = (1 << 14) - 1;

/// Number of bits to shift the timestamp to its position (bit 22).
pub const TIMESTAMP_SHIFT: u64 = 22;

/// Number of bits to shift the node ID to its position (bit 14).
pub const NODE_ID_SHIFT: u64 = 14;

/// Number of bits to shift the sequence field (bit 0).
pub const SEQUENCE_SHIFT: u64 = 0;

/// A 63-bit Snowflake ID.
///
/// - 1 bit reserved (always zero, so the value also fits an `i64`)
/// - 41 bits timestamp (ms since the generator's epoch)
/// - 8 bits node ID
/// - 14 bits sequence
///
/// ```text
///  Bit Index:  63           63 62            22 21            14 13             0
///              +--------------+----------------+----------------+---------------+
///  Field:      | reserved (1) | timestamp (41) |  node ID (8)   | sequence (14) |
///              +--------------+----------------+----------------+---------------+
///              |<----------- MSB ---------- 64 bits ----------- LSB ----------->|
/// ```
///
/// IDs minted by one generator compare in creation order.
///
/// # Example
///
/// ```
/// use flakeid::SnowflakeId;
///
/// let id = SnowflakeId::from_components(1000, 3, 7);
/// assert_eq!(id.timestamp(), 1000);
/// assert_eq!(id.node_id(), 3);
/// assert_eq!(id.sequence(), 7);
/// assert_eq!(id.to_raw(), 1000 << 22 | 3 << 14 | 7);
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnowflakeId {
    id: u64,
}

impl SnowflakeId {
    /// Bitmask for the 41-bit timestamp field once shifted down.
    pub const TIMESTAMP_MASK: u64 = MAX_TIMESTAMP;

    /// Bitmask for the 8-bit node ID field once shifted down.
    pub const NODE_ID_MASK: u64 = MAX_NODE_ID;

    /// Bitmask for the 14-bit sequence field.
    pub const SEQUENCE_MASK: u64 = MAX_SEQUENCE;

    /// Packs the three fields into an ID.
    ///
    /// Each component is masked to its field width, so an out-of-range value
    /// can never bleed into a neighbouring field. Generators only pass values
    /// they have already validated.
    pub const fn from_components(timestamp: u64, node_id: u64, sequence: u64) -> Self {
        let timestamp = (timestamp & Self::TIMESTAMP_MASK) << TIMESTAMP_SHIFT;
        let node_id = (node_id & Self::NODE_ID_MASK) << NODE_ID_SHIFT;
        let sequence = (sequence & Self::SEQUENCE_MASK) << SEQUENCE_SHIFT;
        Self {
            id: timestamp | node_id | sequence,
        }
    }

    /// Extracts the timestamp (ms since the epoch) from the packed ID.
    pub const fn timestamp(&self) -> u64 {
        (self.id >> TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK
    }

    /// Extracts the node ID from the packed ID.
    pub const fn node_id(&self) -> u64 {
        (self.id >> NODE_ID_SHIFT) & Self::NODE_ID_MASK
    }

    /// Extracts the sequence number from the packed ID.
    pub const fn sequence(&self) -> u64 {
        (self.id >> SEQUENCE_SHIFT) & Self::SEQUENCE_MASK
    }

    /// Returns the raw packed integer.
    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    /// Wraps a raw packed integer without checking it.
    ///
    /// See [`Self::is_valid`] for values that may have the reserved bit set.
    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    /// Returns the packed value as a non-negative `i64`.
    ///
    /// Valid IDs never set bit 63, so this conversion is lossless for any ID
    /// produced by a generator. For an ID built with [`Self::from_raw`] that
    /// sets the reserved bit, the bit is masked off and the result names a
    /// different ID; use `i64::try_from` to reject such values instead.
    pub const fn to_i64(&self) -> i64 {
        (self.id & (u64::MAX >> 1)) as i64
    }

    /// Returns `true` if the reserved top bit is clear.
    pub const fn is_valid(&self) -> bool {
        self.id >> 63 == 0
    }

    /// Returns the Unix time, in milliseconds, at which this ID was minted,
    /// given the epoch (in Unix milliseconds) of the generator that minted
    /// it. Saturates at `i64::MAX`.
    pub const fn unix_millis(&self, epoch_millis: i64) -> i64 {
        // At most 41 bits, so the cast is exact
        #[allow(clippy::cast_possible_wrap)]
        let timestamp = self.timestamp() as i64;
        epoch_millis.saturating_add(timestamp)
    }

    /// Returns the ID as a zero-padded 19-digit string, the width of the
    /// largest 63-bit value, so that string order matches numeric order.
    pub fn to_padded_string(&self) -> String {
        format!("{:019}", self.id)
    }
}

impl From<SnowflakeId> for u64 {
    fn from(id: SnowflakeId) -> Self {
        id.to_raw()
    }
}

impl TryFrom<SnowflakeId> for i64 {
    type Error = Error;

    /// Fails with [`Error::ReservedBitSet`] instead of masking the top bit.
    fn try_from(id: SnowflakeId) -> Result<Self, Self::Error> {
        if !id.is_valid() {
            return Err(Error::ReservedBitSet { raw: id.to_raw() });
        }
        Ok(id.to_i64())
    }
}

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SnowflakeId {{")?;
        writeln!(f, "    raw id     : 0x{:016x} ({})", self.id, self.id)?;
        writeln!(
            f,
            "    timestamp  : {:>14} (0x{:011x}, 41 bits)",
            self.timestamp(),
            self.timestamp()
        )?;
        writeln!(
            f,
            "    node id    : {:>14} (0x{:02x}, 8 bits)",
            self.node_id(),
            self.node_id()
        )?;
        writeln!(
            f,
            "    sequence   : {:>14} (0x{:04x}, 14 bits)",
            self.sequence(),
            self.sequence()
        )?;
        write!(f, "}}")
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for SnowflakeId {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let id = Self::from_raw(<u64 as serde::Deserialize>::deserialize(d)?);
        if !id.is_valid() {
            return Err(serde::de::Error::custom(Error::ReservedBitSet {
                raw: id.to_raw(),
            }));
        }
        Ok(id)
    }
}
