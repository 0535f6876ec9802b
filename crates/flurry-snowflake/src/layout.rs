use crate::error::{Error, Result};
use std::fmt;
use std::str::FromStr;
use typed_builder::TypedBuilder;

/// Bits available to the worker, datacenter and sequence fields together.
const MAX_MILLISECOND_BITS: u32 = 22;
const MAX_SECOND_BITS: u32 = 32;

const DEFAULT_MILLISECOND_SEQUENCE_BITS: u32 = 12;
const DEFAULT_SECOND_SEQUENCE_BITS: u32 = 22;

/// Bits needed to hold any offset within one day (86_400_000 < 2^27, 86_400 < 2^17).
const DAY_MILLISECOND_BITS: u32 = 27;
const DAY_SECOND_BITS: u32 = 17;

/// The sign bit of the packed value is never used.
const ID_BITS: u32 = 63;

/// Granularity of the timestamp field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TimeUnit {
    #[default]
    Milliseconds,
    Seconds,
}

impl TimeUnit {
    /// Length of one tick in milliseconds.
    pub const fn millis_per_tick(self) -> i64 {
        match self {
            TimeUnit::Milliseconds => 1,
            TimeUnit::Seconds => 1_000,
        }
    }

    /// Number of ticks in one calendar day.
    pub const fn ticks_per_day(self) -> i64 {
        86_400_000 / self.millis_per_tick()
    }

    const fn max_field_bits(self) -> u32 {
        match self {
            TimeUnit::Milliseconds => MAX_MILLISECOND_BITS,
            TimeUnit::Seconds => MAX_SECOND_BITS,
        }
    }

    const fn default_sequence_bits(self) -> u32 {
        match self {
            TimeUnit::Milliseconds => DEFAULT_MILLISECOND_SEQUENCE_BITS,
            TimeUnit::Seconds => DEFAULT_SECOND_SEQUENCE_BITS,
        }
    }

    const fn day_bits(self) -> u32 {
        match self {
            TimeUnit::Milliseconds => DAY_MILLISECOND_BITS,
            TimeUnit::Seconds => DAY_SECOND_BITS,
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeUnit::Milliseconds => f.write_str("milliseconds"),
            TimeUnit::Seconds => f.write_str("seconds"),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ms" | "millis" | "milliseconds" => Ok(TimeUnit::Milliseconds),
            "s" | "secs" | "seconds" => Ok(TimeUnit::Seconds),
            _ => Err(Error::UnsupportedTimeUnit(s.to_owned())),
        }
    }
}

/// Requested field widths, validated into a [`Layout`].
///
/// A `sequence_bits` of zero selects the default for the time unit: 12 in
/// milliseconds mode, 22 in seconds mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct BitWidths {
    #[builder(default = 0)]
    pub sequence_bits: u32,
    #[builder(default = 5)]
    pub worker_id_bits: u32,
    #[builder(default = 5)]
    pub datacenter_id_bits: u32,
    #[builder(default)]
    pub time_unit: TimeUnit,
}

impl Default for BitWidths {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A validated bit layout, most to least significant:
/// `[time offset][datacenter id][worker id][sequence]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    time_unit: TimeUnit,
    sequence_bits: u32,
    worker_id_bits: u32,
    datacenter_id_bits: u32,
}

/// The fields of a packed id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdParts {
    /// Ticks since the generator's epoch.
    pub time_offset: u64,
    pub datacenter_id: u64,
    pub worker_id: u64,
    pub sequence: u64,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            time_unit: TimeUnit::Milliseconds,
            sequence_bits: DEFAULT_MILLISECOND_SEQUENCE_BITS,
            worker_id_bits: 5,
            datacenter_id_bits: 5,
        }
    }
}

impl TryFrom<BitWidths> for Layout {
    type Error = Error;

    fn try_from(widths: BitWidths) -> Result<Self> {
        let unit = widths.time_unit;
        let sequence_bits = match widths.sequence_bits {
            0 => unit.default_sequence_bits(),
            bits => bits,
        };
        if widths.worker_id_bits == 0 || widths.datacenter_id_bits == 0 {
            return Err(Error::InvalidBitWidth);
        }

        let total = sequence_bits
            .saturating_add(widths.worker_id_bits)
            .saturating_add(widths.datacenter_id_bits);
        if total > unit.max_field_bits() {
            return Err(Error::BitWidthOverflow {
                total,
                max: unit.max_field_bits(),
                unit,
            });
        }

        Ok(Self {
            time_unit: unit,
            sequence_bits,
            worker_id_bits: widths.worker_id_bits,
            datacenter_id_bits: widths.datacenter_id_bits,
        })
    }
}

const fn mask(bits: u32) -> u64 {
    (1_u64 << bits) - 1
}

impl Layout {
    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    pub fn sequence_bits(&self) -> u32 {
        self.sequence_bits
    }

    pub fn worker_id_bits(&self) -> u32 {
        self.worker_id_bits
    }

    pub fn datacenter_id_bits(&self) -> u32 {
        self.datacenter_id_bits
    }

    pub fn worker_id_shift(&self) -> u32 {
        self.sequence_bits
    }

    pub fn datacenter_id_shift(&self) -> u32 {
        self.sequence_bits + self.worker_id_bits
    }

    pub fn timestamp_left_shift(&self) -> u32 {
        self.sequence_bits + self.worker_id_bits + self.datacenter_id_bits
    }

    pub fn max_worker_id(&self) -> u64 {
        mask(self.worker_id_bits)
    }

    pub fn max_datacenter_id(&self) -> u64 {
        mask(self.datacenter_id_bits)
    }

    pub fn sequence_mask(&self) -> u64 {
        mask(self.sequence_bits)
    }

    /// Largest time offset that still leaves the sign bit clear.
    pub fn max_time_offset(&self) -> u64 {
        mask(ID_BITS - self.timestamp_left_shift())
    }

    /// Decimal width of the largest day-scoped serial value for this layout.
    pub fn natural_serial_width(&self) -> usize {
        let max = mask(self.timestamp_left_shift() + self.time_unit.day_bits());
        max.to_string().len()
    }

    /// Checks that an identity fits the worker and datacenter fields.
    pub fn check_identity(&self, worker_id: u64, datacenter_id: u64) -> Result<()> {
        if worker_id > self.max_worker_id() {
            return Err(Error::InvalidWorkerId {
                worker_id,
                max_worker_id: self.max_worker_id(),
            });
        }
        if datacenter_id > self.max_datacenter_id() {
            return Err(Error::InvalidDatacenterId {
                datacenter_id,
                max_datacenter_id: self.max_datacenter_id(),
            });
        }
        Ok(())
    }

    /// Assembles the fields into one id.
    ///
    /// Fields are assumed to already fit their widths; identities are checked
    /// when they are assigned and the sequence is always masked.
    pub fn pack(&self, parts: IdParts) -> u64 {
        (parts.time_offset << self.timestamp_left_shift())
            | (parts.datacenter_id << self.datacenter_id_shift())
            | (parts.worker_id << self.worker_id_shift())
            | parts.sequence
    }

    pub fn unpack(&self, id: u64) -> IdParts {
        IdParts {
            time_offset: id >> self.timestamp_left_shift(),
            datacenter_id: (id >> self.datacenter_id_shift()) & self.max_datacenter_id(),
            worker_id: (id >> self.worker_id_shift()) & self.max_worker_id(),
            sequence: id & self.sequence_mask(),
        }
    }
}
