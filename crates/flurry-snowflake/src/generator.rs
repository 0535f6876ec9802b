use crate::{
    clock::{Clock, SystemClock},
    error::{Error, Result},
    format::{calendar_day, fixed_width, Pad},
    layout::{BitWidths, IdParts, Layout, TimeUnit},
};
use jiff::Timestamp;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

/// Largest backward clock step, in ticks, absorbed by waiting.
pub const MAX_BACKWARD: i64 = 5;

/// 2015-01-01T00:00:00Z
pub const DEFAULT_EPOCH: Timestamp = Timestamp::constant(1_420_070_400, 0);

/// Identity and epoch of a generator instance.
///
/// Every instance that may run concurrently must be given a distinct
/// `(worker_id, datacenter_id)` pair; nothing checks this at runtime.
#[derive(Debug, Clone, Copy, TypedBuilder)]
pub struct GeneratorSettings {
    #[builder]
    pub worker_id: u64,
    #[builder]
    pub datacenter_id: u64,
    /// Zero point of the time field. Offsets are counted in whole ticks from
    /// the tick containing this instant.
    #[builder(default = DEFAULT_EPOCH)]
    pub epoch: Timestamp,
    /// Initial layout; [`Generator::configure`] can still replace it before
    /// the first id.
    #[builder(default)]
    pub widths: BitWidths,
}

#[derive(Debug, Default)]
struct GeneratorState {
    /// Unix time, in ticks, of the last issued id. `None` until the first id.
    last_timestamp: Option<i64>,
    sequence: u64,
}

/// Everything that changes, guarded together so `configure` can never race
/// with an id being packed under the old layout.
#[derive(Debug)]
struct Inner {
    layout: Layout,
    state: GeneratorState,
}

/// The tick and sequence chosen for one id.
#[derive(Debug, Clone, Copy)]
struct Issued {
    tick: i64,
    time_offset: u64,
    sequence: u64,
}

/// Snowflake-style 64-bit id generator.
///
/// Ids from one instance are strictly increasing as long as the clock never
/// steps back by more than [`MAX_BACKWARD`] ticks. Smaller regressions and
/// sequence exhaustion are absorbed by blocking inside the lock, so callers
/// on the same instance queue behind the one that is waiting.
pub struct Generator<C: Clock = SystemClock> {
    epoch: Timestamp,
    worker_id: u64,
    datacenter_id: u64,
    clock: C,
    inner: Mutex<Inner>,
}

impl Generator<SystemClock> {
    /// Creates a generator with the default layout and epoch, backed by the
    /// system clock.
    pub fn new(worker_id: u64, datacenter_id: u64) -> Result<Self> {
        Self::with_settings(
            GeneratorSettings::builder()
                .worker_id(worker_id)
                .datacenter_id(datacenter_id)
                .build(),
        )
    }

    pub fn with_settings(settings: GeneratorSettings) -> Result<Self> {
        Self::with_clock(settings, SystemClock)
    }
}

impl<C: Clock> Generator<C> {
    /// Creates a generator reading time from `clock`.
    pub fn with_clock(settings: GeneratorSettings, clock: C) -> Result<Self> {
        let layout = Layout::try_from(settings.widths)?;
        layout.check_identity(settings.worker_id, settings.datacenter_id)?;

        let now = clock.now();
        if settings.epoch > now {
            return Err(Error::EpochAhead {
                epoch: settings.epoch,
                now,
            });
        }

        Ok(Self {
            epoch: settings.epoch,
            worker_id: settings.worker_id,
            datacenter_id: settings.datacenter_id,
            clock,
            inner: Mutex::new(Inner {
                layout,
                state: GeneratorState::default(),
            }),
        })
    }

    pub fn worker_id(&self) -> u64 {
        self.worker_id
    }

    pub fn datacenter_id(&self) -> u64 {
        self.datacenter_id
    }

    pub fn epoch(&self) -> Timestamp {
        self.epoch
    }

    /// The layout currently in effect.
    pub fn layout(&self) -> Result<Layout> {
        Ok(self.lock()?.layout)
    }

    /// Replaces the bit layout.
    ///
    /// Only allowed before the first id is issued: the layout is baked into
    /// every id already handed out. On error the previous layout stays in
    /// effect.
    pub fn configure(&self, widths: BitWidths) -> Result<&Self> {
        let mut inner = self.lock()?;
        if inner.state.last_timestamp.is_some() {
            return Err(Error::AlreadyInUse);
        }

        let layout = Layout::try_from(widths)?;
        layout.check_identity(self.worker_id, self.datacenter_id)?;
        inner.layout = layout;

        info!(
            time_unit = %layout.time_unit(),
            sequence_bits = layout.sequence_bits(),
            worker_id_bits = layout.worker_id_bits(),
            datacenter_id_bits = layout.datacenter_id_bits(),
            "applied snowflake layout"
        );
        Ok(self)
    }

    /// Generates the next id.
    pub fn next_id(&self) -> Result<u64> {
        let mut inner = self.lock()?;
        let issued = self.issue(&mut inner)?;
        Ok(inner.layout.pack(self.parts(issued.time_offset, issued.sequence)))
    }

    /// Generates a date-prefixed serial: `YYYYMMDD` of the generation day
    /// followed by an id whose time field only counts ticks since the start
    /// of that day, zero-padded on the left.
    ///
    /// The padded width is the layout's natural serial width, or
    /// `min_length` when it is non-zero. A `min_length` below the natural
    /// width is rejected before any id is consumed.
    pub fn next_serial(&self, min_length: usize) -> Result<String> {
        let mut inner = self.lock()?;
        let layout = inner.layout;

        let natural = layout.natural_serial_width();
        let width = match min_length {
            0 => natural,
            requested if requested < natural => {
                return Err(Error::SerialLengthTooShort { requested, natural });
            }
            requested => requested,
        };

        let issued = self.issue(&mut inner)?;
        let unit = layout.time_unit();
        // Same day boundary as the date prefix: UTC midnight of the tick.
        // rem_euclid is never negative.
        let day_offset = issued.tick.rem_euclid(unit.ticks_per_day()) as u64;
        let serial = layout.pack(self.parts(day_offset, issued.sequence));

        let day = calendar_day(tick_start(unit, issued.tick)?);
        Ok(day + &fixed_width(&serial.to_string(), width, Pad::Left, '0'))
    }

    /// Recovers the instant an id was generated at, truncated to the layout's
    /// time unit.
    pub fn decode_generation_time(&self, id: u64) -> Result<Timestamp> {
        let layout = self.layout()?;
        let unit = layout.time_unit();
        let offset = i64::try_from(layout.unpack(id).time_offset)
            .map_err(|_| Error::TimestampOverflow)?;
        let tick = self
            .epoch_tick(unit)
            .checked_add(offset)
            .ok_or(Error::TimestampOverflow)?;
        tick_start(unit, tick)
    }

    /// Splits an id back into its fields under the current layout.
    pub fn decompose(&self, id: u64) -> Result<IdParts> {
        Ok(self.layout()?.unpack(id))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner.lock().map_err(|_| Error::StatePoisoned)
    }

    fn parts(&self, time_offset: u64, sequence: u64) -> IdParts {
        IdParts {
            time_offset,
            datacenter_id: self.datacenter_id,
            worker_id: self.worker_id,
            sequence,
        }
    }

    fn epoch_tick(&self, unit: TimeUnit) -> i64 {
        to_ticks(unit, self.epoch)
    }

    /// Picks the tick and sequence for the next id and records them.
    ///
    /// State is only written once every check has passed, so a rejected call
    /// leaves the generator exactly as it was.
    fn issue(&self, inner: &mut Inner) -> Result<Issued> {
        let layout = inner.layout;
        let unit = layout.time_unit();
        let mut now = to_ticks(unit, self.clock.now());
        let mut sequence = 0;

        if let Some(last) = inner.state.last_timestamp {
            loop {
                let back_offset = last - now;
                if back_offset <= 0 {
                    break;
                }
                if back_offset > MAX_BACKWARD {
                    warn!(
                        back_offset,
                        %unit,
                        worker_id = self.worker_id,
                        datacenter_id = self.datacenter_id,
                        "clock moved backwards beyond tolerance; refusing to generate id"
                    );
                    return Err(Error::ClockMovedBackwards {
                        offset: back_offset,
                        unit,
                    });
                }
                debug!(back_offset, %unit, "clock moved backwards; waiting to catch up");
                self.clock.wait_until(tick_start(unit, last)?);
                now = to_ticks(unit, self.clock.now());
            }

            if now == last {
                sequence = (inner.state.sequence + 1) & layout.sequence_mask();
                if sequence == 0 {
                    debug!(last, %unit, "sequence exhausted; waiting for next tick");
                    now = self.til_next_tick(unit, last)?;
                }
            }
        }

        let time_offset = u64::try_from(now - self.epoch_tick(unit)).map_err(|_| {
            Error::EpochAhead {
                epoch: self.epoch,
                now: self.clock.now(),
            }
        })?;
        if time_offset > layout.max_time_offset() {
            return Err(Error::TimestampOverflow);
        }

        inner.state.last_timestamp = Some(now);
        inner.state.sequence = sequence;

        Ok(Issued {
            tick: now,
            time_offset,
            sequence,
        })
    }

    /// Polls the clock until it reports a tick later than `last`.
    fn til_next_tick(&self, unit: TimeUnit, last: i64) -> Result<i64> {
        let next = tick_start(unit, last + 1)?;
        loop {
            let now = to_ticks(unit, self.clock.now());
            if now > last {
                return Ok(now);
            }
            self.clock.wait_until(next);
        }
    }
}

impl<C: Clock> fmt::Debug for Generator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Generator");
        debug
            .field("worker_id", &self.worker_id)
            .field("datacenter_id", &self.datacenter_id)
            .field("epoch", &self.epoch);
        match self.inner.try_lock() {
            Ok(inner) => debug.field("layout", &inner.layout).finish(),
            Err(_) => debug.finish_non_exhaustive(),
        }
    }
}

/// Unix time of `timestamp` in whole ticks, rounded towards the past.
fn to_ticks(unit: TimeUnit, timestamp: Timestamp) -> i64 {
    timestamp
        .as_millisecond()
        .div_euclid(unit.millis_per_tick())
}

fn tick_start(unit: TimeUnit, tick: i64) -> Result<Timestamp> {
    let millis = tick
        .checked_mul(unit.millis_per_tick())
        .ok_or(Error::TimestampOverflow)?;
    Timestamp::from_millisecond(millis).map_err(|_| Error::TimestampOverflow)
}
