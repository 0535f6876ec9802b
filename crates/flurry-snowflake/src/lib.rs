//! Coordination-free, time-ordered 64-bit id generation.
//!
//! Each [`Generator`] packs `[time offset][datacenter id][worker id][sequence]`
//! into one integer. Instances never talk to each other: uniqueness across
//! processes relies on every instance holding a distinct worker/datacenter
//! pair.

mod clock;
pub mod error;
pub mod format;
mod generator;
mod layout;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use generator::{Generator, GeneratorSettings, DEFAULT_EPOCH, MAX_BACKWARD};
pub use layout::{BitWidths, IdParts, Layout, TimeUnit};
