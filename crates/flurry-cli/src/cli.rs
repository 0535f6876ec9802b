use clap::{Parser, Subcommand, ValueEnum};
use flurry_snowflake::{BitWidths, TimeUnit};
use std::fmt::{Display, Formatter};

pub const WORKER_ID_ENV: &str = "FLURRY_WORKER_ID";
pub const DATACENTER_ID_ENV: &str = "FLURRY_DATACENTER_ID";
pub const TIME_UNIT_ENV: &str = "FLURRY_TIME_UNIT";
pub const SEQUENCE_BITS_ENV: &str = "FLURRY_SEQUENCE_BITS";
pub const WORKER_ID_BITS_ENV: &str = "FLURRY_WORKER_ID_BITS";
pub const DATACENTER_ID_BITS_ENV: &str = "FLURRY_DATACENTER_ID_BITS";
pub const LOG_FORMAT_ENV: &str = "FLURRY_LOG_FORMAT";

pub const DEFAULT_TIME_UNIT: &str = "milliseconds";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "flurry", about = "Generate and inspect snowflake ids")]
pub struct CLI {
    #[arg(long, env = WORKER_ID_ENV, default_value_t = 0)]
    pub worker_id: u64,

    #[arg(long, env = DATACENTER_ID_ENV, default_value_t = 0)]
    pub datacenter_id: u64,

    /// `ms`/`milliseconds` or `s`/`seconds`.
    #[arg(long, env = TIME_UNIT_ENV, default_value = DEFAULT_TIME_UNIT)]
    pub time_unit: TimeUnit,

    /// Zero picks the default for the time unit.
    #[arg(long, env = SEQUENCE_BITS_ENV, default_value_t = 0)]
    pub sequence_bits: u32,

    #[arg(long, env = WORKER_ID_BITS_ENV, default_value_t = 5)]
    pub worker_id_bits: u32,

    #[arg(long, env = DATACENTER_ID_BITS_ENV, default_value_t = 5)]
    pub datacenter_id_bits: u32,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print new ids, one per line.
    Id {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Print new date-prefixed serials, one per line.
    Serial {
        #[arg(long, default_value_t = 1)]
        count: usize,
        /// Minimum digits after the date; zero uses the layout's natural width.
        #[arg(long, default_value_t = 0)]
        length: usize,
    },
    /// Show when and where an id was generated.
    Decode { id: u64 },
    /// Run one generator per worker id on its own thread and check that every
    /// serial is distinct.
    Stress {
        #[arg(long, default_value_t = 10)]
        workers: u64,
        #[arg(long, default_value_t = 1_000)]
        count: usize,
    },
}

impl CLI {
    pub fn bit_widths(&self) -> BitWidths {
        BitWidths::builder()
            .sequence_bits(self.sequence_bits)
            .worker_id_bits(self.worker_id_bits)
            .datacenter_id_bits(self.datacenter_id_bits)
            .time_unit(self.time_unit)
            .build()
    }
}
