mod cli;

use crate::cli::{Command, LogFormat, CLI};
use anyhow::{ensure, Context};
use clap::Parser;
use flurry_snowflake::{BitWidths, Generator, GeneratorSettings};
use std::collections::HashSet;
use std::thread;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let config = CLI::try_parse()?;
    init_tracing(config.log_format);

    let widths = config.bit_widths();
    info!(
        worker_id = config.worker_id,
        datacenter_id = config.datacenter_id,
        time_unit = %config.time_unit,
        "starting flurry"
    );

    match config.command {
        Command::Id { count } => {
            let generator = build_generator(config.worker_id, config.datacenter_id, widths)?;
            for _ in 0..count {
                println!("{}", generator.next_id()?);
            }
        }
        Command::Serial { count, length } => {
            let generator = build_generator(config.worker_id, config.datacenter_id, widths)?;
            for _ in 0..count {
                println!("{}", generator.next_serial(length)?);
            }
        }
        Command::Decode { id } => {
            let generator = build_generator(config.worker_id, config.datacenter_id, widths)?;
            let parts = generator.decompose(id)?;
            println!("generated_at:  {}", generator.decode_generation_time(id)?);
            println!("time_offset:   {}", parts.time_offset);
            println!("datacenter_id: {}", parts.datacenter_id);
            println!("worker_id:     {}", parts.worker_id);
            println!("sequence:      {}", parts.sequence);
        }
        Command::Stress { workers, count } => {
            stress(workers, config.datacenter_id, count, widths)?;
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    // stdout carries the generated values, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn build_generator(
    worker_id: u64,
    datacenter_id: u64,
    widths: BitWidths,
) -> anyhow::Result<Generator> {
    let settings = GeneratorSettings::builder()
        .worker_id(worker_id)
        .datacenter_id(datacenter_id)
        .widths(widths)
        .build();
    Generator::with_settings(settings).context("invalid generator settings")
}

fn stress(
    workers: u64,
    datacenter_id: u64,
    count: usize,
    widths: BitWidths,
) -> anyhow::Result<()> {
    let started = Instant::now();

    let handles = (0..workers)
        .map(|worker_id| -> anyhow::Result<_> {
            let generator = build_generator(worker_id, datacenter_id, widths)?;
            Ok(thread::spawn(move || {
                (0..count)
                    .map(|_| generator.next_serial(0))
                    .collect::<Result<Vec<_>, _>>()
            }))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut serials = HashSet::new();
    for handle in handles {
        let batch = handle
            .join()
            .map_err(|_| anyhow::anyhow!("stress worker panicked"))??;
        serials.extend(batch);
    }

    let expected = workers as usize * count;
    ensure!(
        serials.len() == expected,
        "expected {expected} distinct serials, got {}",
        serials.len()
    );

    info!(
        workers,
        count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "all serials distinct"
    );
    Ok(())
}
