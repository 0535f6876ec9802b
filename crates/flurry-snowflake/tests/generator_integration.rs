use flurry_snowflake::{
    BitWidths, Clock, Error, Generator, GeneratorSettings, ManualClock, TimeUnit,
};
use jiff::{SignedDuration, Timestamp};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// A clock that only moves forward by itself: every `reads_per_tick` reads it
/// steps one millisecond. `wait_until` does nothing, so the generator has to
/// keep polling.
struct SteppingClock {
    now: Mutex<Timestamp>,
    reads: AtomicUsize,
    reads_per_tick: usize,
}

impl SteppingClock {
    fn new(now: Timestamp, reads_per_tick: usize) -> Self {
        Self {
            now: Mutex::new(now),
            reads: AtomicUsize::new(0),
            reads_per_tick,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Timestamp {
        let reads = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        let mut now = self.now.lock().unwrap();
        if reads % self.reads_per_tick == 0 {
            *now = *now + SignedDuration::from_millis(1);
        }
        *now
    }

    fn wait_until(&self, _target: Timestamp) {}
}

#[test]
fn ids_are_strictly_increasing_across_threads() {
    let generator = Arc::new(Generator::new(1, 1).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let generator = Arc::clone(&generator);
            thread::spawn(move || {
                (0..5_000)
                    .map(|_| generator.next_id().unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        let ids = handle.join().unwrap();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
        for id in ids {
            assert!(all.insert(id), "duplicate id {id}");
        }
    }
    assert_eq!(all.len(), 20_000);
}

#[test]
fn sequential_ids_are_monotonic() {
    let generator = Generator::new(31, 31).unwrap();
    let mut previous = generator.next_id().unwrap();
    for _ in 0..50_000 {
        let id = generator.next_id().unwrap();
        assert!(id > previous);
        previous = id;
    }
}

#[test]
fn overflow_polls_the_clock_until_it_moves() {
    let start: Timestamp = "2024-03-05T10:00:00Z".parse().unwrap();
    // The clock only ticks after many reads, far more than the 4 ids the
    // two-bit sequence allows per tick.
    let clock = SteppingClock::new(start, 50);
    let settings = GeneratorSettings::builder()
        .worker_id(0)
        .datacenter_id(0)
        .build();
    let generator = Generator::with_clock(settings, clock).unwrap();
    generator
        .configure(BitWidths::builder().sequence_bits(2).build())
        .unwrap();

    let ids: Vec<u64> = (0..6).map(|_| generator.next_id().unwrap()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));

    let parts: Vec<_> = ids
        .iter()
        .map(|id| generator.decompose(*id).unwrap())
        .collect();
    assert_eq!(parts[3].sequence, 3);
    assert_eq!(parts[4].sequence, 0);
    assert_eq!(parts[4].time_offset, parts[3].time_offset + 1);
}

#[test]
fn distinct_identities_never_collide_on_the_same_tick() {
    let clock = ManualClock::new("2024-03-05T10:00:00Z".parse().unwrap());
    let make = |worker_id, datacenter_id| {
        let settings = GeneratorSettings::builder()
            .worker_id(worker_id)
            .datacenter_id(datacenter_id)
            .build();
        Generator::with_clock(settings, clock.clone()).unwrap()
    };
    let generators = [make(0, 0), make(1, 0), make(0, 1), make(31, 31)];

    let mut seen = HashSet::new();
    for _ in 0..100 {
        for generator in &generators {
            assert!(seen.insert(generator.next_id().unwrap()));
        }
    }
}

#[test]
fn generation_time_round_trips_with_system_clock() {
    let generator = Generator::new(2, 3).unwrap();
    let before = Timestamp::now();
    let id = generator.next_id().unwrap();
    let after = Timestamp::now();

    let decoded = generator.decode_generation_time(id).unwrap();
    assert!(decoded.as_millisecond() >= before.as_millisecond());
    assert!(decoded.as_millisecond() <= after.as_millisecond());
}

#[test]
fn serial_matches_todays_date() {
    let generator = Generator::new(0, 0).unwrap();
    let serial = generator.next_serial(0).unwrap();
    let day = generator
        .decode_generation_time(generator.next_id().unwrap())
        .unwrap()
        .strftime("%Y%m%d")
        .to_string();

    assert_eq!(serial.len(), 8 + 15);
    assert!(serial.chars().all(|c| c.is_ascii_digit()));
    // the two calls may straddle midnight; the serial can only be the earlier day
    assert!(serial[..8] <= *day);
}

#[test]
fn seconds_layout_allows_wider_fields() {
    // 200 does not fit five worker bits
    let err = Generator::new(200, 3).unwrap_err();
    assert!(matches!(err, Error::InvalidWorkerId { .. }));

    let generator = Generator::new(20, 3).unwrap();
    generator
        .configure(
            BitWidths::builder()
                .sequence_bits(20)
                .worker_id_bits(5)
                .datacenter_id_bits(5)
                .time_unit(TimeUnit::Seconds)
                .build(),
        )
        .unwrap();
    let id = generator.next_id().unwrap();
    let parts = generator.decompose(id).unwrap();
    assert_eq!(parts.worker_id, 20);
    assert_eq!(parts.datacenter_id, 3);
}
