//! Runs the pick and place cycle on a simulated bench: recording servos, a seeded random color
//! sensor and a trigger that is pressed again shortly after every reset.
//!
//! Useful for checking a waypoint config end to end before it goes anywhere near the arm.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use clap::Parser;
use log::info;

use colorsort_arm::arm_hal_mock::{mock_hal, HalRecord, Journal, MockColorSensor, MockTrigger};
use colorsort_arm::config::ArmConfig;
use colorsort_arm::hw::ThreadPacer;
use colorsort_arm::sequencer::PickPlaceSequencer;
use colorsort_arm::telemetry::{JsonLinesSink, LogSink, TeeSink};

#[derive(Parser, Debug)]
#[clap(name = "sorter")]
struct Opts {
    /// JSON arm config. Built-in defaults when omitted.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Number of pick and place cycles to run, 0 to run forever.
    #[clap(short = 'n', long, default_value = "3")]
    cycles: u64,

    /// Really sleep for every pause instead of just recording it.
    #[clap(long)]
    realtime: bool,

    /// Append telemetry events to this file as JSON lines.
    #[clap(long)]
    events_out: Option<PathBuf>,

    #[clap(long, default_value = "0")]
    seed: u64,
}

/// Polls between simulated presses.
const IDLE_POLLS: usize = 20;
const HELD_POLLS: usize = 8;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts: Opts = Opts::parse();

    let config = match &opts.config {
        Some(path) => ArmConfig::from_path(path)?,
        None => ArmConfig::default(),
    };

    let journal = Journal::default();
    let mut hal = mock_hal(
        &journal,
        MockColorSensor::random(journal.clone(), opts.seed),
        MockTrigger::repeating_presses(journal.clone(), IDLE_POLLS, HELD_POLLS));
    if opts.realtime {
        hal.pacer = Box::new(ThreadPacer);
    }

    let mut sequencer = PickPlaceSequencer::new(&config, hal)?;
    if let Some(path) = &opts.events_out {
        let out = BufWriter::new(File::create(path)?);
        sequencer.set_event_sink(Box::new(TeeSink::new(LogSink, JsonLinesSink::new(out))));
    }

    sequencer.start()?;
    journal.clear();
    while opts.cycles == 0 || sequencer.cycles() < opts.cycles {
        sequencer.run_cycles(1)?;
        report_cycle(sequencer.cycles(), &journal);
        journal.clear();
    }
    println!("Sorted {} objects", sequencer.cycles());
    Ok(())
}

fn report_cycle(cycle: u64, journal: &Journal) {
    let records = journal.records();
    let pulses = records.iter().filter(|r| matches!(r, HalRecord::Pulse(..))).count();
    let reads = records.iter().filter(|r| matches!(r, HalRecord::ReadRgb(_))).count();
    let paused = records
        .iter()
        .filter_map(|r| match r {
            HalRecord::Pause(d) => Some(*d),
            _ => None,
        })
        .sum::<std::time::Duration>();
    info!("Cycle {cycle}: {pulses} servo commands, {reads} color reads, {paused:?} paused");
}
