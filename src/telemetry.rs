use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use log::{info, warn};
use serde::Serialize;

use crate::color::{Bin, ColorReading};
use crate::sequencer::SequencerState;

/// Observable side effects of the pick and place cycle.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SequencerEvent {
    StateChanged { from: SequencerState, to: SequencerState },
    FalseTrigger,
    ColorSampled { reading: ColorReading },
    ClassificationRetry { attempt: u32 },
    CycleCompleted { cycle: u64, bin: Bin },
}

pub trait EventSink {
    fn publish(&mut self, event: &SequencerEvent);
}

/// Default sink: everything goes to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&mut self, event: &SequencerEvent) {
        match event {
            SequencerEvent::StateChanged { from, to } => info!("pick_place: [{from:?}] => [{to:?}]"),
            SequencerEvent::FalseTrigger => warn!("Trigger released during debounce, ignoring"),
            SequencerEvent::ColorSampled { .. } => {}
            SequencerEvent::ClassificationRetry { attempt } => {
                warn!("Color indeterminate, retry #{attempt}")
            }
            SequencerEvent::CycleCompleted { cycle, bin } => {
                info!("Cycle {cycle} done, object placed in {bin:?} bin")
            }
        }
    }
}

/// Writes one JSON object per line. Write failures are logged and the event dropped; telemetry
/// never stops the arm.
pub struct JsonLinesSink<W: Write> {
    out: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn publish(&mut self, event: &SequencerEvent) {
        let result = serde_json::to_writer(&mut self.out, event)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(self.out))
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!("Dropping telemetry event {event:?}: {e}");
        }
    }
}

/// Publishes every event to both sinks.
pub struct TeeSink<A, B> {
    first: A,
    second: B,
}

impl<A: EventSink, B: EventSink> TeeSink<A, B> {
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: EventSink, B: EventSink> EventSink for TeeSink<A, B> {
    fn publish(&mut self, event: &SequencerEvent) {
        self.first.publish(event);
        self.second.publish(event);
    }
}

/// Keeps every event for later inspection.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    events: Rc<RefCell<Vec<SequencerEvent>>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<SequencerEvent> {
        self.events.borrow().clone()
    }

    /// Just the `to` side of every state change.
    pub fn states(&self) -> Vec<SequencerState> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                SequencerEvent::StateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn publish(&mut self, event: &SequencerEvent) {
        self.events.borrow_mut().push(event.clone());
    }
}
