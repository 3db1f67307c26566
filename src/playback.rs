//! The playback driver: one chord per trigger, with timed note-on/note-off.
//!
//! Nothing here sleeps. `advance` only puts signals on a timer heap; the
//! session loop calls `fire_due` whenever a deadline passes. This keeps the
//! loop free to take the next trigger while the previous chord is still
//! sounding, and lets tests drive time with synthetic `Instant`s.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::chords::Chord;
use crate::error::{Result, VirtuosoError};

/// Anything that accepts raw MIDI messages.
pub trait MidiSink {
    fn send(&mut self, message: &[u8]) -> Result<()>;
}

impl MidiSink for midir::MidiOutputConnection {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        midir::MidiOutputConnection::send(self, message)?;
        Ok(())
    }
}

/// Records every message, in send order.
impl MidiSink for Vec<Vec<u8>> {
    fn send(&mut self, message: &[u8]) -> Result<()> {
        self.push(message.to_vec());
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Signal {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8 },
}

impl Signal {
    pub fn to_bytes(self, channel: u8) -> [u8; 3] {
        match self {
            Signal::NoteOn { note, velocity } => [0x90 | (channel & 0x0F), note, velocity],
            Signal::NoteOff { note } => [0x80 | (channel & 0x0F), note, 0],
        }
    }
}

/// Pending signals ordered by deadline, then by the order they were added.
#[derive(Debug, Default)]
pub struct Scheduler {
    heap: BinaryHeap<Reverse<(Instant, u64, Signal)>>,
    next_seq: u64,
}

impl Scheduler {
    pub fn schedule(&mut self, due: Instant, signal: Signal) {
        self.heap.push(Reverse((due, self.next_seq, signal)));
        self.next_seq += 1;
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.heap.peek().map(|Reverse((due, _, _))| *due)
    }

    /// Remove and return the earliest signal if it is due at `now`.
    pub fn pop_due(&mut self, now: Instant) -> Option<Signal> {
        match self.heap.peek() {
            Some(Reverse((due, _, _))) if *due <= now => {
                self.heap.pop().map(|Reverse((_, _, signal))| signal)
            }
            _ => None,
        }
    }

    /// Empty the heap, returning what was left in deadline order.
    pub fn drain(&mut self) -> Vec<Signal> {
        let mut pending = Vec::with_capacity(self.heap.len());
        while let Some(Reverse((_, _, signal))) = self.heap.pop() {
            pending.push(signal);
        }
        pending
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverState {
    /// Nothing scheduled; waiting for the next trigger.
    Idle,
    /// Signals of one or more chords are still pending.
    Playing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced { remaining: usize },
    /// The chord just scheduled was the last one.
    Finished,
}

pub struct PlaybackDriver<S: MidiSink> {
    queue: VecDeque<Chord>,
    total: usize,
    scheduler: Scheduler,
    sink: S,
    sustain: Duration,
    channel: u8,
}

impl<S: MidiSink> PlaybackDriver<S> {
    pub fn new(chords: Vec<Chord>, sink: S, sustain: Duration, channel: u8) -> Self {
        PlaybackDriver {
            total: chords.len(),
            queue: chords.into(),
            scheduler: Scheduler::default(),
            sink,
            sustain,
            channel,
        }
    }

    /// Schedule the next chord relative to `now`.
    ///
    /// The first note sounds at `now`, later notes at their offset within the
    /// chord; each note-off follows its note-on after the sustain window.
    /// Signals still pending from earlier chords are left alone.
    pub fn advance(&mut self, now: Instant) -> Result<AdvanceOutcome> {
        let chord = self.queue.pop_front().ok_or(VirtuosoError::QueueExhausted)?;
        debug!(
            "Chord {}/{}: {} notes, {:.0} ms after the previous one in the file",
            self.played(),
            self.total,
            chord.len(),
            chord.since_previous_ms()
        );

        for (delay_ms, note) in chord.schedule() {
            let on_at = now + Duration::from_secs_f64(delay_ms.max(0.0) / 1000.0);
            self.scheduler.schedule(
                on_at,
                Signal::NoteOn {
                    note: note.note_number,
                    velocity: note.velocity,
                },
            );
            self.scheduler.schedule(
                on_at + self.sustain,
                Signal::NoteOff {
                    note: note.note_number,
                },
            );
        }

        if self.queue.is_empty() {
            Ok(AdvanceOutcome::Finished)
        } else {
            Ok(AdvanceOutcome::Advanced {
                remaining: self.queue.len(),
            })
        }
    }

    /// Send every signal whose deadline is at or before `now`.
    pub fn fire_due(&mut self, now: Instant) -> Result<usize> {
        let mut sent = 0;
        while let Some(signal) = self.scheduler.pop_due(now) {
            self.emit(signal)?;
            sent += 1;
        }
        Ok(sent)
    }

    /// Send all pending note-offs right away and drop pending note-ons.
    pub fn flush_note_offs(&mut self) -> Result<()> {
        for signal in self.scheduler.drain() {
            if let Signal::NoteOff { .. } = signal {
                self.emit(signal)?;
            }
        }
        Ok(())
    }

    fn emit(&mut self, signal: Signal) -> Result<()> {
        let bytes = signal.to_bytes(self.channel);
        trace!("-> {:02X?}", bytes);
        self.sink.send(&bytes)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn state(&self) -> DriverState {
        if self.scheduler.is_empty() {
            DriverState::Idle
        } else {
            DriverState::Playing
        }
    }

    /// Chords already handed to the scheduler.
    pub fn played(&self) -> usize {
        self.total - self.queue.len()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn is_exhausted(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}
