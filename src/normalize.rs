//! Track normalization.
//!
//! A Standard MIDI File stores each track as a list of events whose timing is
//! a delta in ticks from the previous event. How long a tick lasts depends on
//! the header's time base and, for metrical files, on the tempo that is in
//! effect when those ticks elapse.
//!
//! This module flattens one track into the list of note-on events the player
//! cares about, each carrying the wall-clock time since the previous note-on:
//!  - ticks are converted to milliseconds with the tempo active at the time
//!  - tempo changes only affect ticks that come after them
//!  - every other event is dropped, but its delta still counts towards the
//!    next retained note-on

use midly::{MetaMessage, MidiMessage, Timing, TrackEvent, TrackEventKind};

/// Tempo assumed until the first tempo event: 500,000 µs per beat (120 BPM).
pub const DEFAULT_TEMPO_US_PER_BEAT: u32 = 500_000;

/// How ticks map to real time for a whole file.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TimeBase {
    /// Ticks are fractions of a beat; their length follows the tempo map.
    Metrical { ticks_per_beat: u16 },
    /// SMPTE timing: ticks are fixed fractions of a second, tempo is ignored.
    Timecode { ticks_per_second: f64 },
}

impl TimeBase {
    /// Milliseconds covered by `ticks` at the given tempo.
    pub fn ticks_to_ms(&self, ticks: u32, us_per_beat: u32) -> f64 {
        match *self {
            TimeBase::Metrical { ticks_per_beat } => {
                ticks as f64 * us_per_beat as f64 / ticks_per_beat.max(1) as f64 / 1000.0
            }
            TimeBase::Timecode { ticks_per_second } => {
                ticks as f64 * 1000.0 / ticks_per_second
            }
        }
    }
}

impl From<Timing> for TimeBase {
    fn from(timing: Timing) -> Self {
        match timing {
            Timing::Metrical(ticks) => TimeBase::Metrical {
                ticks_per_beat: ticks.as_int(),
            },
            Timing::Timecode(fps, subframes) => TimeBase::Timecode {
                ticks_per_second: (fps.as_f32() as f64 * subframes as f64).max(1.0),
            },
        }
    }
}

/// A note-on event with its delay from the previous note-on of the track.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedNote {
    pub note_number: u8,
    pub velocity: u8,
    pub delta_time_ms: f64,
}

/// Running state while walking a track.
struct Cursor {
    elapsed_ms: f64,
    us_per_beat: u32,
}

/// Convert one track into its note-on events with millisecond deltas.
///
/// A note-on with velocity 0 is kept as a note-on; it is not folded into a
/// note-off here.
pub fn normalize_track(time_base: TimeBase, events: &[TrackEvent<'_>]) -> Vec<NormalizedNote> {
    let mut cursor = Cursor {
        elapsed_ms: 0.0,
        us_per_beat: DEFAULT_TEMPO_US_PER_BEAT,
    };
    let mut notes = Vec::new();

    for event in events {
        cursor.elapsed_ms += time_base.ticks_to_ms(event.delta.as_int(), cursor.us_per_beat);

        match event.kind {
            TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
                cursor.us_per_beat = tempo.as_int();
            }
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { key, vel },
                ..
            } => {
                notes.push(NormalizedNote {
                    note_number: key.as_int(),
                    velocity: vel.as_int(),
                    delta_time_ms: cursor.elapsed_ms,
                });
                cursor.elapsed_ms = 0.0;
            }
            _ => {}
        }
    }

    notes
}

/// The text of the first non-empty track name event, if the track has one.
pub fn track_name(events: &[TrackEvent<'_>]) -> Option<String> {
    events.iter().find_map(|event| match event.kind {
        TrackEventKind::Meta(MetaMessage::TrackName(bytes)) => {
            let name = String::from_utf8_lossy(bytes).trim().to_string();
            (!name.is_empty()).then_some(name)
        }
        _ => None,
    })
}
