//! Virtuoso: play a MIDI track one chord per keystroke.
//!
//! A track is normalized into note-on events with millisecond deltas, grouped
//! into chords, and then each trigger (a key press or a note from a MIDI
//! keyboard) plays the next chord on a virtual MIDI output.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

// Global shutdown flag, set from the interrupt handler
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

pub fn set_shutdown_flag() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

pub fn should_shutdown() -> bool {
    SHUTDOWN.load(Ordering::Relaxed)
}

// The sample song played when no file is given
include!(concat!(env!("OUT_DIR"), "/bundled_midi.rs"));

pub mod chords;
pub mod cli;
pub mod error;
pub mod normalize;
pub mod playback;
pub mod ports;
pub mod prompt;
pub mod session;
pub mod song;
pub mod trigger;

pub use chords::{default_threshold_ms, group_chords, Chord, GroupingConfig};
pub use error::{Result, VirtuosoError};
pub use normalize::{normalize_track, NormalizedNote, TimeBase};
pub use playback::{AdvanceOutcome, DriverState, MidiSink, PlaybackDriver};
pub use session::{Session, SessionEnd};
pub use song::{Song, TrackChoice};
pub use trigger::{Instrument, Trigger, TriggerSource};

#[derive(Clone, Debug)]
/// Configuration for output and playback behaviour
pub struct PlayerConfig {
    /// How long each note sounds before its note-off, in milliseconds
    pub sustain_ms: u64,
    /// Name of the MIDI output port other applications connect to
    pub output_port_name: String,
    /// Output channel, 0-based
    pub output_channel: u8,
    /// Share of the mean note spacing used as the default chord threshold
    pub threshold_ratio: f64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            sustain_ms: 200,
            output_port_name: "Virtuoso".to_string(),
            output_channel: 0,
            threshold_ratio: chords::DEFAULT_THRESHOLD_RATIO,
        }
    }
}

impl PlayerConfig {
    pub fn sustain(&self) -> Duration {
        Duration::from_millis(self.sustain_ms)
    }
}
