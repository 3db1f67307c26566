//! Error types for the player.
//!
//! Every fallible operation returns [`VirtuosoError`]. Almost all variants are
//! fatal: they bubble up to `main`, which prints them and exits with code 1.
//! The one exception is [`VirtuosoError::Validation`], which the prompts catch
//! themselves and answer by asking the question again.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VirtuosoError {
    /// The MIDI file could not be read from disk.
    #[error("Could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not a Standard MIDI File midly understands.
    #[error("Not a valid MIDI file: {0}")]
    Parse(#[from] midly::Error),

    /// No track of the song contains a single note-on event.
    #[error("No playable tracks in {0}: none of its tracks contain notes")]
    NoPlayableTracks(String),

    #[error("Track {requested} does not exist (the song has {available} playable tracks)")]
    TrackOutOfRange { requested: usize, available: usize },

    #[error("No MIDI input port matches {0:?}")]
    NoSuchInput(String),

    /// Standard input closed while a prompt was waiting for an answer.
    #[error("Input closed before a choice was made")]
    PromptClosed,

    /// `advance` was called with nothing left to play.
    #[error("Nothing left to play")]
    QueueExhausted,

    #[error("MIDI initialisation failed: {0}")]
    MidiInit(#[from] midir::InitError),

    #[error("Could not connect MIDI port: {0}")]
    MidiConnect(String),

    #[error("Failed to send MIDI message: {0}")]
    MidiSend(#[from] midir::SendError),

    #[error("No MIDI output port available to play through")]
    NoOutputPort,

    /// A prompt answer was rejected; the prompt asks again.
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VirtuosoError>;
