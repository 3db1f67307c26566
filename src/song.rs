//! Loading a MIDI file into playable track choices.

use std::fs;
use std::path::Path;

use log::{debug, info};
use midly::Smf;

use crate::error::{Result, VirtuosoError};
use crate::normalize::{normalize_track, track_name, NormalizedNote, TimeBase};

/// One track the user can pick: only tracks with at least one note-on qualify.
#[derive(Clone, Debug)]
pub struct TrackChoice {
    /// Position of the track in the file, 0-based.
    pub index: usize,
    pub name: String,
    pub notes: Vec<NormalizedNote>,
}

impl TrackChoice {
    /// Prompt label: name plus note count.
    pub fn label(&self) -> String {
        format!("{} ({} notes)", self.name, self.notes.len())
    }

    /// Wall-clock length of the track up to its last note-on, in ms.
    pub fn duration_ms(&self) -> f64 {
        self.notes.iter().map(|n| n.delta_time_ms).sum()
    }
}

#[derive(Clone, Debug)]
pub struct Song {
    pub name: String,
    pub time_base: TimeBase,
    pub tracks: Vec<TrackChoice>,
}

impl Song {
    /// Read and parse a MIDI file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| VirtuosoError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Unknown")
            .to_string();
        Self::from_bytes(name, &data)
    }

    /// The sample song embedded at build time.
    pub fn bundled() -> Result<Self> {
        Self::from_bytes(crate::BUNDLED_SAMPLE_NAME, crate::BUNDLED_SAMPLE)
    }

    /// Parse raw MIDI bytes and normalize every track.
    ///
    /// Tracks without note-on events are dropped; if none remain the song is
    /// unplayable and [`VirtuosoError::NoPlayableTracks`] is returned.
    pub fn from_bytes(name: impl Into<String>, data: &[u8]) -> Result<Self> {
        let name = name.into();
        let smf = Smf::parse(data)?;
        let time_base = TimeBase::from(smf.header.timing);
        debug!(
            "Parsed {}: {} tracks, time base {:?}",
            name,
            smf.tracks.len(),
            time_base
        );

        let tracks: Vec<TrackChoice> = smf
            .tracks
            .iter()
            .enumerate()
            .filter_map(|(index, events)| {
                let notes = normalize_track(time_base, events);
                if notes.is_empty() {
                    debug!("Skipping track {}: no note-on events", index);
                    return None;
                }
                let name = track_name(events).unwrap_or_else(|| format!("Track {}", index + 1));
                Some(TrackChoice { index, name, notes })
            })
            .collect();

        if tracks.is_empty() {
            return Err(VirtuosoError::NoPlayableTracks(name));
        }
        info!("Loaded {} with {} playable tracks", name, tracks.len());

        Ok(Song {
            name,
            time_base,
            tracks,
        })
    }
}
