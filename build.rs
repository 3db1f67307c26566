//! Build script for embedding the bundled sample MIDI file
//!
//! This script:
//! - Scans the `midi/` directory for `.mid` files
//! - Parses the first one (sorted by name) with the midly crate
//! - Refuses to build if it has no note-on events at all
//! - Generates Rust code exposing its name and bytes to the player

use midly::{MidiMessage, Smf, TrackEventKind};
use std::env;
use std::fs::{read_dir, File};
use std::io::Write;
use std::path::Path;

fn main() {
    println!("cargo:rerun-if-changed=midi/");

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("bundled_midi.rs");
    let mut out = File::create(&dest_path).unwrap();

    let midi_dir = Path::new("midi");
    let mut midi_file_paths = Vec::new();

    if midi_dir.exists() {
        for entry in read_dir(midi_dir).unwrap() {
            let entry = entry.unwrap();
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("mid") {
                midi_file_paths.push(path);
            }
        }
    }
    midi_file_paths.sort();

    let sample = midi_file_paths
        .first()
        .expect("No MIDI files found in midi/ directory!");
    println!("cargo:rerun-if-changed={}", sample.display());

    let midi_bytes = std::fs::read(sample).unwrap();
    let smf = Smf::parse(&midi_bytes).unwrap();

    let note_ons: usize = smf
        .tracks
        .iter()
        .map(|track| {
            track
                .iter()
                .filter(|ev| {
                    matches!(
                        ev.kind,
                        TrackEventKind::Midi {
                            message: MidiMessage::NoteOn { .. },
                            ..
                        }
                    )
                })
                .count()
        })
        .sum();
    if note_ons == 0 {
        panic!("Bundled sample {} has no note-on events", sample.display());
    }

    let filename = sample.file_name().unwrap().to_str().unwrap().to_string();
    let song_name = filename.replace(".mid", "").replace('_', " ");
    let abs_path = std::fs::canonicalize(sample).unwrap();

    writeln!(out, "// Bundled sample: {} ({} note-ons)", filename, note_ons).unwrap();
    writeln!(out, "pub const BUNDLED_SAMPLE_NAME: &str = {:?};", song_name).unwrap();
    writeln!(
        out,
        "pub static BUNDLED_SAMPLE: &[u8] = include_bytes!({:?});",
        abs_path.display().to_string()
    )
    .unwrap();
}
