use std::time::{Duration, Instant};

use midly::num::{u15, u24, u28, u4, u7};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use virtuoso::{
    default_threshold_ms, group_chords, AdvanceOutcome, DriverState, GroupingConfig,
    PlaybackDriver, Song, VirtuosoError,
};

const PPQ: u16 = 480;

fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Meta(message),
    }
}

fn note_on(delta: u32, key: u8, vel: u8) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message: MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(vel),
            },
        },
    }
}

fn note_off(delta: u32, key: u8) -> TrackEvent<'static> {
    TrackEvent {
        delta: u28::new(delta),
        kind: TrackEventKind::Midi {
            channel: u4::new(0),
            message: MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            },
        },
    }
}

fn smf_bytes(tracks: Vec<Track<'static>>) -> Vec<u8> {
    let smf = Smf {
        header: Header::new(Format::Parallel, Timing::Metrical(u15::new(PPQ))),
        tracks,
    };
    let mut data = Vec::new();
    smf.write_std(&mut data).unwrap();
    data
}

/// Wall-clock time of an absolute tick, walking a tempo map of
/// `(tick, microseconds per beat)` changes sorted by tick.
fn absolute_ms(tick: u32, tempo_map: &[(u32, u32)]) -> f64 {
    let mut ms = 0.0;
    let mut at = 0;
    let mut tempo = 500_000;
    for &(change, next_tempo) in tempo_map {
        if change >= tick {
            break;
        }
        ms += (change - at) as f64 * tempo as f64 / PPQ as f64 / 1000.0;
        at = change;
        tempo = next_tempo;
    }
    ms + (tick - at) as f64 * tempo as f64 / PPQ as f64 / 1000.0
}

#[test]
fn test_deltas_follow_tempo_changes() {
    let track = vec![
        meta(0, MetaMessage::TrackName(b"Lead")),
        note_on(0, 60, 100),
        note_off(240, 60),
        note_on(240, 62, 100),
        meta(480, MetaMessage::Tempo(u24::new(1_000_000))),
        note_on(480, 64, 100),
        note_off(480, 64),
        meta(0, MetaMessage::EndOfTrack),
    ];
    let song = Song::from_bytes("tempo.mid", &smf_bytes(vec![track])).unwrap();
    let lead = &song.tracks[0];
    assert_eq!(lead.name, "Lead");

    let deltas: Vec<f64> = lead.notes.iter().map(|n| n.delta_time_ms).collect();
    assert_eq!(deltas, vec![0.0, 500.0, 1500.0]);

    let tempo_map = [(0, 500_000), (960, 1_000_000)];
    let reference = absolute_ms(1440, &tempo_map);
    assert!((lead.duration_ms() - reference).abs() < 1e-9);
}

#[test]
fn test_tracks_without_notes_are_not_offered() {
    let conductor = vec![
        meta(0, MetaMessage::TrackName(b"Conductor")),
        meta(0, MetaMessage::Tempo(u24::new(600_000))),
        meta(0, MetaMessage::EndOfTrack),
    ];
    let unnamed = vec![
        note_on(0, 48, 80),
        note_off(100, 48),
        meta(0, MetaMessage::EndOfTrack),
    ];
    let song = Song::from_bytes("two.mid", &smf_bytes(vec![conductor, unnamed])).unwrap();

    assert_eq!(song.tracks.len(), 1);
    assert_eq!(song.tracks[0].index, 1);
    assert_eq!(song.tracks[0].name, "Track 2");
}

#[test]
fn test_song_without_notes_is_unplayable() {
    let silent = vec![
        meta(0, MetaMessage::TrackName(b"Silence")),
        meta(960, MetaMessage::EndOfTrack),
    ];
    let err = Song::from_bytes("silent.mid", &smf_bytes(vec![silent])).unwrap_err();
    assert!(matches!(err, VirtuosoError::NoPlayableTracks(name) if name == "silent.mid"));
}

#[test]
fn test_bundled_sample_tracks() {
    let song = Song::bundled().unwrap();
    let names: Vec<&str> = song.tracks.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Melody", "Accompaniment"]);
    assert_eq!(song.tracks[0].notes.len(), 15);
    assert_eq!(song.tracks[1].notes.len(), 24);
    assert!((song.tracks[0].duration_ms() - 7000.0).abs() < 1e-9);
}

#[test]
fn test_rolled_chords_play_through() {
    let song = Song::bundled().unwrap();
    let accompaniment = &song.tracks[1];
    let threshold = default_threshold_ms(&accompaniment.notes, 0.6);
    let chords = group_chords(&accompaniment.notes, GroupingConfig::within(threshold));
    assert_eq!(chords.len(), 8);
    assert!(chords.iter().all(|c| c.len() == 3));

    let sustain = Duration::from_millis(200);
    let mut driver = PlaybackDriver::new(chords, Vec::new(), sustain, 1);
    let t0 = Instant::now();

    assert_eq!(driver.advance(t0).unwrap(), AdvanceOutcome::Advanced { remaining: 7 });
    assert_eq!(driver.fire_due(t0).unwrap(), 1);
    assert_eq!(driver.sink()[0], vec![0x91, 48, 70]);

    // The roll is 10 ticks per note at 120 BPM, about 10.4 ms.
    assert_eq!(driver.fire_due(t0 + Duration::from_millis(21)).unwrap(), 2);
    assert_eq!(driver.state(), DriverState::Playing);
    assert_eq!(driver.fire_due(t0 + Duration::from_millis(221)).unwrap(), 3);
    assert_eq!(driver.state(), DriverState::Idle);

    let mut now = t0;
    let mut outcome = AdvanceOutcome::Advanced { remaining: 7 };
    while outcome != AdvanceOutcome::Finished {
        now += Duration::from_secs(1);
        outcome = driver.advance(now).unwrap();
        driver.fire_due(now + Duration::from_millis(500)).unwrap();
    }
    assert_eq!(driver.played(), 8);

    let sent = driver.sink();
    assert_eq!(sent.iter().filter(|m| m[0] == 0x91).count(), 24);
    assert_eq!(sent.iter().filter(|m| m[0] == 0x81).count(), 24);
    assert!(matches!(driver.advance(now), Err(VirtuosoError::QueueExhausted)));
}
