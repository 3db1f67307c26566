//! Grouping normalized notes into chords, the unit one trigger plays.

use crate::normalize::NormalizedNote;

/// Share of a track's mean note spacing used as the default chord threshold.
pub const DEFAULT_THRESHOLD_RATIO: f64 = 0.6;

/// How notes are grouped into chords.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroupingConfig {
    pub group_chords: bool,
    /// Only consulted when `group_chords` is set.
    pub threshold_ms: f64,
}

impl GroupingConfig {
    pub fn disabled() -> Self {
        GroupingConfig {
            group_chords: false,
            threshold_ms: 0.0,
        }
    }

    pub fn within(threshold_ms: f64) -> Self {
        GroupingConfig {
            group_chords: true,
            threshold_ms,
        }
    }
}

/// Notes played by a single trigger.
///
/// The first note's `delta_time_ms` is the time since the previous chord.
/// Every later note's `delta_time_ms` is its offset from the first note.
#[derive(Clone, Debug, PartialEq)]
pub struct Chord {
    notes: Vec<NormalizedNote>,
}

impl Chord {
    fn starting_with(note: NormalizedNote) -> Self {
        Chord { notes: vec![note] }
    }

    pub fn notes(&self) -> &[NormalizedNote] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    /// Always false: a chord holds at least its first note.
    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Time between the previous chord and this one in the source file.
    pub fn since_previous_ms(&self) -> f64 {
        self.notes[0].delta_time_ms
    }

    /// Each note with its delay from the trigger: 0 for the first note.
    pub fn schedule(&self) -> impl Iterator<Item = (f64, &NormalizedNote)> + '_ {
        self.notes
            .iter()
            .enumerate()
            .map(|(i, note)| (if i == 0 { 0.0 } else { note.delta_time_ms }, note))
    }
}

/// Split a track's notes into chords.
///
/// A note opens a new chord when it is the first note, when grouping is off,
/// or when it would start more than `threshold_ms` after the current chord's
/// first note. Otherwise it joins the current chord, re-based to its offset
/// from the chord's first note.
pub fn group_chords(notes: &[NormalizedNote], grouping: GroupingConfig) -> Vec<Chord> {
    let mut chords: Vec<Chord> = Vec::new();
    // Offset of the previous note from the first note of the current chord.
    let mut offset_ms = 0.0;

    for note in notes {
        let joins =
            grouping.group_chords && offset_ms + note.delta_time_ms <= grouping.threshold_ms;
        match chords.last_mut() {
            Some(chord) if joins => {
                offset_ms += note.delta_time_ms;
                chord.notes.push(NormalizedNote {
                    delta_time_ms: offset_ms,
                    ..*note
                });
            }
            _ => {
                offset_ms = 0.0;
                chords.push(Chord::starting_with(*note));
            }
        }
    }

    chords
}

/// `round(ratio * mean delta)` over the track, 0 for an empty track.
pub fn default_threshold_ms(notes: &[NormalizedNote], ratio: f64) -> f64 {
    if notes.is_empty() {
        return 0.0;
    }
    let mean = notes.iter().map(|n| n.delta_time_ms).sum::<f64>() / notes.len() as f64;
    (ratio * mean).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes_with_deltas(deltas: &[f64]) -> Vec<NormalizedNote> {
        deltas
            .iter()
            .enumerate()
            .map(|(i, &delta_time_ms)| NormalizedNote {
                note_number: 60 + i as u8,
                velocity: 100,
                delta_time_ms,
            })
            .collect()
    }

    fn sizes(chords: &[Chord]) -> Vec<usize> {
        chords.iter().map(Chord::len).collect()
    }

    #[test]
    fn test_grouping_disabled_gives_single_note_chords() {
        let notes = notes_with_deltas(&[0.0, 0.0, 5.0, 300.0, 0.0]);
        let chords = group_chords(&notes, GroupingConfig::disabled());
        assert_eq!(sizes(&chords), vec![1, 1, 1, 1, 1]);
        for (chord, note) in chords.iter().zip(&notes) {
            assert_eq!(chord.notes()[0], *note);
        }
    }

    #[test]
    fn test_threshold_splits_on_large_gap() {
        let notes = notes_with_deltas(&[0.0, 10.0, 5.0, 80.0, 0.0]);
        let chords = group_chords(&notes, GroupingConfig::within(50.0));
        assert_eq!(sizes(&chords), vec![3, 2]);
    }

    #[test]
    fn test_joined_notes_are_rebased_to_chord_start() {
        let notes = notes_with_deltas(&[120.0, 10.0, 5.0, 80.0, 0.0]);
        let chords = group_chords(&notes, GroupingConfig::within(50.0));

        let first: Vec<f64> = chords[0].notes().iter().map(|n| n.delta_time_ms).collect();
        assert_eq!(first, vec![120.0, 10.0, 15.0]);
        assert_eq!(chords[0].since_previous_ms(), 120.0);

        let second: Vec<f64> = chords[1].notes().iter().map(|n| n.delta_time_ms).collect();
        assert_eq!(second, vec![80.0, 0.0]);
    }

    #[test]
    fn test_schedule_starts_at_zero() {
        let notes = notes_with_deltas(&[400.0, 20.0, 30.0]);
        let chords = group_chords(&notes, GroupingConfig::within(50.0));
        let delays: Vec<f64> = chords[0].schedule().map(|(d, _)| d).collect();
        assert_eq!(delays, vec![0.0, 20.0, 50.0]);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let notes = notes_with_deltas(&[0.0, 50.0, 50.1]);
        let chords = group_chords(&notes, GroupingConfig::within(50.0));
        assert_eq!(sizes(&chords), vec![2, 1]);
    }

    #[test]
    fn test_chord_never_spans_past_threshold() {
        let notes = notes_with_deltas(&[0.0, 40.0, 40.0, 40.0]);
        let chords = group_chords(&notes, GroupingConfig::within(50.0));
        assert_eq!(sizes(&chords), vec![2, 2]);

        for chord in &chords {
            let last = chord.schedule().map(|(d, _)| d).fold(0.0, f64::max);
            assert!(last <= 50.0);
        }
        assert_eq!(chords[1].since_previous_ms(), 40.0);
    }

    #[test]
    fn test_no_notes_no_chords() {
        assert!(group_chords(&[], GroupingConfig::within(50.0)).is_empty());
    }

    #[test]
    fn test_default_threshold_is_rounded_share_of_mean() {
        // mean = 250, 0.6 * 250 = 150
        let notes = notes_with_deltas(&[0.0, 500.0, 250.0, 250.0]);
        assert_eq!(default_threshold_ms(&notes, DEFAULT_THRESHOLD_RATIO), 150.0);

        // mean = 111.1.., 0.6 * mean = 66.66.. -> 67
        let notes = notes_with_deltas(&[100.0, 100.0, 133.333_333]);
        assert_eq!(default_threshold_ms(&notes, DEFAULT_THRESHOLD_RATIO), 67.0);

        assert_eq!(default_threshold_ms(&[], DEFAULT_THRESHOLD_RATIO), 0.0);
    }
}
