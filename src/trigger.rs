//! Turning keystrokes and incoming MIDI into playback triggers.

use std::sync::mpsc::RecvTimeoutError;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{debug, warn};

use crate::error::Result;
use crate::ports::InputListener;

/// How often the terminal is checked for exit keys while waiting on MIDI.
const MIDI_POLL_SLICE: Duration = Duration::from_millis(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instrument {
    ComputerKeyboard,
    MidiInput { index: usize, name: String },
}

impl Instrument {
    pub fn label(&self) -> String {
        match self {
            Instrument::ComputerKeyboard => "Computer keyboard".to_string(),
            Instrument::MidiInput { name, .. } => name.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Trigger {
    /// Play the next chord.
    Advance,
    /// Ctrl-C, Ctrl-D or Esc: leave right away.
    Exit,
}

/// Map a key event to a trigger.
///
/// Exit keys work with either instrument; any other key press only advances
/// when the computer keyboard is the instrument.
pub fn classify_key(key: &KeyEvent, keyboard_advances: bool) -> Option<Trigger> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => Some(Trigger::Exit),
        KeyCode::Char('c') | KeyCode::Char('d') if ctrl => Some(Trigger::Exit),
        _ if keyboard_advances => Some(Trigger::Advance),
        _ => None,
    }
}

/// A note-on with non-zero velocity, on any channel.
pub fn is_trigger_message(message: &[u8]) -> bool {
    matches!(message, [status, _, velocity, ..] if status & 0xF0 == 0x90 && *velocity > 0)
}

/// Puts the terminal in raw mode for as long as it lives.
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn enter() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Where a session gets its triggers from.
pub trait TriggerSource {
    /// Wait at most `timeout` for the next trigger.
    fn wait(&mut self, timeout: Duration) -> Result<Option<Trigger>>;
}

/// Triggers read from the controlling terminal, plus the MIDI input when one
/// was chosen as the instrument.
///
/// Owns the raw-mode guard and the input connection; both are released when
/// it is dropped.
pub struct TerminalTriggers {
    midi: Option<InputListener>,
    _raw: RawModeGuard,
}

impl TerminalTriggers {
    pub fn keyboard() -> Result<Self> {
        Ok(TerminalTriggers {
            midi: None,
            _raw: RawModeGuard::enter()?,
        })
    }

    pub fn midi(listener: InputListener) -> Result<Self> {
        Ok(TerminalTriggers {
            midi: Some(listener),
            _raw: RawModeGuard::enter()?,
        })
    }

    fn next_key(timeout: Duration, keyboard_advances: bool) -> Result<Option<Trigger>> {
        if !event::poll(timeout)? {
            return Ok(None);
        }
        match event::read()? {
            Event::Key(key) => Ok(classify_key(&key, keyboard_advances)),
            _ => Ok(None),
        }
    }

    fn next_midi(listener: &InputListener, timeout: Duration) -> Result<Option<Trigger>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(trigger) = Self::next_key(Duration::ZERO, false)? {
                return Ok(Some(trigger));
            }
            let slice = deadline
                .saturating_duration_since(Instant::now())
                .min(MIDI_POLL_SLICE);
            match listener.receiver().recv_timeout(slice) {
                Ok(message) => {
                    debug!("MIDI in {:02X?}", message);
                    if is_trigger_message(&message) {
                        return Ok(Some(Trigger::Advance));
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("MIDI input {:?} disconnected", listener.name());
                    return Ok(Some(Trigger::Exit));
                }
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
        }
    }
}

impl TriggerSource for TerminalTriggers {
    fn wait(&mut self, timeout: Duration) -> Result<Option<Trigger>> {
        match &self.midi {
            None => Self::next_key(timeout, true),
            Some(listener) => Self::next_midi(listener, timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventState;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_exit_keys_exit_in_both_modes() {
        for advances in [true, false] {
            assert_eq!(
                classify_key(&key(KeyCode::Esc, KeyModifiers::NONE), advances),
                Some(Trigger::Exit)
            );
            assert_eq!(
                classify_key(&key(KeyCode::Char('c'), KeyModifiers::CONTROL), advances),
                Some(Trigger::Exit)
            );
            assert_eq!(
                classify_key(&key(KeyCode::Char('d'), KeyModifiers::CONTROL), advances),
                Some(Trigger::Exit)
            );
        }
    }

    #[test]
    fn test_any_other_key_advances_on_keyboard() {
        assert_eq!(
            classify_key(&key(KeyCode::Char('c'), KeyModifiers::NONE), true),
            Some(Trigger::Advance)
        );
        assert_eq!(
            classify_key(&key(KeyCode::Char(' '), KeyModifiers::NONE), true),
            Some(Trigger::Advance)
        );
        assert_eq!(
            classify_key(&key(KeyCode::Enter, KeyModifiers::NONE), true),
            Some(Trigger::Advance)
        );
    }

    #[test]
    fn test_keys_do_not_advance_in_midi_mode() {
        assert_eq!(classify_key(&key(KeyCode::Char('a'), KeyModifiers::NONE), false), None);
    }

    #[test]
    fn test_key_release_is_ignored() {
        let release = KeyEvent {
            code: KeyCode::Char('a'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        };
        assert_eq!(classify_key(&release, true), None);
    }

    #[test]
    fn test_midi_trigger_filter() {
        assert!(is_trigger_message(&[0x90, 60, 100]));
        assert!(is_trigger_message(&[0x9A, 60, 1]));
        assert!(!is_trigger_message(&[0x90, 60, 0]));
        assert!(!is_trigger_message(&[0x80, 60, 64]));
        assert!(!is_trigger_message(&[0xB0, 64, 127]));
        assert!(!is_trigger_message(&[0x90, 60]));
        assert!(!is_trigger_message(&[]));
    }

    #[test]
    fn test_instrument_labels() {
        assert_eq!(Instrument::ComputerKeyboard.label(), "Computer keyboard");
        let midi = Instrument::MidiInput {
            index: 0,
            name: "Digital Piano".to_string(),
        };
        assert_eq!(midi.label(), "Digital Piano");
    }
}
