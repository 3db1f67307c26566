//! MIDI port plumbing: the output the chords are played on and the optional
//! MIDI keyboard that triggers them.

use std::sync::mpsc::{self, Receiver};

use log::{info, warn};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

use crate::error::{Result, VirtuosoError};

const CLIENT_NAME: &str = "Virtuoso";

/// Names of all MIDI input ports currently visible.
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new(CLIENT_NAME)?;
    Ok(midi_in
        .ports()
        .iter()
        .map(|port| {
            midi_in
                .port_name(port)
                .unwrap_or_else(|_| "<Unknown>".to_string())
        })
        .collect())
}

/// Case-insensitive substring match against the listed port names.
pub fn find_input(ports: &[String], query: &str) -> Option<usize> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    ports
        .iter()
        .position(|name| name.to_lowercase() == query)
        .or_else(|| ports.iter().position(|name| name.to_lowercase().contains(&query)))
}

/// Open the output the player sends its notes to.
///
/// On Unix this is a virtual port other applications subscribe to. Platforms
/// without virtual ports get the first hardware/software output instead.
#[cfg(unix)]
pub fn open_output(port_name: &str) -> Result<MidiOutputConnection> {
    use midir::os::unix::VirtualOutput;

    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    let conn = midi_out
        .create_virtual(port_name)
        .map_err(|e| VirtuosoError::MidiConnect(e.to_string()))?;
    info!("Opened virtual MIDI output {:?}", port_name);
    Ok(conn)
}

#[cfg(not(unix))]
pub fn open_output(port_name: &str) -> Result<MidiOutputConnection> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    let ports = midi_out.ports();
    let port = ports.first().ok_or(VirtuosoError::NoOutputPort)?;
    let name = midi_out
        .port_name(port)
        .unwrap_or_else(|_| "Unknown".to_string());
    warn!(
        "Virtual ports are not supported here; playing through {:?} instead of {:?}",
        name, port_name
    );
    midi_out
        .connect(port, port_name)
        .map_err(|e| VirtuosoError::MidiConnect(e.to_string()))
}

/// A connected MIDI input whose messages are forwarded over a channel.
///
/// midir calls back on its own thread; the channel hands every message to
/// whoever owns the receiver. Dropping the listener closes the port.
pub struct InputListener {
    name: String,
    receiver: Receiver<Vec<u8>>,
    _conn: MidiInputConnection<()>,
}

impl InputListener {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn receiver(&self) -> &Receiver<Vec<u8>> {
        &self.receiver
    }
}

/// Connect to input port `index` as listed by [`list_input_ports`].
pub fn connect_input(index: usize) -> Result<InputListener> {
    let mut midi_in = MidiInput::new(CLIENT_NAME)?;
    midi_in.ignore(Ignore::All);

    let ports = midi_in.ports();
    let port = ports
        .get(index)
        .ok_or_else(|| VirtuosoError::NoSuchInput(format!("#{}", index + 1)))?;
    let name = midi_in
        .port_name(port)
        .unwrap_or_else(|_| "Unknown".to_string());

    let (sender, receiver) = mpsc::channel();
    let conn = midi_in
        .connect(
            port,
            "virtuoso-input",
            move |_timestamp, message, _| {
                if sender.send(message.to_vec()).is_err() {
                    warn!("MIDI input received after the session ended");
                }
            },
            (),
        )
        .map_err(|e| VirtuosoError::MidiConnect(e.to_string()))?;
    info!("Listening on MIDI input {:?}", name);

    Ok(InputListener {
        name,
        receiver,
        _conn: conn,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports() -> Vec<String> {
        vec![
            "Midi Through:Midi Through Port-0 14:0".to_string(),
            "Digital Piano:Digital Piano MIDI 1 20:0".to_string(),
            "piano".to_string(),
        ]
    }

    #[test]
    fn test_exact_name_wins_over_substring() {
        assert_eq!(find_input(&ports(), "Piano"), Some(2));
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        assert_eq!(find_input(&ports(), "digital"), Some(1));
        assert_eq!(find_input(&ports(), "THROUGH"), Some(0));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(find_input(&ports(), "launchpad"), None);
        assert_eq!(find_input(&ports(), "  "), None);
    }
}
