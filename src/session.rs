//! The interactive session: one thread, one loop, one chord per trigger.
//!
//! Each turn of the loop fires whatever signals are due, then waits for a
//! trigger no longer than the time to the next deadline. All queue and
//! scheduler state lives on this thread; MIDI input reaches it through the
//! trigger source's channel.

use std::io::{stdout, Write};
use std::time::{Duration, Instant};

use log::{info, warn};

use crate::error::Result;
use crate::playback::{AdvanceOutcome, MidiSink, PlaybackDriver};
use crate::trigger::{Trigger, TriggerSource};
use crate::{set_shutdown_flag, should_shutdown};

/// Longest single wait, so exit requests are noticed promptly.
const MAX_WAIT: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every chord was played and every scheduled signal was sent.
    Completed,
    /// The user pressed an exit key (or the process was interrupted).
    Exited,
}

/// Route SIGINT into the session loop so an interrupt still releases pending
/// notes. Only the first call in a process installs the handler.
pub fn install_interrupt_handler() {
    if let Err(e) = ctrlc::set_handler(set_shutdown_flag) {
        warn!("Could not install interrupt handler: {}", e);
    }
}

pub struct Session<S: MidiSink, T: TriggerSource> {
    driver: PlaybackDriver<S>,
    triggers: T,
    show_progress: bool,
}

impl<S: MidiSink, T: TriggerSource> Session<S, T> {
    pub fn new(driver: PlaybackDriver<S>, triggers: T) -> Self {
        Session {
            driver,
            triggers,
            show_progress: true,
        }
    }

    pub fn quiet(mut self) -> Self {
        self.show_progress = false;
        self
    }

    /// Play until the queue is exhausted and drained, or until an exit.
    ///
    /// After the last chord is scheduled, further triggers are ignored and the
    /// loop keeps running until the trailing note-offs have been sent. An exit
    /// key sends every pending note-off at once and drops pending note-ons.
    pub fn run(&mut self) -> Result<SessionEnd> {
        let mut finished = self.driver.is_exhausted();

        loop {
            let now = Instant::now();
            self.driver.fire_due(now)?;

            if should_shutdown() {
                return self.exit();
            }
            if finished && self.driver.next_deadline().is_none() {
                self.end_progress();
                info!("All {} chords played", self.driver.total());
                return Ok(SessionEnd::Completed);
            }

            let timeout = self
                .driver
                .next_deadline()
                .map(|due| due.saturating_duration_since(now))
                .unwrap_or(MAX_WAIT)
                .min(MAX_WAIT);

            match self.triggers.wait(timeout)? {
                Some(Trigger::Exit) => return self.exit(),
                Some(Trigger::Advance) if !finished => {
                    let now = Instant::now();
                    if let AdvanceOutcome::Finished = self.driver.advance(now)? {
                        finished = true;
                    }
                    self.driver.fire_due(now)?;
                    self.print_progress();
                }
                _ => {}
            }
        }
    }

    fn exit(&mut self) -> Result<SessionEnd> {
        self.driver.flush_note_offs()?;
        self.end_progress();
        info!(
            "Stopped after {} of {} chords",
            self.driver.played(),
            self.driver.total()
        );
        Ok(SessionEnd::Exited)
    }

    fn print_progress(&self) {
        if self.show_progress {
            print!(
                "\r🎵 Chord {}/{}",
                self.driver.played(),
                self.driver.total()
            );
            stdout().flush().unwrap_or(());
        }
    }

    fn end_progress(&self) {
        if self.show_progress {
            // Raw mode needs the explicit carriage return.
            print!("\r\n");
            stdout().flush().unwrap_or(());
        }
    }

    pub fn driver(&self) -> &PlaybackDriver<S> {
        &self.driver
    }
}
