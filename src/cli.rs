use clap::{ArgAction, Parser};
use log::{info, warn};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::chords::{default_threshold_ms, group_chords, GroupingConfig};
use crate::error::{Result, VirtuosoError};
use crate::playback::PlaybackDriver;
use crate::ports::{connect_input, find_input, list_input_ports, open_output};
use crate::prompt::{parse_number, Prompter};
use crate::session::{install_interrupt_handler, Session, SessionEnd};
use crate::song::{Song, TrackChoice};
use crate::trigger::{Instrument, TerminalTriggers};
use crate::PlayerConfig;

const KEYBOARD_CHOICE: &str = "Computer keyboard";

#[derive(Parser)]
#[command(name = "virtuoso")]
#[command(about = "Play a MIDI track one chord per keystroke or MIDI note")]
#[command(version)]
pub struct Cli {
    /// MIDI file to play (defaults to the bundled sample)
    pub midi_file: Option<PathBuf>,

    /// Instrument: "keyboard", or (part of) a MIDI input port name
    #[arg(long)]
    pub input: Option<String>,

    /// Track number as listed by --list-tracks
    #[arg(long)]
    pub track: Option<usize>,

    /// Play every note on its own trigger
    #[arg(long, conflicts_with = "threshold")]
    pub no_group: bool,

    /// Chord threshold in milliseconds (implies chord grouping)
    #[arg(long, value_parser = parse_threshold_arg)]
    pub threshold: Option<f64>,

    /// How long each note sounds, in milliseconds
    #[arg(long, default_value = "200")]
    pub sustain: u64,

    /// Output MIDI channel
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub channel: u8,

    /// Name of the virtual MIDI output port
    #[arg(long, default_value = "Virtuoso")]
    pub port_name: String,

    /// List the playable tracks and exit
    #[arg(long)]
    pub list_tracks: bool,

    /// List MIDI input ports and exit
    #[arg(long)]
    pub list_inputs: bool,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn player_config(&self) -> PlayerConfig {
        PlayerConfig {
            sustain_ms: self.sustain,
            output_port_name: self.port_name.clone(),
            output_channel: self.channel - 1,
            ..PlayerConfig::default()
        }
    }
}

fn parse_threshold_arg(value: &str) -> std::result::Result<f64, String> {
    parse_number(value.trim(), 0.0).map_err(|e| e.to_string())
}

/// Log to stderr; `RUST_LOG` overrides the level picked by `-v`.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = cli.player_config();

    let song = match &cli.midi_file {
        Some(path) => Song::load(path)?,
        None => {
            println!("🎼 No file given, playing the bundled sample");
            Song::bundled()?
        }
    };

    if cli.list_tracks {
        print!("{}", format_track_list(&song));
        return Ok(());
    }
    let inputs = available_inputs();
    if cli.list_inputs {
        print_inputs(&inputs);
        return Ok(());
    }

    // Open the output first so synths can subscribe while the prompts run.
    let output = open_output(&config.output_port_name)?;
    println!("🔌 MIDI output {:?} is open", config.output_port_name);

    let (instrument, track, grouping) = {
        let mut prompter = Prompter::stdio();
        let instrument = choose_instrument(&cli, &inputs, &mut prompter)?;
        let track = choose_track(&cli, &song, &mut prompter)?;
        let grouping = choose_grouping(&cli, track, &config, &mut prompter)?;
        (instrument, track, grouping)
    };

    let chords = group_chords(&track.notes, grouping);
    info!(
        "{}: {} notes in {} chords ({:?})",
        track.name,
        track.notes.len(),
        chords.len(),
        grouping
    );
    println!(
        "\n🎹 {} - {} chords, played with: {}",
        track.name,
        chords.len(),
        instrument.label()
    );

    let driver = PlaybackDriver::new(chords, output, config.sustain(), config.output_channel);
    match &instrument {
        Instrument::ComputerKeyboard => println!("⌨️  Press any key to play the next chord."),
        Instrument::MidiInput { .. } => {
            println!("🎹 Play any note on your MIDI keyboard to play the next chord.")
        }
    }
    println!("🛑 Press Esc, Ctrl-C or Ctrl-D to exit.\n");

    let triggers = match instrument {
        Instrument::ComputerKeyboard => TerminalTriggers::keyboard()?,
        Instrument::MidiInput { index, .. } => TerminalTriggers::midi(connect_input(index)?)?,
    };
    install_interrupt_handler();

    // The session owns the output port and the terminal guard; both are
    // released when it goes out of scope, before the farewell is printed.
    let end = Session::new(driver, triggers).run()?;
    match end {
        SessionEnd::Completed => println!("🎉 Thanks for playing!"),
        SessionEnd::Exited => println!("👋 Goodbye!"),
    }
    Ok(())
}

/// Every playable track, numbered the way `--track` expects.
pub fn format_track_list(song: &Song) -> String {
    let mut output = format!("🎵 Playable tracks in {}:\n", song.name);
    for (i, track) in song.tracks.iter().enumerate() {
        output.push_str(&format!(
            "{}: {} - {:.1}s\n",
            i + 1,
            track.label(),
            track.duration_ms() / 1000.0
        ));
    }
    output
}

fn available_inputs() -> Vec<String> {
    match list_input_ports() {
        Ok(ports) => ports,
        Err(e) => {
            warn!("Could not list MIDI inputs: {}", e);
            Vec::new()
        }
    }
}

fn print_inputs(inputs: &[String]) {
    if inputs.is_empty() {
        println!("❌ No MIDI input ports found");
        return;
    }
    println!("🎹 MIDI input ports:");
    for (i, name) in inputs.iter().enumerate() {
        println!("  {}: {}", i + 1, name);
    }
}

fn choose_instrument<R: std::io::BufRead, W: std::io::Write>(
    cli: &Cli,
    inputs: &[String],
    prompter: &mut Prompter<R, W>,
) -> Result<Instrument> {
    if let Some(query) = &cli.input {
        if query.eq_ignore_ascii_case("keyboard") {
            return Ok(Instrument::ComputerKeyboard);
        }
        let index =
            find_input(inputs, query).ok_or_else(|| VirtuosoError::NoSuchInput(query.clone()))?;
        return Ok(Instrument::MidiInput {
            index,
            name: inputs[index].clone(),
        });
    }
    if inputs.is_empty() {
        println!("💡 No MIDI inputs found, using the computer keyboard");
        return Ok(Instrument::ComputerKeyboard);
    }

    let mut options = inputs.to_vec();
    options.push(KEYBOARD_CHOICE.to_string());
    let choice = prompter.select("🎹 Which instrument will you play?", &options)?;
    Ok(if choice == inputs.len() {
        Instrument::ComputerKeyboard
    } else {
        Instrument::MidiInput {
            index: choice,
            name: inputs[choice].clone(),
        }
    })
}

fn choose_track<'a, R: std::io::BufRead, W: std::io::Write>(
    cli: &Cli,
    song: &'a Song,
    prompter: &mut Prompter<R, W>,
) -> Result<&'a TrackChoice> {
    if let Some(number) = cli.track {
        return number
            .checked_sub(1)
            .and_then(|i| song.tracks.get(i))
            .ok_or(VirtuosoError::TrackOutOfRange {
                requested: number,
                available: song.tracks.len(),
            });
    }
    let labels: Vec<String> = song.tracks.iter().map(TrackChoice::label).collect();
    let choice = prompter.select("🎵 Which track do you want to play?", &labels)?;
    Ok(&song.tracks[choice])
}

fn choose_grouping<R: std::io::BufRead, W: std::io::Write>(
    cli: &Cli,
    track: &TrackChoice,
    config: &PlayerConfig,
    prompter: &mut Prompter<R, W>,
) -> Result<GroupingConfig> {
    if cli.no_group {
        return Ok(GroupingConfig::disabled());
    }
    if let Some(threshold_ms) = cli.threshold {
        return Ok(GroupingConfig::within(threshold_ms));
    }
    if !prompter.confirm("\n🎼 Group chords?", true)? {
        return Ok(GroupingConfig::disabled());
    }
    let default = default_threshold_ms(&track.notes, config.threshold_ratio);
    let threshold_ms = prompter.number("⏱️  Chord threshold in ms", default)?;
    Ok(GroupingConfig::within(threshold_ms))
}
