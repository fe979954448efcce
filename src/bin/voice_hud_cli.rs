use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::Level;
use voice_hud::analysis::{
    describe_resonance, frequency_to_note_name, frequency_to_semitones, Formants, Locale,
    VoiceRange,
};
use voice_hud::audio::CpalCapture;
use voice_hud::config::AppConfig;
use voice_hud::engine::{analyze_wav, start_session, DetectionSnapshot};

#[derive(Parser, Debug)]
#[command(
    name = "voice_hud_cli",
    about = "Pitch, formant and voicing analysis for recordings and live input"
)]
struct Cli {
    /// JSON configuration file (defaults are used for missing fields)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Analyse a WAV file and print one JSON snapshot per line
    Analyze {
        #[arg(long)]
        wav: PathBuf,
        /// Samples between consecutive frames
        #[arg(long, default_value_t = 1024)]
        hop: usize,
        /// Include the byte spectrum in each line
        #[arg(long)]
        with_spectrum: bool,
        /// Locale for the resonance description
        #[arg(long, value_enum, default_value_t = LocaleArg::En)]
        locale: LocaleArg,
    },
    /// Analyse the default microphone and print snapshots as they arrive
    Live {
        /// Stop after this many seconds
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        #[arg(long, value_enum, default_value_t = LocaleArg::En)]
        locale: LocaleArg,
    },
    /// Print the note name and voice ranges for a frequency
    Note { hz: f64 },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LocaleArg {
    En,
    Zh,
}

impl From<LocaleArg> for Locale {
    fn from(arg: LocaleArg) -> Self {
        match arg {
            LocaleArg::En => Locale::En,
            LocaleArg::Zh => Locale::Zh,
        }
    }
}

/// One output line
#[derive(Serialize)]
struct SnapshotLine<'a> {
    t_ms: u64,
    pitch_hz: Option<f64>,
    note: Option<String>,
    rms: f64,
    voiced: bool,
    hold: voice_hud::engine::HoldState,
    formants: Formants,
    ghost_formants: Formants,
    resonance: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    spectrum: Option<&'a [u8]>,
}

impl<'a> SnapshotLine<'a> {
    fn new(snapshot: &'a DetectionSnapshot, locale: Locale, with_spectrum: bool) -> Self {
        Self {
            t_ms: snapshot.timestamp_ms,
            pitch_hz: snapshot.pitch,
            note: snapshot.pitch.map(frequency_to_note_name),
            rms: snapshot.rms,
            voiced: snapshot.voiced,
            hold: snapshot.hold_state,
            formants: snapshot.formants,
            ghost_formants: snapshot.ghost_formants,
            resonance: describe_resonance(&snapshot.formants, locale),
            spectrum: with_spectrum.then_some(snapshot.spectrum_bytes.as_slice()),
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::default(),
    };
    config.validate().context("validating configuration")?;

    match cli.command {
        Commands::Analyze {
            wav,
            hop,
            with_spectrum,
            locale,
        } => run_analyze(&config, wav, hop, with_spectrum, locale.into()),
        Commands::Live { seconds, locale } => run_live(config, seconds, locale.into()),
        Commands::Note { hz } => run_note(hz),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn run_analyze(
    config: &AppConfig,
    wav: PathBuf,
    hop: usize,
    with_spectrum: bool,
    locale: Locale,
) -> Result<ExitCode> {
    let snapshots = analyze_wav(&wav, config, hop)
        .with_context(|| format!("analysing {}", wav.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for snapshot in &snapshots {
        let line = SnapshotLine::new(snapshot, locale, with_spectrum);
        writeln!(out, "{}", serde_json::to_string(&line)?)?;
    }

    let voiced = snapshots.iter().filter(|s| s.voiced).count();
    eprintln!("{} frames, {} voiced", snapshots.len(), voiced);
    Ok(ExitCode::from(0))
}

fn run_live(mut config: AppConfig, seconds: u64, locale: Locale) -> Result<ExitCode> {
    let (capture, source) =
        CpalCapture::open(&config.spectrum).context("opening the default input device")?;
    config.spectrum.sample_rate = capture.sample_rate();
    eprintln!(
        "Listening at {} Hz for {}s (Ctrl+C to abort)",
        capture.sample_rate(),
        seconds
    );

    let handle = start_session(source, config).context("starting detection session")?;
    let mut rx = handle.subscribe();
    let deadline = Instant::now() + Duration::from_secs(seconds);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    while Instant::now() < deadline && handle.is_running() {
        loop {
            match rx.try_recv() {
                Ok(snapshot) => {
                    let line = SnapshotLine::new(&snapshot, locale, false);
                    writeln!(out, "{}", serde_json::to_string(&line)?)?;
                }
                Err(tokio::sync::broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("output lagged, skipped {} snapshots", skipped);
                }
                Err(_) => break,
            }
        }
        thread::sleep(Duration::from_millis(20));
    }

    let stream_failed = !capture.is_active();
    handle.stop().context("stopping detection session")?;
    capture.stop().context("stopping input stream")?;
    if stream_failed {
        bail!("input stream failed during capture");
    }
    Ok(ExitCode::from(0))
}

fn run_note(hz: f64) -> Result<ExitCode> {
    if !(hz.is_finite() && hz > 0.0) {
        bail!("frequency must be a positive number (got {hz})");
    }
    println!("{}", frequency_to_note_name(hz));
    println!("{:+.2} semitones from A4", frequency_to_semitones(hz));
    for range in VoiceRange::all() {
        let (low, high) = range.bounds();
        let marker = if range.contains(hz) { "*" } else { " " };
        println!("{} {:<12} {:>5.0}-{:<5.0} Hz", marker, range.label(), low, high);
    }
    Ok(ExitCode::from(0))
}
