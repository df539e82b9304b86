// Melomidi command-line entry point
// Parses arguments, layers them over the JSON config, and runs the transcriber

use clap::Parser;
use std::path::PathBuf;

use melomidi_lib::pipeline::{
    write_notes_json, PipelineError, TraceWriter, TranscribeConfig, Transcriber,
};

#[derive(Parser, Debug)]
#[command(name = "melomidi")]
#[command(author, version, about = "Transcribe a monophonic melody from audio into a MIDI file", long_about = None)]
struct Args {
    /// Input WAV file
    input: PathBuf,

    /// Output MIDI file
    output: PathBuf,

    /// Median smoothing window in seconds (zero or negative disables smoothing)
    #[arg(long, allow_negative_numbers = true)]
    smooth: Option<f64>,

    /// Minimum note duration in seconds
    #[arg(long, allow_negative_numbers = true)]
    minduration: Option<f64>,

    /// Apply the minimum duration to the final note as well
    #[arg(long)]
    strict: bool,

    /// Fixed tempo in BPM instead of estimating it from the audio
    #[arg(long)]
    bpm: Option<f64>,

    /// JSON config file; command-line flags take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Append per-stage progress as JSON lines to this file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Also write the detected notes as JSON
    #[arg(long)]
    notes_json: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn resolve_config(&self) -> Result<TranscribeConfig, PipelineError> {
        let mut config = match self.config {
            Some(ref path) => TranscribeConfig::from_json_file(path)?,
            None => TranscribeConfig::default(),
        };

        if let Some(smooth) = self.smooth {
            config.smooth_secs = smooth;
        }
        if let Some(min_duration) = self.minduration {
            config.min_duration_secs = min_duration;
        }
        if self.strict {
            config.strict_min_duration = true;
        }
        if self.bpm.is_some() {
            config.bpm = self.bpm;
        }

        Ok(config)
    }

    /// Resolved and validated transcriber, with tracing attached when requested
    fn transcriber(&self) -> Result<Transcriber, PipelineError> {
        let config = self.resolve_config()?;
        log::debug!("Resolved config: {:?}", config);

        let transcriber = Transcriber::new(config)?;
        Ok(match self.trace {
            Some(ref path) => transcriber.with_trace(TraceWriter::new(path.clone())),
            None => transcriber,
        })
    }
}

fn run(args: &Args) -> Result<(), PipelineError> {
    let transcriber = args.transcriber()?;
    let transcription = transcriber.transcribe_file(&args.input, &args.output)?;

    if let Some(ref path) = args.notes_json {
        write_notes_json(path, &transcription)?;
        log::info!("Notes written to {}", path.display());
    }

    Ok(())
}

fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    match run(&args) {
        Ok(()) => log::info!("Conversion complete."),
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(e.exit_code());
        }
    }
}
