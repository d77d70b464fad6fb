use clap::Parser;
use midi2ly::{transcribe_with, MidiFile, RenderSettings, TranscribeOptions};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "midi2ly",
    version,
    about = "Transcribe standard MIDI files into LilyPond source"
)]
struct Cli {
    /// MIDI files to transcribe
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Write the result here instead of standard output
    #[arg(short, long, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Use \relative octave entry instead of absolute pitches
    #[arg(long)]
    relative: bool,

    /// Omit durations that repeat the previous note's duration
    #[arg(long)]
    condense: bool,

    /// Snap note starts and ends to a grid of this many ticks
    #[arg(long, value_name = "TICKS")]
    quantize: Option<u64>,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(&cli) {
        eprintln!("{}", e);
        std::process::exit(1)
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let settings = RenderSettings {
        relative: cli.relative,
        condense: cli.condense,
    };
    let options = TranscribeOptions {
        quantize: cli.quantize,
    };

    let mut outputs = Vec::new();
    for path in &cli.files {
        let file = MidiFile::load(path)?;
        let score = transcribe_with(&file, &options)?;
        outputs.push(score.render(&settings)?);
    }
    let text = outputs.join("\n");

    match &cli.out {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{}", text),
    }
    Ok(())
}
