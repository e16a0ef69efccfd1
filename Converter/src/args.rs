// File: args.rs
use clap::{Parser, ValueEnum};
use mpd_augment::ConvertOptions;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, ValueEnum)]
pub enum LogLevel {
    Trace = 0, // Designates very fine-grained informational events, extremely verbose.
    Debug = 1, // Designates fine-grained informational events.
    Info = 2, // Designates informational messages.
    Warn = 3, // Designates hazardous situations.
    Error = 4, // Designates very serious errors.
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "bba2-converter",
    long_about = "Adds per-segment chunk sizes and a maxAvgRatio to every Representation of a DASH manifest, for BBA-2 clients."
)]
pub struct Args {
    /// Manifest (.mpd) to augment; segment paths resolve relative to its directory
    pub manifest: PathBuf,
    /// Write the augmented manifest here instead of next to the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Appended to the input file stem to name the output (foo.mpd -> fooBBA2.mpd)
    #[arg(short, long, default_value = "BBA2")]
    pub suffix: String,
    /// Analyze representations one after another instead of in parallel
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub sequential: bool,
    /// Write a JSON report of the computed chunk sizes and ratios
    #[arg(short, long)]
    pub report: Option<PathBuf>,
    #[arg(short, long, default_value = "info")]
    pub log_level: LogLevel,
}

pub fn parse_args() -> Args {
    Args::parse()
}

impl Args {
    pub fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            output_path: self.output.clone(),
            suffix: self.suffix.clone(),
            parallel: !self.sequential,
            ..ConvertOptions::new(&self.manifest)
        }
    }
}

pub fn get_log_level_filter(args: &Args) -> LevelFilter {
    // Map the LogLevel enum to the LevelFilter enum
    match args.log_level {
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}
