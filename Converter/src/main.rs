// main.rs

use mpd_augment::ManifestError;
use std::error::Error;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, Layer};

mod args;

fn main() -> ExitCode {
    // Parse command-line arguments
    let args = args::parse_args();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(true)
        .with_line_number(true)
        .with_filter(args::get_log_level_filter(&args));
    let subscriber = tracing_subscriber::registry().with(fmt_layer);
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set global default subscriber: {}", e);
        return ExitCode::FAILURE;
    }

    info!("{:?}", args);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  caused by: {}", cause);
                source = cause.source();
            }
            ExitCode::FAILURE
        }
    }
}

/// Convert the manifest. An error means no output file was written; the
/// report is best effort once the manifest is in place.
fn run(args: &args::Args) -> Result<(), ManifestError> {
    let summary = mpd_augment::convert_manifest(&args.convert_options())?;

    for rep in &summary.representations {
        info!("{} {} {}", rep.representation_id, rep.bandwidth, rep.ratio_text());
    }

    if let Some(report) = &args.report {
        match summary.write_report(report) {
            Ok(()) => info!("Report written to {}", report.display()),
            Err(e) => error!("{}", e),
        }
    }

    info!("{}", summary.output.display());
    Ok(())
}
