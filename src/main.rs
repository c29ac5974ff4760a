use aiwc::trace::{self, Event};
use aiwc::WorkloadCharacterization;
use clap::Parser;
use color_eyre::eyre;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Options {
    /// JSON event trace to replay
    #[arg(value_name = "TRACE")]
    trace: PathBuf,

    /// Characterize the replayed kernels
    #[arg(long)]
    aiwc: bool,

    /// Directory the CSV artifacts are written to
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

fn main() -> eyre::Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let options = Options::parse();
    let reader = aiwc::fs::open_readable(&options.trace)?;
    let events: Vec<Event> = serde_json::from_reader(reader)?;
    log::info!(
        "replaying {} events from {}",
        events.len(),
        options.trace.display()
    );

    if options.aiwc {
        let plugin = WorkloadCharacterization::new(options.output_dir.clone());
        trace::replay(&plugin, events);
    } else {
        println!(
            "{} events in {} (pass --aiwc to characterize the kernels)",
            events.len(),
            options.trace.display()
        );
    }
    Ok(())
}
