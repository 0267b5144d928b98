use clap::Parser;
use snmpsim::cli::{initialize_logging, log_path, run, Args};
use snmpsim_core::ExitStatus;
use std::process;
use tracing::{instrument::WithSubscriber, Dispatch};

#[tokio::main]
async fn main() {
    println!("snmpsim v{}", env!("CARGO_PKG_VERSION"));
    let args = Args::parse();

    let dispatch = match initialize_logging(&log_path(&args.script), args.log_level) {
        Ok(dispatch) => dispatch,
        Err(err) => {
            eprintln!("Logging disabled, unable to open log file: {err}");
            Dispatch::none()
        }
    };

    let outcome = tokio::select! {
        outcome = run(&args).with_subscriber(dispatch) => outcome,
        _ = tokio::signal::ctrl_c() => Ok(ExitStatus::Aborted),
    };
    match outcome {
        Ok(ExitStatus::Completed | ExitStatus::ScriptFailed) => {}
        Ok(ExitStatus::Aborted) => {
            eprintln!("Simulation aborted");
            process::exit(1);
        }
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}
