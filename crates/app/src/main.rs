use clap::Parser;
use std::process::ExitCode;

use voxbridge_app::cli::Args;
use voxbridge_app::{glue, logging};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(1);
        }
    };

    if args.list_devices {
        return match voxbridge_audio::print_input_devices() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Failed to enumerate audio devices: {e}");
                ExitCode::from(1)
            }
        };
    }

    let log_level = args.log_level;
    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid arguments: {e}");
            return ExitCode::from(1);
        }
    };

    let _log_guard = match logging::init(log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            return ExitCode::from(1);
        }
    };

    match glue::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Fatal error: {e}");
            eprintln!("Fatal error: {e}");
            ExitCode::from(1)
        }
    }
}
