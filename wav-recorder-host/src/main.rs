use std::process::ExitCode;

use clap::Parser;

use wav_recorder_core::StopHandle;
use wav_recorder_host::cli::{Cli, Command};
use wav_recorder_host::{commands, CliError};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level)).init();

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode, CliError> {
    match command {
        Command::Record(args) => {
            let stop = StopHandle::new();
            let on_interrupt = stop.clone();
            ctrlc::set_handler(move || {
                log::info!("interrupt received, finishing the current frame");
                on_interrupt.request_stop();
            })?;

            let result = commands::record(&args, stop)?;
            println!("{}", commands::render_result(&result));
            Ok(ExitCode::SUCCESS)
        }
        Command::Inspect(args) => {
            let (report, consistent) = commands::inspect(&args)?;
            println!("{}", report);
            Ok(if consistent { ExitCode::SUCCESS } else { ExitCode::from(2) })
        }
    }
}
