use clap::{CommandFactory, Parser};
use crossbeam_channel::unbounded;

use mergetail::cli::Cli;
use mergetail::config::{format_error_message, MergetailConfig};
use mergetail::config_file::ConfigFile;
use mergetail::platform::{Ctrl, ExitCode, SignalHandler};
use mergetail::{logging, runner, tty};

fn main() {
    let (ctrl_tx, ctrl_rx) = unbounded::<Ctrl>();

    // Initialize signal handling early
    let _signal_handler = match SignalHandler::new(ctrl_tx) {
        Ok(handler) => handler,
        Err(e) => {
            eprintln!(
                "{}",
                format_error_message(&format!("Failed to initialize signal handling: {}", e))
            );
            ExitCode::GeneralError.exit();
        }
    };

    let cli = process_args_with_config();
    logging::init(cli.verbose, tty::is_stderr_tty());

    let config = match MergetailConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error_message(&format!("{:#}", e)));
            ExitCode::InvalidUsage.exit();
        }
    };

    // Nothing to merge and nobody piping in: show usage instead of waiting
    if config.is_humanize_mode() && tty::is_stdin_tty() {
        println!("{}", Cli::command().render_usage());
        println!("Merge concurrently growing logs into one time-ordered, colorized stream");
        println!("Try 'mergetail --help' for more information.");
        ExitCode::Success.exit();
    }

    match runner::run(&config, ctrl_rx) {
        Ok(exit_code) => exit_code.exit(),
        Err(e) => {
            runner::report_error(&e);
            ExitCode::GeneralError.exit();
        }
    }
}

/// Apply rc-file defaults and aliases, then parse the command line.
fn process_args_with_config() -> Cli {
    let raw_args: Vec<String> = std::env::args().collect();
    let config_file_path = extract_config_file_arg(&raw_args);

    if raw_args.iter().any(|arg| arg == "--show-config") {
        match ConfigFile::load_with_custom_path(config_file_path.as_deref()) {
            Ok(loaded) => print!("{}", loaded.describe()),
            Err(e) => {
                eprintln!("{}", format_error_message(&format!("Config file error: {:#}", e)));
                ExitCode::GeneralError.exit();
            }
        }
        ExitCode::Success.exit();
    }

    let processed_args = if raw_args.iter().any(|arg| arg == "--ignore-config") {
        raw_args
    } else {
        let processed = ConfigFile::load_with_custom_path(config_file_path.as_deref())
            .and_then(|loaded| loaded.config.process_args(raw_args));
        match processed {
            Ok(args) => args,
            Err(e) => {
                eprintln!("{}", format_error_message(&format!("Config error: {:#}", e)));
                ExitCode::GeneralError.exit();
            }
        }
    };

    // Prints help/version or a usage error (exit 2) on its own
    let mut cli = Cli::try_parse_from(processed_args).unwrap_or_else(|e| e.exit());
    cli.resolve_boolean_flags();
    cli
}

fn extract_config_file_arg(args: &[String]) -> Option<String> {
    args.iter().enumerate().find_map(|(i, arg)| {
        if arg == "--config-file" {
            args.get(i + 1).cloned()
        } else {
            arg.strip_prefix("--config-file=").map(str::to_string)
        }
    })
}
