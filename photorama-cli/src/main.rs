//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use photorama_cli::CliError;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    if let Err(err) = photorama_cli::run() {
        if let CliError::ArgumentParsing(clap_err) = &err {
            clap_err.exit();
        }
        eprintln!("photorama: {err}");
        std::process::exit(1);
    }
}
