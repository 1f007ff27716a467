// src/main.rs

use std::process::ExitCode;

use stackguard::{cli, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("stackguard error: {err:?}");
        return ExitCode::from(1);
    }

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("stackguard error: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
