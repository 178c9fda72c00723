// src/main.rs

use planrun::{cli, error_exit_code, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("planrun error: {err:?}");
        std::process::exit(1);
    }

    match run(args).await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(err) => {
            eprintln!("planrun error: {err}");
            std::process::exit(error_exit_code(&err));
        }
    }
}
