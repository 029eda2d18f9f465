// src/main.rs

use taskdag::{all_succeeded, cli, logging, run};

#[tokio::main]
async fn main() {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("taskdag error: {err:?}");
        std::process::exit(1);
    }

    match run(args).await {
        Ok(reports) => {
            if !all_succeeded(&reports) {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("taskdag error: {err:?}");
            std::process::exit(1);
        }
    }
}
