//! Load generator: many virtual users replaying a scenario against
//! `TALKILLA_SERVER`.
//!
//! ```bash
//! TALKILLA_SERVER=localhost:5000 LOAD_USERS=200 LOAD_SCENARIO=call \
//!     cargo run --release --bin talkilla-loadtest
//! ```

use talkilla_signal::config::ClientConfig;
use talkilla_signal::{load, logging};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init("info");

    let config = ClientConfig::from_env();

    let report = match load::run(&config).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("cannot start load: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "{} scenario(s): {} succeeded, {} failed in {:.2}s",
        report.total(),
        report.succeeded,
        report.failed,
        report.elapsed.as_secs_f64()
    );

    if !report.is_success() {
        std::process::exit(1);
    }
}
