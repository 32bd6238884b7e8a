//! `pklookup` binary entrypoint.

use pklookup_telemetry::{LoggingConfig, init_logging};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = init_logging(&LoggingConfig::default()) {
        eprintln!("warning: {err}");
    }
    let exit_code = pklookup_cli::run().await;
    std::process::exit(exit_code);
}
