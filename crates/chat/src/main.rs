use std::process::ExitCode;

use mcpchat::app::run_terminal;
use mcpchat::settings::SettingsStore;

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr so they never interleave with streamed replies on stdout.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let settings_store = SettingsStore::load();
    tracing::info!(path = ?settings_store.config_path(), "settings loaded");

    match run_terminal(settings_store).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "mcpchat exited with an error");
            ExitCode::FAILURE
        }
    }
}
