use std::process::ExitCode;

use vizcount::app::DashboardApp;
use vizcount::error::VizError;

#[tokio::main]
async fn main() -> ExitCode {
    match DashboardApp::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(VizError::Cli(err)) => {
            let _ = err.print();
            ExitCode::from(2)
        }
        Err(err) => {
            eprintln!("vizcount: {err}");
            ExitCode::FAILURE
        }
    }
}
