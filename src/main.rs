//! telemetry-reporter entry point.

use telemetry_reporter::cli::{self, Cli};
use telemetry_reporter::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli).await
}
