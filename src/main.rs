//! otlp-recorder CLI entry point.

use otlp_recorder::cli::{self, Cli};
use otlp_recorder::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli::execute(cli).await
}
