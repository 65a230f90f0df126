use clap::Parser;
use presentation::cli::{Cli, CliApp};

#[tokio::main]
async fn main() -> shared::types::Result<()> {
    let cli = Cli::parse();
    let app = CliApp::new();
    app.run(cli).await
}
