use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    agent_probe::cli::run_cli().await
}
