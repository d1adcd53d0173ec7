use clap::Parser;
use treewatch_cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    treewatch_cli::init_logging();
    treewatch_cli::run(cli).await
}
