use clap::Parser;
use mimalloc::MiMalloc;

mod cmd;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cmd::Cli::parse().execute().await
}
