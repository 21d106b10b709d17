use dep_updater::{cli, logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = logger::init() {
        eprintln!("Failed to initialize logging: {e}");
    }

    cli::main().await
}
