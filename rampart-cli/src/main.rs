#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rampart_cli::run_app().await
}
