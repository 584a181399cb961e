#[tokio::main]
async fn main() -> anyhow::Result<()> {
    attested_rewards::server::run().await
}
