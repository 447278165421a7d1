#[tokio::main]
async fn main() -> anyhow::Result<()> {
    sessionswitch_lib::run().await
}
