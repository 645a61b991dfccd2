#[tokio::main]
async fn main() -> anyhow::Result<()> {
    moodquiz_lib::run().await
}
