use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    persona::run().await
}
