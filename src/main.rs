#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chat_gateway_lib::run().await
}
