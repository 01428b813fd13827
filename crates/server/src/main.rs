use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    beacon_server::main_entry().await
}
