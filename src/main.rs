#[tokio::main]
async fn main() -> std::io::Result<()> {
    presence_server::run_with_config().await
}
