#[tokio::main]
async fn main() -> anyhow::Result<()> {
    app_user_db::run_server().await
}
