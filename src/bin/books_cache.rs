use books_cache::app::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    App::from_args()?.execute().await
}
