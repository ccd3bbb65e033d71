use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(auto_maple_lib::DEFAULT_SETTINGS));
    auto_maple_lib::run(&settings_path).await
}
