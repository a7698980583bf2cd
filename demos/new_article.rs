//! New article example
//!
//! Creates an empty draft and a matching `untitled.md` scaffold in the vault.

use zhihu_publish::{Config, ZhihuClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // tracing_subscriber::fmt::init();

    let vault = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let client = ZhihuClient::new(Config {
        vault_dir: vault.into(),
        ..Default::default()
    })?;

    let path = client.create_article().await?;
    println!("Created {}", path.display());
    println!("Fill in `topics` before publishing.");

    Ok(())
}
