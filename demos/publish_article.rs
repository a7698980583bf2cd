//! Publish example
//!
//! Publishes (or updates) a Markdown note from a vault. Run the `qr_login`
//! example first so the session file holds a logged-in session.
//!
//! ```bash
//! cargo run --example publish_article -- /path/to/vault notes/post.md
//! ```

use zhihu_publish::{Config, Event, ZhihuClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let vault = args.next().unwrap_or_else(|| ".".to_string());
    let Some(document) = args.next() else {
        eprintln!("usage: publish_article <vault> <document>");
        std::process::exit(2);
    };

    let client = ZhihuClient::new(Config {
        vault_dir: vault.into(),
        ..Default::default()
    })?;

    let Some(user) = client.current_user().await? else {
        eprintln!("Not logged in; run the qr_login example first");
        std::process::exit(1);
    };
    println!("Publishing as {}", user.name);

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::StepSucceeded { step } => println!("  ok    {step}"),
                Event::StepFailed { step, error } => println!("  fail  {step}: {error}"),
                Event::ImageUploaded { url, transferred, .. } => {
                    println!("  image {url}{}", if transferred { "" } else { " (cached)" });
                }
                Event::TopicSkipped { topic, reason } => println!("  skip  topic {topic}: {reason}"),
                _ => {}
            }
        }
    });

    match client.publish_document(&document).await {
        Ok(report) => {
            println!("Published {} at {}", report.article_id, report.url);
            if !report.skipped_topics.is_empty() {
                println!("Topics not attached: {}", report.skipped_topics.join(", "));
            }
        }
        Err(e) if e.is_precondition() => {
            eprintln!("Document is not ready: {e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
