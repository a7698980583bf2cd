//! QR login example
//!
//! This example demonstrates the login flow of zhihu-publish:
//! - Creating a client with a session file
//! - Subscribing to login events
//! - Printing the scan URL (and its replacements when the code expires)
//! - Cancelling with Ctrl+C
//!
//! Render the printed URL as a QR code with any tool and scan it with the
//! mobile app.

use zhihu_publish::{Config, Event, LoginOutcome, ZhihuClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let config = Config {
        state_path: "zhihu-data.json".into(),
        ..Default::default()
    };
    let client = ZhihuClient::new(config)?;

    if let Some(user) = client.current_user().await? {
        println!("Already logged in as {}", user.name);
        return Ok(());
    }

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::QrCodeRotated { url } => println!("Code expired, scan this one instead:\n  {url}"),
                Event::QrCodeScanned => println!("Scanned, confirm the login on your phone"),
                Event::StepFailed { step, error } => eprintln!("{step} failed: {error}"),
                _ => {}
            }
        }
    });

    let login = client.start_qr_login().await?;
    println!("Scan this URL as a QR code:\n  {}", login.url());

    tokio::select! {
        outcome = login.wait() => match outcome? {
            LoginOutcome::Confirmed(user) => println!("Logged in as {}", user.name),
            LoginOutcome::Cancelled => println!("Login cancelled"),
        },
        _ = tokio::signal::ctrl_c() => {
            // Dropping the handle stops polling
            println!("Interrupted");
        }
    }

    Ok(())
}
