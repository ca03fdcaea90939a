use crypto_portfolio_assistant::{
    agent::{Assistant, DEFAULT_SESSION_ID},
    config::AssistantConfig,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn session_from_args() -> String {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--session" {
            if let Some(id) = args.next() {
                return id;
            }
        } else if let Some(id) = arg.strip_prefix("--session=") {
            return id.to_string();
        }
    }
    DEFAULT_SESSION_ID.to_string()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Logs go to stderr so replies stay readable on stdout
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = AssistantConfig::from_env()?;
    let session_id = session_from_args();
    let assistant = Assistant::from_config(&config).await?;

    info!(session_id = %session_id, "Console session started");

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Crypto portfolio assistant. Type a message, or 'quit' to exit.\n> ")
        .await?;
    stdout.flush().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            break;
        }
        if !line.is_empty() {
            let reply = assistant.handle_turn(&session_id, line).await;
            stdout.write_all(format!("{}\n", reply.summary).as_bytes()).await?;
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
