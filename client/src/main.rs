use clap::Parser;
use client::input::{spawn_stdin_reader, ClientCommand, HELP};
use client::network::Client;
use client::rendering::TextRenderer;
use client::store::{leaderboard, FileScoreStore, ScoreStore};
use log::{info, warn};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5555")]
    server: String,

    /// Name shown to the other player
    #[arg(short = 'u', long)]
    username: String,

    /// Score history file
    #[arg(long, default_value = "playerscore.bin")]
    scores: String,

    /// Mark this player ready as soon as it joins
    #[arg(long)]
    auto_ready: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let store = FileScoreStore::new(&args.scores);
    match store.load() {
        Ok(book) => {
            for (rank, (name, score)) in leaderboard(&book).iter().take(5).enumerate() {
                info!("#{} {} {}", rank + 1, name, score);
            }
        }
        Err(e) => warn!("Could not read {}: {}", args.scores, e),
    }

    info!("Controls: {}", HELP);

    let mut client = Client::connect(
        &args.server,
        &args.username,
        Box::new(TextRenderer::stdout()),
        Box::new(store),
    )
    .await?;

    let (tx, rx) = mpsc::unbounded_channel();
    if args.auto_ready {
        let _ = tx.send(ClientCommand::ToggleReady);
    }
    spawn_stdin_reader(tx);

    client.run(rx).await
}
