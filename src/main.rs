use std::sync::Arc;

use feed_tailor::config::Config;
use feed_tailor::db::Repository;
use feed_tailor::digest::DigestSender;
use feed_tailor::error::Result;
use feed_tailor::feed::FeedFetcher;
use feed_tailor::ingest::Ingestor;
use feed_tailor::models::NewFeed;
use feed_tailor::server::{run_server, AppState};

const USAGE: &str = "Usage: feed-tailor [COMMAND]

Commands:
  (none)                          start the HTTP server
  --ingest                        run one ingestion pass and exit
  --send-email <user>             send the digest email for a user and exit
  --test-email <user>             send a test digest email and exit
  --add-feed <user> <url> <name>  register a feed
  --add-keyword <user> <word>     register a keyword";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let config = Config::load()?;
    let repo = Repository::new(&config.db_path).await?;

    match args.get(1).map(String::as_str) {
        Some("--ingest") => {
            let fetcher = FeedFetcher::new(&config.user_agent);
            let report = Ingestor::new(&repo, &fetcher).run().await?;
            println!(
                "Ingestion run {} completed: found {}, saved {}",
                report.log_id, report.articles_found, report.articles_saved
            );
        }
        Some("--send-email") | Some("--test-email") => {
            let user = args.get(2).map(String::as_str).unwrap_or_else(|| {
                eprintln!("{}", USAGE);
                std::process::exit(2);
            });
            let is_test = args[1] == "--test-email";
            let outcome = DigestSender::new(&repo, &config).send(user, is_test).await?;
            println!("{}", outcome.message);
        }
        Some("--add-feed") => {
            if args.len() < 5 {
                eprintln!("{}", USAGE);
                std::process::exit(2);
            }
            let id = repo
                .insert_feed(NewFeed {
                    user_id: args[2].clone(),
                    url: args[3].clone(),
                    name: args[4].clone(),
                })
                .await?;
            println!("Added feed {} ({})", id, args[4]);
        }
        Some("--add-keyword") => {
            if args.len() < 4 {
                eprintln!("{}", USAGE);
                std::process::exit(2);
            }
            let id = repo.insert_keyword(&args[2], &args[3]).await?;
            println!("Added keyword {} ({})", id, args[3]);
        }
        Some("--help") | Some("-h") => {
            println!("{}", USAGE);
        }
        Some(other) => {
            eprintln!("Unknown command: {}\n\n{}", other, USAGE);
            std::process::exit(2);
        }
        None => {
            let fetcher = FeedFetcher::new(&config.user_agent);
            let bind_addr = config.bind_addr.clone();
            let state = Arc::new(AppState {
                repo,
                fetcher,
                config,
            });
            run_server(state, &bind_addr).await?;
        }
    }

    Ok(())
}
