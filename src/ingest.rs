use chrono::{DateTime, Utc};

use crate::db::Repository;
use crate::error::Result;
use crate::feed::{extract_items, match_keywords, FeedFetcher};
use crate::models::{Feed, Keyword, NewArticle, RunReport};

/// Summaries are bounded at storage time.
const SUMMARY_MAX_CHARS: usize = 500;
const ARTICLE_CATEGORY: &str = "Feed News";

pub struct Ingestor<'a> {
    repo: &'a Repository,
    fetcher: &'a FeedFetcher,
}

impl<'a> Ingestor<'a> {
    pub fn new(repo: &'a Repository, fetcher: &'a FeedFetcher) -> Self {
        Self { repo, fetcher }
    }

    /// Run one ingestion pass over every active feed.
    ///
    /// Loading feeds/keywords or creating the execution log aborts the run;
    /// anything that goes wrong for a single feed or a single item is logged
    /// and skipped so the remaining feeds still get processed.
    pub async fn run(&self) -> Result<RunReport> {
        let feeds = self.repo.active_feeds().await?;
        let keywords = self.repo.active_keywords().await?;
        tracing::info!(
            "Starting ingestion: {} active feeds, {} active keywords",
            feeds.len(),
            keywords.len()
        );

        let log_id = self.repo.insert_execution_log().await?;

        let mut articles_found = 0i64;
        let mut articles_saved = 0i64;

        // Feeds are processed one at a time: per-feed error isolation stays
        // simple and the store never sees a burst of concurrent writes.
        for feed in &feeds {
            let (found, saved) = self.process_feed(feed, &keywords).await;
            articles_found += found;
            articles_saved += saved;
        }

        if let Err(e) = self
            .repo
            .complete_execution_log(log_id, articles_found, articles_saved)
            .await
        {
            // Don't leave the log stuck on "running" if we can help it.
            let _ = self.repo.fail_execution_log(log_id, &e.to_string()).await;
            return Err(e);
        }

        tracing::info!(
            "Ingestion completed: found {}, saved {}",
            articles_found,
            articles_saved
        );

        Ok(RunReport {
            articles_found,
            articles_saved,
            log_id,
        })
    }

    /// Returns (items found, items saved) for one feed. Never fails: a fetch
    /// error just means zero items, and the feed's last-updated timestamp is
    /// refreshed regardless of how the items went.
    async fn process_feed(&self, feed: &Feed, keywords: &[Keyword]) -> (i64, i64) {
        tracing::debug!("Processing feed: {} ({})", feed.name, feed.url);

        let owner_keywords: Vec<String> = keywords
            .iter()
            .filter(|k| k.user_id == feed.user_id)
            .map(|k| k.word.clone())
            .collect();

        let items = match self.fetcher.fetch_raw(&feed.url).await {
            Ok(raw) => extract_items(&raw),
            Err(e) => {
                tracing::error!("Error fetching feed {} ({}): {}", feed.name, feed.url, e);
                Vec::new()
            }
        };
        let found = items.len() as i64;
        let mut saved = 0i64;

        for item in items {
            // Fast-path dedup; the store's unique constraint has the final say.
            match self.repo.article_exists(&feed.user_id, &item.link).await {
                Ok(true) => {
                    tracing::debug!("Article already exists: {}", item.title);
                    continue;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Dedup check failed for {}: {}", item.link, e);
                    continue;
                }
            }

            let full_text = format!("{} {} {}", item.title, item.description, item.content);
            let matched = match_keywords(&full_text, &owner_keywords);

            let article = NewArticle {
                user_id: feed.user_id.clone(),
                title: item.title.clone(),
                link: item.link,
                published_at: parse_pub_date(&item.pub_date),
                source: feed.name.clone(),
                summary: truncate_chars(&item.description, SUMMARY_MAX_CHARS),
                category: ARTICLE_CATEGORY.to_string(),
                matched_keywords: matched,
            };

            match self.repo.insert_article(article).await {
                Ok(true) => saved += 1,
                Ok(false) => {
                    tracing::debug!("Article raced into store elsewhere: {}", item.title);
                }
                Err(e) => {
                    tracing::warn!("Error saving article '{}': {}", item.title, e);
                }
            }
        }

        if let Err(e) = self.repo.update_feed_last_updated(feed.id).await {
            tracing::warn!("Failed to refresh last_updated for {}: {}", feed.name, e);
        }

        (found, saved)
    }
}

/// Feeds put anything in pubDate; RFC 2822 is the RSS convention, RFC 3339
/// shows up in the wild, and everything else falls back to now.
fn parse_pub_date(raw: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    Utc::now()
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
