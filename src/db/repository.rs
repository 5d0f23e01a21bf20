use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::models::{
    Article, EmailFormat, EmailHistory, EmailStatus, ExecutionLog, ExecutionStatus, Feed, Keyword,
    NewArticle, NewEmailHistory, NewFeed, UserSettings,
};

use super::schema::SCHEMA;

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Feed operations

    pub async fn insert_feed(&self, feed: NewFeed) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO feeds (user_id, url, name) VALUES (?1, ?2, ?3)",
                    params![feed.user_id, feed.url, feed.name],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn active_feeds(&self) -> Result<Vec<Feed>> {
        let feeds = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, url, name, active, last_updated, created_at FROM feeds WHERE active = 1 ORDER BY id",
                )?;
                let feeds = stmt
                    .query_map([], |row| Ok(feed_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(feeds)
            })
            .await?;
        Ok(feeds)
    }

    pub async fn update_feed_last_updated(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE feeds SET last_updated = datetime('now') WHERE id = ?1",
                    params![id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn set_feed_active(&self, id: i64, active: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE feeds SET active = ?1 WHERE id = ?2",
                    params![active, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn delete_feed(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM feeds WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Keyword operations

    /// Insert a keyword for an owner. The word is normalized to lowercase and
    /// must not already exist for that owner (case-insensitive pre-check).
    pub async fn insert_keyword(&self, user_id: &str, word: &str) -> Result<i64> {
        let user_id = user_id.to_string();
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return Err(anyhow::anyhow!("keyword must not be empty").into());
        }

        let existing = self
            .conn
            .call({
                let user_id = user_id.clone();
                let word = word.clone();
                move |conn| {
                    let id: Option<i64> = conn
                        .query_row(
                            "SELECT id FROM keywords WHERE user_id = ?1 AND word = ?2",
                            params![user_id, word],
                            |row| row.get(0),
                        )
                        .optional()?;
                    Ok(id)
                }
            })
            .await?;

        if existing.is_some() {
            return Err(AppError::Conflict(format!(
                "keyword '{}' already exists for this user",
                word
            )));
        }

        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO keywords (user_id, word) VALUES (?1, ?2)",
                    params![user_id, word],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn active_keywords(&self) -> Result<Vec<Keyword>> {
        let keywords = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, word, active, created_at FROM keywords WHERE active = 1 ORDER BY id",
                )?;
                let keywords = stmt
                    .query_map([], |row| Ok(keyword_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(keywords)
            })
            .await?;
        Ok(keywords)
    }

    pub async fn set_keyword_active(&self, id: i64, active: bool) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE keywords SET active = ?1 WHERE id = ?2",
                    params![active, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn delete_keyword(&self, id: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute("DELETE FROM keywords WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    // Article operations

    /// Dedup fast path: has this owner already stored an article with this link?
    pub async fn article_exists(&self, user_id: &str, link: &str) -> Result<bool> {
        let user_id = user_id.to_string();
        let link = link.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM articles WHERE user_id = ?1 AND link = ?2",
                    params![user_id, link],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    /// Insert an article. Returns false if the (user_id, link) pair already
    /// exists; the unique constraint is the dedup authority under concurrent
    /// runs, not the `article_exists` pre-check.
    pub async fn insert_article(&self, article: NewArticle) -> Result<bool> {
        let keywords_json = serde_json::to_string(&article.matched_keywords)?;
        let inserted = self
            .conn
            .call(move |conn| {
                let rows = conn.execute(
                    r#"INSERT INTO articles (user_id, title, link, published_at, source, summary, category, matched_keywords)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                       ON CONFLICT(user_id, link) DO NOTHING"#,
                    params![
                        article.user_id,
                        article.title,
                        article.link,
                        article.published_at.to_rfc3339(),
                        article.source,
                        article.summary,
                        article.category,
                        keywords_json,
                    ],
                )?;
                Ok(rows > 0)
            })
            .await?;
        Ok(inserted)
    }

    pub async fn recent_articles(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Article>> {
        let user_id = user_id.to_string();
        let since = since.to_rfc3339();
        let articles = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, user_id, title, link, published_at, source, summary, category, matched_keywords, created_at
                       FROM articles
                       WHERE user_id = ?1 AND published_at >= ?2
                       ORDER BY published_at DESC
                       LIMIT ?3"#,
                )?;
                let articles = stmt
                    .query_map(params![user_id, since, limit], |row| {
                        Ok(article_from_row(row))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(articles)
            })
            .await?;
        Ok(articles)
    }

    // Execution log operations

    pub async fn insert_execution_log(&self) -> Result<i64> {
        let id = self
            .conn
            .call(|conn| {
                conn.execute(
                    "INSERT INTO execution_logs (status, articles_found, articles_saved) VALUES ('running', 0, 0)",
                    [],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn complete_execution_log(&self, id: i64, found: i64, saved: i64) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE execution_logs
                       SET completed_at = datetime('now'), status = 'completed',
                           articles_found = ?1, articles_saved = ?2
                       WHERE id = ?3"#,
                    params![found, saved, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn fail_execution_log(&self, id: i64, message: &str) -> Result<()> {
        let message = message.to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"UPDATE execution_logs
                       SET completed_at = datetime('now'), status = 'error', error_message = ?1
                       WHERE id = ?2"#,
                    params![message, id],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn execution_log(&self, id: i64) -> Result<Option<ExecutionLog>> {
        let log = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, started_at, completed_at, status, articles_found, articles_saved, error_message FROM execution_logs WHERE id = ?1",
                )?;
                let log = stmt
                    .query_row(params![id], |row| Ok(execution_log_from_row(row)))
                    .optional()?;
                Ok(log)
            })
            .await?;
        Ok(log)
    }

    // Email history

    pub async fn insert_email_history(&self, record: NewEmailHistory) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO email_history (user_id, recipient, subject, articles_count, status, error_message)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                    params![
                        record.user_id,
                        record.recipient,
                        record.subject,
                        record.articles_count,
                        record.status.as_str(),
                        record.error_message,
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;
        Ok(id)
    }

    pub async fn email_history(&self, user_id: &str) -> Result<Vec<EmailHistory>> {
        let user_id = user_id.to_string();
        let history = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, user_id, recipient, subject, articles_count, status, error_message, sent_at
                       FROM email_history WHERE user_id = ?1 ORDER BY sent_at DESC, id DESC"#,
                )?;
                let history = stmt
                    .query_map(params![user_id], |row| Ok(email_history_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(history)
            })
            .await?;
        Ok(history)
    }

    // User settings

    pub async fn user_settings(&self, user_id: &str) -> Result<Option<UserSettings>> {
        let user_id = user_id.to_string();
        let settings = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT user_id, email_enabled, email_address, max_articles_per_email, subject_template, format
                       FROM user_settings WHERE user_id = ?1"#,
                )?;
                let settings = stmt
                    .query_row(params![user_id], |row| Ok(settings_from_row(row)))
                    .optional()?;
                Ok(settings)
            })
            .await?;
        Ok(settings)
    }

    pub async fn upsert_user_settings(&self, settings: UserSettings) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO user_settings (user_id, email_enabled, email_address, max_articles_per_email, subject_template, format)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                       ON CONFLICT(user_id) DO UPDATE SET
                           email_enabled = excluded.email_enabled,
                           email_address = excluded.email_address,
                           max_articles_per_email = excluded.max_articles_per_email,
                           subject_template = excluded.subject_template,
                           format = excluded.format"#,
                    params![
                        settings.user_id,
                        settings.email_enabled,
                        settings.email_address,
                        settings.max_articles_per_email,
                        settings.subject_template,
                        settings.format.as_str(),
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn feed_from_row(row: &Row) -> Feed {
    Feed {
        id: row.get(0).unwrap(),
        user_id: row.get(1).unwrap(),
        url: row.get(2).unwrap(),
        name: row.get(3).unwrap(),
        active: row.get::<_, i64>(4).unwrap() != 0,
        last_updated: row
            .get::<_, Option<String>>(5)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        created_at: row
            .get::<_, String>(6)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn keyword_from_row(row: &Row) -> Keyword {
    Keyword {
        id: row.get(0).unwrap(),
        user_id: row.get(1).unwrap(),
        word: row.get(2).unwrap(),
        active: row.get::<_, i64>(3).unwrap() != 0,
        created_at: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn article_from_row(row: &Row) -> Article {
    let keywords_json: String = row.get(8).unwrap();
    Article {
        id: row.get(0).unwrap(),
        user_id: row.get(1).unwrap(),
        title: row.get(2).unwrap(),
        link: row.get(3).unwrap(),
        published_at: row
            .get::<_, String>(4)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        source: row.get(5).unwrap(),
        summary: row.get(6).unwrap(),
        category: row.get(7).unwrap(),
        matched_keywords: serde_json::from_str(&keywords_json).unwrap_or_default(),
        created_at: row
            .get::<_, String>(9)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn execution_log_from_row(row: &Row) -> ExecutionLog {
    ExecutionLog {
        id: row.get(0).unwrap(),
        started_at: row
            .get::<_, String>(1)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        completed_at: row
            .get::<_, Option<String>>(2)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        status: ExecutionStatus::parse(&row.get::<_, String>(3).unwrap()),
        articles_found: row.get(4).unwrap(),
        articles_saved: row.get(5).unwrap(),
        error_message: row.get(6).unwrap(),
    }
}

fn email_history_from_row(row: &Row) -> EmailHistory {
    EmailHistory {
        id: row.get(0).unwrap(),
        user_id: row.get(1).unwrap(),
        recipient: row.get(2).unwrap(),
        subject: row.get(3).unwrap(),
        articles_count: row.get(4).unwrap(),
        status: EmailStatus::parse(&row.get::<_, String>(5).unwrap()),
        error_message: row.get(6).unwrap(),
        sent_at: row
            .get::<_, String>(7)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
    }
}

fn settings_from_row(row: &Row) -> UserSettings {
    UserSettings {
        user_id: row.get(0).unwrap(),
        email_enabled: row.get::<_, i64>(1).unwrap() != 0,
        email_address: row.get(2).unwrap(),
        max_articles_per_email: row.get(3).unwrap(),
        subject_template: row.get(4).unwrap(),
        format: EmailFormat::parse(&row.get::<_, String>(5).unwrap()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn test_repo() -> (Repository, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.expect("repo");
        (repo, dir)
    }

    fn sample_article(user_id: &str, link: &str) -> NewArticle {
        NewArticle {
            user_id: user_id.to_string(),
            title: "BCE tassi".to_string(),
            link: link.to_string(),
            published_at: Utc::now(),
            source: "Test Feed".to_string(),
            summary: "Summary".to_string(),
            category: "Feed News".to_string(),
            matched_keywords: vec!["bce".to_string()],
        }
    }

    #[tokio::test]
    async fn insert_article_dedups_on_owner_and_link() {
        let (repo, _dir) = test_repo().await;

        let first = repo
            .insert_article(sample_article("alice", "https://example.com/a"))
            .await
            .unwrap();
        assert!(first);

        let second = repo
            .insert_article(sample_article("alice", "https://example.com/a"))
            .await
            .unwrap();
        assert!(!second, "same (owner, link) must not insert twice");

        // A different owner storing the same link is not a duplicate.
        let other_owner = repo
            .insert_article(sample_article("bob", "https://example.com/a"))
            .await
            .unwrap();
        assert!(other_owner);

        assert!(repo.article_exists("alice", "https://example.com/a").await.unwrap());
        assert!(!repo.article_exists("alice", "https://example.com/b").await.unwrap());
    }

    #[tokio::test]
    async fn keyword_insert_is_unique_per_owner_case_insensitive() {
        let (repo, _dir) = test_repo().await;

        repo.insert_keyword("alice", "BCE").await.unwrap();
        let dup = repo.insert_keyword("alice", "bce").await;
        assert!(dup.is_err(), "case-insensitive duplicate must be rejected");

        // Same word for another owner is fine.
        repo.insert_keyword("bob", "bce").await.unwrap();

        let active = repo.active_keywords().await.unwrap();
        let alice: Vec<_> = active.iter().filter(|k| k.user_id == "alice").collect();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].word, "bce");
    }

    #[tokio::test]
    async fn toggled_keywords_leave_active_set() {
        let (repo, _dir) = test_repo().await;

        let id = repo.insert_keyword("alice", "crypto").await.unwrap();
        assert_eq!(repo.active_keywords().await.unwrap().len(), 1);

        repo.set_keyword_active(id, false).await.unwrap();
        assert!(repo.active_keywords().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn execution_log_lifecycle() {
        let (repo, _dir) = test_repo().await;

        let id = repo.insert_execution_log().await.unwrap();
        let running = repo.execution_log(id).await.unwrap().unwrap();
        assert_eq!(running.status, ExecutionStatus::Running);
        assert!(running.completed_at.is_none());

        repo.complete_execution_log(id, 12, 7).await.unwrap();
        let done = repo.execution_log(id).await.unwrap().unwrap();
        assert_eq!(done.status, ExecutionStatus::Completed);
        assert_eq!(done.articles_found, 12);
        assert_eq!(done.articles_saved, 7);
        assert!(done.completed_at.is_some());

        let failed_id = repo.insert_execution_log().await.unwrap();
        repo.fail_execution_log(failed_id, "store unreachable").await.unwrap();
        let failed = repo.execution_log(failed_id).await.unwrap().unwrap();
        assert_eq!(failed.status, ExecutionStatus::Error);
        assert_eq!(failed.error_message.as_deref(), Some("store unreachable"));
    }

    #[tokio::test]
    async fn recent_articles_are_scoped_sorted_and_limited() {
        let (repo, _dir) = test_repo().await;
        let now = Utc::now();

        for (i, hours) in [30i64, 1, 2, 3].iter().enumerate() {
            let mut article = sample_article("alice", &format!("https://example.com/{}", i));
            article.published_at = now - Duration::hours(*hours);
            repo.insert_article(article).await.unwrap();
        }
        repo.insert_article(sample_article("bob", "https://example.com/bob"))
            .await
            .unwrap();

        let since = now - Duration::hours(24);
        let recent = repo.recent_articles("alice", since, 2).await.unwrap();
        assert_eq!(recent.len(), 2, "30h-old article is excluded, limit applies");
        assert!(recent[0].published_at >= recent[1].published_at);
        assert!(recent.iter().all(|a| a.user_id == "alice"));
    }

    #[tokio::test]
    async fn user_settings_upsert_never_duplicates() {
        let (repo, _dir) = test_repo().await;

        let mut settings = UserSettings::for_user("alice", "alice@example.com");
        repo.upsert_user_settings(settings.clone()).await.unwrap();

        settings.max_articles_per_email = 5;
        settings.format = EmailFormat::Text;
        repo.upsert_user_settings(settings).await.unwrap();

        let loaded = repo.user_settings("alice").await.unwrap().unwrap();
        assert_eq!(loaded.max_articles_per_email, 5);
        assert_eq!(loaded.format, EmailFormat::Text);
        assert_eq!(loaded.email_address, "alice@example.com");
    }
}
