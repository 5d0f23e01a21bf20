use chrono::{Duration, Utc};

use crate::config::Config;
use crate::db::Repository;
use crate::digest::composer::compose;
use crate::error::{AppError, Result};
use crate::models::{Article, EmailStatus, NewEmailHistory};
use crate::services::ResendClient;

#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message: String,
    pub articles_count: i64,
    pub email_id: Option<String>,
}

pub struct DigestSender<'a> {
    repo: &'a Repository,
    config: &'a Config,
    client: Option<ResendClient>,
}

impl<'a> DigestSender<'a> {
    pub fn new(repo: &'a Repository, config: &'a Config) -> Self {
        Self {
            repo,
            config,
            client: None,
        }
    }

    /// Use a pre-built email client instead of one derived from the config.
    pub fn with_client(repo: &'a Repository, config: &'a Config, client: ResendClient) -> Self {
        Self {
            repo,
            config,
            client: Some(client),
        }
    }

    /// Send the digest email for one user.
    ///
    /// Test sends use a fixed synthetic article set, get a `[TEST]` subject
    /// prefix, and are never recorded in the email history. Real sends write
    /// exactly one history row per attempt, sent or failed.
    pub async fn send(&self, user_id: &str, is_test: bool) -> Result<SendOutcome> {
        let api_key = self
            .config
            .resend_api_key
            .as_ref()
            .ok_or_else(|| AppError::Config("resend_api_key is not configured".to_string()))?;

        let settings = self
            .repo
            .user_settings(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user settings for {}", user_id)))?;

        let articles = if is_test {
            test_articles(user_id)
        } else {
            let since = Utc::now() - Duration::hours(24);
            self.repo
                .recent_articles(user_id, since, settings.max_articles_per_email)
                .await?
        };

        if articles.is_empty() && !is_test {
            tracing::info!("No new articles for {}, skipping send", user_id);
            return Ok(SendOutcome {
                message: "No new articles to send".to_string(),
                articles_count: 0,
                email_id: None,
            });
        }

        let digest = compose(&articles, &settings, Utc::now(), is_test);

        let built;
        let client = match &self.client {
            Some(client) => client,
            None => {
                built = ResendClient::new(api_key.clone());
                &built
            }
        };

        tracing::info!(
            "Sending digest to {} ({} articles, test: {})",
            settings.email_address,
            articles.len(),
            is_test
        );

        match client
            .send_email(
                &self.config.from_address,
                &settings.email_address,
                &digest.subject,
                &digest.body,
                settings.format,
            )
            .await
        {
            Ok(email_id) => {
                if !is_test {
                    self.repo
                        .insert_email_history(NewEmailHistory {
                            user_id: user_id.to_string(),
                            recipient: settings.email_address.clone(),
                            subject: digest.subject.clone(),
                            articles_count: articles.len() as i64,
                            status: EmailStatus::Sent,
                            error_message: None,
                        })
                        .await?;
                }
                Ok(SendOutcome {
                    message: format!("Email sent to {}", settings.email_address),
                    articles_count: articles.len() as i64,
                    email_id: Some(email_id),
                })
            }
            Err(e) => {
                tracing::error!("Digest send failed for {}: {}", user_id, e);
                if !is_test {
                    // Best effort: the failure itself is what gets surfaced.
                    let history = self
                        .repo
                        .insert_email_history(NewEmailHistory {
                            user_id: user_id.to_string(),
                            recipient: settings.email_address.clone(),
                            subject: digest.subject.clone(),
                            articles_count: articles.len() as i64,
                            status: EmailStatus::Failed,
                            error_message: Some(e.to_string()),
                        })
                        .await;
                    if let Err(history_err) = history {
                        tracing::error!("Failed to record email history: {}", history_err);
                    }
                }
                Err(e)
            }
        }
    }
}

/// Synthetic articles for validating delivery without waiting for a real
/// ingestion run.
fn test_articles(user_id: &str) -> Vec<Article> {
    let now = Utc::now();
    let entries = [
        (
            "Test Article 1 - Crypto News",
            "https://example.com/crypto-1",
            "This is a test article about cryptocurrency trends and market analysis.",
            vec!["crypto".to_string(), "bitcoin".to_string()],
        ),
        (
            "Test Article 2 - Banking Innovation",
            "https://example.com/banking-1",
            "This is a test article about new banking technologies and digital transformation.",
            vec!["banking".to_string(), "fintech".to_string()],
        ),
        (
            "Test Article 3 - Market Update",
            "https://example.com/market-1",
            "This is a test article with general market updates and economic news.",
            Vec::new(),
        ),
    ];

    entries
        .into_iter()
        .enumerate()
        .map(|(i, (title, link, summary, keywords))| Article {
            id: i as i64,
            user_id: user_id.to_string(),
            title: title.to_string(),
            link: link.to_string(),
            published_at: now,
            source: "Test Feed".to_string(),
            summary: summary.to_string(),
            category: "Feed News".to_string(),
            matched_keywords: keywords,
            created_at: now,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmailStatus, NewArticle, UserSettings};
    use axum::routing::post;
    use axum::{Json, Router};

    async fn test_repo() -> (Repository, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("test.db");
        let repo = Repository::new(path.to_str().unwrap()).await.expect("repo");
        (repo, dir)
    }

    fn config_with_key() -> Config {
        Config {
            resend_api_key: Some("test-key".to_string()),
            ..Config::default()
        }
    }

    async fn spawn_mock_api(fail: bool) -> String {
        let app = Router::new().route(
            "/emails",
            post(move || async move {
                if fail {
                    (
                        axum::http::StatusCode::UNPROCESSABLE_ENTITY,
                        Json(serde_json::json!({"message": "invalid recipient"})),
                    )
                } else {
                    (
                        axum::http::StatusCode::OK,
                        Json(serde_json::json!({"id": "email-123"})),
                    )
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        format!("http://{}", address)
    }

    async fn seed_recipient_with_article(repo: &Repository) {
        repo.upsert_user_settings(UserSettings::for_user("alice", "alice@example.com"))
            .await
            .unwrap();
        repo.insert_article(NewArticle {
            user_id: "alice".to_string(),
            title: "BCE tassi".to_string(),
            link: "https://example.com/bce-tassi".to_string(),
            published_at: Utc::now(),
            source: "Bank News".to_string(),
            summary: "La BCE ha deciso sui tassi.".to_string(),
            category: "Feed News".to_string(),
            matched_keywords: vec!["bce".to_string()],
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn missing_api_key_is_a_configuration_error() {
        let (repo, _dir) = test_repo().await;
        let config = Config {
            resend_api_key: None,
            ..Config::default()
        };

        let err = DigestSender::new(&repo, &config)
            .send("alice", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[tokio::test]
    async fn missing_settings_is_not_found() {
        let (repo, _dir) = test_repo().await;
        let config = config_with_key();

        let err = DigestSender::new(&repo, &config)
            .send("nobody", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn no_recent_articles_short_circuits_without_sending() {
        let (repo, _dir) = test_repo().await;
        let config = config_with_key();
        repo.upsert_user_settings(UserSettings::for_user("alice", "alice@example.com"))
            .await
            .unwrap();

        // No email client is ever reached, so no mock is needed.
        let outcome = DigestSender::new(&repo, &config)
            .send("alice", false)
            .await
            .unwrap();
        assert_eq!(outcome.articles_count, 0);
        assert!(outcome.email_id.is_none());
        assert_eq!(outcome.message, "No new articles to send");
    }

    #[tokio::test]
    async fn successful_send_records_one_sent_history_row() {
        let base = spawn_mock_api(false).await;
        let (repo, _dir) = test_repo().await;
        let config = config_with_key();
        seed_recipient_with_article(&repo).await;

        let client = ResendClient::with_base_url("test-key".to_string(), base);
        let outcome = DigestSender::with_client(&repo, &config, client)
            .send("alice", false)
            .await
            .unwrap();
        assert_eq!(outcome.articles_count, 1);
        assert_eq!(outcome.email_id.as_deref(), Some("email-123"));

        let history = repo.email_history("alice").await.unwrap();
        assert_eq!(history.len(), 1);
        let row = &history[0];
        assert_eq!(row.status, EmailStatus::Sent);
        assert_eq!(row.recipient, "alice@example.com");
        assert_eq!(row.articles_count, 1);
        assert!(row.error_message.is_none());
    }

    #[tokio::test]
    async fn failed_send_records_one_failed_history_row_and_propagates() {
        let base = spawn_mock_api(true).await;
        let (repo, _dir) = test_repo().await;
        let config = config_with_key();
        seed_recipient_with_article(&repo).await;

        let client = ResendClient::with_base_url("test-key".to_string(), base);
        let err = DigestSender::with_client(&repo, &config, client)
            .send("alice", false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::EmailApi(_)));

        let history = repo.email_history("alice").await.unwrap();
        assert_eq!(history.len(), 1);
        let row = &history[0];
        assert_eq!(row.status, EmailStatus::Failed);
        assert_eq!(row.articles_count, 1);
        assert!(row.error_message.as_deref().unwrap().contains("API error"));
    }

    #[tokio::test]
    async fn test_send_leaves_no_history_row() {
        let base = spawn_mock_api(false).await;
        let (repo, _dir) = test_repo().await;
        let config = config_with_key();
        repo.upsert_user_settings(UserSettings::for_user("alice", "alice@example.com"))
            .await
            .unwrap();

        let client = ResendClient::with_base_url("test-key".to_string(), base);
        let outcome = DigestSender::with_client(&repo, &config, client)
            .send("alice", true)
            .await
            .unwrap();
        assert_eq!(outcome.articles_count, 3);
        assert_eq!(outcome.email_id.as_deref(), Some("email-123"));

        assert!(repo.email_history("alice").await.unwrap().is_empty());
    }

    #[test]
    fn test_article_set_mixes_matched_and_unmatched() {
        let articles = test_articles("alice");
        assert_eq!(articles.len(), 3);
        assert!(articles.iter().any(|a| !a.matched_keywords.is_empty()));
        assert!(articles.iter().any(|a| a.matched_keywords.is_empty()));
    }
}
