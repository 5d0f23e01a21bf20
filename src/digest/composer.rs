use chrono::{DateTime, Utc};

use crate::models::{Article, EmailFormat, UserSettings};

#[derive(Debug, Clone)]
pub struct Digest {
    pub subject: String,
    pub body: String,
}

const NO_ARTICLES_MESSAGE: &str = "Nessun nuovo articolo in questo digest.";
const TEXT_SEPARATOR: &str = "----------------------------------------";

/// Build the digest email for an article set.
///
/// Articles with at least one matched keyword come first, everything else
/// after, each group preserving the input order (callers pass articles
/// pre-sorted by publish time descending). Test sends get a `[TEST] `
/// subject prefix.
pub fn compose(
    articles: &[Article],
    settings: &UserSettings,
    now: DateTime<Utc>,
    is_test: bool,
) -> Digest {
    let (keyword_articles, other_articles): (Vec<&Article>, Vec<&Article>) = articles
        .iter()
        .partition(|article| !article.matched_keywords.is_empty());

    let date = now.format("%d/%m/%Y").to_string();
    let mut subject = settings
        .subject_template
        .replacen("{date}", &date, 1)
        .replacen("{count}", &articles.len().to_string(), 1);
    if is_test {
        subject = format!("[TEST] {}", subject);
    }

    let body = match settings.format {
        EmailFormat::Html => render_html(&keyword_articles, &other_articles, settings, &date),
        EmailFormat::Text => render_text(&keyword_articles, &other_articles, &date),
    };

    Digest { subject, body }
}

fn render_html(
    keyword_articles: &[&Article],
    other_articles: &[&Article],
    settings: &UserSettings,
    date: &str,
) -> String {
    let total = keyword_articles.len() + other_articles.len();
    let mut html = String::new();

    html.push_str(&format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>Feed Tailor - Daily Digest</title>
<style>
  body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
  .header {{ background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 30px; text-align: center; border-radius: 10px 10px 0 0; }}
  .content {{ background: #f8f9fa; padding: 30px; border-radius: 0 0 10px 10px; }}
  .section {{ margin-bottom: 30px; }}
  .section-title {{ color: #495057; font-size: 20px; font-weight: bold; margin-bottom: 15px; padding-bottom: 10px; border-bottom: 2px solid #e9ecef; }}
  .article {{ background: white; padding: 20px; margin-bottom: 15px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
  .article-title {{ font-size: 18px; font-weight: bold; margin-bottom: 8px; }}
  .article-title a {{ color: #495057; text-decoration: none; }}
  .article-meta {{ font-size: 14px; color: #6c757d; margin-bottom: 10px; }}
  .article-summary {{ font-size: 16px; line-height: 1.5; }}
  .keywords {{ margin-top: 10px; }}
  .keyword {{ background: #667eea; color: white; padding: 4px 8px; border-radius: 4px; font-size: 12px; margin-right: 5px; display: inline-block; }}
  .empty {{ text-align: center; color: #6c757d; padding: 30px; }}
  .footer {{ text-align: center; margin-top: 30px; padding-top: 20px; border-top: 1px solid #e9ecef; color: #6c757d; font-size: 14px; }}
  .stats {{ background: #e3f2fd; padding: 15px; border-radius: 5px; margin-bottom: 20px; text-align: center; }}
</style>
</head>
<body>
<div class="header">
  <h1>Feed Tailor</h1>
  <p>Il tuo digest personalizzato - {date}</p>
</div>
<div class="content">
"#,
        date = date
    ));

    if total == 0 {
        html.push_str(&format!("<div class=\"empty\">{}</div>\n", NO_ARTICLES_MESSAGE));
    } else {
        html.push_str(&format!(
            "<div class=\"stats\"><strong>{} articoli trovati</strong> &bull; <strong>{} con keywords</strong> &bull; <strong>{} altri</strong></div>\n",
            total,
            keyword_articles.len(),
            other_articles.len()
        ));

        if !keyword_articles.is_empty() {
            html.push_str(&format!(
                "<div class=\"section\">\n<h2 class=\"section-title\">Articoli con Keywords ({})</h2>\n",
                keyword_articles.len()
            ));
            for article in keyword_articles {
                html.push_str(&render_html_article(article, true));
            }
            html.push_str("</div>\n");
        }

        if !other_articles.is_empty() {
            html.push_str(&format!(
                "<div class=\"section\">\n<h2 class=\"section-title\">Altri Articoli ({})</h2>\n",
                other_articles.len()
            ));
            for article in other_articles {
                html.push_str(&render_html_article(article, false));
            }
            html.push_str("</div>\n");
        }
    }

    html.push_str(&format!(
        r#"</div>
<div class="footer">
  <p>Email generata automaticamente da Feed Tailor</p>
  <p>Configurazione: {} articoli max &bull; Formato: {}</p>
</div>
</body>
</html>
"#,
        settings.max_articles_per_email,
        settings.format.as_str()
    ));

    html
}

fn render_html_article(article: &Article, with_keywords: bool) -> String {
    let mut block = format!(
        r#"<div class="article">
  <div class="article-title"><a href="{link}" target="_blank">{title}</a></div>
  <div class="article-meta">{source} &bull; {date}</div>
  <div class="article-summary">{summary}</div>
"#,
        link = article.link,
        title = article.title,
        source = article.source,
        date = article.published_at.format("%d/%m/%Y"),
        summary = article.summary,
    );

    if with_keywords && !article.matched_keywords.is_empty() {
        block.push_str("  <div class=\"keywords\">");
        for keyword in &article.matched_keywords {
            block.push_str(&format!("<span class=\"keyword\">{}</span>", keyword));
        }
        block.push_str("</div>\n");
    }

    block.push_str("</div>\n");
    block
}

fn render_text(keyword_articles: &[&Article], other_articles: &[&Article], date: &str) -> String {
    let total = keyword_articles.len() + other_articles.len();
    let mut text = String::new();

    text.push_str("FEED TAILOR - DAILY DIGEST\n");
    text.push_str(&format!("Il tuo digest personalizzato - {}\n", date));
    text.push_str(&format!("{}\n\n", TEXT_SEPARATOR));

    if total == 0 {
        text.push_str(NO_ARTICLES_MESSAGE);
        text.push('\n');
        return text;
    }

    text.push_str(&format!(
        "{} articoli trovati, {} con keywords, {} altri\n\n",
        total,
        keyword_articles.len(),
        other_articles.len()
    ));

    if !keyword_articles.is_empty() {
        text.push_str(&format!(
            "ARTICOLI CON KEYWORDS ({})\n\n",
            keyword_articles.len()
        ));
        for article in keyword_articles {
            text.push_str(&render_text_article(article, true));
        }
    }

    if !other_articles.is_empty() {
        text.push_str(&format!("ALTRI ARTICOLI ({})\n\n", other_articles.len()));
        for article in other_articles {
            text.push_str(&render_text_article(article, false));
        }
    }

    text
}

fn render_text_article(article: &Article, with_keywords: bool) -> String {
    let mut block = format!(
        "{}\n{} - {}\n{}\n{}\n",
        article.title,
        article.source,
        article.published_at.format("%d/%m/%Y"),
        article.summary,
        article.link,
    );

    if with_keywords && !article.matched_keywords.is_empty() {
        block.push_str(&format!(
            "Keywords: {}\n",
            article.matched_keywords.join(", ")
        ));
    }

    block.push_str(&format!("{}\n\n", TEXT_SEPARATOR));
    block
}
