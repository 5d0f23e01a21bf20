use std::sync::OnceLock;

use regex::Regex;

/// One item extracted from a raw feed document. Fields are already
/// tag-stripped and trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RssItem {
    pub title: String,
    pub link: String,
    pub pub_date: String,
    pub description: String,
    pub content: String,
}

// Real-world feeds are frequently malformed, so items are extracted with
// tolerant patterns instead of a strict XML parser. Each field pattern
// accepts either a CDATA-wrapped body or a plain body.

fn item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<item[^>]*>(.*?)</item>").expect("valid regex"))
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<title[^>]*><!\[CDATA\[(.*?)\]\]></title>|<title[^>]*>(.*?)</title>")
            .expect("valid regex")
    })
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)<link[^>]*><!\[CDATA\[(.*?)\]\]></link>|<link[^>]*>(.*?)</link>")
            .expect("valid regex")
    })
}

fn pub_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<pubDate[^>]*>(.*?)</pubDate>").expect("valid regex"))
}

fn description_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<description[^>]*><!\[CDATA\[(.*?)\]\]></description>|<description[^>]*>(.*?)</description>",
        )
        .expect("valid regex")
    })
}

fn content_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?is)<content:encoded[^>]*><!\[CDATA\[(.*?)\]\]></content:encoded>|<content:encoded[^>]*>(.*?)</content:encoded>",
        )
        .expect("valid regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid regex"))
}

fn extract_field(block: &str, re: &Regex) -> String {
    re.captures(block)
        .and_then(|cap| cap.get(1).or_else(|| cap.get(2)))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

fn strip_tags(text: &str) -> String {
    tag_re().replace_all(text, "").trim().to_string()
}

/// Extract item records from raw feed text, in document order.
///
/// Items missing a title or link (after tag stripping) are silently dropped:
/// news feeds omit elements inconsistently and a partial feed is still worth
/// processing. An input with no `<item>` blocks yields an empty vec.
pub fn extract_items(xml: &str) -> Vec<RssItem> {
    let mut items = Vec::new();

    for block_cap in item_re().captures_iter(xml) {
        let block = &block_cap[1];

        let title = strip_tags(&extract_field(block, title_re()));
        let link = strip_tags(&extract_field(block, link_re()));
        let pub_date = strip_tags(&extract_field(block, pub_date_re()));
        let description = strip_tags(&extract_field(block, description_re()));

        // content:encoded wins when present, otherwise the description
        // doubles as content.
        let encoded = extract_field(block, content_re());
        let content = if encoded.is_empty() {
            description.clone()
        } else {
            strip_tags(&encoded)
        };

        if title.is_empty() || link.is_empty() {
            continue;
        }

        items.push(RssItem {
            title,
            link,
            pub_date,
            description,
            content,
        });
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(title: &str, link: &str) -> String {
        format!(
            "<item><title>{}</title><link>{}</link><pubDate>Mon, 16 Jun 2025 08:00:00 GMT</pubDate><description>desc</description></item>",
            title, link
        )
    }

    #[test]
    fn empty_feed_yields_no_items() {
        assert!(extract_items("").is_empty());
        assert!(extract_items("<?xml version=\"1.0\"?><rss><channel></channel></rss>").is_empty());
    }

    #[test]
    fn extracts_items_in_document_order() {
        let xml = format!(
            "<rss><channel>{}{}</channel></rss>",
            item("First", "https://example.com/1"),
            item("Second", "https://example.com/2")
        );
        let items = extract_items(&xml);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "First");
        assert_eq!(items[1].title, "Second");
        assert_eq!(items[0].link, "https://example.com/1");
    }

    #[test]
    fn drops_items_missing_title_or_link() {
        let xml = "<rss><channel>\
            <item><title>No link here</title><description>x</description></item>\
            <item><link>https://example.com/no-title</link></item>\
            <item><title>Kept</title><link>https://example.com/ok</link></item>\
            </channel></rss>";
        let items = extract_items(xml);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kept");
    }

    #[test]
    fn title_emptied_by_tag_stripping_drops_the_item() {
        let xml = "<rss><channel><item><title><b></b></title><link>https://example.com/x</link></item></channel></rss>";
        assert!(extract_items(xml).is_empty());
    }

    #[test]
    fn accepts_cdata_and_plain_bodies() {
        let xml = "<rss><channel><item>\
            <title><![CDATA[CDATA title]]></title>\
            <link>https://example.com/cdata</link>\
            <description><![CDATA[<p>CDATA description</p>]]></description>\
            </item></channel></rss>";
        let items = extract_items(xml);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "CDATA title");
        assert_eq!(items[0].description, "CDATA description");
    }

    #[test]
    fn content_encoded_takes_precedence_over_description() {
        let xml = "<rss><channel><item>\
            <title>T</title><link>https://example.com/c</link>\
            <description>short summary</description>\
            <content:encoded><![CDATA[<p>full <b>body</b></p>]]></content:encoded>\
            </item></channel></rss>";
        let items = extract_items(xml);
        assert_eq!(items[0].description, "short summary");
        assert_eq!(items[0].content, "full body");
    }

    #[test]
    fn content_falls_back_to_description() {
        let xml = "<rss><channel><item>\
            <title>T</title><link>https://example.com/d</link>\
            <description>only summary</description>\
            </item></channel></rss>";
        let items = extract_items(xml);
        assert_eq!(items[0].content, "only summary");
    }

    #[test]
    fn tolerates_attributes_and_mixed_case_tags() {
        let xml = "<rss><channel>\
            <ITEM rdf:about=\"x\"><Title>Upper</Title>\
            <LINK>https://example.com/upper</LINK></ITEM>\
            </channel></rss>";
        let items = extract_items(xml);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Upper");
    }

    #[test]
    fn strips_markup_from_text_fields() {
        let xml = "<rss><channel><item>\
            <title>Breaking: <em>markets</em> up</title>\
            <link>https://example.com/markets</link>\
            <description><![CDATA[<div>Some <a href=\"x\">linked</a> text</div>]]></description>\
            </item></channel></rss>";
        let items = extract_items(xml);
        assert_eq!(items[0].title, "Breaking: markets up");
        assert_eq!(items[0].description, "Some linked text");
    }

    #[test]
    fn duplicate_titles_are_both_emitted() {
        let xml = format!(
            "<rss><channel>{}{}</channel></rss>",
            item("Same title", "https://example.com/a"),
            item("Same title", "https://example.com/b")
        );
        let items = extract_items(&xml);
        assert_eq!(items.len(), 2, "title is not the identity key, link is");
    }

    #[test]
    fn pub_date_is_captured_verbatim() {
        let xml = item("T", "https://example.com/t");
        let items = extract_items(&format!("<rss>{}</rss>", xml));
        assert_eq!(items[0].pub_date, "Mon, 16 Jun 2025 08:00:00 GMT");
    }
}
