/// Return the subset of `keywords` whose lowercase form occurs anywhere in
/// the lowercased `text` (plain substring containment, not word-boundary
/// aware). The result preserves the order of `keywords`, not the order of
/// appearance in the text.
pub fn match_keywords(text: &str, keywords: &[String]) -> Vec<String> {
    if text.is_empty() || keywords.is_empty() {
        return Vec::new();
    }

    let text_lower = text.to_lowercase();
    keywords
        .iter()
        .filter(|keyword| text_lower.contains(&keyword.to_lowercase()))
        .cloned()
        .collect()
}
