//! HTML composition of a streaming reply

use pulldown_cmark::{html, Options, Parser};

/// Shown while neither buffer has any text yet
pub const PENDING_HTML: &str = r#"<span class="thinking-indicator">Thinking…</span>"#;

/// Render the two buffers of a reply.
///
/// Thinking text is escaped and shown verbatim in a labelled block; the
/// answer goes through Markdown.
pub fn compose(thinking: &str, answer: &str) -> String {
    if thinking.is_empty() && answer.is_empty() {
        return PENDING_HTML.to_string();
    }

    let mut out = String::new();
    if !thinking.is_empty() {
        out.push_str(r#"<div class="think-block"><div class="think-label">Thinking</div>"#);
        out.push_str(&html_escape::encode_text(thinking));
        out.push_str("</div>");
    }
    if !answer.is_empty() {
        out.push_str(&markdown_to_html(answer));
    }
    out
}

pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::with_capacity(markdown.len() + markdown.len() / 2);
    html::push_html(&mut out, parser);
    out
}
