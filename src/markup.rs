//! Helpers for the small inline markup subset the block accepts.

use lazy_static::lazy_static;
use regex::Regex;

/// Tags that survive sanitizing in every text field of the block.
pub const ALLOWED_INLINE_TAGS: &[&str] = &["br", "b", "i", "a"];

/// Tags whose content is dropped together with the tag.
const DROP_CONTENT_TAGS: &[&str] = &["script", "style"];

lazy_static! {
    /// Markup that renders as nothing: whitespace, `&nbsp;` and line breaks.
    static ref EMPTY_MARKUP_REGEX: Regex =
        Regex::new(r"(?i)^(?:\s|&nbsp;|<\s*br\s*/?\s*>)*$").expect("empty markup pattern");

    /// One opening or closing tag: slash, name, raw attributes.
    static ref TAG_REGEX: Regex =
        Regex::new(r"<\s*(/)?\s*([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").expect("tag pattern");

    /// The `href` attribute in double, single or no quotes.
    static ref HREF_REGEX: Regex =
        Regex::new(r#"(?i)(?:^|\s)href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#)
            .expect("href pattern");

    static ref REMOTE_URL_REGEX: Regex =
        Regex::new(r"(?i)^https?://[^\s/$.?#][^\s]*$").expect("remote url pattern");
}

/// True when the markup renders as nothing: only whitespace, `&nbsp;` and line breaks.
pub fn is_effectively_empty(markup: &str) -> bool {
    EMPTY_MARKUP_REGEX.is_match(markup)
}

/// Collapses a region left with only a stray line break into a true empty string.
/// Returns whether the content changed.
pub fn normalize_empty(markup: &mut String) -> bool {
    if !markup.is_empty() && is_effectively_empty(markup) {
        markup.clear();
        true
    } else {
        false
    }
}

/// An absolute `http` or `https` URL with no whitespace.
pub fn is_remote_url(text: &str) -> bool {
    REMOTE_URL_REGEX.is_match(text)
}

/// Removes every tag not named in `allowed`, keeping the text between tags.
///
/// Allowed tags are rebuilt without attributes, except an `http(s)` `href` on
/// `<a>`. Content of `<script>` and `<style>` is dropped entirely, and any `<`
/// that does not start a tag is escaped.
pub fn strip_disallowed(input: &str, allowed: &[&str]) -> String {
    let mut output = String::with_capacity(input.len());
    let mut skip_until: Option<String> = None;
    let mut last = 0;

    for caps in TAG_REGEX.captures_iter(input) {
        let Some(tag) = caps.get(0) else {
            continue;
        };
        if skip_until.is_none() {
            push_text(&mut output, &input[last..tag.start()]);
        }
        last = tag.end();

        let closing = caps.get(1).is_some();
        let name = caps[2].to_ascii_lowercase();
        if let Some(waiting_for) = &skip_until {
            if closing && name == *waiting_for {
                skip_until = None;
            }
        } else if allowed.iter().any(|allowed| allowed.eq_ignore_ascii_case(&name)) {
            let attributes = caps.get(3).map_or("", |m| m.as_str());
            output.push_str(&rebuild_tag(&name, closing, attributes));
        } else if !closing && DROP_CONTENT_TAGS.contains(&name.as_str()) {
            skip_until = Some(name);
        }
    }

    if skip_until.is_none() {
        push_text(&mut output, &input[last..]);
    }
    output
}

fn push_text(output: &mut String, text: &str) {
    output.push_str(&text.replace('<', "&lt;"));
}

fn rebuild_tag(name: &str, closing: bool, attributes: &str) -> String {
    if closing {
        return format!("</{name}>");
    }
    if name == "a" {
        if let Some(href) = href_attribute(attributes).filter(|href| is_remote_url(href)) {
            return format!("<a href=\"{}\">", href.replace('"', "&quot;"));
        }
    }
    format!("<{name}>")
}

fn href_attribute(attributes: &str) -> Option<&str> {
    let caps = HREF_REGEX.captures(attributes)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim())
}
