//! Reply text helpers: markup stripping, quoted-history removal and
//! sender address extraction.
//!
//! Pure string processing, no I/O.

use std::sync::LazyLock;

use lettre::Address;
use lettre::message::Mailbox;
use regex::Regex;

/// `<style>`/`<script>` blocks whose content is never human text.
static INVISIBLE_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(style|script|head)\b[^>]*>.*?</(style|script|head)\s*>").expect("valid regex")
});

/// Tags that end a visual line.
static LINE_BREAK_TAGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*(br|/p|/div|/li|/tr|blockquote|hr)\b[^>]*>").expect("valid regex")
});

/// Start of the quoted original in a reply. Everything from the earliest
/// match onward is discarded.
static QUOTE_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\bOn\s[^\n]{0,300}?\bwrote:",
        r"|\b(?:From|Sent|To|Subject):",
        r"|-{2,}\s*Original Message\s*-{2,}",
        r"|(?m:^[ \t]*>)",
    ))
    .expect("valid regex")
});

/// An actual markup tag or declaration. Bare `<` and `>` in prose, or an
/// address in angle brackets, do not match.
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</?[a-z][a-z0-9]*(?:\s[^<>]*)?/?>|<!").expect("valid regex")
});

static BRACKETED_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\s*([^<>\s]+@[^<>\s]+)\s*>").expect("valid regex"));

/// Strip HTML tags, keeping line structure for block-level elements.
pub fn strip_html(html: &str) -> String {
    let without_blocks = INVISIBLE_BLOCKS.replace_all(html, " ");
    let with_breaks = LINE_BREAK_TAGS.replace_all(&without_blocks, "\n");

    let mut result = String::with_capacity(with_breaks.len());
    let mut in_tag = false;
    for ch in with_breaks.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    decode_entities(&result)
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Collapse every whitespace run into a single space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Isolate the human-authored portion of a reply.
///
/// Strips markup, cuts at the first quoted-reply marker (`On … wrote:`,
/// `From:`, `Sent:`, `To:`, `Subject:`, an "Original Message" separator or a
/// `>`-quoted line) and collapses whitespace.
pub fn isolate_reply(raw: &str) -> String {
    let text = if HTML_TAG.is_match(raw) {
        strip_html(raw)
    } else {
        decode_entities(raw)
    };
    let authored = match QUOTE_MARKERS.find(&text) {
        Some(m) => &text[..m.start()],
        None => text.as_str(),
    };
    collapse_whitespace(authored)
}

/// First non-empty of plain body, HTML body and provider summary, after
/// reply isolation. Empty if none has any authored text.
pub fn resolve_body(plain: Option<&str>, html: Option<&str>, summary: Option<&str>) -> String {
    [plain, html, summary]
        .into_iter()
        .flatten()
        .map(isolate_reply)
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// Canonical form of a target address: trimmed, lower-cased and valid.
pub fn normalize_address(email: &str) -> Option<String> {
    let lowered = email.trim().to_lowercase();
    lowered.parse::<Address>().ok().map(|addr| addr.to_string())
}

/// Extract the bare address from a sender header such as
/// `"Alice Smith" <Alice@Example.com>` or `alice@example.com`.
pub fn parse_sender(header: &str) -> Option<String> {
    let header = decode_entities(header.trim());
    if let Ok(mailbox) = header.parse::<Mailbox>() {
        return normalize_address(mailbox.email.as_ref());
    }
    if let Some(caps) = BRACKETED_ADDRESS.captures(&header) {
        return normalize_address(&caps[1]);
    }
    header
        .split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .map(|token| token.trim_matches(|c| c == '"' || c == '\'' || c == '<' || c == '>'))
        .find(|token| token.contains('@'))
        .and_then(normalize_address)
}

/// First `max_chars` characters of `text`.
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── HTML stripping ──────────────────────────────────────────────

    #[test]
    fn strip_html_nested_tags() {
        assert_eq!(
            collapse_whitespace(&strip_html("<div><b>Bold</b> and <i>italic</i></div>")),
            "Bold and italic"
        );
    }

    #[test]
    fn strip_html_drops_style_blocks() {
        let html = "<html><head><style>p { color: red; }</style></head><body><p>Hi</p></body></html>";
        assert_eq!(collapse_whitespace(&strip_html(html)), "Hi");
    }

    #[test]
    fn strip_html_line_breaks_separate_words() {
        assert_eq!(strip_html("one<br>two").trim(), "one\ntwo");
    }

    #[test]
    fn strip_html_decodes_entities() {
        assert_eq!(strip_html("Tom&nbsp;&amp;&nbsp;Jerry"), "Tom & Jerry");
    }

    // ── Reply isolation ─────────────────────────────────────────────

    #[test]
    fn isolate_cuts_at_on_wrote_attribution() {
        let body = "Is this real?\n\nOn Mon, Jan 5, 2026 at 10:00 AM IT Desk <it@x.com> wrote:\n> Please verify";
        assert_eq!(isolate_reply(body), "Is this real?");
    }

    #[test]
    fn isolate_keeps_angle_brackets_in_plain_text() {
        assert_eq!(
            isolate_reply("ask Alice <alice@x.com> about it"),
            "ask Alice <alice@x.com> about it"
        );
        assert_eq!(isolate_reply("is 3 < 5 > 2 true?"), "is 3 < 5 > 2 true?");
    }

    #[test]
    fn isolate_strips_real_markup() {
        assert_eq!(isolate_reply("<p>Who sent this?</p>"), "Who sent this?");
        assert_eq!(
            isolate_reply("<!DOCTYPE html><div class=\"x\">Hi <br/>there</div>"),
            "Hi there"
        );
    }

    #[test]
    fn isolate_cuts_at_outlook_header_block() {
        let body = "Not interested.\n\nFrom: IT Desk\nSent: Monday\nTo: me\nSubject: Verify";
        assert_eq!(isolate_reply(body), "Not interested.");
    }

    #[test]
    fn isolate_cuts_at_quoted_line() {
        let body = "Ok thanks\n> earlier text\nmore";
        assert_eq!(isolate_reply(body), "Ok thanks");
    }

    #[test]
    fn isolate_cuts_at_original_message_separator() {
        let body = "Who is this?\n-----Original Message-----\nold";
        assert_eq!(isolate_reply(body), "Who is this?");
    }

    #[test]
    fn isolate_handles_html_reply() {
        let html = "<div>What happened??<br> I didn't authorize this</div><div>On Tue, IT Desk wrote:</div><blockquote>old</blockquote>";
        assert_eq!(isolate_reply(html), "What happened?? I didn't authorize this");
    }

    #[test]
    fn isolate_keeps_plain_text_without_markers() {
        assert_eq!(
            isolate_reply("  What happened??   I didn't authorize this \n"),
            "What happened?? I didn't authorize this"
        );
    }

    #[test]
    fn isolate_empty_when_only_quoted() {
        assert_eq!(isolate_reply("> quoted only"), "");
    }

    #[test]
    fn resolve_body_prefers_plain_then_html_then_summary() {
        assert_eq!(resolve_body(Some("plain"), Some("<p>html</p>"), Some("sum")), "plain");
        assert_eq!(resolve_body(Some("  "), Some("<p>html</p>"), Some("sum")), "html");
        assert_eq!(resolve_body(None, Some("<p></p>"), Some("sum")), "sum");
        assert_eq!(resolve_body(None, None, None), "");
    }

    // ── Addresses ───────────────────────────────────────────────────

    #[test]
    fn parse_sender_display_name() {
        assert_eq!(
            parse_sender("\"Alice Smith\" <Alice@Example.com>").as_deref(),
            Some("alice@example.com")
        );
    }

    #[test]
    fn parse_sender_bare_address() {
        assert_eq!(parse_sender(" bob@x.com ").as_deref(), Some("bob@x.com"));
    }

    #[test]
    fn parse_sender_html_escaped_brackets() {
        assert_eq!(
            parse_sender("Carol &lt;carol@x.com&gt;").as_deref(),
            Some("carol@x.com")
        );
    }

    #[test]
    fn parse_sender_rejects_garbage() {
        assert_eq!(parse_sender("no address here"), None);
        assert_eq!(parse_sender(""), None);
    }

    #[test]
    fn normalize_address_lowercases_and_validates() {
        assert_eq!(normalize_address(" A@X.com ").as_deref(), Some("a@x.com"));
        assert_eq!(normalize_address("not-an-address"), None);
    }

    #[test]
    fn preview_respects_char_boundaries() {
        assert_eq!(preview("héllo wörld", 4), "héll");
        assert_eq!(preview("short", 200), "short");
    }
}
