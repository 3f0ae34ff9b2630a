//! Inline emphasis and link rules, most specific first.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::escape::quote_attr;
use crate::placeholder::{PlaceholderTable, contains_token};

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[([^\]\n]+)\]\(([^\s)]+)(?:[ \t]+"([^"\n]*)")?\)"#).expect("valid link regex")
});
static BOLD_ITALIC_STAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*\*([^*\s](?:[^*\n]*?[^*\s])?)\*\*\*").expect("valid bold italic regex")
});
static BOLD_ITALIC_UNDERSCORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b___([^_\s](?:[^_\n]*?[^_\s])?)___\b").expect("valid bold italic regex")
});
static BOLD_STAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*([^*\s](?:[^*\n]*?[^*\s])?)\*\*").expect("valid bold regex")
});
static BOLD_UNDERSCORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b__([^_\s](?:[^_\n]*?[^_\s])?)__\b").expect("valid bold regex")
});
static ITALIC_STAR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*([^*\s](?:[^*\n]*?[^*\s])?)\*").expect("valid italic regex"));
static ITALIC_UNDERSCORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b_([^_\s](?:[^_\n]*?[^_\s])?)_\b").expect("valid italic regex")
});
static STRIKE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"~~([^~\s](?:[^~\n]*?[^~\s])?)~~").expect("valid strike regex"));
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([a-z][a-z0-9]*)[^>]*>").expect("valid tag regex"));

const UNSAFE_SCHEMES: [&str; 3] = ["javascript:", "vbscript:", "data:"];

fn is_unsafe_url(url: &str) -> bool {
    let lowered = url.trim().to_ascii_lowercase();
    UNSAFE_SCHEMES
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
}

fn links(text: &str, table: &mut PlaceholderTable) -> String {
    LINK_RE
        .replace_all(text, |caps: &Captures<'_>| {
            let label = &caps[1];
            let url = &caps[2];
            if contains_token(url) {
                return caps[0].to_string();
            }
            if is_unsafe_url(url) {
                return label.to_string();
            }
            let title = caps
                .get(3)
                .map(|t| format!(r#" title="{}""#, quote_attr(t.as_str())))
                .unwrap_or_default();
            // One token per anchor; outer emphasis cannot split it.
            let label = emphasis(label);
            table.inline(format!(r#"<a href="{}"{title}>{label}</a>"#, quote_attr(url)))
        })
        .into_owned()
}

/// True when every tag opened in `body` is closed inside it, in order.
fn is_balanced(body: &str) -> bool {
    let mut open = Vec::new();
    for caps in TAG_RE.captures_iter(body) {
        let name = caps.get(2).map_or("", |m| m.as_str());
        if matches!(name, "br" | "hr") {
            continue;
        }
        if caps[1].is_empty() {
            open.push(name);
        } else if open.pop() != Some(name) {
            return false;
        }
    }
    open.is_empty()
}

fn emphasis(text: &str) -> String {
    let mut out = text.to_string();
    for (re, open, close) in [
        (&*BOLD_ITALIC_STAR_RE, "<strong><em>", "</em></strong>"),
        (&*BOLD_ITALIC_UNDERSCORE_RE, "<strong><em>", "</em></strong>"),
        (&*BOLD_STAR_RE, "<strong>", "</strong>"),
        (&*BOLD_UNDERSCORE_RE, "<strong>", "</strong>"),
        (&*ITALIC_STAR_RE, "<em>", "</em>"),
        (&*ITALIC_UNDERSCORE_RE, "<em>", "</em>"),
        (&*STRIKE_RE, "<del>", "</del>"),
    ] {
        out = re
            .replace_all(&out, |caps: &Captures<'_>| {
                let body = &caps[1];
                if is_balanced(body) {
                    format!("{open}{body}{close}")
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned();
    }
    out
}

pub(crate) fn apply(text: &str, table: &mut PlaceholderTable) -> String {
    emphasis(&links(text, table))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(text: &str) -> String {
        let mut table = PlaceholderTable::default();
        let out = apply(text, &mut table);
        table.restore(&out)
    }

    #[test]
    fn emphasis_variants() {
        assert_eq!(inline("***both***"), "<strong><em>both</em></strong>");
        assert_eq!(inline("**bold** and __bold__"), "<strong>bold</strong> and <strong>bold</strong>");
        assert_eq!(inline("*it* and _it_"), "<em>it</em> and <em>it</em>");
        assert_eq!(inline("~~gone~~"), "<del>gone</del>");
    }

    #[test]
    fn underscores_inside_words_are_literal() {
        assert_eq!(inline("snake_case_name"), "snake_case_name");
    }

    #[test]
    fn spaced_asterisks_are_literal() {
        assert_eq!(inline("2 * 3 * 4"), "2 * 3 * 4");
    }

    #[test]
    fn links_with_and_without_title() {
        assert_eq!(
            inline("[docs](https://example.com/a_b_c)"),
            r#"<a href="https://example.com/a_b_c">docs</a>"#
        );
        assert_eq!(
            inline(r#"[docs](https://example.com "The Docs")"#),
            r#"<a href="https://example.com" title="The Docs">docs</a>"#
        );
    }

    #[test]
    fn link_label_still_gets_emphasis() {
        assert_eq!(
            inline("[**x**](/y)"),
            r#"<a href="/y"><strong>x</strong></a>"#
        );
    }

    #[test]
    fn overlapping_delimiters_stay_nested() {
        assert_eq!(inline("**_&lt;**_"), "<strong>_&lt;</strong>_");
        assert_eq!(inline("*a __b* c__"), "*a <strong>b* c</strong>");
        assert_eq!(inline("**[x*](/y) z*"), r#"*<em><a href="/y">x*</a> z</em>"#);
    }

    #[test]
    fn link_label_keeps_code_spans() {
        let mut table = PlaceholderTable::default();
        let code = table.inline("<code>c</code>".into());
        let out = apply(&format!("[{code} *k*](/d)"), &mut table);
        assert_eq!(
            table.restore(&out),
            r#"<a href="/d"><code>c</code> <em>k</em></a>"#
        );
    }

    #[test]
    fn script_urls_render_label_only() {
        assert_eq!(inline("[click](javascript:alert)"), "click");
        assert_eq!(inline("[click](JavaScript:go)"), "click");
    }

    #[test]
    fn link_with_placeholder_url_is_skipped() {
        let mut table = PlaceholderTable::default();
        let token = table.inline("<code>u</code>".into());
        let text = format!("[x]({token})");
        assert_eq!(apply(&text, &mut table), text);
    }
}
