use once_cell::sync::Lazy;
use regex::{Captures, Regex};

const OPEN: char = '\u{E000}';
const CLOSE: char = '\u{E001}';

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}B?([0-9]+)\u{E001}").expect("valid token regex"));
static BLOCK_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new("^\u{E000}B[0-9]+\u{E001}$").expect("valid block token regex"));

/// Indexed store of rendered fragments that later rewrite passes must not see.
///
/// Owned by a single render call. Block tokens stand for a whole block (a
/// fenced code block) and are never wrapped in a paragraph; inline tokens
/// live inside running text.
#[derive(Debug, Default)]
pub(crate) struct PlaceholderTable {
    entries: Vec<String>,
}

impl PlaceholderTable {
    pub fn inline(&mut self, markup: String) -> String {
        let idx = self.push(markup);
        format!("{OPEN}{idx}{CLOSE}")
    }

    pub fn block(&mut self, markup: String) -> String {
        let idx = self.push(markup);
        format!("{OPEN}B{idx}{CLOSE}")
    }

    fn push(&mut self, markup: String) -> usize {
        self.entries.push(markup);
        self.entries.len() - 1
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Replaces every token with its stored fragment.
    ///
    /// A fragment may itself hold tokens pushed before it; those expand too.
    pub fn restore(&self, text: &str) -> String {
        self.restore_below(text, self.entries.len())
    }

    fn restore_below(&self, text: &str, limit: usize) -> String {
        TOKEN_RE
            .replace_all(text, |caps: &Captures<'_>| {
                let Some((idx, entry)) = caps[1]
                    .parse::<usize>()
                    .ok()
                    .filter(|idx| *idx < limit)
                    .and_then(|idx| self.entries.get(idx).map(|entry| (idx, entry)))
                else {
                    return String::new();
                };
                if contains_token(entry) {
                    self.restore_below(entry, idx)
                } else {
                    entry.clone()
                }
            })
            .into_owned()
    }
}

pub(crate) fn contains_token(text: &str) -> bool {
    text.contains(OPEN)
}

pub(crate) fn is_block_token(line: &str) -> bool {
    BLOCK_TOKEN_RE.is_match(line)
}

/// Removes sentinel characters so input text can never forge a token.
pub(crate) fn strip_sentinels(text: &str) -> String {
    text.chars().filter(|c| *c != OPEN && *c != CLOSE).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restore_replaces_tokens_by_index() {
        let mut table = PlaceholderTable::default();
        let a = table.inline("<code>a</code>".into());
        let b = table.block("<pre><code>b</code></pre>".into());
        let text = format!("{b} then {a}");
        assert_eq!(table.len(), 2);
        assert_eq!(table.restore(&text), "<pre><code>b</code></pre> then <code>a</code>");
    }

    #[test]
    fn nested_tokens_expand_but_never_point_forward() {
        let mut table = PlaceholderTable::default();
        let code = table.inline("<code>c</code>".into());
        let link = table.inline(format!("<a href=\"/\">{code}</a>"));
        assert_eq!(table.restore(&link), r#"<a href="/"><code>c</code></a>"#);

        let mut table = PlaceholderTable::default();
        table.inline("\u{E000}1\u{E001}".into());
        table.inline("x".into());
        assert_eq!(table.restore("\u{E000}0\u{E001}"), "");
    }

    #[test]
    fn block_token_detection_requires_whole_line() {
        let mut table = PlaceholderTable::default();
        let block = table.block(String::new());
        let inline = table.inline(String::new());
        assert!(is_block_token(&block));
        assert!(!is_block_token(&inline));
        assert!(!is_block_token(&format!("x {block}")));
    }

    #[test]
    fn sentinels_are_stripped_from_input() {
        let forged = "\u{E000}0\u{E001}";
        assert_eq!(strip_sentinels(forged), "0");
        assert!(!contains_token(&strip_sentinels(forged)));
    }
}
