//! Line-oriented block rules: headings, rules, quotes, and lists.
//!
//! Input is already text-escaped, so a quote marker arrives as `&gt;`.

use once_cell::sync::Lazy;
use regex::Regex;

static HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(#{1,6})[ \t]+(\S.*?)[ \t]*$").expect("valid heading regex"));
static RULE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[ \t]{0,3}(?:(?:-[ \t]*){3,}|(?:\*[ \t]*){3,}|(?:_[ \t]*){3,})$")
        .expect("valid rule regex")
});
static QUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]{0,3}&gt;[ \t]?(.*)$").expect("valid quote regex"));
static BULLET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]{0,3}[*+-][ \t]+(.*)$").expect("valid bullet regex"));
static NUMBERED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ \t]{0,3}([0-9]{1,9})\.[ \t]+(.*)$").expect("valid numbered regex"));

static QUOTE_MERGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"</blockquote>\n<blockquote>").expect("valid quote merge regex"));
static UL_MERGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n</ul>\n(?:[ \t]*\n)*<ul>").expect("valid ul merge regex"));
static OL_MERGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\n</ol>\n(?:[ \t]*\n)*<ol(?: start="[0-9]+")?>"#).expect("valid ol merge regex")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn close_tag(self) -> &'static str {
        match self {
            Self::Unordered => "</ul>",
            Self::Ordered => "</ol>",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LineBlock<'a> {
    Heading { level: usize, text: &'a str },
    Rule,
    Quote(&'a str),
    ListItem { kind: ListKind, number: u64, text: &'a str },
    Plain,
}

/// Classifies one line. Precedence is heading, rule, quote, list item, so a
/// `* * *` line is a rule rather than a bullet.
fn classify(line: &str) -> LineBlock<'_> {
    if let Some(caps) = HEADING_RE.captures(line) {
        let (Some(hashes), Some(text)) = (caps.get(1), caps.get(2)) else {
            return LineBlock::Plain;
        };
        return LineBlock::Heading {
            level: hashes.as_str().len(),
            text: text.as_str(),
        };
    }
    if RULE_RE.is_match(line) {
        return LineBlock::Rule;
    }
    if let Some(text) = QUOTE_RE.captures(line).and_then(|c| c.get(1)) {
        return LineBlock::Quote(text.as_str());
    }
    if let Some(text) = BULLET_RE.captures(line).and_then(|c| c.get(1)) {
        return LineBlock::ListItem {
            kind: ListKind::Unordered,
            number: 1,
            text: text.as_str(),
        };
    }
    if let Some(caps) = NUMBERED_RE.captures(line) {
        let number = caps[1].parse().unwrap_or(1);
        if let Some(text) = caps.get(2) {
            return LineBlock::ListItem {
                kind: ListKind::Ordered,
                number,
                text: text.as_str(),
            };
        }
    }
    LineBlock::Plain
}

fn close_list(out: &mut Vec<String>, open: &mut Option<ListKind>) {
    if let Some(kind) = open.take() {
        out.push(kind.close_tag().to_string());
    }
}

pub(crate) fn apply(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut open_list: Option<ListKind> = None;

    for line in text.split('\n') {
        match classify(line) {
            LineBlock::ListItem { kind, number, text } => {
                if open_list != Some(kind) {
                    close_list(&mut out, &mut open_list);
                    out.push(match kind {
                        ListKind::Unordered => "<ul>".to_string(),
                        ListKind::Ordered if number != 1 => format!(r#"<ol start="{number}">"#),
                        ListKind::Ordered => "<ol>".to_string(),
                    });
                    open_list = Some(kind);
                }
                out.push(format!("<li>{}</li>", text.trim_end()));
            }
            other => {
                close_list(&mut out, &mut open_list);
                out.push(match other {
                    LineBlock::Heading { level, text } => format!("<h{level}>{text}</h{level}>"),
                    LineBlock::Rule => "<hr>".to_string(),
                    LineBlock::Quote(text) => format!("<blockquote>{}</blockquote>", text.trim_end()),
                    _ => line.to_string(),
                });
            }
        }
    }
    close_list(&mut out, &mut open_list);

    let joined = out.join("\n");
    let merged = QUOTE_MERGE_RE.replace_all(&joined, "<br>");
    let merged = UL_MERGE_RE.replace_all(&merged, "");
    OL_MERGE_RE.replace_all(&merged, "").into_owned()
}
