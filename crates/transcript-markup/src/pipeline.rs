//! The staged rewrite pipeline.
//!
//! Stages run in a fixed order and each one only sees the output of earlier
//! stages: verbatim extraction, escaping, block rules, inline rules,
//! paragraphs, line breaks, and finally placeholder restoration.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::trace;

use crate::escape::{escape_html, escape_text};
use crate::placeholder::{PlaceholderTable, is_block_token, strip_sentinels};
use crate::{blocks, inline};

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)^```[ \t]*([A-Za-z0-9_+#.-]*)[ \t]*\n(.*?)^```[ \t]*$")
        .expect("valid fence regex")
});
static CODE_SPAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`([^`\n]+)`").expect("valid code span regex"));
static BLOCK_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^<(?:/?(?:h[1-6]|ul|ol|li|blockquote|pre|p)\b|hr\b)").expect("valid block tag regex")
});
static BR_BEFORE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new("(?:<br>)+(</?(?:h[1-6]|p|ul|ol|li|blockquote|pre)\\b|<hr>|\u{E000}B[0-9]+\u{E001})")
        .expect("valid br cleanup regex")
});
static BR_AFTER_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        "(</(?:h[1-6]|p|ul|ol|li|blockquote|pre)>|<hr>|<(?:ul|ol)[^>]*>|\u{E000}B[0-9]+\u{E001})(?:<br>)+",
    )
    .expect("valid br cleanup regex")
});
static BR_RUN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:<br>){2,}").expect("valid br run regex"));

pub(crate) fn run(text: &str) -> String {
    let mut table = PlaceholderTable::default();

    let normalized = normalize(text);
    let protected = extract_verbatim(&normalized, &mut table);
    let escaped = escape_text(&protected);
    let structured = blocks::apply(&escaped);
    let styled = inline::apply(&structured, &mut table);
    let wrapped = wrap_paragraphs(&styled);
    let broken = convert_breaks(&wrapped);
    let html = table.restore(&broken);

    trace!(input_len = text.len(), output_len = html.len(), "rendered markup");
    html
}

fn normalize(text: &str) -> String {
    strip_sentinels(&text.replace("\r\n", "\n").replace('\r', "\n"))
}

fn extract_verbatim(text: &str, table: &mut PlaceholderTable) -> String {
    let fenced = FENCE_RE.replace_all(text, |caps: &Captures<'_>| {
        let lang = &caps[1];
        let body = caps[2].strip_suffix('\n').unwrap_or(&caps[2]);
        let class = if lang.is_empty() {
            String::new()
        } else {
            format!(r#" class="language-{}""#, escape_html(lang))
        };
        table.block(format!("<pre><code{class}>{}</code></pre>", escape_html(body)))
    });
    CODE_SPAN_RE
        .replace_all(&fenced, |caps: &Captures<'_>| {
            table.inline(format!("<code>{}</code>", escape_html(&caps[1])))
        })
        .into_owned()
}

fn is_structural(line: &str) -> bool {
    line.is_empty() || BLOCK_TAG_RE.is_match(line) || is_block_token(line)
}

fn wrap_paragraphs(text: &str) -> String {
    fn flush(out: &mut Vec<String>, para: &mut Vec<&str>) {
        let body = para.join("\n");
        if !body.trim().is_empty() {
            out.push(format!("<p>{}</p>", body.trim()));
        }
        para.clear();
    }

    let mut out: Vec<String> = Vec::new();
    let mut para: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        let trimmed = line.trim();
        if is_structural(trimmed) {
            flush(&mut out, &mut para);
            out.push(trimmed.to_string());
        } else {
            para.push(trimmed);
        }
    }
    flush(&mut out, &mut para);
    out.join("\n")
}

fn convert_breaks(text: &str) -> String {
    let broken = text.replace('\n', "<br>");
    let cleaned = BR_BEFORE_BLOCK_RE.replace_all(&broken, "$1");
    let cleaned = BR_AFTER_BLOCK_RE.replace_all(&cleaned, "$1");
    let collapsed = BR_RUN_RE.replace_all(&cleaned, "<br>");
    collapsed
        .trim_start_matches("<br>")
        .trim_end_matches("<br>")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn heading_paragraph_bold_and_code() {
        assert_eq!(
            run("# Title\n\nSome **bold** and `code`"),
            "<h1>Title</h1><p>Some <strong>bold</strong> and <code>code</code></p>"
        );
    }

    #[test]
    fn plain_text_becomes_one_paragraph() {
        assert_eq!(run("Hello, world"), "<p>Hello, world</p>");
    }

    #[test]
    fn consecutive_lines_break_inside_paragraph() {
        assert_eq!(run("one\ntwo\n\nthree"), "<p>one<br>two</p><p>three</p>");
    }

    #[test]
    fn crlf_is_normalized() {
        assert_eq!(run("one\r\ntwo\rthree"), "<p>one<br>two<br>three</p>");
    }

    #[test]
    fn fenced_code_is_escaped_once_and_untouched_by_rules() {
        let out = run("before\n```rust\nlet x = a < b && *p*;\n# not a heading\n```\nafter");
        assert_eq!(
            out,
            "<p>before</p><pre><code class=\"language-rust\">let x = a &lt; b &amp;&amp; *p*;\n# not a heading</code></pre><p>after</p>"
        );
    }

    #[test]
    fn fence_without_language_and_empty_body() {
        assert_eq!(run("```\n```"), "<pre><code></code></pre>");
    }

    #[test]
    fn unterminated_fence_stays_literal() {
        let out = run("```python\nprint('<hi>')");
        assert!(!out.contains("<pre>"));
        assert!(out.contains("```python"));
        assert!(out.contains("&lt;hi&gt;"));
    }

    #[test]
    fn fence_becomes_stable_once_closed() {
        let closed = run("```\ncode\n```");
        let with_more = run("```\ncode\n```\n\nMore text");
        assert!(with_more.starts_with(&closed));
    }

    #[test]
    fn inline_code_protects_markup_characters() {
        assert_eq!(
            run("use `**not bold**` and `<tag>`"),
            "<p>use <code>**not bold**</code> and <code>&lt;tag&gt;</code></p>"
        );
    }

    #[test]
    fn raw_html_is_escaped() {
        let out = run("<script>alert('x')</script>\n> <b>quoted</b>");
        assert!(!out.contains("<script>"));
        assert!(!out.contains("<b>"));
        assert!(out.contains("&lt;script&gt;"));
        assert!(out.contains("<blockquote>&lt;b&gt;quoted&lt;/b&gt;</blockquote>"));
    }

    #[test]
    fn list_and_rule_have_no_stray_breaks() {
        assert_eq!(
            run("Items:\n- a\n- b\n\n---\nend"),
            "<p>Items:</p><ul><li>a</li><li>b</li></ul><hr><p>end</p>"
        );
    }

    #[test]
    fn output_is_deterministic() {
        let text = "## H\n\n1. *a*\n2. [b](http://x.io)\n\n```\nz\n```";
        assert_eq!(run(text), run(text));
    }

    #[test]
    fn list_rendering_settles_as_lines_arrive() {
        assert_eq!(run("- first"), "<ul><li>first</li></ul>");
        assert_eq!(
            run("- first\n- second"),
            "<ul><li>first</li><li>second</li></ul>"
        );
    }

    #[test]
    fn overlapping_emphasis_renders_well_nested() {
        assert_eq!(
            run("**_<**_"),
            "<p><strong>_&lt;</strong>_</p>"
        );
    }

    static OWN_TAG_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(concat!(
            r#"</?(?:h[1-6]|p|ul|li|blockquote|pre|strong|em|del|a)>|<ol(?: start="[0-9]+")?>|</ol>"#,
            r#"|<hr>|<br>|<code(?: class="language-[^"<>]*")?>|</code>"#,
            r#"|<a href="[^"<>]*"(?: title="[^"<>]*")?>"#,
        ))
        .expect("valid tag regex")
    });
    static TAG_NAME_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"<(/?)([a-z][a-z0-9]*)[^>]*>").expect("valid tag regex"));

    fn is_well_nested(html: &str) -> bool {
        let mut open = Vec::new();
        for caps in TAG_NAME_RE.captures_iter(html) {
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

    fn markup_text() -> impl Strategy<Value = String> {
        prop_oneof![
            r#"[a-z0-9 #*_~`>+.:/<&"'()\[\]\n-]{0,80}"#,
            any::<String>(),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(512))]

        #[test]
        fn only_own_tags_reach_the_output(text in markup_text()) {
            let html = run(&text);
            let stripped = OWN_TAG_RE.replace_all(&html, "");
            prop_assert!(
                !stripped.contains('<') && !stripped.contains('>'),
                "stray angle bracket in {html:?} from {text:?}"
            );
            prop_assert!(is_well_nested(&html), "mis-nested tags in {html:?} from {text:?}");
        }
    }
}
