/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes markup-bearing text outside verbatim regions.
///
/// Quotes are left alone so the link rule can still see `"title"` slots;
/// attribute values are quoted separately by [`quote_attr`].
pub(crate) fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Makes already text-escaped input safe inside a double-quoted attribute.
pub(crate) fn quote_attr(escaped: &str) -> String {
    escaped.replace('"', "&quot;").replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_html_covers_quotes() {
        assert_eq!(escape_html(r#"a<"b">'c'&"#), "a&lt;&quot;b&quot;&gt;&#39;c&#39;&amp;");
    }

    #[test]
    fn escape_text_keeps_quotes() {
        assert_eq!(escape_text(r#"<a "t">"#), r#"&lt;a "t"&gt;"#);
    }
}
