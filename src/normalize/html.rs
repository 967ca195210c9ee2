//! HTML text helpers for rendered content.

/// Escape text for use in HTML element content or a quoted attribute.
#[must_use]
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Whether the text after a `<` starts a tag, comment or closing tag.
fn opens_tag(after_lt: &str) -> bool {
    after_lt
        .chars()
        .next()
        .is_some_and(|c| c == '/' || c == '!' || c.is_ascii_alphabetic())
}

/// Remove markup, dropping `<script>` and `<style>` bodies entirely.
///
/// A `<` not followed by a tag name, `/` or `!` is kept as text.
#[must_use]
pub fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(open) = rest.find('<') {
        out.push_str(&rest[..open]);
        let after = &rest[open..];
        if !opens_tag(&after[1..]) {
            out.push('<');
            rest = &after[1..];
            continue;
        }
        let Some(close) = after.find('>') else {
            // Unterminated tag: nothing after it can be trusted as text.
            rest = "";
            break;
        };

        let tag = after[1..close].trim().to_ascii_lowercase();
        rest = &after[close + 1..];

        for raw_body in ["script", "style"] {
            if tag == raw_body || tag.starts_with(&format!("{raw_body} ")) {
                let end_tag = format!("</{raw_body}");
                rest = match rest.to_ascii_lowercase().find(&end_tag) {
                    Some(end) => rest[end..].find('>').map_or("", |gt| &rest[end + gt + 1..]),
                    None => "",
                };
            }
        }
    }
    out.push_str(rest);

    out.trim().to_string()
}

/// URL-friendly slug: lowercase alphanumerics separated by single dashes.
#[must_use]
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_dash = false;

    for c in strip_tags(s).chars() {
        if c.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(c.to_lowercase());
        } else if c != '\'' {
            pending_dash = true;
        }
    }

    slug
}
