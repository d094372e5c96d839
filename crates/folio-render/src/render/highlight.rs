//! Post-processing passes applied to every rendered page.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static CODE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<pre><code([^>]*)>([^<]+)</code></pre>").expect("valid code block regex")
});

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?m)(?P<com>//[^\n]*|/\*[\s\S]*?\*/|^[ \t]*#[^\n]*)",
        r"|(?P<str>&quot;.*?&quot;|&#x27;.*?&#x27;|&#39;.*?&#39;|'[^'\n]*'|`[^`]*`)",
        r"|(?P<ent>&#?[a-zA-Z0-9]+;)",
        r"|(?P<kwd>\b(?:as|async|await|break|case|catch|class|const|continue|def|default|do|else|enum|export|extends|fn|for|from|function|if|impl|import|in|let|loop|match|mod|mut|new|pub|return|self|static|struct|switch|this|throw|trait|try|type|use|var|void|where|while|yield)\b)",
        r"|(?P<lit>\b(?:\d+(?:\.\d+)?|true|false|null|nil|None)\b)",
    ))
    .expect("valid token regex")
});

static APOSTROPHE_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:39|x27);").expect("valid apostrophe regex"));

/// Replace the contents of each `<pre><code>` block with a highlighted equivalent,
/// leaving the surrounding tags (and any attributes on `<code>`) in place.
///
/// Blocks that already contain markup are skipped, so running this twice is a no-op.
pub fn highlight_code_blocks(html: &str) -> String {
    CODE_BLOCK_RE
        .replace_all(html, |caps: &Captures<'_>| {
            format!(
                "<pre><code{}>{}</code></pre>",
                &caps[1],
                highlight(&caps[2])
            )
        })
        .into_owned()
}

/// Wrap comments, strings, keywords and literals of already-escaped code in
/// `<span class="com|str|kwd|lit">`.
pub fn highlight(code: &str) -> String {
    TOKEN_RE
        .replace_all(code, |caps: &Captures<'_>| {
            if caps.name("ent").is_some() {
                return caps[0].to_string();
            }
            let (class, text) = ["com", "str", "kwd", "lit"]
                .iter()
                .find_map(|name| caps.name(name).map(|m| (*name, m.as_str())))
                .unwrap_or(("pln", &caps[0]));
            format!(r#"<span class="{class}">{text}</span>"#)
        })
        .into_owned()
}

/// Undo the apostrophe escaping done by the template layer; escaped apostrophes
/// make feeds invalid.
pub fn repair_apostrophes(html: &str) -> String {
    APOSTROPHE_ESCAPE_RE.replace_all(html, "'").into_owned()
}
