//! Markdown inline-markup stripping for bookmark labels.
//!
//! Each rule is a single non-overlapping substitution pass over the output of the previous
//! rule. Emphasis patterns use non-nested character classes, so an unmatched `*` or `_`
//! is kept as literal text. The whole pipeline is repeated until the text stops changing,
//! which makes stacked markers (`- - item`, `> > quote`) collapse in one call.

use regex::Regex;
use std::sync::LazyLock;

static BOLD_STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid regex"));
static BOLD_UNDERSCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__([^_]+)__").expect("valid regex"));
static ITALIC_STAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*([^*]+)\*").expect("valid regex"));
static ITALIC_UNDERSCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"_([^_]+)_").expect("valid regex"));
static CODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").expect("valid regex"));
static STRIKE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"~~([^~]+)~~").expect("valid regex"));
// The optional bang lets the link pass leave images for the image pass.
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\([^)]+\)").expect("valid regex"));
static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]+\)").expect("valid regex"));
static BLOCKQUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^>\s*").expect("valid regex"));
static BULLET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[-*+]\s+").expect("valid regex"));
static ORDERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\d+\.\s+").expect("valid regex"));
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip Markdown inline markup from heading text, producing a clean label.
///
/// ```
/// use docpress::normalize_heading_text;
///
/// assert_eq!(normalize_heading_text("**Bold** and [a link](https://x.y)"), "Bold and a link");
/// assert_eq!(normalize_heading_text("- `code`  item"), "code item");
/// ```
pub fn normalize_heading_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut current = raw.to_string();
    // Every pass only deletes characters or folds whitespace, so this reaches a fixpoint.
    loop {
        let next = normalize_once(&current);
        if next == current {
            return next;
        }
        current = next;
    }
}

fn normalize_once(raw: &str) -> String {
    let mut cleaned = raw.to_string();
    for pattern in [
        &BOLD_STAR_RE,
        &BOLD_UNDERSCORE_RE,
        &ITALIC_STAR_RE,
        &ITALIC_UNDERSCORE_RE,
        &CODE_RE,
        &STRIKE_RE,
    ] {
        cleaned = pattern.replace_all(&cleaned, "$1").into_owned();
    }

    cleaned = LINK_RE
        .replace_all(&cleaned, |caps: &regex::Captures<'_>| {
            if &caps[1] == "!" || caps[2].is_empty() {
                caps[0].to_string()
            } else {
                caps[2].to_string()
            }
        })
        .into_owned();
    cleaned = IMAGE_RE.replace_all(&cleaned, "$1").into_owned();

    for pattern in [&BLOCKQUOTE_RE, &BULLET_RE, &ORDERED_RE, &TAG_RE] {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }
    cleaned = WHITESPACE_RE.replace_all(&cleaned, " ").into_owned();
    cleaned.trim().to_string()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn never_panics(s in ".*") {
            let _ = normalize_heading_text(&s);
        }

        #[test]
        fn plain_words_pass_through(s in "[a-zA-Z0-9]{1,12}( [a-zA-Z0-9]{1,12}){0,4}") {
            prop_assert_eq!(normalize_heading_text(&s), s);
        }

        #[test]
        fn single_markup_yields_inner_text(
            inner in "[a-zA-Z0-9]{1,10}( [a-zA-Z0-9]{1,10}){0,2}",
            kind in 0usize..7,
        ) {
            let wrapped = match kind {
                0 => format!("**{inner}**"),
                1 => format!("_{inner}_"),
                2 => format!("`{inner}`"),
                3 => format!("~~{inner}~~"),
                4 => format!("[{inner}](https://example.com/{kind})"),
                5 => format!("![{inner}](img/{kind}.png)"),
                _ => format!("__{inner}__"),
            };
            prop_assert_eq!(normalize_heading_text(&wrapped), inner);
        }

        #[test]
        fn idempotent_on_markdown_like_input(s in "[a-zA-Z0-9 *_`~\\[\\]()<>!#.+-]{0,40}") {
            let once = normalize_heading_text(&s);
            prop_assert_eq!(normalize_heading_text(&once), once.clone());
        }
    }
}
