//! Pure text repairs applied to a model reply before it is parsed as JSON.
//! Each step is a heuristic; none of them understands JSON string bounds.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```(?:json)?").expect("valid regex literal"));

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex literal"));

static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)(\s*:)").expect("valid regex literal")
});

static PYTHON_LITERAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([:\[,]\s*)(True|False|None)(\s*[,}\]])").expect("valid regex literal")
});

/// Removes every triple-backtick marker, with or without a `json` tag.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").into_owned()
}

/// Narrows the text to the span between the first `[` and the last `]`.
/// Text without such a span is returned unchanged.
pub fn slice_array_span(text: &str) -> &str {
    match (text.find('['), text.rfind(']')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    }
}

pub fn normalize_quotes(text: &str) -> String {
    text.replace('\'', "\"")
}

pub fn strip_trailing_commas(text: &str) -> String {
    TRAILING_COMMA.replace_all(text, "$1").into_owned()
}

pub fn quote_bare_keys(text: &str) -> String {
    BARE_KEY.replace_all(text, r#"$1"$2"$3"#).into_owned()
}

/// Bare `True`/`False`/`None` values become JSON literals. A literal must be
/// followed by `,`, `}` or `]`, so words inside strings are left alone.
pub fn python_literals_to_json(text: &str) -> String {
    let mut current = text.to_string();
    // Neighbouring literals share a delimiter, so one pass only gets every other one.
    loop {
        let next = PYTHON_LITERAL
            .replace_all(&current, |caps: &Captures<'_>| {
                let literal = match &caps[2] {
                    "True" => "true",
                    "False" => "false",
                    _ => "null",
                };
                format!("{}{literal}{}", &caps[1], &caps[3])
            })
            .into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}
