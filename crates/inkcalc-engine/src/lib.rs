pub mod canvas;
pub mod gemini;
pub mod service;
pub mod vision;

pub use canvas::{prepare_canvas_image, PreparedImage};
pub use gemini::{GeminiSettings, GeminiVisionClient};
pub use service::{CalculationRequest, CalculationService, Calculator};
pub use vision::{VisionModel, VisionRequest};

/// Flattens an error chain into one line, skipping repeated messages.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts.last().is_some_and(|existing| existing == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use anyhow::Context;

    use super::*;

    #[test]
    fn error_chain_joins_causes() {
        let err = Err::<(), _>(anyhow::anyhow!("connection refused"))
            .context("Gemini request failed")
            .unwrap_err();
        assert_eq!(
            error_chain_text(&err, 200),
            "Gemini request failed | caused by: connection refused"
        );
        assert_eq!(error_chain_text(&err, 6), "Gemini…");
    }

    #[test]
    fn truncate_counts_chars_not_bytes() {
        assert_eq!(truncate_text("±±±", 3), "±±±");
        assert_eq!(truncate_text("±±±±", 2), "±±…");
    }
}
