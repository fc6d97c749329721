//! Error taxonomy for the rendering pipeline.
//!
//! Each pipeline stage owns one variant family; the orchestrator propagates
//! the first failure unchanged, so the variant always identifies the stage
//! that produced it.

use thiserror::Error;

/// Result type alias for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors produced by the markup → PDF pipeline.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Malformed markup text: unterminated or mismatched tags, bad entities.
    /// `position` is the byte offset into the template where the problem was
    /// detected.
    #[error("markup syntax error at offset {position}: {message}")]
    MarkupSyntax { position: usize, message: String },

    /// Violated tag-nesting invariant (e.g. a non-row child of a table).
    #[error("markup structure error: {0}")]
    MarkupStructure(String),

    /// Strict-mode data-field path that did not resolve against the record.
    #[error("unresolved data field `{path}`")]
    Binding { path: String },

    /// Content that cannot be placed under any pagination (e.g. a single
    /// table row taller than a full page).
    #[error("layout error: {0}")]
    Layout(String),

    /// Content the emitter cannot represent (e.g. an unsupported font).
    #[error("emit error: {0}")]
    Emit(String),
}

impl RenderError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::MarkupSyntax {
            position,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = RenderError::syntax(17, "unterminated tag");
        assert_eq!(
            err.to_string(),
            "markup syntax error at offset 17: unterminated tag"
        );

        let err = RenderError::Binding {
            path: "sender.name".to_string(),
        };
        assert!(err.to_string().contains("sender.name"));
    }
}
