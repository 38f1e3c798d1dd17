// Template Error Types
// Errors raised while registering templates or rewriting a template tree

use crate::expression::EvalError;

/// A template processing failure. Aborts the whole processing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateError {
    pub message: String,
    pub kind: TemplateErrorKind,
    /// Tag being processed or expanded when the error occurred
    pub tag: Option<String>,
    /// Underlying expression failure, if any
    pub source: Option<EvalError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateErrorKind {
    /// Required attribute absent on a control tag or template definition
    MissingAttribute,
    /// `os:Render` names a child that the invocation did not supply
    UnknownRenderNode,
    /// Template tag not registered in the library
    UnknownTemplate,
    /// `repeat` target did not evaluate to an array
    NotAnArray,
    /// Attribute used on an element that cannot carry it
    InvalidAttribute,
    /// Library document malformed or built-in library unavailable
    Library,
    /// Custom template expansion nested too deeply
    MaxDepthExceeded,
    /// Expression evaluation failed
    Expression,
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "template error in <{}>: {}", tag, self.message),
            None => write!(f, "template error: {}", self.message),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl TemplateError {
    pub fn new(message: impl Into<String>, kind: TemplateErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            tag: None,
            source: None,
        }
    }

    /// Wrap an expression failure, keeping the offending expression text
    pub fn expression(expression: &str, source: EvalError) -> Self {
        Self {
            message: format!("failed to evaluate '{}': {}", expression, source),
            kind: TemplateErrorKind::Expression,
            tag: None,
            source: Some(source),
        }
    }

    pub fn missing_attribute(tag: &str, attribute: &str) -> Self {
        Self::new(
            format!("missing required attribute '{}'", attribute),
            TemplateErrorKind::MissingAttribute,
        )
        .with_tag(tag)
    }

    /// Attach the tag name. The innermost tag wins.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        if self.tag.is_none() {
            self.tag = Some(tag.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::{LexError, Lexer};

    #[test]
    fn test_display_with_tag() {
        let err = TemplateError::missing_attribute("os:Repeat", "expression");
        assert_eq!(
            err.to_string(),
            "template error in <os:Repeat>: missing required attribute 'expression'"
        );
        assert_eq!(err.kind, TemplateErrorKind::MissingAttribute);
    }

    #[test]
    fn test_innermost_tag_is_kept() {
        let err = TemplateError::new("boom", TemplateErrorKind::Library)
            .with_tag("os:Name")
            .with_tag("my:Card");
        assert_eq!(err.tag.as_deref(), Some("os:Name"));
    }

    #[test]
    fn test_expression_error_keeps_source() {
        let lex: LexError = Lexer::process("'abc").unwrap_err();
        let err = TemplateError::expression("'abc", lex.into());
        assert_eq!(err.kind, TemplateErrorKind::Expression);
        assert!(err.message.contains("'abc"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
