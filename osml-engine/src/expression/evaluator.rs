// Expression Engine
// Evaluates `${...}` markers in text against a data context

use crate::config::EvaluatorKind;
use crate::context::DataContext;
use crate::expression::legacy::{ExpressionError, LegacyEvaluator};
use crate::expression::lexer::{extract_expressions, Fragment, LexError, Lexer};
use crate::expression::parser::{ParseError, Parser};
use crate::expression::types::TypeError;
use crate::value::Value;

use thiserror::Error;
use tracing::trace;

/// Any failure while evaluating an expression
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Legacy(#[from] ExpressionError),
}

impl EvalError {
    /// The offending source fragment
    pub fn fragment(&self) -> &str {
        match self {
            EvalError::Lex(e) => &e.fragment,
            EvalError::Parse(e) => &e.fragment,
            EvalError::Type(e) => &e.fragment,
            EvalError::Legacy(e) => &e.expression,
        }
    }
}

/// Expression engine that handles marker extraction and evaluation
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpressionEngine {
    kind: EvaluatorKind,
}

impl ExpressionEngine {
    pub fn new(kind: EvaluatorKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> EvaluatorKind {
        self.kind
    }

    /// Evaluate a bare expression body (no `${}`)
    pub fn evaluate(&self, expression: &str, context: &DataContext) -> Result<Value, EvalError> {
        trace!(expression, kind = ?self.kind, "evaluating expression");
        match self.kind {
            EvaluatorKind::Full => {
                let tokens = Lexer::process(expression)?;
                Parser::new(context).parse(tokens)
            }
            EvaluatorKind::Legacy => Ok(LegacyEvaluator::evaluate(expression, context)?),
        }
    }

    /// Evaluate marker-bearing text. A value that is exactly one marker
    /// (surrounding whitespace aside) keeps its raw type so arrays and
    /// booleans survive; anything else becomes an interpolated string.
    pub fn evaluate_markers(&self, text: &str, context: &DataContext) -> Result<Value, EvalError> {
        if let [Fragment::Expression(expression)] = extract_expressions(text.trim()).as_slice() {
            return self.evaluate(expression, context);
        }
        self.interpolate(text, context).map(Value::String)
    }

    /// Substitute every marker in `text` with the string form of its value
    pub fn interpolate(&self, text: &str, context: &DataContext) -> Result<String, EvalError> {
        self.interpolate_fragments(extract_expressions(text), context)
    }

    fn interpolate_fragments(
        &self,
        fragments: Vec<Fragment>,
        context: &DataContext,
    ) -> Result<String, EvalError> {
        let mut out = String::new();
        for fragment in fragments {
            match fragment {
                Fragment::Text(text) => out.push_str(&text),
                Fragment::Expression(expression) => {
                    out.push_str(&self.evaluate(&expression, context)?.as_string())
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> DataContext {
        DataContext::new(Value::map([
            ("Foo", Value::Int(2)),
            ("items", Value::from(vec!["a", "b"])),
            ("name", Value::from("Ada")),
        ]))
    }

    #[test]
    fn test_single_marker_keeps_raw_value() {
        let engine = ExpressionEngine::default();
        let value = engine.evaluate_markers(" ${items} ", &context()).unwrap();
        assert_eq!(value, Value::from(vec!["a", "b"]));
    }

    #[test]
    fn test_mixed_text_interpolates() {
        let engine = ExpressionEngine::default();
        assert_eq!(
            engine.evaluate_markers("Hi ${name}, ${Foo + 1}", &context()).unwrap(),
            Value::from("Hi Ada, 3")
        );
        assert_eq!(
            engine.interpolate("${items}", &context()).unwrap(),
            r#"["a","b"]"#
        );
    }

    #[test]
    fn test_mixed_text_keeps_surrounding_whitespace() {
        let engine = ExpressionEngine::default();
        assert_eq!(
            engine.evaluate_markers(" ${name} and ${Foo} ", &context()).unwrap(),
            Value::from(" Ada and 2 ")
        );
    }

    #[test]
    fn test_cur_shadows_top_in_markers() {
        let ctx = context()
            .with_cur(Value::map([("Foo", 1i64)]));
        let engine = ExpressionEngine::default();
        assert_eq!(engine.evaluate_markers("${Foo}", &ctx).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_url_encode_marker() {
        let engine = ExpressionEngine::default();
        assert_eq!(
            engine.interpolate("${osx:urlEncode('a b')}", &context()).unwrap(),
            "a%20b"
        );
    }

    #[test]
    fn test_error_carries_fragment() {
        let engine = ExpressionEngine::default();

        let err = engine.interpolate("${'abc}", &context()).unwrap_err();
        assert!(matches!(err, EvalError::Lex(_)));
        assert_eq!(err.fragment(), "'abc");

        let err = engine.interpolate("${(1+2}", &context()).unwrap_err();
        assert!(matches!(err, EvalError::Lex(_)));

        let err = engine.interpolate("${.Foo}", &context()).unwrap_err();
        assert!(matches!(err, EvalError::Lex(_)));
    }

    #[test]
    fn test_legacy_engine() {
        let engine = ExpressionEngine::new(EvaluatorKind::Legacy);
        assert_eq!(
            engine.evaluate_markers("${Foo * 3}", &context()).unwrap(),
            Value::Int(6)
        );
        assert!(matches!(
            engine.evaluate("Foo ? 1 : 2", &context()),
            Err(EvalError::Legacy(_))
        ));
    }
}
