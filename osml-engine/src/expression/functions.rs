// Built-in Functions
// The whitelisted `osx:` transforms callable from expressions

use crate::expression::parser::{ParseError, ParseErrorKind};
use crate::expression::types::{Function, Token};
use crate::value::Value;

use base64::Engine as _;

/// Registry of built-in functions
pub struct BuiltinFunctions;

impl BuiltinFunctions {
    /// Call a built-in function on already evaluated arguments
    pub fn call(function: Function, args: Vec<Value>) -> Result<Value, ParseError> {
        let arg = Self::single_arg(function, args)?;
        let text = Token::from_value(arg).coerce_to_string().map_err(|e| {
            ParseError::new(
                format!("{} expects a string argument: {}", function.name(), e.message),
                ParseErrorKind::FunctionFailed,
                function.name(),
            )
        })?;

        match function {
            Function::ParseJson => Self::parse_json(&text),
            Function::DecodeBase64 => Self::decode_base64(&text),
            Function::UrlEncode => Ok(Value::String(urlencoding::encode(&text).into_owned())),
            Function::UrlDecode => Self::url_decode(&text),
        }
    }

    fn single_arg(function: Function, args: Vec<Value>) -> Result<Value, ParseError> {
        let count = args.len();
        let mut iter = args.into_iter();
        match (iter.next(), iter.next()) {
            (Some(arg), None) => Ok(arg),
            _ => Err(ParseError::new(
                format!("{} expects 1 argument, got {}", function.name(), count),
                ParseErrorKind::Arity,
                function.name(),
            )),
        }
    }

    fn parse_json(text: &str) -> Result<Value, ParseError> {
        serde_json::from_str::<serde_json::Value>(text)
            .map(Value::from)
            .map_err(|e| {
                ParseError::new(
                    format!("invalid JSON: {}", e),
                    ParseErrorKind::FunctionFailed,
                    text,
                )
            })
    }

    fn decode_base64(text: &str) -> Result<Value, ParseError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map_err(|e| {
                ParseError::new(
                    format!("invalid base64: {}", e),
                    ParseErrorKind::FunctionFailed,
                    text,
                )
            })?;
        Ok(Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    }

    fn url_decode(text: &str) -> Result<Value, ParseError> {
        let plus_as_space = text.replace('+', " ");
        urlencoding::decode(&plus_as_space)
            .map(|s| Value::String(s.into_owned()))
            .map_err(|e| {
                ParseError::new(
                    format!("invalid percent-encoding: {}", e),
                    ParseErrorKind::FunctionFailed,
                    text,
                )
            })
    }
}
