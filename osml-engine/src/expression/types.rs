// Expression Token Model
// Token kinds produced by the lexer and the coercion rules between them

use crate::value::{format_float, Array, DataObject, Value};

use std::fmt;
use std::sync::Arc;

/// Closed set of token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Function,
    Ternary,
    Paren,
    Comma,
    RawOperator,
    BinaryOp,
    UnaryOp,
    Dot,
    Raw,
    Int,
    Float,
    String,
    Bool,
    Null,
    Identity,
    Array,
    Object,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenType::Function => "FUNCTION",
            TokenType::Ternary => "TERNARY",
            TokenType::Paren => "PAREN",
            TokenType::Comma => "COMMA",
            TokenType::RawOperator => "RAW_OPERATOR",
            TokenType::BinaryOp => "BINARY_OP",
            TokenType::UnaryOp => "UNARY_OP",
            TokenType::Dot => "DOT",
            TokenType::Raw => "RAW",
            TokenType::Int => "INT",
            TokenType::Float => "FLOAT",
            TokenType::String => "STRING",
            TokenType::Bool => "BOOL",
            TokenType::Null => "NULL",
            TokenType::Identity => "IDENTITY",
            TokenType::Array => "ARRAY",
            TokenType::Object => "OBJECT",
        };
        write!(f, "{}", name)
    }
}

/// Operators. `Index` is produced by the parser for bracket access and
/// never by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
    And,
    Or,
    Not,
    Empty,
    Index,
}

impl Operator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::Mod => "%",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::Ne => "!=",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Not => "!",
            Operator::Empty => "empty",
            Operator::Index => "[]",
        }
    }

    /// Binding strength of the binary form, highest first
    pub fn precedence(&self) -> u8 {
        match self {
            Operator::Index => 7,
            Operator::Not | Operator::Empty => 6,
            Operator::Mul | Operator::Div | Operator::Mod => 5,
            Operator::Add | Operator::Sub => 4,
            Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => 3,
            Operator::Eq | Operator::Ne => 2,
            Operator::And => 1,
            Operator::Or => 0,
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "*" => Operator::Mul,
            "/" => Operator::Div,
            "%" => Operator::Mod,
            ">" => Operator::Gt,
            "<" => Operator::Lt,
            ">=" => Operator::Ge,
            "<=" => Operator::Le,
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            "&&" => Operator::And,
            "||" => Operator::Or,
            "!" => Operator::Not,
            "empty" => Operator::Empty,
            _ => return None,
        };
        Some(op)
    }

    /// Word forms accepted in place of the symbols
    pub fn from_word(word: &str) -> Option<Self> {
        let op = match word {
            "and" => Operator::And,
            "or" => Operator::Or,
            "div" => Operator::Div,
            "mod" => Operator::Mod,
            "gt" => Operator::Gt,
            "lt" => Operator::Lt,
            "ge" => Operator::Ge,
            "le" => Operator::Le,
            "eq" => Operator::Eq,
            "ne" => Operator::Ne,
            "not" => Operator::Not,
            "empty" => Operator::Empty,
            _ => return None,
        };
        Some(op)
    }
}

/// Whitelisted functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    ParseJson,
    DecodeBase64,
    UrlEncode,
    UrlDecode,
}

impl Function {
    pub const ALL: [Function; 4] = [
        Function::ParseJson,
        Function::DecodeBase64,
        Function::UrlEncode,
        Function::UrlDecode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Function::ParseJson => "osx:parseJson",
            Function::DecodeBase64 => "osx:decodeBase64",
            Function::UrlEncode => "osx:urlEncode",
            Function::UrlDecode => "osx:urlDecode",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ternary {
    Question,
    Colon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Paren {
    Open,
    Close,
    OpenBracket,
    CloseBracket,
}

impl Paren {
    pub fn is_open(&self) -> bool {
        matches!(self, Paren::Open | Paren::OpenBracket)
    }
}

/// A typed token. Each variant carries exactly the payload its type
/// requires, so type and value cannot disagree.
#[derive(Debug, Clone)]
pub enum Token {
    Function(Function),
    Ternary(Ternary),
    Paren(Paren),
    Comma,
    RawOperator(Operator),
    BinaryOp(Operator),
    UnaryOp(Operator),
    Dot,
    Raw(String),
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Null,
    Identity(String),
    Array(Array),
    Object(Arc<dyn DataObject>),
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Token::Function(a), Token::Function(b)) => a == b,
            (Token::Ternary(a), Token::Ternary(b)) => a == b,
            (Token::Paren(a), Token::Paren(b)) => a == b,
            (Token::Comma, Token::Comma) => true,
            (Token::RawOperator(a), Token::RawOperator(b)) => a == b,
            (Token::BinaryOp(a), Token::BinaryOp(b)) => a == b,
            (Token::UnaryOp(a), Token::UnaryOp(b)) => a == b,
            (Token::Dot, Token::Dot) => true,
            (Token::Raw(a), Token::Raw(b)) => a == b,
            (Token::Identity(a), Token::Identity(b)) => a == b,
            _ => match (self.to_value(), other.to_value()) {
                (Some(a), Some(b)) => self.token_type() == other.token_type() && a == b,
                _ => false,
            },
        }
    }
}

impl Token {
    pub fn token_type(&self) -> TokenType {
        match self {
            Token::Function(_) => TokenType::Function,
            Token::Ternary(_) => TokenType::Ternary,
            Token::Paren(_) => TokenType::Paren,
            Token::Comma => TokenType::Comma,
            Token::RawOperator(_) => TokenType::RawOperator,
            Token::BinaryOp(_) => TokenType::BinaryOp,
            Token::UnaryOp(_) => TokenType::UnaryOp,
            Token::Dot => TokenType::Dot,
            Token::Raw(_) => TokenType::Raw,
            Token::Int(_) => TokenType::Int,
            Token::Float(_) => TokenType::Float,
            Token::String(_) => TokenType::String,
            Token::Bool(_) => TokenType::Bool,
            Token::Null => TokenType::Null,
            Token::Identity(_) => TokenType::Identity,
            Token::Array(_) => TokenType::Array,
            Token::Object(_) => TokenType::Object,
        }
    }

    /// Wrap a runtime value as a literal token
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Null => Token::Null,
            Value::Bool(b) => Token::Bool(b),
            Value::Int(n) => Token::Int(n),
            Value::Float(n) => Token::Float(n),
            Value::String(s) => Token::String(s),
            Value::Array(a) => Token::Array(a),
            Value::Object(o) => Token::Object(o),
        }
    }

    /// Runtime value of a literal token; `None` for structural tokens
    pub fn to_value(&self) -> Option<Value> {
        let value = match self {
            Token::Null => Value::Null,
            Token::Bool(b) => Value::Bool(*b),
            Token::Int(n) => Value::Int(*n),
            Token::Float(n) => Value::Float(*n),
            Token::String(s) | Token::Raw(s) => Value::String(s.clone()),
            Token::Array(a) => Value::Array(a.clone()),
            Token::Object(o) => Value::Object(o.clone()),
            _ => return None,
        };
        Some(value)
    }

    pub fn into_value(self) -> Result<Value, TypeError> {
        match self {
            Token::Null => Ok(Value::Null),
            Token::Bool(b) => Ok(Value::Bool(b)),
            Token::Int(n) => Ok(Value::Int(n)),
            Token::Float(n) => Ok(Value::Float(n)),
            Token::String(s) | Token::Raw(s) => Ok(Value::String(s)),
            Token::Array(a) => Ok(Value::Array(a)),
            Token::Object(o) => Ok(Value::Object(o)),
            other => Err(TypeError::new(&other, "value")),
        }
    }

    /// Literal and resolved-value tokens
    pub fn is_operand(&self) -> bool {
        matches!(
            self,
            Token::Raw(_)
                | Token::Int(_)
                | Token::Float(_)
                | Token::String(_)
                | Token::Bool(_)
                | Token::Null
                | Token::Identity(_)
                | Token::Array(_)
                | Token::Object(_)
        )
    }

    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            Token::RawOperator(_) | Token::BinaryOp(_) | Token::UnaryOp(_)
        )
    }

    // =========================================================================
    // Coercions
    // =========================================================================

    /// Boolean coercion. Strings and raw text compare case-insensitively
    /// against `true`/`false`.
    pub fn coerce_to_bool(&self) -> Result<bool, TypeError> {
        match self {
            Token::Raw(s) | Token::String(s) => {
                if s.eq_ignore_ascii_case("true") {
                    Ok(true)
                } else {
                    Ok(!(s.is_empty() || s == "0" || s.eq_ignore_ascii_case("false")))
                }
            }
            Token::Bool(b) => Ok(*b),
            Token::Int(n) => Ok(*n != 0),
            Token::Float(n) => Ok(*n != 0.0),
            Token::Null => Ok(false),
            Token::Array(a) => Ok(!a.is_empty()),
            Token::Object(_) => Ok(true),
            other => Err(TypeError::new(other, TokenType::Bool)),
        }
    }

    /// Numeric coercion, producing an `Int` or `Float` token
    pub fn coerce_to_number(&self) -> Result<Token, TypeError> {
        match self {
            Token::Int(n) => Ok(Token::Int(*n)),
            Token::Float(n) => Ok(Token::Float(*n)),
            Token::Bool(b) => Ok(Token::Int(i64::from(*b))),
            Token::Null => Ok(Token::Int(0)),
            Token::Raw(s) | Token::String(s) => {
                let trimmed = s.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    Ok(Token::Int(n))
                } else if is_float_literal(trimmed) {
                    trimmed
                        .parse::<f64>()
                        .map(Token::Float)
                        .map_err(|_| TypeError::new(self, "number"))
                } else {
                    Err(TypeError::new(self, "number"))
                }
            }
            other => Err(TypeError::new(other, "number")),
        }
    }

    /// Numeric coercion widened to `f64`
    pub fn coerce_to_f64(&self) -> Result<f64, TypeError> {
        match self.coerce_to_number()? {
            Token::Int(n) => Ok(n as f64),
            Token::Float(n) => Ok(n),
            _ => Err(TypeError::new(self, "number")),
        }
    }

    pub fn coerce_to_string(&self) -> Result<String, TypeError> {
        match self {
            Token::Raw(s) | Token::String(s) | Token::Identity(s) => Ok(s.clone()),
            Token::Int(n) => Ok(n.to_string()),
            Token::Float(n) => Ok(format_float(*n)),
            Token::Bool(b) => Ok(b.to_string()),
            Token::Null => Ok(String::new()),
            Token::Array(a) => Ok(Value::Array(a.clone()).as_string()),
            Token::Object(o) => Ok(o.type_name().to_string()),
            other => Err(TypeError::new(other, TokenType::String)),
        }
    }

    /// Convert to exactly `target`, or fail with a `TypeError`
    pub fn coerce(&self, target: TokenType) -> Result<Token, TypeError> {
        match target {
            TokenType::Bool => self.coerce_to_bool().map(Token::Bool),
            TokenType::Int => match self.coerce_to_number()? {
                Token::Float(n) if n.fract() == 0.0 => Ok(Token::Int(n as i64)),
                Token::Int(n) => Ok(Token::Int(n)),
                _ => Err(TypeError::new(self, target)),
            },
            TokenType::Float => self.coerce_to_f64().map(Token::Float),
            TokenType::String => self.coerce_to_string().map(Token::String),
            TokenType::Null => match self {
                Token::Null => Ok(Token::Null),
                Token::String(s) | Token::Raw(s) if s.is_empty() => Ok(Token::Null),
                _ => Err(TypeError::new(self, target)),
            },
            TokenType::Array => match self {
                Token::Array(a) => Ok(Token::Array(a.clone())),
                _ => Err(TypeError::new(self, target)),
            },
            TokenType::Object => match self {
                Token::Object(o) => Ok(Token::Object(o.clone())),
                _ => Err(TypeError::new(self, target)),
            },
            _ if self.token_type() == target => Ok(self.clone()),
            _ => Err(TypeError::new(self, target)),
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Function(func) => write!(f, "{}", func.name()),
            Token::Ternary(Ternary::Question) => write!(f, "?"),
            Token::Ternary(Ternary::Colon) => write!(f, ":"),
            Token::Paren(Paren::Open) => write!(f, "("),
            Token::Paren(Paren::Close) => write!(f, ")"),
            Token::Paren(Paren::OpenBracket) => write!(f, "["),
            Token::Paren(Paren::CloseBracket) => write!(f, "]"),
            Token::Comma => write!(f, ","),
            Token::RawOperator(op) | Token::BinaryOp(op) | Token::UnaryOp(op) => {
                write!(f, "{}", op.symbol())
            }
            Token::Dot => write!(f, "."),
            Token::Raw(s) | Token::Identity(s) => write!(f, "{}", s),
            Token::Int(n) => write!(f, "{}", n),
            Token::Float(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    write!(f, "{:.1}", n)
                } else {
                    write!(f, "{}", n)
                }
            }
            Token::String(s) => write!(f, "'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Token::Bool(b) => write!(f, "{}", b),
            Token::Null => write!(f, "null"),
            Token::Array(a) => write!(f, "{}", Value::Array(a.clone()).as_string()),
            Token::Object(o) => write!(f, "{}", o.type_name()),
        }
    }
}

/// Unescape the body of a quoted string literal: `\"`, `\'` and `\\`.
/// Other backslashes are kept as written.
pub fn unescape_string_literal(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.peek() {
                Some(&next @ ('"' | '\'' | '\\')) => {
                    out.push(next);
                    chars.next();
                }
                _ => out.push(ch),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// `digits[.digits][e[+-]digits]`, with at least one of `.` or exponent
fn is_float_literal(s: &str) -> bool {
    let (mantissa, exponent) = match s.find(['e', 'E']) {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    };
    let mantissa = mantissa.strip_prefix('-').unwrap_or(mantissa);
    let mantissa_ok = match mantissa.split_once('.') {
        Some((int, frac)) => {
            !(int.is_empty() && frac.is_empty())
                && int.chars().all(|c| c.is_ascii_digit())
                && frac.chars().all(|c| c.is_ascii_digit())
        }
        None => !mantissa.is_empty() && mantissa.chars().all(|c| c.is_ascii_digit()),
    };
    let exponent_ok = match exponent {
        Some(exp) => {
            let digits = exp.strip_prefix(['+', '-']).unwrap_or(exp);
            !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
        }
        None => true,
    };
    mantissa_ok && exponent_ok
}

// =============================================================================
// Errors
// =============================================================================

/// A token could not be converted to the type an operation requires
#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    pub message: String,
    pub from: TokenType,
    pub fragment: String,
}

impl TypeError {
    pub fn new(token: &Token, target: impl fmt::Display) -> Self {
        Self {
            message: format!("cannot coerce {} to {}", token.token_type(), target),
            from: token.token_type(),
            fragment: token.to_string(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type error at '{}': {}", self.fragment, self.message)
    }
}

impl std::error::Error for TypeError {}
