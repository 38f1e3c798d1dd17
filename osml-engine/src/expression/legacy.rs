// Legacy Expression Evaluator
// Single-pass scanner with immediate variable lookup and postfix evaluation

use crate::context::DataContext;
use crate::expression::types::Operator;
use crate::value::Value;

use std::fmt;
use tracing::trace;

/// Error raised by the legacy evaluator
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionError {
    pub message: String,
    /// The expression being evaluated
    pub expression: String,
}

impl ExpressionError {
    fn new(message: impl Into<String>, expression: &str) -> Self {
        Self {
            message: message.into(),
            expression: expression.to_string(),
        }
    }
}

impl fmt::Display for ExpressionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "expression error in '{}': {}", self.expression, self.message)
    }
}

impl std::error::Error for ExpressionError {}

/// Operator table, longest first. Word forms only match on word boundaries.
const OPERATOR_TABLE: [(&str, Operator); 25] = [
    ("empty", Operator::Empty),
    ("and", Operator::And),
    ("not", Operator::Not),
    ("div", Operator::Div),
    ("mod", Operator::Mod),
    ("&&", Operator::And),
    ("||", Operator::Or),
    ("==", Operator::Eq),
    ("!=", Operator::Ne),
    (">=", Operator::Ge),
    ("<=", Operator::Le),
    ("or", Operator::Or),
    ("eq", Operator::Eq),
    ("ne", Operator::Ne),
    ("gt", Operator::Gt),
    ("lt", Operator::Lt),
    ("ge", Operator::Ge),
    ("le", Operator::Le),
    (">", Operator::Gt),
    ("<", Operator::Lt),
    ("+", Operator::Add),
    ("-", Operator::Sub),
    ("*", Operator::Mul),
    ("/", Operator::Div),
    ("%", Operator::Mod),
];

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Operand(Value),
    Binary(Operator),
    Unary(Operator),
    Open,
    Close,
}

impl Item {
    fn precedence(&self) -> u8 {
        match self {
            Item::Unary(_) => 6,
            Item::Binary(op) => op.precedence(),
            _ => 0,
        }
    }
}

/// The legacy evaluator. No functions, ternaries or bracket indexing.
pub struct LegacyEvaluator;

impl LegacyEvaluator {
    pub fn evaluate(expression: &str, context: &DataContext) -> Result<Value, ExpressionError> {
        let items = tokenize(expression, context)?;
        let postfix = to_postfix(items, expression)?;
        trace!(expression, items = postfix.len(), "legacy postfix");
        evaluate_postfix(postfix, expression)
    }
}

// =============================================================================
// Scanning
// =============================================================================

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Characters that continue a dotted variable path
fn is_path_char(c: char) -> bool {
    is_word_char(c) || c == '.'
}

fn tokenize(expression: &str, context: &DataContext) -> Result<Vec<Item>, ExpressionError> {
    let chars: Vec<char> = expression.chars().collect();
    let mut items: Vec<Item> = Vec::new();
    let mut i = 0;

    'scan: while i < chars.len() {
        let ch = chars[i];

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        if ch == '(' || ch == ')' {
            items.push(if ch == '(' { Item::Open } else { Item::Close });
            i += 1;
            continue;
        }

        if ch == '\'' || ch == '"' {
            let (text, next) = scan_string(&chars, i, expression)?;
            items.push(Item::Operand(Value::String(text)));
            i = next;
            continue;
        }

        if ch.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let literal: String = chars[start..i].iter().collect();
            items.push(Item::Operand(number(&literal, expression)?));
            continue;
        }

        for (symbol, op) in OPERATOR_TABLE {
            if !matches_at(&chars, i, symbol) {
                continue;
            }
            let is_word = symbol.chars().all(|c| c.is_ascii_alphabetic());
            let boundary_before = i == 0 || !is_path_char(chars[i - 1]);
            let after = i + symbol.chars().count();
            let boundary_after = after >= chars.len() || !is_path_char(chars[after]);
            if is_word && !(boundary_before && boundary_after) {
                continue;
            }

            let unary_position = matches!(
                items.last(),
                None | Some(Item::Binary(_)) | Some(Item::Unary(_)) | Some(Item::Open)
            );
            let item = match op {
                Operator::Not | Operator::Empty => Item::Unary(op),
                Operator::Sub if unary_position => Item::Unary(op),
                _ => Item::Binary(op),
            };
            items.push(item);
            i = after;
            continue 'scan;
        }

        if ch == '!' {
            items.push(Item::Unary(Operator::Not));
            i += 1;
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = i;
            while i < chars.len() && is_path_char(chars[i]) {
                i += 1;
            }
            let path: String = chars[start..i].iter().collect();
            items.push(Item::Operand(variable(&path, context, expression)?));
            continue;
        }

        return Err(ExpressionError::new(
            format!("unexpected character '{}'", ch),
            expression,
        ));
    }

    Ok(items)
}

fn matches_at(chars: &[char], at: usize, symbol: &str) -> bool {
    let mut i = at;
    for s in symbol.chars() {
        if chars.get(i) != Some(&s) {
            return false;
        }
        i += 1;
    }
    true
}

fn scan_string(chars: &[char], start: usize, expression: &str) -> Result<(String, usize), ExpressionError> {
    let quote = chars[start];
    let mut text = String::new();
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                text.push(chars[i + 1]);
                i += 2;
            }
            c if c == quote => return Ok((text, i + 1)),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    Err(ExpressionError::new("unterminated string", expression))
}

fn number(literal: &str, expression: &str) -> Result<Value, ExpressionError> {
    let parsed = if literal.contains('.') {
        literal.parse::<f64>().ok().map(Value::Float)
    } else {
        literal.parse::<i64>().ok().map(Value::Int)
    };
    parsed.ok_or_else(|| ExpressionError::new(format!("invalid number '{}'", literal), expression))
}

/// Literals and dotted paths, resolved as soon as they are scanned
fn variable(path: &str, context: &DataContext, expression: &str) -> Result<Value, ExpressionError> {
    match path {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        "null" => return Ok(Value::Null),
        _ => {}
    }
    context
        .resolve_path(path)
        .ok_or_else(|| ExpressionError::new(format!("unknown variable '{}'", path), expression))
}

// =============================================================================
// Postfix conversion and evaluation
// =============================================================================

fn to_postfix(items: Vec<Item>, expression: &str) -> Result<Vec<Item>, ExpressionError> {
    let mut output = Vec::with_capacity(items.len());
    let mut stack: Vec<Item> = Vec::new();

    for item in items {
        match item {
            Item::Operand(_) => output.push(item),
            Item::Open => stack.push(item),
            Item::Close => loop {
                match stack.pop() {
                    Some(Item::Open) => break,
                    Some(op) => output.push(op),
                    None => return Err(ExpressionError::new("unbalanced ')'", expression)),
                }
            },
            Item::Unary(_) => stack.push(item),
            Item::Binary(_) => {
                let precedence = item.precedence();
                while let Some(top) = stack.last() {
                    if matches!(top, Item::Open) || top.precedence() < precedence {
                        break;
                    }
                    if let Some(op) = stack.pop() {
                        output.push(op);
                    }
                }
                stack.push(item);
            }
        }
    }

    while let Some(item) = stack.pop() {
        if matches!(item, Item::Open) {
            return Err(ExpressionError::new("unbalanced '('", expression));
        }
        output.push(item);
    }
    Ok(output)
}

fn evaluate_postfix(postfix: Vec<Item>, expression: &str) -> Result<Value, ExpressionError> {
    let mut stack: Vec<Value> = Vec::new();
    let missing = || ExpressionError::new("operator is missing an operand", expression);

    for item in postfix {
        match item {
            Item::Operand(value) => stack.push(value),
            Item::Unary(op) => {
                let operand = stack.pop().ok_or_else(missing)?;
                stack.push(apply_unary(op, operand, expression)?);
            }
            Item::Binary(op) => {
                let rhs = stack.pop().ok_or_else(missing)?;
                let lhs = stack.pop().ok_or_else(missing)?;
                stack.push(apply_binary(op, lhs, rhs, expression)?);
            }
            Item::Open | Item::Close => {
                return Err(ExpressionError::new("unbalanced parentheses", expression))
            }
        }
    }

    match (stack.pop(), stack.is_empty()) {
        (Some(value), true) => Ok(value),
        (None, _) => Err(ExpressionError::new("empty expression", expression)),
        (Some(_), false) => Err(ExpressionError::new("operands without an operator", expression)),
    }
}

/// Strict numeric view: numbers and numeric strings only
fn numeric(value: &Value, expression: &str) -> Result<f64, ExpressionError> {
    match value {
        Value::Int(_) | Value::Float(_) | Value::String(_) => value.as_number(),
        _ => None,
    }
    .ok_or_else(|| {
        ExpressionError::new(
            format!("'{}' is not a number", value.as_string()),
            expression,
        )
    })
}

fn apply_unary(op: Operator, operand: Value, expression: &str) -> Result<Value, ExpressionError> {
    match op {
        Operator::Not => Ok(Value::Bool(!operand.is_truthy())),
        Operator::Empty => Ok(Value::Bool(match &operand {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            Value::Array(a) => a.is_empty(),
            Value::Int(n) => *n == 0,
            Value::Float(n) => *n == 0.0,
            _ => false,
        })),
        Operator::Sub => match operand {
            Value::Int(n) => Ok(Value::Int(n.wrapping_neg())),
            other => Ok(Value::Float(-numeric(&other, expression)?)),
        },
        _ => Err(ExpressionError::new(
            format!("'{}' is not a unary operator", op.symbol()),
            expression,
        )),
    }
}

fn apply_binary(op: Operator, lhs: Value, rhs: Value, expression: &str) -> Result<Value, ExpressionError> {
    match op {
        Operator::And => Ok(Value::Bool(lhs.is_truthy() && rhs.is_truthy())),
        Operator::Or => Ok(Value::Bool(lhs.is_truthy() || rhs.is_truthy())),
        Operator::Eq => Ok(Value::Bool(loose_equals(&lhs, &rhs))),
        Operator::Ne => Ok(Value::Bool(!loose_equals(&lhs, &rhs))),
        Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => {
            let (a, b) = (numeric(&lhs, expression)?, numeric(&rhs, expression)?);
            Ok(Value::Bool(match op {
                Operator::Gt => a > b,
                Operator::Lt => a < b,
                Operator::Ge => a >= b,
                _ => a <= b,
            }))
        }
        _ => arithmetic(op, &lhs, &rhs, expression),
    }
}

fn arithmetic(op: Operator, lhs: &Value, rhs: &Value, expression: &str) -> Result<Value, ExpressionError> {
    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        let result = match op {
            Operator::Add => a.checked_add(*b),
            Operator::Sub => a.checked_sub(*b),
            Operator::Mul => a.checked_mul(*b),
            Operator::Mod if *b != 0 => a.checked_rem(*b),
            Operator::Div if *b != 0 && a.checked_rem(*b) == Some(0) => a.checked_div(*b),
            _ => None,
        };
        if let Some(n) = result {
            return Ok(Value::Int(n));
        }
    }

    let (a, b) = (numeric(lhs, expression)?, numeric(rhs, expression)?);
    let result = match op {
        Operator::Add => a + b,
        Operator::Sub => a - b,
        Operator::Mul => a * b,
        Operator::Div | Operator::Mod if b == 0.0 => {
            return Err(ExpressionError::new("division by zero", expression))
        }
        Operator::Div => a / b,
        Operator::Mod => a % b,
        _ => {
            return Err(ExpressionError::new(
                format!("'{}' is not a binary operator", op.symbol()),
                expression,
            ))
        }
    };
    Ok(Value::Float(result))
}

fn loose_equals(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => true,
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(a), other) | (other, Value::Bool(a)) => *a == other.is_truthy(),
        (Value::String(a), Value::String(b)) => a == b,
        _ => match (lhs.as_number(), rhs.as_number()) {
            (Some(a), Some(b)) => a == b,
            _ => lhs == rhs,
        },
    }
}
