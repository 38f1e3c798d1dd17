// Expression Parser
// Reduces a lexed token stream to a value using a stack of open scopes

use crate::context::DataContext;
use crate::expression::evaluator::EvalError;
use crate::expression::functions::BuiltinFunctions;
use crate::expression::types::{Function, Operator, Paren, Ternary, Token, TokenType, TypeError};
use crate::value::{Array, Value};

use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Parse error
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub kind: ParseErrorKind,
    /// Offending token text
    pub fragment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Scope closed by the wrong token, or left open
    Unbalanced,
    /// Token that cannot appear where it was found
    UnexpectedToken,
    /// Identity not found in any scope
    UnresolvedIdentity,
    /// Wrong number of function arguments
    Arity,
    DivisionByZero,
    /// A built-in function rejected its input
    FunctionFailed,
    /// Nothing to evaluate
    Empty,
}

impl ParseError {
    pub fn new(
        message: impl Into<String>,
        kind: ParseErrorKind,
        fragment: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            kind,
            fragment: fragment.into(),
        }
    }

    fn unexpected(token: &Token) -> Self {
        Self::new(
            format!("unexpected token '{}'", token),
            ParseErrorKind::UnexpectedToken,
            token.to_string(),
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at '{}': {}", self.fragment, self.message)
    }
}

impl std::error::Error for ParseError {}

// =============================================================================
// Scopes
// =============================================================================

/// What opened a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeReason {
    /// The outermost scope; closed by the end of input
    Final,
    Paren,
    Bracket,
    Function(Function),
}

/// Token buffer for one open scope
#[derive(Debug)]
pub struct PrimitiveExpression {
    pub reason: ScopeReason,
    pub tokens: Vec<Token>,
    /// Completed arguments of a function scope
    pub args: Vec<Value>,
}

impl PrimitiveExpression {
    pub fn new(reason: ScopeReason) -> Self {
        Self {
            reason,
            tokens: Vec::new(),
            args: Vec::new(),
        }
    }
}

/// Expression parser bound to a data context
pub struct Parser<'a> {
    context: &'a DataContext,
}

impl<'a> Parser<'a> {
    pub fn new(context: &'a DataContext) -> Self {
        Self { context }
    }

    /// Evaluate a token stream
    pub fn parse(&self, tokens: Vec<Token>) -> Result<Value, EvalError> {
        let mut tokens = tokens;
        let mut scopes = vec![PrimitiveExpression::new(ScopeReason::Final)];
        let mut cursor = 0;

        while cursor < tokens.len() {
            match tokens[cursor].clone() {
                Token::Paren(Paren::Open) => scopes.push(PrimitiveExpression::new(ScopeReason::Paren)),
                Token::Paren(Paren::OpenBracket) => {
                    scopes.push(PrimitiveExpression::new(ScopeReason::Bracket))
                }
                Token::Function(function) => {
                    if !matches!(tokens.get(cursor + 1), Some(Token::Paren(Paren::Open))) {
                        return Err(ParseError::new(
                            "function call is missing '('",
                            ParseErrorKind::Unbalanced,
                            function.name(),
                        )
                        .into());
                    }
                    scopes.push(PrimitiveExpression::new(ScopeReason::Function(function)));
                    cursor += 1;
                }
                Token::Paren(Paren::Close) => {
                    let scope = pop_scope(&mut scopes, ")")?;
                    let value = match scope.reason {
                        ScopeReason::Paren => self.reduce(scope.tokens)?,
                        ScopeReason::Function(function) => {
                            let args = self.finish_args(scope)?;
                            BuiltinFunctions::call(function, args)?
                        }
                        _ => return Err(unbalanced(")")),
                    };
                    current_scope(&mut scopes)?
                        .tokens
                        .push(Token::from_value(value));
                }
                Token::Paren(Paren::CloseBracket) => {
                    let scope = pop_scope(&mut scopes, "]")?;
                    if scope.reason != ScopeReason::Bracket {
                        return Err(unbalanced("]"));
                    }
                    let key = self.reduce(scope.tokens)?;
                    let parent = current_scope(&mut scopes)?;
                    parent.tokens.push(Token::BinaryOp(Operator::Index));
                    parent.tokens.push(Token::from_value(key));
                }
                Token::Comma => {
                    let scope = current_scope(&mut scopes)?;
                    if !matches!(scope.reason, ScopeReason::Function(_)) {
                        return Err(ParseError::unexpected(&Token::Comma).into());
                    }
                    let arg_tokens = std::mem::take(&mut scope.tokens);
                    let arg = self.reduce(arg_tokens)?;
                    current_scope(&mut scopes)?.args.push(arg);
                }
                Token::Ternary(Ternary::Question) => {
                    let scope = current_scope(&mut scopes)?;
                    let condition_tokens = std::mem::take(&mut scope.tokens);
                    let condition = self.reduce(condition_tokens)?;
                    let taken = Token::from_value(condition).coerce_to_bool()?;
                    splice_ternary(&mut tokens, cursor, taken)?;
                    continue;
                }
                Token::Ternary(Ternary::Colon) => {
                    return Err(ParseError::unexpected(&tokens[cursor]).into());
                }
                token => current_scope(&mut scopes)?.tokens.push(token),
            }
            cursor += 1;
        }

        let scope = pop_scope(&mut scopes, "end of input")?;
        if !scopes.is_empty() || scope.reason != ScopeReason::Final {
            return Err(ParseError::new(
                "scope left open at end of input",
                ParseErrorKind::Unbalanced,
                "",
            )
            .into());
        }
        self.reduce(scope.tokens)
    }

    fn finish_args(&self, mut scope: PrimitiveExpression) -> Result<Vec<Value>, EvalError> {
        if !scope.tokens.is_empty() {
            let last = self.reduce(std::mem::take(&mut scope.tokens))?;
            scope.args.push(last);
        } else if !scope.args.is_empty() {
            return Err(ParseError::new(
                "missing argument after ','",
                ParseErrorKind::Arity,
                ",",
            )
            .into());
        }
        Ok(scope.args)
    }

    // =========================================================================
    // Reduction of a closed scope
    // =========================================================================

    /// Reduce a flat token sequence by precedence climbing
    pub fn reduce(&self, tokens: Vec<Token>) -> Result<Value, EvalError> {
        if tokens.is_empty() {
            return Err(ParseError::new("empty expression", ParseErrorKind::Empty, "").into());
        }

        let tokens = self.resolve_identities(tokens)?;
        trace!(tokens = tokens.len(), "reducing primitive expression");

        let mut reducer = Reducer { tokens, pos: 0 };
        let result = reducer.expression(0)?;
        if let Some(extra) = reducer.tokens.get(reducer.pos) {
            return Err(ParseError::unexpected(extra).into());
        }
        Ok(result.into_value()?)
    }

    /// Identities are looked up in the context unless they name a member
    /// after a dot. A chain such as `a.b.c` is resolved in one walk so the
    /// intermediate scopes are never copied.
    fn resolve_identities(&self, tokens: Vec<Token>) -> Result<Vec<Token>, EvalError> {
        let mut out = Vec::with_capacity(tokens.len());
        let mut i = 0;

        while i < tokens.len() {
            let after_dot = i > 0 && matches!(tokens[i - 1], Token::Dot);
            match &tokens[i] {
                Token::Identity(name) if !after_dot => {
                    let end = member_chain_end(&tokens, i);
                    let path: Vec<&str> = tokens[i..end]
                        .iter()
                        .filter_map(|token| match token {
                            Token::Identity(member) => Some(member.as_str()),
                            _ => None,
                        })
                        .collect();
                    if let Some(value) = self.context.resolve_members(&path) {
                        out.push(Token::from_value(value));
                        i = end;
                        continue;
                    }

                    // missing members are left to the dot operator
                    let value = self.context.resolve(name).ok_or_else(|| {
                        ParseError::new(
                            format!("unresolved identity '{}'", name),
                            ParseErrorKind::UnresolvedIdentity,
                            name.clone(),
                        )
                    })?;
                    out.push(Token::from_value(value));
                }
                token => out.push(token.clone()),
            }
            i += 1;
        }
        Ok(out)
    }
}

/// End (exclusive) of `identity (. identity)*` starting at `start`
fn member_chain_end(tokens: &[Token], start: usize) -> usize {
    let mut end = start + 1;
    while matches!(
        (tokens.get(end), tokens.get(end + 1)),
        (Some(Token::Dot), Some(Token::Identity(_)))
    ) {
        end += 2;
    }
    end
}

fn unbalanced(closer: &str) -> EvalError {
    ParseError::new(
        format!("'{}' does not close the innermost scope", closer),
        ParseErrorKind::Unbalanced,
        closer,
    )
    .into()
}

fn current_scope(scopes: &mut [PrimitiveExpression]) -> Result<&mut PrimitiveExpression, EvalError> {
    scopes.last_mut().ok_or_else(|| unbalanced("scope"))
}

fn pop_scope(scopes: &mut Vec<PrimitiveExpression>, closer: &str) -> Result<PrimitiveExpression, EvalError> {
    match scopes.last() {
        Some(scope) if scope.reason == ScopeReason::Final && closer != "end of input" => {
            Err(unbalanced(closer))
        }
        Some(_) => scopes.pop().ok_or_else(|| unbalanced(closer)),
        None => Err(unbalanced(closer)),
    }
}

/// Remove the branch that is not taken. `question` indexes the `?`; on
/// return the cursor position holds the first token of the taken branch.
fn splice_ternary(tokens: &mut Vec<Token>, question: usize, taken: bool) -> Result<(), EvalError> {
    let colon = find_colon(tokens, question).ok_or_else(|| {
        EvalError::from(ParseError::new(
            "'?' without matching ':'",
            ParseErrorKind::Unbalanced,
            "?",
        ))
    })?;

    if taken {
        let end = branch_end(tokens, colon + 1);
        tokens.drain(colon..end);
        tokens.remove(question);
    } else {
        tokens.drain(question..=colon);
    }
    Ok(())
}

fn find_colon(tokens: &[Token], question: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(question + 1) {
        match token {
            Token::Ternary(Ternary::Question) => depth += 1,
            Token::Ternary(Ternary::Colon) if depth == 0 => return Some(i),
            Token::Ternary(Ternary::Colon) => depth -= 1,
            _ => {}
        }
    }
    None
}

/// End (exclusive) of a false branch: the closer or comma of the enclosing
/// scope, or end of input.
fn branch_end(tokens: &[Token], start: usize) -> usize {
    let mut depth = 0usize;
    for (i, token) in tokens.iter().enumerate().skip(start) {
        match token {
            Token::Paren(p) if p.is_open() => depth += 1,
            Token::Paren(_) if depth == 0 => return i,
            Token::Paren(_) => depth -= 1,
            Token::Comma if depth == 0 => return i,
            _ => {}
        }
    }
    tokens.len()
}

// =============================================================================
// Precedence climbing
// =============================================================================

struct Reducer {
    tokens: Vec<Token>,
    pos: usize,
}

impl Reducer {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expression(&mut self, min_precedence: u8) -> Result<Token, EvalError> {
        let mut lhs = self.unary()?;

        loop {
            let (op, precedence) = match self.tokens.get(self.pos) {
                None => break,
                Some(Token::Dot) => (None, Operator::Index.precedence()),
                Some(Token::BinaryOp(op)) => (Some(*op), op.precedence()),
                Some(other) => return Err(ParseError::unexpected(other).into()),
            };
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;

            lhs = match op {
                None => match self.next() {
                    Some(Token::Identity(name)) => member(lhs, &name)?,
                    Some(other) => return Err(ParseError::unexpected(&other).into()),
                    None => return Err(ParseError::unexpected(&Token::Dot).into()),
                },
                Some(op) => {
                    let rhs = self.expression(precedence + 1)?;
                    binary(op, lhs, rhs)?
                }
            };
        }

        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Token, EvalError> {
        match self.next() {
            Some(Token::UnaryOp(op)) => {
                let operand = self.expression(Operator::Not.precedence())?;
                unary(op, operand)
            }
            Some(token) if token.is_operand() => Ok(token),
            Some(other) => Err(ParseError::unexpected(&other).into()),
            None => Err(ParseError::new(
                "expression ended where an operand was expected",
                ParseErrorKind::UnexpectedToken,
                "",
            )
            .into()),
        }
    }
}

fn unary(op: Operator, operand: Token) -> Result<Token, EvalError> {
    match op {
        Operator::Sub => match operand.coerce_to_number()? {
            Token::Int(n) => Ok(n
                .checked_neg()
                .map(Token::Int)
                .unwrap_or(Token::Float(-(n as f64)))),
            Token::Float(n) => Ok(Token::Float(-n)),
            other => Err(TypeError::new(&other, "number").into()),
        },
        Operator::Not => Ok(Token::Bool(!operand.coerce_to_bool()?)),
        Operator::Empty => Ok(Token::Bool(is_empty(&operand))),
        _ => Err(ParseError::unexpected(&Token::UnaryOp(op)).into()),
    }
}

fn is_empty(token: &Token) -> bool {
    match token {
        Token::Null => true,
        Token::Int(n) => *n == 0,
        Token::Float(n) => *n == 0.0,
        Token::String(s) | Token::Raw(s) => s.is_empty(),
        Token::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn binary(op: Operator, lhs: Token, rhs: Token) -> Result<Token, EvalError> {
    match op {
        Operator::Index => index(lhs, rhs),
        Operator::And => Ok(Token::Bool(lhs.coerce_to_bool()? && rhs.coerce_to_bool()?)),
        Operator::Or => Ok(Token::Bool(lhs.coerce_to_bool()? || rhs.coerce_to_bool()?)),
        Operator::Eq => Ok(Token::Bool(equals(&lhs, &rhs)?)),
        Operator::Ne => Ok(Token::Bool(!equals(&lhs, &rhs)?)),
        Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => compare(op, &lhs, &rhs),
        Operator::Add | Operator::Sub | Operator::Mul | Operator::Div | Operator::Mod => {
            arithmetic(op, &lhs, &rhs)
        }
        Operator::Not | Operator::Empty => Err(ParseError::unexpected(&Token::BinaryOp(op)).into()),
    }
}

fn division_by_zero(op: Operator) -> EvalError {
    ParseError::new("division by zero", ParseErrorKind::DivisionByZero, op.symbol()).into()
}

fn arithmetic(op: Operator, lhs: &Token, rhs: &Token) -> Result<Token, EvalError> {
    let (a, b) = (lhs.coerce_to_number()?, rhs.coerce_to_number()?);
    if let (Token::Int(x), Token::Int(y)) = (&a, &b) {
        return int_arithmetic(op, *x, *y);
    }

    let (x, y) = (a.coerce_to_f64()?, b.coerce_to_f64()?);
    let result = match op {
        Operator::Add => x + y,
        Operator::Sub => x - y,
        Operator::Mul => x * y,
        Operator::Div | Operator::Mod if y == 0.0 => return Err(division_by_zero(op)),
        Operator::Div => x / y,
        Operator::Mod => x % y,
        _ => return Err(ParseError::unexpected(&Token::BinaryOp(op)).into()),
    };
    Ok(Token::Float(result))
}

/// Integer arithmetic; overflow widens to float, inexact division yields a
/// float.
fn int_arithmetic(op: Operator, x: i64, y: i64) -> Result<Token, EvalError> {
    let widened = |checked: Option<i64>, fallback: f64| {
        checked.map(Token::Int).unwrap_or(Token::Float(fallback))
    };

    let result = match op {
        Operator::Add => widened(x.checked_add(y), x as f64 + y as f64),
        Operator::Sub => widened(x.checked_sub(y), x as f64 - y as f64),
        Operator::Mul => widened(x.checked_mul(y), x as f64 * y as f64),
        Operator::Div | Operator::Mod if y == 0 => return Err(division_by_zero(op)),
        Operator::Div => match x.checked_rem(y) {
            Some(0) => widened(x.checked_div(y), x as f64 / y as f64),
            _ => Token::Float(x as f64 / y as f64),
        },
        Operator::Mod => Token::Int(x.checked_rem(y).unwrap_or(0)),
        _ => return Err(ParseError::unexpected(&Token::BinaryOp(op)).into()),
    };
    Ok(result)
}

/// Numeric comparison; two non-numeric strings compare lexicographically
fn compare(op: Operator, lhs: &Token, rhs: &Token) -> Result<Token, EvalError> {
    if let (Token::String(a), Token::String(b)) = (lhs, rhs) {
        if lhs.coerce_to_number().is_err() || rhs.coerce_to_number().is_err() {
            let ordering = a.cmp(b);
            return Ok(Token::Bool(match op {
                Operator::Gt => ordering.is_gt(),
                Operator::Lt => ordering.is_lt(),
                Operator::Ge => ordering.is_ge(),
                _ => ordering.is_le(),
            }));
        }
    }

    let (x, y) = (lhs.coerce_to_f64()?, rhs.coerce_to_f64()?);
    Ok(Token::Bool(match op {
        Operator::Gt => x > y,
        Operator::Lt => x < y,
        Operator::Ge => x >= y,
        _ => x <= y,
    }))
}

pub(crate) fn equals(lhs: &Token, rhs: &Token) -> Result<bool, TypeError> {
    match (lhs, rhs) {
        (Token::Null, Token::Null) => Ok(true),
        (Token::Null, _) | (_, Token::Null) => Ok(false),
        (Token::Bool(_), _) | (_, Token::Bool(_)) => {
            Ok(lhs.coerce_to_bool()? == rhs.coerce_to_bool()?)
        }
        (Token::Int(a), Token::Int(b)) => Ok(a == b),
        (Token::String(a), Token::String(b)) => Ok(a == b),
        (Token::Array(a), Token::Array(b)) => Ok(a == b),
        (Token::Object(a), Token::Object(b)) => Ok(Arc::ptr_eq(a, b)),
        _ => match (lhs.coerce_to_f64(), rhs.coerce_to_f64()) {
            (Ok(a), Ok(b)) => Ok(a == b),
            _ => Ok(false),
        },
    }
}

/// `lhs.name`
fn member(lhs: Token, name: &str) -> Result<Token, EvalError> {
    match lhs {
        Token::Null => Ok(Token::Null),
        Token::Array(array) => Ok(array
            .get(name)
            .cloned()
            .map(Token::from_value)
            .unwrap_or(Token::Null)),
        Token::Object(object) => Ok(object
            .property(name)
            .map(Token::from_value)
            .unwrap_or(Token::Null)),
        other => Err(TypeError::new(&other, "a member access target")
            .with_message(format!("cannot read '{}' of {}", name, other.token_type()))
            .into()),
    }
}

/// `lhs[key]`
fn index(lhs: Token, key: Token) -> Result<Token, EvalError> {
    if matches!(lhs, Token::Null) || matches!(key, Token::Null) {
        return Ok(Token::Null);
    }

    let found = match (&lhs, &key) {
        (Token::Array(array @ Array::List(_)), _) => {
            let position = match key.coerce(TokenType::Int) {
                Ok(Token::Int(n)) => n,
                _ => {
                    return Err(TypeError::new(&key, "list index")
                        .with_message(format!("list index must be an integer, got {}", key))
                        .into())
                }
            };
            array.get_index(position).cloned()
        }
        (Token::Array(array @ Array::Map(_)), Token::Int(_) | Token::String(_) | Token::Float(_)) => {
            array.get(&key.coerce_to_string()?).cloned()
        }
        (Token::Object(_), _) => {
            return Err(TypeError::new(&lhs, "map")
                .with_message("object members require an identity key; use '.'")
                .into())
        }
        _ => {
            return Err(TypeError::new(&lhs, "map")
                .with_message(format!("cannot index {} with {}", lhs.token_type(), key.token_type()))
                .into())
        }
    };

    Ok(found.map(Token::from_value).unwrap_or(Token::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::lexer::Lexer;
    use crate::value::DataObject;

    #[derive(Debug)]
    struct Person;

    impl DataObject for Person {
        fn type_name(&self) -> &str {
            "Person"
        }

        fn property(&self, name: &str) -> Option<Value> {
            (name == "name").then(|| Value::from("Ada"))
        }
    }

    fn context() -> DataContext {
        DataContext::new(Value::map([
            ("Foo", Value::Int(2)),
            ("idx", Value::Int(1)),
            (
                "items",
                Value::from(vec![
                    Value::map([("title", "a")]),
                    Value::map([("title", "b")]),
                ]),
            ),
            ("viewer", Value::map([("name", "Ada")])),
            ("person", Value::Object(Arc::new(Person))),
            ("blank", Value::from("")),
        ]))
    }

    fn eval_in(expr: &str, ctx: &DataContext) -> Result<Value, EvalError> {
        let tokens = Lexer::process(expr)?;
        Parser::new(ctx).parse(tokens)
    }

    fn eval(expr: &str) -> Result<Value, EvalError> {
        eval_in(expr, &context())
    }

    fn parse_kind(result: Result<Value, EvalError>) -> ParseErrorKind {
        match result {
            Err(EvalError::Parse(e)) => e.kind,
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval("2 + 3 * 4").unwrap(), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4").unwrap(), Value::Int(20));
        assert_eq!(eval("10 - 4 - 3").unwrap(), Value::Int(3));
        assert_eq!(eval("2 * 3 % 4").unwrap(), Value::Int(2));
        assert_eq!(eval("-2 * 3").unwrap(), Value::Int(-6));
        assert_eq!(eval("1 + 2 > 2 && 3 == 3").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_division() {
        assert_eq!(eval("8 / 4").unwrap(), Value::Int(2));
        assert_eq!(eval("10 / 4").unwrap(), Value::Float(2.5));
        assert_eq!(eval("7 mod 3").unwrap(), Value::Int(1));
        assert_eq!(eval("1.5 * 2").unwrap(), Value::Float(3.0));
        assert_eq!(parse_kind(eval("1 / 0")), ParseErrorKind::DivisionByZero);
        assert_eq!(parse_kind(eval("1 % 0.0")), ParseErrorKind::DivisionByZero);
    }

    #[test]
    fn test_ternary() {
        assert_eq!(eval("1 == 1 ? 'yes' : 'no'").unwrap(), Value::from("yes"));
        assert_eq!(eval("Foo > 5 ? 'big' : 'small'").unwrap(), Value::from("small"));
        assert_eq!(eval("true ? false ? 1 : 2 : 3").unwrap(), Value::Int(2));
        assert_eq!(eval("false ? 1 : false ? 2 : 3").unwrap(), Value::Int(3));
        assert_eq!(eval("(true ? 1 : 2) + 10").unwrap(), Value::Int(11));
    }

    #[test]
    fn test_ternary_untaken_branch_not_evaluated() {
        assert_eq!(eval("false ? (1/0) : 'safe'").unwrap(), Value::from("safe"));
        assert_eq!(eval("true ? 'ok' : (1/0)").unwrap(), Value::from("ok"));
        assert_eq!(eval("true ? 'ok' : nobody.here").unwrap(), Value::from("ok"));
    }

    #[test]
    fn test_ternary_inside_function_arguments() {
        assert_eq!(
            eval("osx:urlEncode(Foo == 2 ? 'a b' : 'c')").unwrap(),
            Value::from("a%20b")
        );
    }

    #[test]
    fn test_word_and_symbol_operators_agree() {
        let pairs = [("gt", ">"), ("lt", "<"), ("ge", ">="), ("le", "<="), ("eq", "=="), ("ne", "!=")];
        for (a, b) in [(1, 2), (2, 2), (3, 2)] {
            for (word, symbol) in pairs {
                let by_word = eval(&format!("{} {} {}", a, word, b)).unwrap();
                let by_symbol = eval(&format!("{} {} {}", a, symbol, b)).unwrap();
                assert_eq!(by_word, by_symbol, "{} {} {}", a, word, b);
            }
        }
    }

    #[test]
    fn test_cur_shadows_top() {
        let ctx = context().with_cur(Value::map([("Foo", 1i64)]));
        assert_eq!(eval_in("Foo", &ctx).unwrap(), Value::Int(1));
        assert_eq!(eval_in("Top.Foo", &ctx).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_paths_and_indexing() {
        assert_eq!(eval("items[1].title").unwrap(), Value::from("b"));
        assert_eq!(eval("Top.items[idx].title").unwrap(), Value::from("b"));
        assert_eq!(eval("viewer['name']").unwrap(), Value::from("Ada"));
        assert_eq!(eval("items[5]").unwrap(), Value::Null);
        assert_eq!(eval("viewer.missing.deeper").unwrap(), Value::Null);
        assert_eq!(eval("items[1 + 0]['title']").unwrap(), Value::from("b"));
    }

    #[test]
    fn test_member_chain_resolves_to_one_token() {
        let ctx = context();
        let parser = Parser::new(&ctx);
        let tokens = Lexer::process("Top.viewer.name == items[0].title").unwrap();
        let resolved = parser.resolve_identities(tokens).unwrap();

        assert_eq!(resolved[0], Token::String("Ada".into()));
        assert_eq!(resolved[1], Token::BinaryOp(Operator::Eq));
        assert!(matches!(resolved[2], Token::Array(_)));
        assert_eq!(resolved.last(), Some(&Token::Identity("title".into())));
    }

    #[test]
    fn test_object_access() {
        assert_eq!(eval("person.name").unwrap(), Value::from("Ada"));
        assert!(matches!(eval("person['name']"), Err(EvalError::Type(_))));
        assert!(matches!(eval("Foo.bar"), Err(EvalError::Type(_))));
    }

    #[test]
    fn test_unresolved_identity() {
        let err = eval("nobody + 1").unwrap_err();
        match err {
            EvalError::Parse(e) => {
                assert_eq!(e.kind, ParseErrorKind::UnresolvedIdentity);
                assert_eq!(e.fragment, "nobody");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_empty_and_not() {
        assert_eq!(eval("empty blank").unwrap(), Value::Bool(true));
        assert_eq!(eval("empty items").unwrap(), Value::Bool(false));
        assert_eq!(eval("not empty viewer.name").unwrap(), Value::Bool(true));
        assert_eq!(eval("!(Foo == 2)").unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_string_comparison() {
        assert_eq!(eval("'abc' < 'abd'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'10' > '9'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'a' == 'a'").unwrap(), Value::Bool(true));
        assert_eq!(eval("'2' == 2").unwrap(), Value::Bool(true));
        assert_eq!(eval("null == 0").unwrap(), Value::Bool(false));
        assert_eq!(eval("'TRUE' == true").unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_arithmetic_on_text_is_type_error() {
        assert!(matches!(eval("'abc' * 2"), Err(EvalError::Type(_))));
        assert_eq!(eval("'3' + 4").unwrap(), Value::Int(7));
    }

    #[test]
    fn test_functions() {
        assert_eq!(eval("osx:urlEncode('a b')").unwrap(), Value::from("a%20b"));
        assert_eq!(eval("osx:parseJson('[1, 2]')[1]").unwrap(), Value::Int(2));
        assert_eq!(
            eval("osx:decodeBase64(osx:urlDecode('aGk%3D'))").unwrap(),
            Value::from("hi")
        );
        assert_eq!(
            parse_kind(eval("osx:urlEncode('a', 'b')")),
            ParseErrorKind::Arity
        );
        assert_eq!(parse_kind(eval("osx:urlEncode()")), ParseErrorKind::Arity);
    }

    #[test]
    fn test_adjacent_operands_rejected() {
        assert_eq!(parse_kind(eval("1 2")), ParseErrorKind::UnexpectedToken);
    }

    #[test]
    fn test_comma_outside_function() {
        assert_eq!(parse_kind(eval("1, 2")), ParseErrorKind::UnexpectedToken);
    }

    #[test]
    fn test_reduce_empty() {
        let ctx = context();
        let err = Parser::new(&ctx).reduce(vec![]).unwrap_err();
        assert!(matches!(err, EvalError::Parse(ParseError { kind: ParseErrorKind::Empty, .. })));
    }
}
