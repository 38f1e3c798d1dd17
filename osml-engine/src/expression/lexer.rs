// Expression Lexer
// Multi-pass segmentation of `${...}` expression bodies into validated tokens

use crate::expression::types::{
    unescape_string_literal, Function, Operator, Paren, Ternary, Token,
};

use std::fmt;
use tracing::trace;

/// Lexer error
#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub message: String,
    /// Index into the segment stream where the problem was found
    pub position: usize,
    /// Offending source text
    pub fragment: String,
}

impl LexError {
    fn new(message: impl Into<String>, position: usize, fragment: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            position,
            fragment: fragment.into(),
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lex error at segment {} ('{}'): {}",
            self.position, self.fragment, self.message
        )
    }
}

impl std::error::Error for LexError {}

/// Partially lexed input. Only `Raw` segments are re-split by later passes.
#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Raw(String),
    Token(Token),
}

/// Symbolic operators in extraction order; longer forms come first
const SYMBOL_OPERATORS: [&str; 12] = [
    ">=", "<=", "==", "!=", "&&", "||", "*", "/", "%", ">", "<", "!",
];

/// Expression lexer
pub struct Lexer;

impl Lexer {
    /// Tokenize an expression body (the text between `${` and `}`)
    pub fn process(input: &str) -> Result<Vec<Token>, LexError> {
        let segments = extract_strings(input)?;
        let segments = split_whitespace(segments);
        let segments = extract_keyed(segments);
        let segments = disambiguate_floats(segments)?;
        let segments = extract_word_operators(segments);
        let segments = split_dots(segments);
        let segments = classify_operators(segments);
        let tokens = evaluate_literals(segments)?;
        validate(&tokens)?;

        trace!(input, tokens = tokens.len(), "lexed expression");
        Ok(tokens)
    }
}

// =============================================================================
// Pass 1: string literals
// =============================================================================

fn extract_strings(input: &str) -> Result<Vec<Segment>, LexError> {
    let chars: Vec<char> = input.chars().collect();
    let mut segments = Vec::new();
    let mut raw = String::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        if ch != '\'' && ch != '"' {
            raw.push(ch);
            i += 1;
            continue;
        }

        let Some(end) = find_string_end(&chars, i + 1, ch) else {
            let rest: String = chars[i..].iter().collect();
            return Err(LexError::new(
                "unterminated string literal",
                segments.len(),
                rest,
            ));
        };

        if !raw.is_empty() {
            segments.push(Segment::Raw(std::mem::take(&mut raw)));
        }
        let body: String = chars[i + 1..end].iter().collect();
        segments.push(Segment::Token(Token::String(unescape_string_literal(&body))));
        i = end + 1;
    }

    if !raw.is_empty() {
        segments.push(Segment::Raw(raw));
    }
    Ok(segments)
}

/// Index of the closing quote. A quote preceded by an odd number of
/// backslashes is escaped.
fn find_string_end(chars: &[char], start: usize, quote: char) -> Option<usize> {
    let mut i = start;
    while i < chars.len() {
        if chars[i] == quote {
            let backslashes = chars[start..i]
                .iter()
                .rev()
                .take_while(|&&c| c == '\\')
                .count();
            if backslashes % 2 == 0 {
                return Some(i);
            }
        }
        i += 1;
    }
    None
}

// =============================================================================
// Pass 2: whitespace
// =============================================================================

fn split_whitespace(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Raw(text) => {
                out.extend(text.split_whitespace().map(|s| Segment::Raw(s.to_string())));
            }
            token => out.push(token),
        }
    }
    out
}

// =============================================================================
// Pass 3: keyed patterns
// =============================================================================

fn extract_keyed(segments: Vec<Segment>) -> Vec<Segment> {
    let mut segments = segments;

    for function in Function::ALL {
        segments = extract_pattern(segments, function.name(), || Token::Function(function));
    }
    segments = extract_pattern(segments, "?", || Token::Ternary(Ternary::Question));
    segments = extract_pattern(segments, ":", || Token::Ternary(Ternary::Colon));
    segments = extract_pattern(segments, "(", || Token::Paren(Paren::Open));
    segments = extract_pattern(segments, ")", || Token::Paren(Paren::Close));
    segments = extract_pattern(segments, "[", || Token::Paren(Paren::OpenBracket));
    segments = extract_pattern(segments, "]", || Token::Paren(Paren::CloseBracket));
    segments = extract_pattern(segments, ",", || Token::Comma);

    for symbol in SYMBOL_OPERATORS {
        if let Some(op) = Operator::from_symbol(symbol) {
            segments = extract_pattern(segments, symbol, || Token::RawOperator(op));
        }
    }
    segments
}

/// Pull every occurrence of `pattern` out of the raw segments
fn extract_pattern(
    segments: Vec<Segment>,
    pattern: &str,
    make: impl Fn() -> Token,
) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        let Segment::Raw(text) = segment else {
            out.push(segment);
            continue;
        };

        let mut rest = text.as_str();
        while let Some(pos) = rest.find(pattern) {
            if pos > 0 {
                out.push(Segment::Raw(rest[..pos].to_string()));
            }
            out.push(Segment::Token(make()));
            rest = &rest[pos + pattern.len()..];
        }
        if !rest.is_empty() {
            out.push(Segment::Raw(rest.to_string()));
        }
    }
    out
}

// =============================================================================
// Pass 4: floating point disambiguation
// =============================================================================

/// Provisional pieces of one raw segment
#[derive(Debug)]
enum Piece {
    Text(String),
    Tag(String),
}

fn disambiguate_floats(segments: Vec<Segment>) -> Result<Vec<Segment>, LexError> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Raw(text) => {
                let position = out.len();
                reassemble(tag_float_pieces(&text), position, &mut out)?;
            }
            token => out.push(token),
        }
    }
    Ok(out)
}

/// Split on `e+`, `e-`, `e`, `+` and `-`
fn tag_float_pieces(text: &str) -> Vec<Piece> {
    let chars: Vec<char> = text.chars().collect();
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        let tag = match ch {
            'e' | 'E' => match chars.get(i + 1) {
                Some(&sign @ ('+' | '-')) => Some(format!("{}{}", ch, sign)),
                _ => Some(ch.to_string()),
            },
            '+' | '-' => Some(ch.to_string()),
            _ => None,
        };

        match tag {
            Some(tag) => {
                pieces.push(Piece::Text(std::mem::take(&mut current)));
                i += tag.chars().count();
                pieces.push(Piece::Tag(tag));
            }
            None => {
                current.push(ch);
                i += 1;
            }
        }
    }
    pieces.push(Piece::Text(current));
    pieces
}

/// Fuse `digits[.digits] e[+-] digits` into a float; everything else is
/// glued back into raw text or becomes a `+`/`-` operator.
fn reassemble(pieces: Vec<Piece>, position: usize, out: &mut Vec<Segment>) -> Result<(), LexError> {
    let mut pending = String::new();
    let mut iter = pieces.into_iter().peekable();

    while let Some(piece) = iter.next() {
        let tag = match piece {
            Piece::Text(text) => {
                pending.push_str(&text);
                continue;
            }
            Piece::Tag(tag) => tag,
        };

        if tag == "+" || tag == "-" {
            flush(&mut pending, out);
            out.push(Segment::Token(Token::RawOperator(sign_operator(&tag))));
            continue;
        }

        let right = match iter.peek() {
            Some(Piece::Text(text)) => text.clone(),
            _ => String::new(),
        };

        if is_decimal(&pending) {
            if right.is_empty() || !right.chars().all(|c| c.is_ascii_digit()) {
                return Err(LexError::new(
                    "malformed exponent in numeric literal",
                    out.len(),
                    format!("{}{}{}", pending, tag, right),
                ));
            }
            let literal = format!("{}{}{}", pending, tag, right);
            let value = literal.parse::<f64>().map_err(|_| {
                LexError::new("malformed floating point literal", position, literal.clone())
            })?;
            out.push(Segment::Token(Token::Float(value)));
            pending.clear();
            iter.next();
            continue;
        }

        // Not an exponent: `e` stays part of the surrounding text and a
        // trailing sign becomes an operator.
        let mut chars = tag.chars();
        if let Some(e) = chars.next() {
            pending.push(e);
        }
        if let Some(sign) = chars.next() {
            flush(&mut pending, out);
            out.push(Segment::Token(Token::RawOperator(sign_operator(&sign.to_string()))));
        }
    }

    flush(&mut pending, out);
    Ok(())
}

fn flush(pending: &mut String, out: &mut Vec<Segment>) {
    if !pending.is_empty() {
        out.push(Segment::Raw(std::mem::take(pending)));
    }
}

fn sign_operator(sign: &str) -> Operator {
    if sign == "+" {
        Operator::Add
    } else {
        Operator::Sub
    }
}

/// Digits and dots only, with at least one digit
fn is_decimal(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit()) && text.chars().all(|c| c.is_ascii_digit() || c == '.')
}

// =============================================================================
// Passes 5-7: word operators, dots, operator arity
// =============================================================================

fn extract_word_operators(segments: Vec<Segment>) -> Vec<Segment> {
    segments
        .into_iter()
        .map(|segment| match segment {
            Segment::Raw(text) => match Operator::from_word(&text) {
                Some(op) => Segment::Token(Token::RawOperator(op)),
                None => Segment::Raw(text),
            },
            token => token,
        })
        .collect()
}

fn split_dots(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());
    for segment in segments {
        match segment {
            Segment::Raw(text) if text.contains('.') && !is_number_literal(&text) => {
                for (i, part) in text.split('.').enumerate() {
                    if i > 0 {
                        out.push(Segment::Token(Token::Dot));
                    }
                    if !part.is_empty() {
                        out.push(Segment::Raw(part.to_string()));
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// `-` is unary when nothing that can end an operand precedes it
fn classify_operators(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        let Segment::Token(Token::RawOperator(op)) = segment else {
            out.push(segment);
            continue;
        };

        let unary = match op {
            Operator::Not | Operator::Empty => true,
            Operator::Sub => match out.last() {
                None => true,
                Some(Segment::Raw(_)) => false,
                Some(Segment::Token(prev)) => {
                    prev.is_operator()
                        || matches!(
                            prev,
                            Token::Ternary(_)
                                | Token::Comma
                                | Token::Paren(Paren::Open | Paren::OpenBracket)
                        )
                }
            },
            _ => false,
        };

        out.push(Segment::Token(if unary {
            Token::UnaryOp(op)
        } else {
            Token::BinaryOp(op)
        }));
    }
    out
}

// =============================================================================
// Pass 8: literals
// =============================================================================

fn evaluate_literals(segments: Vec<Segment>) -> Result<Vec<Token>, LexError> {
    segments
        .into_iter()
        .enumerate()
        .map(|(position, segment)| match segment {
            Segment::Token(token) => Ok(token),
            Segment::Raw(text) => literal(&text)
                .ok_or_else(|| LexError::new("mal-formed segment", position, text)),
        })
        .collect()
}

fn literal(text: &str) -> Option<Token> {
    if text.eq_ignore_ascii_case("true") {
        return Some(Token::Bool(true));
    }
    if text.eq_ignore_ascii_case("false") {
        return Some(Token::Bool(false));
    }
    if text == "null" {
        return Some(Token::Null);
    }
    if is_number_literal(text) {
        if !text.contains('.') {
            if let Ok(n) = text.parse::<i64>() {
                return Some(Token::Int(n));
            }
        }
        return text.parse::<f64>().ok().map(Token::Float);
    }
    if is_identifier(text) {
        return Some(Token::Identity(text.to_string()));
    }
    None
}

/// `digits` or `[digits].digits`
fn is_number_literal(text: &str) -> bool {
    match text.split_once('.') {
        Some((int, frac)) => {
            !frac.is_empty()
                && int.chars().all(|c| c.is_ascii_digit())
                && frac.chars().all(|c| c.is_ascii_digit())
        }
        None => !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

// =============================================================================
// Pass 9: validation
// =============================================================================

/// Tokens after which an operand has just ended
fn ends_operand(token: Option<&Token>) -> bool {
    matches!(
        token,
        Some(t) if t.is_operand() || matches!(t, Token::Paren(Paren::Close | Paren::CloseBracket))
    )
}

/// Tokens that can begin an operand
fn starts_operand(token: Option<&Token>) -> bool {
    matches!(
        token,
        Some(t) if t.is_operand()
            || matches!(t, Token::UnaryOp(_) | Token::Function(_) | Token::Paren(Paren::Open))
    )
}

fn validate(tokens: &[Token]) -> Result<(), LexError> {
    let mut stack: Vec<(usize, &Token)> = Vec::new();
    let err = |message: &str, position: usize| {
        LexError::new(message, position, tokens[position].to_string())
    };

    for (i, token) in tokens.iter().enumerate() {
        let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
        let next = tokens.get(i + 1);

        match token {
            Token::Paren(Paren::Open) | Token::Paren(Paren::OpenBracket)
            | Token::Ternary(Ternary::Question) => {
                if matches!(token, Token::Paren(Paren::OpenBracket)) && !ends_operand(prev) {
                    return Err(err("'[' must follow an operand", i));
                }
                stack.push((i, token));
            }
            Token::Paren(Paren::Close) => match stack.pop() {
                Some((_, Token::Paren(Paren::Open))) => {}
                _ => return Err(err("unbalanced ')'", i)),
            },
            Token::Paren(Paren::CloseBracket) => match stack.pop() {
                Some((_, Token::Paren(Paren::OpenBracket))) => {}
                _ => return Err(err("unbalanced ']'", i)),
            },
            Token::Ternary(Ternary::Colon) => match stack.pop() {
                Some((_, Token::Ternary(Ternary::Question))) => {}
                _ => return Err(err("':' without matching '?'", i)),
            },
            Token::UnaryOp(_) => {
                if ends_operand(prev) {
                    return Err(err("unary operator cannot follow an operand", i));
                }
                if !starts_operand(next) {
                    return Err(err("unary operator is missing its operand", i));
                }
            }
            Token::BinaryOp(_) => {
                if !ends_operand(prev) {
                    return Err(err("binary operator is missing its left operand", i));
                }
                if !starts_operand(next) {
                    return Err(err("binary operator is missing its right operand", i));
                }
            }
            Token::Dot => {
                if !ends_operand(prev) {
                    return Err(err("'.' must follow an operand", i));
                }
                if !matches!(next, Some(Token::Identity(_))) {
                    return Err(err("'.' must be followed by an identifier", i));
                }
            }
            Token::Function(_) => {
                if !matches!(next, Some(Token::Paren(Paren::Open))) {
                    return Err(err("function name must be followed by '('", i));
                }
            }
            _ => {}
        }
    }

    if let Some((position, _)) = stack.pop() {
        return Err(err("unclosed scope", position));
    }
    Ok(())
}

// =============================================================================
// Marker extraction
// =============================================================================

/// Piece of text split at `${...}` markers
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    Expression(String),
}

/// Split text into literal runs and `${...}` expression bodies. Quotes and
/// nested braces inside a marker are honoured; a marker whose quote never
/// closes ends at its first brace so the lexer can report it. A marker with
/// no closing brace at all is kept as text.
pub fn extract_expressions(input: &str) -> Vec<Fragment> {
    let chars: Vec<char> = input.chars().collect();
    let len = chars.len();
    let mut results = Vec::new();
    let mut text = String::new();
    let mut current_pos = 0;

    while current_pos < len {
        if chars[current_pos] == '$' && current_pos + 1 < len && chars[current_pos + 1] == '{' {
            let end = find_closing_brace(&chars, current_pos + 2, true)
                .or_else(|| find_closing_brace(&chars, current_pos + 2, false));
            if let Some(end) = end {
                if !text.is_empty() {
                    results.push(Fragment::Text(std::mem::take(&mut text)));
                }
                let expr: String = chars[current_pos + 2..end].iter().collect();
                results.push(Fragment::Expression(expr.trim().to_string()));
                current_pos = end + 1;
                continue;
            }
        }
        text.push(chars[current_pos]);
        current_pos += 1;
    }

    if !text.is_empty() {
        results.push(Fragment::Text(text));
    }
    results
}

/// Whether text holds at least one complete marker
pub fn contains_expression(input: &str) -> bool {
    input.contains("${")
        && extract_expressions(input)
            .iter()
            .any(|f| matches!(f, Fragment::Expression(_)))
}

fn find_closing_brace(chars: &[char], start: usize, honour_quotes: bool) -> Option<usize> {
    let mut depth = 1;
    let mut quote: Option<char> = None;
    let mut i = start;

    while i < chars.len() {
        let ch = chars[i];
        match quote {
            Some(q) => {
                if ch == '\\' {
                    i += 1;
                } else if ch == q {
                    quote = None;
                }
            }
            None => match ch {
                '\'' | '"' if honour_quotes => quote = Some(ch),
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ident(name: &str) -> Token {
        Token::Identity(name.to_string())
    }

    #[test]
    fn test_lex_arithmetic() {
        let tokens = Lexer::process("2 + 3 * 4").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Int(2),
                Token::BinaryOp(Operator::Add),
                Token::Int(3),
                Token::BinaryOp(Operator::Mul),
                Token::Int(4),
            ]
        );
    }

    #[test]
    fn test_lex_strings_with_escapes() {
        let tokens = Lexer::process(r#"'it\'s' == "say \"hi\"""#).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::String("it's".to_string()),
                Token::BinaryOp(Operator::Eq),
                Token::String(r#"say "hi""#.to_string()),
            ]
        );
    }

    #[test]
    fn test_lex_string_keeps_operators_verbatim() {
        let tokens = Lexer::process("'a ? b : (c)'").unwrap();
        assert_eq!(tokens, vec![Token::String("a ? b : (c)".to_string())]);
    }

    #[test]
    fn test_lex_unterminated_string() {
        let err = Lexer::process("'abc").unwrap_err();
        assert!(err.message.contains("unterminated"));
        assert_eq!(err.fragment, "'abc");
    }

    #[test]
    fn test_lex_even_backslashes_close_string() {
        let tokens = Lexer::process(r"'a\\'").unwrap();
        assert_eq!(tokens, vec![Token::String(r"a\".to_string())]);
    }

    #[test]
    fn test_lex_unbalanced_parens() {
        let err = Lexer::process("(1+2").unwrap_err();
        assert!(err.message.contains("unclosed"));
        assert!(Lexer::process("1+2)").is_err());
        assert!(Lexer::process("a[1)").is_err());
    }

    #[test]
    fn test_lex_leading_dot_is_error() {
        let err = Lexer::process(".Foo").unwrap_err();
        assert!(err.message.contains("'.'"));
        assert!(Lexer::process("Foo.").is_err());
    }

    #[test]
    fn test_lex_dotted_path() {
        let tokens = Lexer::process("Top.viewer.name").unwrap();
        assert_eq!(
            tokens,
            vec![
                ident("Top"),
                Token::Dot,
                ident("viewer"),
                Token::Dot,
                ident("name"),
            ]
        );
    }

    #[test]
    fn test_lex_float_forms() {
        assert_eq!(Lexer::process("1.5").unwrap(), vec![Token::Float(1.5)]);
        assert_eq!(Lexer::process("1e3").unwrap(), vec![Token::Float(1000.0)]);
        assert_eq!(Lexer::process("2.5e-1").unwrap(), vec![Token::Float(0.25)]);
        assert_eq!(Lexer::process("1.5E+2").unwrap(), vec![Token::Float(150.0)]);
    }

    #[test]
    fn test_lex_e_inside_identifiers_is_not_split() {
        let tokens = Lexer::process("level - index").unwrap();
        assert_eq!(
            tokens,
            vec![ident("level"), Token::BinaryOp(Operator::Sub), ident("index")]
        );
    }

    #[test]
    fn test_lex_e_sign_glues_to_identifier() {
        let tokens = Lexer::process("value+1").unwrap();
        assert_eq!(
            tokens,
            vec![ident("value"), Token::BinaryOp(Operator::Add), Token::Int(1)]
        );
    }

    #[test]
    fn test_lex_malformed_exponent() {
        let err = Lexer::process("1.5e+").unwrap_err();
        assert!(err.message.contains("exponent"));
        assert!(Lexer::process("2ex").is_err());
    }

    #[test]
    fn test_lex_word_operators() {
        let tokens = Lexer::process("a gt 1 and not b").unwrap();
        assert_eq!(
            tokens,
            vec![
                ident("a"),
                Token::BinaryOp(Operator::Gt),
                Token::Int(1),
                Token::BinaryOp(Operator::And),
                Token::UnaryOp(Operator::Not),
                ident("b"),
            ]
        );
    }

    #[test]
    fn test_lex_unary_minus_positions() {
        let tokens = Lexer::process("-1 - -2").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::UnaryOp(Operator::Sub),
                Token::Int(1),
                Token::BinaryOp(Operator::Sub),
                Token::UnaryOp(Operator::Sub),
                Token::Int(2),
            ]
        );

        let tokens = Lexer::process("(-x)").unwrap();
        assert_eq!(tokens[1], Token::UnaryOp(Operator::Sub));
    }

    #[test]
    fn test_lex_misplaced_operators() {
        assert!(Lexer::process("1 +").is_err());
        assert!(Lexer::process("* 2").is_err());
        assert!(Lexer::process("a !b").is_err());
    }

    #[test]
    fn test_lex_function_and_ternary() {
        let tokens = Lexer::process("osx:urlEncode(a) ? 1 : 2").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Function(Function::UrlEncode),
                Token::Paren(Paren::Open),
                ident("a"),
                Token::Paren(Paren::Close),
                Token::Ternary(Ternary::Question),
                Token::Int(1),
                Token::Ternary(Ternary::Colon),
                Token::Int(2),
            ]
        );
        assert!(Lexer::process("osx:urlEncode").is_err());
    }

    #[test]
    fn test_lex_literals() {
        assert_eq!(
            Lexer::process("TRUE != null").unwrap(),
            vec![Token::Bool(true), Token::BinaryOp(Operator::Ne), Token::Null]
        );
        let err = Lexer::process("a = b").unwrap_err();
        assert_eq!(err.message, "mal-formed segment");
        assert_eq!(err.fragment, "=");
    }

    #[test]
    fn test_lex_round_trip_through_display() {
        let source = "Top.items[0] >= 2.5 && !empty name ? 'x' : \"y\"";
        let tokens = Lexer::process(source).unwrap();
        let rebuilt: Vec<String> = tokens.iter().map(ToString::to_string).collect();
        let relexed = Lexer::process(&rebuilt.join(" ")).unwrap();
        assert_eq!(tokens, relexed);
    }

    #[test]
    fn test_extract_expressions() {
        assert_eq!(
            extract_expressions("Hello ${Top.name}!"),
            vec![
                Fragment::Text("Hello ".to_string()),
                Fragment::Expression("Top.name".to_string()),
                Fragment::Text("!".to_string()),
            ]
        );
    }

    #[test]
    fn test_extract_expressions_quoted_brace() {
        assert_eq!(
            extract_expressions("${a == '}' ? 1 : 2}"),
            vec![Fragment::Expression("a == '}' ? 1 : 2".to_string())]
        );
    }

    #[test]
    fn test_extract_expressions_unterminated_is_text() {
        assert_eq!(
            extract_expressions("cost: ${5"),
            vec![Fragment::Text("cost: ${5".to_string())]
        );
        assert!(!contains_expression("cost: ${5"));
        assert!(contains_expression("${x}"));
    }

    #[test]
    fn test_extract_expressions_unterminated_quote() {
        assert_eq!(
            extract_expressions("${'abc}"),
            vec![Fragment::Expression("'abc".to_string())]
        );
    }
}
