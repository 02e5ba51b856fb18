//! Lexer for shale source code.
//!
//! Converts source text into a stream of spanned tokens using the logos
//! lexer generator. String literals are unescaped here but any `${...}`
//! interpolation spans are left intact — the evaluator re-lexes those at
//! runtime.
//!
//! # Token Categories
//!
//! - **Keywords**: `function`, `namespace`, `using`, `as`, `if`, `elif`,
//!   `else`, `for`, `in`, `return`, `true`, `false`, `null`
//! - **Literals**: numbers (integer or decimal), double-quoted strings
//! - **Operators**: `|| && == != > >= < <= + - * / % ! =`
//! - **Punctuation**: `. , ; : ( ) { } [ ]`
//!
//! `#` starts a comment running to end of line.

use std::fmt;
use std::ops::Range;

use logos::Logos;

use crate::ast::Span;

/// A token paired with its byte span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Range<usize>,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Range<usize>) -> Self {
        Self { token, span }
    }
}

fn unescape_string(lex: &mut logos::Lexer<Token>) -> Option<String> {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                other => {
                    // Unknown escapes pass through verbatim.
                    out.push('\\');
                    out.push(other);
                }
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
#[logos(skip r"#[^\n]*")]
pub enum Token {
    #[token("function")]
    Function,
    #[token("namespace")]
    Namespace,
    #[token("using")]
    Using,
    #[token("as")]
    As,
    #[token("if")]
    If,
    #[token("elif")]
    Elif,
    #[token("else")]
    Else,
    #[token("for")]
    For,
    #[token("in")]
    In,
    #[token("return")]
    Return,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,

    #[regex(r"[0-9]+(\.[0-9]+)?", |lex| lex.slice().to_string())]
    Number(String),
    #[regex(r#""([^"\\]|\\.)*""#, unescape_string)]
    Str(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[token("||")]
    OrOr,
    #[token("&&")]
    AndAnd,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token(">=")]
    GtEq,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token("<")]
    Lt,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("!")]
    Bang,
    #[token("=")]
    Assign,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Function => write!(f, "function"),
            Token::Namespace => write!(f, "namespace"),
            Token::Using => write!(f, "using"),
            Token::As => write!(f, "as"),
            Token::If => write!(f, "if"),
            Token::Elif => write!(f, "elif"),
            Token::Else => write!(f, "else"),
            Token::For => write!(f, "for"),
            Token::In => write!(f, "in"),
            Token::Return => write!(f, "return"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Number(n) => write!(f, "{n}"),
            Token::Str(_) => write!(f, "string literal"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::OrOr => write!(f, "||"),
            Token::AndAnd => write!(f, "&&"),
            Token::EqEq => write!(f, "=="),
            Token::BangEq => write!(f, "!="),
            Token::GtEq => write!(f, ">="),
            Token::LtEq => write!(f, "<="),
            Token::Gt => write!(f, ">"),
            Token::Lt => write!(f, "<"),
            Token::Plus => write!(f, "+"),
            Token::Minus => write!(f, "-"),
            Token::Star => write!(f, "*"),
            Token::Slash => write!(f, "/"),
            Token::Percent => write!(f, "%"),
            Token::Bang => write!(f, "!"),
            Token::Assign => write!(f, "="),
            Token::Dot => write!(f, "."),
            Token::Comma => write!(f, ","),
            Token::Semi => write!(f, ";"),
            Token::Colon => write!(f, ":"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::LBrace => write!(f, "{{"),
            Token::RBrace => write!(f, "}}"),
            Token::LBracket => write!(f, "["),
            Token::RBracket => write!(f, "]"),
        }
    }
}

/// Tokenize a source string. Returns the token stream or the byte span
/// of the first unlexable input.
pub fn tokenize(src: &str) -> Result<Vec<Spanned<Token>>, Range<usize>> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(src).spanned() {
        match result {
            Ok(token) => tokens.push(Spanned::new(token, span)),
            Err(()) => return Err(span),
        }
    }
    Ok(tokens)
}

/// Maps byte offsets to 1-based line:column positions.
pub struct LineMap {
    line_starts: Vec<usize>,
}

impl LineMap {
    pub fn new(src: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in src.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// 1-based (line, column) of a byte offset.
    pub fn position(&self, offset: usize) -> (u32, u32) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let col = offset - self.line_starts[line] + 1;
        (line as u32 + 1, col as u32)
    }

    /// Convert a byte range into a line:column [`Span`]. The end column
    /// is that of the last byte, so a one-character token at column 5
    /// spans columns 5:5.
    pub fn span(&self, range: &Range<usize>) -> Span {
        let (start_line, start_col) = self.position(range.start);
        let (end_line, end_col) = self.position(range.end.saturating_sub(1).max(range.start));
        Span::new(start_line, start_col, end_line, end_col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<Token> {
        tokenize(src).unwrap().into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn tokenize_keywords_and_idents() {
        assert_eq!(
            kinds("if ifx function"),
            vec![Token::If, Token::Ident("ifx".into()), Token::Function]
        );
    }

    #[test]
    fn tokenize_numbers() {
        assert_eq!(
            kinds("3 3.5"),
            vec![Token::Number("3".into()), Token::Number("3.5".into())]
        );
    }

    #[test]
    fn tokenize_string_with_escapes() {
        assert_eq!(kinds(r#""a\n\"b\"""#), vec![Token::Str("a\n\"b\"".into())]);
    }

    #[test]
    fn string_keeps_interpolation_span_raw() {
        assert_eq!(kinds(r#""a${1+1}b""#), vec![Token::Str("a${1+1}b".into())]);
    }

    #[test]
    fn tokenize_operators() {
        assert_eq!(
            kinds("|| && == != >= <= > <"),
            vec![
                Token::OrOr,
                Token::AndAnd,
                Token::EqEq,
                Token::BangEq,
                Token::GtEq,
                Token::LtEq,
                Token::Gt,
                Token::Lt,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("1 # the rest is ignored\n2"),
            vec![Token::Number("1".into()), Token::Number("2".into())]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(tokenize(r#""abc"#).is_err());
    }

    #[test]
    fn line_map_positions() {
        let map = LineMap::new("ab\ncd\nef");
        assert_eq!(map.position(0), (1, 1));
        assert_eq!(map.position(1), (1, 2));
        assert_eq!(map.position(3), (2, 1));
        assert_eq!(map.position(7), (3, 2));
    }

    #[test]
    fn line_map_span() {
        let map = LineMap::new("x = 12\ny");
        // `12` occupies bytes 4..6 on line 1.
        assert_eq!(map.span(&(4..6)).to_string(), "line 1, columns 5:6");
    }
}
