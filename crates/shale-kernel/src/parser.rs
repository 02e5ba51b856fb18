//! Parser for shale source code.
//!
//! Transforms a token stream from the lexer into a syntax tree. The
//! expression grammar is a strict precedence chain, one function per
//! level:
//!
//! ```text
//! or → and → equality → relational → additive → multiplicative
//!    → unary → primary
//! ```
//!
//! Syntax errors abort the whole input unit — nothing of a malformed
//! program is evaluated.

use thiserror::Error;

use crate::ast::{
    Assign, BinaryOp, Expr, ForStmt, FunctionDef, IfStmt, Literal, NamespaceDef, ParamDef,
    Program, ReturnStmt, Span, Stmt, Target, Term, TypeSpec, UnaryOp, UsingDecl,
};
use crate::lexer::{self, LineMap, Spanned, Token};

/// A syntax error with the offending source span.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("syntax error: {message} ({span})")]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

/// Parse a complete program.
pub fn parse(src: &str) -> Result<Program, SyntaxError> {
    let mut parser = Parser::new(src)?;
    let program = parser.parse_program()?;
    Ok(program)
}

/// Parse a single expression, e.g. the content of a `${...}`
/// interpolation span. Trailing input is an error.
pub fn parse_expression(src: &str) -> Result<Expr, SyntaxError> {
    let mut parser = Parser::new(src)?;
    let expr = parser.parse_expr()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    lines: LineMap,
}

impl Parser {
    fn new(src: &str) -> Result<Self, SyntaxError> {
        let lines = LineMap::new(src);
        let tokens = lexer::tokenize(src).map_err(|range| SyntaxError {
            message: "unrecognized input".into(),
            span: lines.span(&range),
        })?;
        Ok(Self { tokens, pos: 0, lines })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned<Token>> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<Span, SyntaxError> {
        if self.check(token) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(self.err(format!("expected {what}")))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), SyntaxError> {
        match self.peek() {
            Some(Token::Ident(_)) => {
                let spanned = self.advance().expect("peeked token exists");
                let Token::Ident(name) = spanned.token else { unreachable!() };
                Ok((name, self.lines.span(&spanned.span)))
            }
            _ => Err(self.err(format!("expected {what}"))),
        }
    }

    /// Span of the token at the cursor, or of the last token at EOF.
    fn current_span(&self) -> Span {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(s) => self.lines.span(&s.span),
            None => Span::new(1, 1, 1, 1),
        }
    }

    /// Span of the most recently consumed token.
    fn prev_span(&self) -> Span {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(s) => self.lines.span(&s.span),
            None => Span::new(1, 1, 1, 1),
        }
    }

    fn err(&self, message: impl Into<String>) -> SyntaxError {
        let message = match self.peek() {
            Some(t) => format!("{}, found `{t}`", message.into()),
            None => format!("{}, found end of input", message.into()),
        };
        SyntaxError { message, span: self.current_span() }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expect_end(&mut self) -> Result<(), SyntaxError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.err("expected end of input"))
        }
    }

    // ───── statements ─────

    fn parse_program(&mut self) -> Result<Program, SyntaxError> {
        let mut statements = Vec::new();
        while !self.at_end() {
            if self.eat(&Token::Semi) {
                continue;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    fn parse_statement(&mut self) -> Result<Stmt, SyntaxError> {
        let stmt = match self.peek() {
            Some(Token::Function) => Stmt::FunctionDef(self.parse_function_def()?),
            Some(Token::Namespace) => Stmt::NamespaceDef(self.parse_namespace_def()?),
            Some(Token::Using) => Stmt::Using(self.parse_using()?),
            Some(Token::If) => Stmt::If(self.parse_if()?),
            Some(Token::For) => Stmt::For(self.parse_for()?),
            Some(Token::Return) => Stmt::Return(self.parse_return()?),
            _ if self.looks_like_assignment() => Stmt::Assign(self.parse_assignment()?),
            _ => Stmt::Expr(self.parse_expr()?),
        };
        self.eat(&Token::Semi);
        Ok(stmt)
    }

    /// Lookahead: `NAME {.NAME} {[...]} =` without consuming anything.
    fn looks_like_assignment(&self) -> bool {
        let mut i = self.pos;
        match self.tokens.get(i).map(|s| &s.token) {
            Some(Token::Ident(_)) => i += 1,
            _ => return false,
        }
        loop {
            match self.tokens.get(i).map(|s| &s.token) {
                Some(Token::Dot) => match self.tokens.get(i + 1).map(|s| &s.token) {
                    Some(Token::Ident(_)) => i += 2,
                    _ => return false,
                },
                Some(Token::LBracket) => {
                    let mut depth = 1usize;
                    i += 1;
                    while depth > 0 {
                        match self.tokens.get(i).map(|s| &s.token) {
                            Some(Token::LBracket) => depth += 1,
                            Some(Token::RBracket) => depth -= 1,
                            None => return false,
                            _ => {}
                        }
                        i += 1;
                    }
                }
                Some(Token::Assign) => return true,
                _ => return false,
            }
        }
    }

    fn parse_assignment(&mut self) -> Result<Assign, SyntaxError> {
        let (first, start) = self.expect_ident("a name")?;
        let mut path = vec![first];
        while self.check(&Token::Dot) {
            self.pos += 1;
            let (segment, _) = self.expect_ident("a name after `.`")?;
            path.push(segment);
        }
        let mut indices = Vec::new();
        while self.eat(&Token::LBracket) {
            indices.push(self.parse_expr()?);
            self.expect(&Token::RBracket, "`]`")?;
        }
        let target_span = start.merge(self.prev_span());
        self.expect(&Token::Assign, "`=`")?;
        let value = self.parse_expr()?;
        let span = start.merge(value.span());
        Ok(Assign { target: Target { path, indices, span: target_span }, value, span })
    }

    fn parse_function_def(&mut self) -> Result<FunctionDef, SyntaxError> {
        let start = self.expect(&Token::Function, "`function`")?;
        let (name, _) = self.expect_ident("a function name")?;
        self.expect(&Token::LParen, "`(`")?;
        let mut params = Vec::new();
        if !self.check(&Token::RParen) {
            loop {
                params.push(self.parse_param()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RParen, "`)`")?;
        let (body, close) = self.parse_block()?;
        Ok(FunctionDef { name, params, body, span: start.merge(close) })
    }

    fn parse_param(&mut self) -> Result<ParamDef, SyntaxError> {
        let (first, first_span) = self.expect_ident("a parameter name")?;
        if let Some(Token::Ident(_)) = self.peek() {
            // Two identifiers: `number n` — the first is a specifier.
            let spec = TypeSpec::parse(&first).ok_or_else(|| SyntaxError {
                message: format!("unknown type specifier `{first}`"),
                span: first_span,
            })?;
            let (name, _) = self.expect_ident("a parameter name")?;
            Ok(ParamDef { name, spec })
        } else {
            Ok(ParamDef { name: first, spec: TypeSpec::Any })
        }
    }

    fn parse_namespace_def(&mut self) -> Result<NamespaceDef, SyntaxError> {
        let start = self.expect(&Token::Namespace, "`namespace`")?;
        let (name, _) = self.expect_ident("a namespace name")?;
        self.expect(&Token::LBrace, "`{`")?;
        let mut body = Vec::new();
        loop {
            if self.eat(&Token::Semi) {
                continue;
            }
            if self.check(&Token::RBrace) {
                break;
            }
            let stmt = match self.peek() {
                Some(Token::Function) => Stmt::FunctionDef(self.parse_function_def()?),
                Some(Token::Namespace) => Stmt::NamespaceDef(self.parse_namespace_def()?),
                Some(Token::Using) => Stmt::Using(self.parse_using()?),
                _ if self.looks_like_assignment() => {
                    let assign = self.parse_assignment()?;
                    if assign.target.path.len() != 1 || !assign.target.indices.is_empty() {
                        return Err(SyntaxError {
                            message: "namespace members are assigned by simple name".into(),
                            span: assign.target.span,
                        });
                    }
                    Stmt::Assign(assign)
                }
                _ => return Err(self.err("expected a declaration inside namespace")),
            };
            self.eat(&Token::Semi);
            body.push(stmt);
        }
        let close = self.expect(&Token::RBrace, "`}`")?;
        Ok(NamespaceDef { name, body, span: start.merge(close) })
    }

    fn parse_using(&mut self) -> Result<UsingDecl, SyntaxError> {
        let start = self.expect(&Token::Using, "`using`")?;
        let path = match self.peek() {
            Some(Token::Str(_)) => {
                let spanned = self.advance().expect("peeked token exists");
                let Token::Str(path) = spanned.token else { unreachable!() };
                path
            }
            _ => return Err(self.err("expected a quoted path after `using`")),
        };
        let alias = if self.eat(&Token::As) {
            let (name, _) = self.expect_ident("a name after `as`")?;
            Some(name)
        } else {
            None
        };
        Ok(UsingDecl { path, alias, span: start.merge(self.prev_span()) })
    }

    fn parse_if(&mut self) -> Result<IfStmt, SyntaxError> {
        let start = self.expect(&Token::If, "`if`")?;
        let mut arms = Vec::new();
        let condition = self.parse_expr()?;
        let (body, mut close) = self.parse_block()?;
        arms.push((condition, body));
        let mut else_branch = None;
        loop {
            if self.eat(&Token::Elif) {
                let condition = self.parse_expr()?;
                let (body, c) = self.parse_block()?;
                close = c;
                arms.push((condition, body));
            } else if self.eat(&Token::Else) {
                let (body, c) = self.parse_block()?;
                close = c;
                else_branch = Some(body);
                break;
            } else {
                break;
            }
        }
        Ok(IfStmt { arms, else_branch, span: start.merge(close) })
    }

    fn parse_for(&mut self) -> Result<ForStmt, SyntaxError> {
        let start = self.expect(&Token::For, "`for`")?;
        let (variable, _) = self.expect_ident("a loop variable")?;
        self.expect(&Token::In, "`in`")?;
        let iterable = self.parse_expr()?;
        let (body, close) = self.parse_block()?;
        Ok(ForStmt { variable, iterable, body, span: start.merge(close) })
    }

    fn parse_return(&mut self) -> Result<ReturnStmt, SyntaxError> {
        let start = self.expect(&Token::Return, "`return`")?;
        let value = match self.peek() {
            Some(t) if starts_expression(t) => Some(self.parse_expr()?),
            _ => None,
        };
        Ok(ReturnStmt { value, span: start.merge(self.prev_span()) })
    }

    /// Parse `{ statements }`, returning the body and the closing
    /// brace's span.
    fn parse_block(&mut self) -> Result<(Vec<Stmt>, Span), SyntaxError> {
        self.expect(&Token::LBrace, "`{`")?;
        let mut statements = Vec::new();
        loop {
            if self.eat(&Token::Semi) {
                continue;
            }
            if self.check(&Token::RBrace) {
                break;
            }
            if self.at_end() {
                return Err(self.err("expected `}`"));
            }
            statements.push(self.parse_statement()?);
        }
        let close = self.expect(&Token::RBrace, "`}`")?;
        Ok((statements, close))
    }

    // ───── expressions, one function per precedence level ─────

    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::OrOr) {
            let rhs = self.parse_and()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { op: BinaryOp::Or, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_equality()?;
        while self.eat(&Token::AndAnd) {
            let rhs = self.parse_equality()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { op: BinaryOp::And, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::BangEq) => BinaryOp::NotEq,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_relational()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::GtEq) => BinaryOp::GtEq,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::LtEq) => BinaryOp::LtEq,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_additive()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_multiplicative()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => break,
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            let span = lhs.span().merge(rhs.span());
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs), span };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek() {
            Some(Token::Bang) => Some(UnaryOp::Not),
            Some(Token::Minus) => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            let start = self.current_span();
            self.pos += 1;
            let operand = self.parse_unary()?;
            let span = start.merge(operand.span());
            return Ok(Expr::Unary { op, operand: Box::new(operand), span });
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek() {
            Some(Token::Number(_)) => {
                let spanned = self.advance().expect("peeked token exists");
                let Token::Number(text) = spanned.token else { unreachable!() };
                let span = self.lines.span(&spanned.span);
                let value = Literal::number(&text)
                    .ok_or_else(|| SyntaxError { message: format!("invalid number literal `{text}`"), span })?;
                Ok(Expr::Literal { value, span })
            }
            Some(Token::Str(_)) => {
                let spanned = self.advance().expect("peeked token exists");
                let Token::Str(text) = spanned.token else { unreachable!() };
                let span = self.lines.span(&spanned.span);
                Ok(Expr::Literal { value: Literal::Str(text), span })
            }
            Some(Token::True) => {
                self.pos += 1;
                Ok(Expr::Literal { value: Literal::Bool(true), span: self.prev_span() })
            }
            Some(Token::False) => {
                self.pos += 1;
                Ok(Expr::Literal { value: Literal::Bool(false), span: self.prev_span() })
            }
            Some(Token::Null) => {
                self.pos += 1;
                Ok(Expr::Literal { value: Literal::Null, span: self.prev_span() })
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen, "`)`")?;
                Ok(expr)
            }
            Some(Token::LBracket) => self.parse_array_literal(),
            Some(Token::LBrace) => self.parse_object_literal(),
            Some(Token::Ident(_)) => self.parse_term(),
            _ => Err(self.err("expected an expression")),
        }
    }

    fn parse_array_literal(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(&Token::LBracket, "`[`")?;
        let mut items = Vec::new();
        if !self.check(&Token::RBracket) {
            loop {
                items.push(self.parse_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(&Token::RBracket, "`]`")?;
        Ok(Expr::Array { items, span: start.merge(close) })
    }

    fn parse_object_literal(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.expect(&Token::LBrace, "`{`")?;
        let mut entries = Vec::new();
        if !self.check(&Token::RBrace) {
            loop {
                let key = match self.peek() {
                    Some(Token::Ident(_)) => {
                        let (name, _) = self.expect_ident("a key")?;
                        name
                    }
                    Some(Token::Str(_)) => {
                        let spanned = self.advance().expect("peeked token exists");
                        let Token::Str(key) = spanned.token else { unreachable!() };
                        key
                    }
                    _ => return Err(self.err("expected an object key")),
                };
                self.expect(&Token::Colon, "`:`")?;
                let value = self.parse_expr()?;
                entries.push((key, value));
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let close = self.expect(&Token::RBrace, "`}`")?;
        Ok(Expr::Object { entries, span: start.merge(close) })
    }

    fn parse_term(&mut self) -> Result<Expr, SyntaxError> {
        let (first, start) = self.expect_ident("a name")?;
        let mut path = vec![first];
        while self.check(&Token::Dot) {
            self.pos += 1;
            let (segment, _) = self.expect_ident("a name after `.`")?;
            path.push(segment);
        }
        let args = if self.eat(&Token::LParen) {
            let mut args = Vec::new();
            if !self.check(&Token::RParen) {
                loop {
                    args.push(self.parse_expr()?);
                    if !self.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            self.expect(&Token::RParen, "`)`")?;
            Some(args)
        } else {
            None
        };
        let mut indices = Vec::new();
        while self.eat(&Token::LBracket) {
            indices.push(self.parse_expr()?);
            self.expect(&Token::RBracket, "`]`")?;
        }
        let span = start.merge(self.prev_span());
        Ok(Expr::Term(Term { path, args, indices, span }))
    }
}

fn starts_expression(token: &Token) -> bool {
    matches!(
        token,
        Token::Number(_)
            | Token::Str(_)
            | Token::Ident(_)
            | Token::True
            | Token::False
            | Token::Null
            | Token::LParen
            | Token::LBracket
            | Token::LBrace
            | Token::Minus
            | Token::Bang
    )
}
