//! # Parser / 语法分析器
//!
//! Recursive-descent parser producing the statement list of one source file or
//! test body. Parse failures are load-time errors and carry their own line.
//!
//! 递归下降解析器，为单个源文件或测试体生成语句列表。
//! 解析失败属于加载期错误，并带有各自的行号。

use std::mem::discriminant;
use std::rc::Rc;

use crate::script::ast::{BinaryOp, Expr, ExprKind, FunctionDef, Stmt, StmtKind, UnaryOp};
use crate::script::error::ErrorKind;
use crate::script::lexer::{tokenize, SyntaxError, Token, TokenKind};
use crate::script::stack::ensure_sufficient_stack;

/// Deepest nesting of blocks, parentheses and prefix operators a body may use.
pub const MAX_NESTING_DEPTH: usize = 1000;

/// Parses a complete program.
pub fn parse(src: &str) -> Result<Vec<Stmt>, SyntaxError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        src,
        tokens,
        pos: 0,
        depth: 0,
    };
    let body = parser.block(&[])?;
    parser.expect(TokenKind::Eof, "end of input")?;
    Ok(body)
}

struct Parser<'a> {
    src: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        discriminant(&self.peek().kind) == discriminant(kind)
    }

    fn at_any(&self, kinds: &[TokenKind]) -> bool {
        kinds.iter().any(|k| self.at(k))
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn error_at(&self, token: &Token, message: String) -> SyntaxError {
        SyntaxError {
            kind: ErrorKind::Syntax(message),
            line: token.line,
        }
    }

    fn unexpected(&self, what: &str) -> SyntaxError {
        let token = self.peek();
        let found = match &token.kind {
            TokenKind::Eof => "end of input".to_string(),
            TokenKind::Newline => "newline".to_string(),
            _ => format!("\"{}\"", &self.src[token.start..token.end]),
        };
        self.error_at(token, format!("expected {what}, found {found}"))
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<Token, SyntaxError> {
        if self.at(&kind) {
            Ok(self.bump())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn ident(&mut self, what: &str) -> Result<String, SyntaxError> {
        match &self.peek().kind {
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.bump();
                Ok(name)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// Runs one level of recursive descent, failing once nesting exceeds
    /// [`MAX_NESTING_DEPTH`].
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, SyntaxError>,
    ) -> Result<T, SyntaxError> {
        if self.depth >= MAX_NESTING_DEPTH {
            let token = self.peek().clone();
            return Err(self.error_at(
                &token,
                format!("expression nested more than {MAX_NESTING_DEPTH} levels deep"),
            ));
        }
        self.depth += 1;
        let result = ensure_sufficient_stack(|| f(&mut *self));
        self.depth -= 1;
        result
    }

    fn skip_newlines(&mut self) {
        while self.eat(&TokenKind::Newline) {}
    }

    /// Parses statements until one of `terminators` (or end of input) is next.
    /// The terminator itself is left for the caller.
    fn block(&mut self, terminators: &[TokenKind]) -> Result<Vec<Stmt>, SyntaxError> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.at(&TokenKind::Eof) || self.at_any(terminators) {
                return Ok(body);
            }
            body.push(self.nested(Self::statement)?);
            if !(self.at(&TokenKind::Newline) || self.at(&TokenKind::Eof) || self.at_any(terminators)) {
                let token = self.peek().clone();
                return Err(self.error_at(
                    &token,
                    format!(
                        "extra token \"{}\" after end of expression",
                        &self.src[token.start..token.end]
                    ),
                ));
            }
        }
    }

    /// Parses a block that must be closed by `end`; `opener` names the construct for errors.
    fn closed_block(&mut self, opener: &Token, name: &str) -> Result<Vec<Stmt>, SyntaxError> {
        let body = self.block(&[TokenKind::End])?;
        if !self.eat(&TokenKind::End) {
            return Err(self.error_at(
                opener,
                format!("incomplete: \"{name}\" at line {} requires end", opener.line),
            ));
        }
        Ok(body)
    }

    fn statement(&mut self) -> Result<Stmt, SyntaxError> {
        let token = self.peek().clone();
        let line = token.line;
        let kind = match &token.kind {
            TokenKind::Function => StmtKind::Function(Rc::new(self.function_def()?)),
            TokenKind::Return => {
                self.bump();
                if self.at_any(&[TokenKind::Newline, TokenKind::Eof, TokenKind::End, TokenKind::Else, TokenKind::Elseif]) {
                    StmtKind::Return(None)
                } else {
                    StmtKind::Return(Some(self.expr()?))
                }
            }
            TokenKind::If => self.if_stmt()?,
            TokenKind::While => {
                let opener = self.bump();
                let cond = self.expr()?;
                let body = self.closed_block(&opener, "while")?;
                StmtKind::While { cond, body }
            }
            TokenKind::For => {
                let opener = self.bump();
                let var = self.ident("loop variable")?;
                self.expect(TokenKind::In, "\"in\"")?;
                let iter = self.expr()?;
                let body = self.closed_block(&opener, "for")?;
                StmtKind::For { var, iter, body }
            }
            TokenKind::Begin => {
                let opener = self.bump();
                StmtKind::Block(self.closed_block(&opener, "begin")?)
            }
            TokenKind::Using | TokenKind::Import => {
                let bind_exports = matches!(token.kind, TokenKind::Using);
                self.bump();
                StmtKind::Using {
                    modules: self.name_list("module name")?,
                    bind_exports,
                }
            }
            TokenKind::Export => {
                self.bump();
                StmtKind::Export(self.name_list("exported name")?)
            }
            TokenKind::Macro(name) => self.macro_call(name.clone(), &token)?,
            TokenKind::Ident(name) if matches!(self.peek_at(1).kind, TokenKind::Assign) => {
                let target = name.clone();
                self.bump();
                self.bump();
                StmtKind::Assign {
                    target,
                    value: self.expr()?,
                }
            }
            TokenKind::Ident(_) if self.is_short_function() => {
                StmtKind::Function(Rc::new(self.short_function()?))
            }
            _ => StmtKind::Expr(self.expr()?),
        };
        Ok(Stmt { kind, line })
    }

    fn name_list(&mut self, what: &str) -> Result<Vec<String>, SyntaxError> {
        let mut names = vec![self.ident(what)?];
        while self.eat(&TokenKind::Comma) {
            names.push(self.ident(what)?);
        }
        Ok(names)
    }

    fn params(&mut self) -> Result<Vec<String>, SyntaxError> {
        self.expect(TokenKind::LParen, "\"(\"")?;
        let mut params = Vec::new();
        if !self.at(&TokenKind::RParen) {
            params = self.name_list("parameter name")?;
        }
        self.expect(TokenKind::RParen, "\")\"")?;
        Ok(params)
    }

    fn function_def(&mut self) -> Result<FunctionDef, SyntaxError> {
        let opener = self.bump();
        let name = self.ident("function name")?;
        let params = self.params()?;
        let body = self.closed_block(&opener, "function")?;
        Ok(FunctionDef {
            name,
            params,
            body,
            line: opener.line,
        })
    }

    /// `f(a, b) = expr`: an identifier, a balanced parameter list, then `=`.
    fn is_short_function(&self) -> bool {
        if !matches!(self.peek_at(1).kind, TokenKind::LParen) {
            return false;
        }
        let mut depth = 0usize;
        let mut offset = 1;
        loop {
            match self.peek_at(offset).kind {
                TokenKind::LParen => depth += 1,
                TokenKind::RParen => {
                    depth -= 1;
                    if depth == 0 {
                        return matches!(self.peek_at(offset + 1).kind, TokenKind::Assign);
                    }
                }
                TokenKind::Eof | TokenKind::Newline => return false,
                _ => {}
            }
            offset += 1;
        }
    }

    fn short_function(&mut self) -> Result<FunctionDef, SyntaxError> {
        let line = self.peek().line;
        let name = self.ident("function name")?;
        let params = self.params()?;
        self.expect(TokenKind::Assign, "\"=\"")?;
        let value = self.expr()?;
        let value_line = value.line;
        Ok(FunctionDef {
            name,
            params,
            body: vec![Stmt {
                kind: StmtKind::Return(Some(value)),
                line: value_line,
            }],
            line,
        })
    }

    fn if_stmt(&mut self) -> Result<StmtKind, SyntaxError> {
        let opener = self.bump();
        let mut branches = Vec::new();
        let mut otherwise = None;
        let terminators = [TokenKind::Elseif, TokenKind::Else, TokenKind::End];
        let cond = self.expr()?;
        branches.push((cond, self.block(&terminators)?));
        loop {
            if self.eat(&TokenKind::Elseif) {
                let cond = self.expr()?;
                branches.push((cond, self.block(&terminators)?));
            } else if self.eat(&TokenKind::Else) {
                otherwise = Some(self.block(&[TokenKind::End])?);
            } else if self.eat(&TokenKind::End) {
                break;
            } else {
                return Err(self.error_at(
                    &opener,
                    format!("incomplete: \"if\" at line {} requires end", opener.line),
                ));
            }
        }
        Ok(StmtKind::If { branches, otherwise })
    }

    /// Parses an expression and returns it with its source text.
    fn expr_with_source(&mut self) -> Result<(Expr, String), SyntaxError> {
        let start = self.peek().start;
        let expr = self.expr()?;
        let end = self.tokens[self.pos.saturating_sub(1)].end.max(start);
        Ok((expr, self.src[start..end].trim().to_string()))
    }

    fn macro_call(&mut self, name: String, token: &Token) -> Result<StmtKind, SyntaxError> {
        self.bump();
        match name.as_str() {
            "test" => {
                let (expr, source) = self.expr_with_source()?;
                Ok(StmtKind::Test { expr, source })
            }
            "test_throws" => {
                let (expr, source) = self.expr_with_source()?;
                Ok(StmtKind::TestThrows { expr, source })
            }
            "testset" => {
                let name = self.expr()?;
                let opener = self.expect(TokenKind::Begin, "\"begin\" after @testset name")?;
                let body = self.closed_block(&opener, "begin")?;
                Ok(StmtKind::TestSet { name, body })
            }
            _ => Err(SyntaxError {
                kind: ErrorKind::UndefVar(format!("@{name}")),
                line: token.line,
            }),
        }
    }

    pub fn expr(&mut self) -> Result<Expr, SyntaxError> {
        self.nested(Self::or_expr)
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        let line = lhs.line;
        Expr {
            kind: ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            line,
        }
    }

    fn or_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.and_expr()?;
        while self.eat(&TokenKind::OrOr) {
            let rhs = self.and_expr()?;
            lhs = Self::binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.comparison()?;
        while self.eat(&TokenKind::AndAnd) {
            let rhs = self.comparison()?;
            lhs = Self::binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn comparison(&mut self) -> Result<Expr, SyntaxError> {
        let lhs = self.range()?;
        let op = match self.peek().kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::NotEq,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Le => BinaryOp::Le,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Ge => BinaryOp::Ge,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.range()?;
        Ok(Self::binary(op, lhs, rhs))
    }

    fn range(&mut self) -> Result<Expr, SyntaxError> {
        let lhs = self.additive()?;
        if self.eat(&TokenKind::Colon) {
            let rhs = self.additive()?;
            let line = lhs.line;
            return Ok(Expr {
                kind: ExprKind::Range(Box::new(lhs), Box::new(rhs)),
                line,
            });
        }
        Ok(lhs)
    }

    fn additive(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.multiplicative()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.multiplicative()?;
            lhs = Self::binary(op, lhs, rhs);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let mut lhs = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => return Ok(lhs),
            };
            self.bump();
            let rhs = self.unary()?;
            lhs = Self::binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Expr, SyntaxError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.postfix(),
        };
        let line = self.bump().line;
        let operand = self.nested(Self::unary)?;
        Ok(Expr {
            kind: ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            line,
        })
    }

    fn postfix(&mut self) -> Result<Expr, SyntaxError> {
        let mut expr = self.primary()?;
        loop {
            let line = expr.line;
            if self.eat(&TokenKind::LParen) {
                let args = self.comma_separated(TokenKind::RParen, "\")\"")?;
                expr = Expr {
                    kind: ExprKind::Call {
                        callee: Box::new(expr),
                        args,
                    },
                    line,
                };
            } else if self.eat(&TokenKind::LBracket) {
                let index = self.expr()?;
                self.expect(TokenKind::RBracket, "\"]\"")?;
                expr = Expr {
                    kind: ExprKind::Index {
                        target: Box::new(expr),
                        index: Box::new(index),
                    },
                    line,
                };
            } else if self.eat(&TokenKind::Dot) {
                let name = self.ident("field name")?;
                expr = Expr {
                    kind: ExprKind::Field {
                        target: Box::new(expr),
                        name,
                    },
                    line,
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn comma_separated(&mut self, close: TokenKind, what: &str) -> Result<Vec<Expr>, SyntaxError> {
        let mut items = Vec::new();
        if self.eat(&close) {
            return Ok(items);
        }
        loop {
            items.push(self.expr()?);
            if self.eat(&TokenKind::Comma) {
                if self.eat(&close) {
                    return Ok(items);
                }
                continue;
            }
            self.expect(close, what)?;
            return Ok(items);
        }
    }

    fn primary(&mut self) -> Result<Expr, SyntaxError> {
        let token = self.peek().clone();
        let kind = match token.kind {
            TokenKind::Int(v) => ExprKind::Int(v),
            TokenKind::Float(v) => ExprKind::Float(v),
            TokenKind::Str(s) => ExprKind::Str(s),
            TokenKind::True => ExprKind::Bool(true),
            TokenKind::False => ExprKind::Bool(false),
            TokenKind::Nothing => ExprKind::Nothing,
            TokenKind::Ident(name) => ExprKind::Ident(name),
            TokenKind::LParen => {
                self.bump();
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "\")\"")?;
                return Ok(Expr {
                    kind: inner.kind,
                    line: token.line,
                });
            }
            TokenKind::LBracket => {
                self.bump();
                let items = self.comma_separated(TokenKind::RBracket, "\"]\"")?;
                return Ok(Expr {
                    kind: ExprKind::Array(items),
                    line: token.line,
                });
            }
            _ => return Err(self.unexpected("expression")),
        };
        self.bump();
        Ok(Expr {
            kind,
            line: token.line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignment_and_test_macro_with_source_text() {
        let body = parse("x = 1 + 1\n@test x == 2\n").unwrap();
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0].kind, StmtKind::Assign { .. }));
        match &body[1].kind {
            StmtKind::Test { source, .. } => assert_eq!(source, "x == 2"),
            other => panic!("expected @test, got {other:?}"),
        }
        assert_eq!(body[1].line, 2);
    }

    #[test]
    fn short_function_form_becomes_a_return() {
        let body = parse("double(x) = 2 * x").unwrap();
        match &body[0].kind {
            StmtKind::Function(def) => {
                assert_eq!(def.name, "double");
                assert_eq!(def.params, vec!["x".to_string()]);
                assert!(matches!(def.body[0].kind, StmtKind::Return(Some(_))));
            }
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn missing_end_reports_the_opening_line() {
        let err = parse("\n\nfunction f()\n  1\n").unwrap_err();
        assert_eq!(err.line, 3);
        assert!(matches!(err.kind, ErrorKind::Syntax(ref m) if m.contains("requires end")));
    }

    #[test]
    fn unknown_macro_is_an_undefined_name() {
        let err = parse("@nope 1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefVar("@nope".to_string()));
    }

    #[test]
    fn nesting_within_the_limit_parses() {
        let depth = MAX_NESTING_DEPTH - 10;
        let src = format!("x = {}1{}", "(".repeat(depth), ")".repeat(depth));
        assert!(parse(&src).is_ok());
        let src = format!("x = {}1", "-".repeat(depth));
        assert!(parse(&src).is_ok());
    }

    #[test]
    fn excessive_nesting_is_a_syntax_error() {
        let depth = 200_000;
        let src = format!("\n@test {}1{} == 1", "(".repeat(depth), ")".repeat(depth));
        let err = parse(&src).unwrap_err();
        assert_eq!(err.line, 2);
        assert!(matches!(err.kind, ErrorKind::Syntax(ref m) if m.contains("nested more than")));

        let src = format!("x = {}1", "!".repeat(depth));
        assert!(matches!(parse(&src).unwrap_err().kind, ErrorKind::Syntax(_)));
    }

    #[test]
    fn newlines_inside_brackets_do_not_end_statements() {
        let body = parse("x = [1,\n 2,\n 3]\n").unwrap();
        assert_eq!(body.len(), 1);
    }
}
