//! # Lexer / 词法分析器
//!
//! Turns test-item source text into a flat token stream. Every token carries its
//! 1-based line and column plus byte offsets into the source, so the parser can
//! recover the exact text of an `@test` expression for failure descriptions.
//!
//! 将测试项源代码转换为扁平的词法单元流。每个词法单元都带有从 1 开始的行号和列号，
//! 以及源文本中的字节偏移，以便解析器恢复 `@test` 表达式的原始文本。

use crate::script::error::ErrorKind;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    /// `@name`, stored without the leading `@`.
    Macro(String),

    Function,
    End,
    Return,
    If,
    Elseif,
    Else,
    While,
    For,
    In,
    Begin,
    Using,
    Import,
    Export,
    True,
    False,
    Nothing,

    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    Newline,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    pub column: u32,
    pub start: usize,
    pub end: usize,
}

/// A lexing or parsing failure: message plus the 1-based line it occurred on.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxError {
    pub kind: ErrorKind,
    pub line: u32,
}

fn keyword(word: &str) -> Option<TokenKind> {
    let kind = match word {
        "function" => TokenKind::Function,
        "end" => TokenKind::End,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "elseif" => TokenKind::Elseif,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "begin" => TokenKind::Begin,
        "using" => TokenKind::Using,
        "import" => TokenKind::Import,
        "export" => TokenKind::Export,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "nothing" => TokenKind::Nothing,
        _ => return None,
    };
    Some(kind)
}

struct Lexer<'a> {
    src: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
    line: u32,
    column: u32,
    /// Nesting depth of `(` and `[`; newlines inside brackets are not separators.
    depth: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().collect(),
            pos: 0,
            line: 1,
            column: 1,
            depth: 0,
            tokens: Vec::new(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|&(_, c)| c)
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).map(|&(_, c)| c)
    }

    fn offset(&self) -> usize {
        self.chars
            .get(self.pos)
            .map(|&(i, _)| i)
            .unwrap_or(self.src.len())
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, message: String) -> SyntaxError {
        SyntaxError {
            kind: ErrorKind::Syntax(message),
            line: self.line,
        }
    }

    fn push(&mut self, kind: TokenKind, line: u32, column: u32, start: usize) {
        let end = self.offset();
        self.tokens.push(Token {
            kind,
            line,
            column,
            start,
            end,
        });
    }

    fn run(mut self) -> Result<Vec<Token>, SyntaxError> {
        while let Some(c) = self.peek() {
            let (line, column, start) = (self.line, self.column, self.offset());
            match c {
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '\n' | ';' => {
                    self.bump();
                    if self.depth == 0 {
                        self.push(TokenKind::Newline, line, column, start);
                    }
                }
                '"' => {
                    let text = self.string()?;
                    self.push(TokenKind::Str(text), line, column, start);
                }
                '@' => {
                    self.bump();
                    let name = self.word();
                    if name.is_empty() {
                        return Err(self.error("expected macro name after `@`".to_string()));
                    }
                    self.push(TokenKind::Macro(name), line, column, start);
                }
                c if c.is_ascii_digit() => {
                    let kind = self.number()?;
                    self.push(kind, line, column, start);
                }
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.word();
                    let kind = keyword(&word).unwrap_or(TokenKind::Ident(word));
                    self.push(kind, line, column, start);
                }
                _ => {
                    let kind = self.punct(c)?;
                    self.push(kind, line, column, start);
                }
            }
        }
        let end = self.src.len();
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
            column: self.column,
            start: end,
            end,
        });
        Ok(self.tokens)
    }

    fn word(&mut self) -> String {
        let mut word = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
                self.bump();
            } else {
                break;
            }
        }
        word
    }

    fn number(&mut self) -> Result<TokenKind, SyntaxError> {
        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                if c != '_' {
                    text.push(c);
                }
                self.bump();
            } else if c == '.'
                && !is_float
                && self.peek_next().is_some_and(|n| n.is_ascii_digit())
            {
                is_float = true;
                text.push(c);
                self.bump();
            } else if (c == 'e' || c == 'E')
                && self
                    .peek_next()
                    .is_some_and(|n| n.is_ascii_digit() || n == '-' || n == '+')
            {
                is_float = true;
                text.push(c);
                self.bump();
                if let Some(sign) = self.peek().filter(|s| *s == '-' || *s == '+') {
                    text.push(sign);
                    self.bump();
                }
            } else {
                break;
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| self.error(format!("invalid numeric constant \"{text}\"")))
        } else {
            text.parse::<i64>()
                .map(TokenKind::Int)
                .map_err(|_| self.error(format!("integer constant \"{text}\" is too large")))
        }
    }

    fn string(&mut self) -> Result<String, SyntaxError> {
        let opening_line = self.line;
        self.bump();
        let mut text = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(SyntaxError {
                        kind: ErrorKind::Syntax("incomplete: unterminated string literal".to_string()),
                        line: opening_line,
                    });
                }
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some('$') => text.push('$'),
                    Some(other) => {
                        return Err(self.error(format!("invalid escape sequence \"\\{other}\"")));
                    }
                    None => {
                        return Err(SyntaxError {
                            kind: ErrorKind::Syntax("incomplete: unterminated string literal".to_string()),
                            line: opening_line,
                        });
                    }
                },
                Some(c) => text.push(c),
            }
        }
        Ok(text)
    }

    fn punct(&mut self, c: char) -> Result<TokenKind, SyntaxError> {
        self.bump();
        let next = self.peek();
        let two = |lexer: &mut Self, kind: TokenKind| {
            lexer.bump();
            kind
        };
        let kind = match (c, next) {
            ('(', _) => {
                self.depth += 1;
                TokenKind::LParen
            }
            ('[', _) => {
                self.depth += 1;
                TokenKind::LBracket
            }
            (')', _) => {
                self.depth = self.depth.saturating_sub(1);
                TokenKind::RParen
            }
            (']', _) => {
                self.depth = self.depth.saturating_sub(1);
                TokenKind::RBracket
            }
            (',', _) => TokenKind::Comma,
            ('.', _) => TokenKind::Dot,
            (':', _) => TokenKind::Colon,
            ('+', _) => TokenKind::Plus,
            ('-', _) => TokenKind::Minus,
            ('*', _) => TokenKind::Star,
            ('/', _) => TokenKind::Slash,
            ('%', _) => TokenKind::Percent,
            ('=', Some('=')) => two(self, TokenKind::EqEq),
            ('=', _) => TokenKind::Assign,
            ('!', Some('=')) => two(self, TokenKind::NotEq),
            ('!', _) => TokenKind::Bang,
            ('<', Some('=')) => two(self, TokenKind::Le),
            ('<', _) => TokenKind::Lt,
            ('>', Some('=')) => two(self, TokenKind::Ge),
            ('>', _) => TokenKind::Gt,
            ('&', Some('&')) => two(self, TokenKind::AndAnd),
            ('|', Some('|')) => two(self, TokenKind::OrOr),
            (other, _) => {
                return Err(self.error(format!("invalid character \"{other}\"")));
            }
        };
        Ok(kind)
    }
}

/// Tokenizes `src`. The returned stream always ends with a single `Eof` token.
pub fn tokenize(src: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(src).run()
}
