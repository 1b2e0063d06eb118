use std::iter::Peekable;
use std::str::CharIndices;

use arch::reg::Reg;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub line: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub pos: Pos,
}

impl Token {
    pub fn new(kind: TokenKind, text: String, pos: Pos) -> Self {
        Token { kind, text, pos }
    }

    /// Identifier text, for Word and AlphaNum tokens.
    pub fn ident(&self) -> Option<&str> {
        match self.kind {
            TokenKind::Word | TokenKind::AlphaNum => Some(&self.text),
            _ => None,
        }
    }

    pub fn is_word(&self, s: &str) -> bool {
        self.ident() == Some(s)
    }

    pub fn is_symbol(&self, c: char) -> bool {
        self.kind == TokenKind::Symbol(c)
    }

    pub fn constant(&self) -> Option<&Constant> {
        match &self.kind {
            TokenKind::Constant(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Identifier without digits, directives included
    Word,
    /// Identifier containing digits
    AlphaNum,
    Symbol(char),
    Register(Reg),
    Constant(Constant),
    /// Unlexable input, reported by the grammar phase
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Ascii(char),
    Str(String),
    Bin(u32),
    Hex(u32),
    UDec(u32),
    Dec(i32),
}

impl Constant {
    /// Numeric value; None for string constants.
    pub fn value(&self) -> Option<i64> {
        match self {
            Constant::Ascii(c) => Some(*c as i64),
            Constant::Str(_) => None,
            Constant::Bin(v) | Constant::Hex(v) | Constant::UDec(v) => Some(*v as i64),
            Constant::Dec(v) => Some(*v as i64),
        }
    }
}

// ----------------------------------------------------------------------------

pub struct Lexer<'a> {
    src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self { src }
    }

    pub fn tokenize(self) -> Vec<Vec<Token>> {
        self.src
            .lines()
            .enumerate()
            .map(|(no, line)| lex_line(line, no))
            .collect()
    }
}

/// Lex a single source line. Also used to re-lex macro expansions.
pub fn lex_line(line: &str, line_no: usize) -> Vec<Token> {
    LineLexer::new(line, line_no).lex()
}

struct LineLexer<'a> {
    iter: Peekable<CharIndices<'a>>,
    line: usize,
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '_' | '.' | '\\')
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.')
}

impl<'a> LineLexer<'a> {
    fn new(line: &'a str, line_no: usize) -> Self {
        Self {
            iter: line.char_indices().peekable(),
            line: line_no,
        }
    }

    fn peek_nth(&self, n: usize) -> Option<(usize, char)> {
        self.iter.clone().nth(n)
    }

    fn consume(&mut self) -> Option<(usize, char)> {
        self.iter.next()
    }

    fn lex(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        while let Some((idx, ch0)) = self.peek_nth(0) {
            // 0. Whitespace separates tokens and is never emitted
            if ch0.is_whitespace() {
                self.consume();
                continue;
            }

            let pos = Pos {
                line: self.line,
                col: idx,
            };

            // 1. Number literal (a '-' glued to a digit is one constant)
            if ch0.is_ascii_digit() {
                tokens.push(self.lex_number(false, pos));
                continue;
            }
            if ch0 == '-' {
                if let Some((_, ch1)) = self.peek_nth(1) {
                    if ch1.is_ascii_digit() {
                        self.consume();
                        tokens.push(self.lex_number(true, pos));
                        continue;
                    }
                }
            }

            // 2. Char literal
            if ch0 == '\'' {
                tokens.push(self.lex_char(pos));
                continue;
            }

            // 3. String literal
            if ch0 == '"' {
                tokens.push(self.lex_text(pos));
                continue;
            }

            // 4. Identifier, register name or directive
            if is_ident_start(ch0) {
                tokens.push(self.lex_ident(pos));
                continue;
            }

            // 5. Everything else is a one-character symbol
            self.consume();
            tokens.push(Token::new(TokenKind::Symbol(ch0), ch0.to_string(), pos));
        }
        tokens
    }

    fn lex_ident(&mut self, pos: Pos) -> Token {
        let (_, ch0) = self.consume().unwrap();
        let mut lexeme = vec![ch0];
        while let Some((_, ch)) = self.iter.next_if(|(_, ch)| is_ident_char(*ch)) {
            lexeme.push(ch);
        }
        let text: String = lexeme.into_iter().collect();

        // Plain names can be register tokens; dotted and escaped ones never are
        if !text.starts_with('.') && !text.starts_with('\\') {
            if let Ok(reg) = Reg::parse(&text) {
                return Token::new(TokenKind::Register(reg), text, pos);
            }
        }
        let kind = if text.chars().any(|c| c.is_ascii_digit()) {
            TokenKind::AlphaNum
        } else {
            TokenKind::Word
        };
        Token::new(kind, text, pos)
    }

    fn lex_number(&mut self, negative: bool, pos: Pos) -> Token {
        let (_, ch0) = self.consume().unwrap();
        if ch0 == '0' && !negative {
            if let Some(&(_, ch1)) = self.iter.peek() {
                if ch1 == 'x' || ch1 == 'X' {
                    self.consume();
                    return self.lex_radix(16, pos);
                }
                if ch1 == 'b' || ch1 == 'B' {
                    self.consume();
                    return self.lex_radix(2, pos);
                }
            }
        }
        let mut lexeme = vec![ch0];
        while let Some((_, ch)) = self
            .iter
            .next_if(|(_, ch)| matches!(ch, '_' | '0'..='9'))
        {
            lexeme.push(ch);
        }
        let digits: String = lexeme.iter().collect();
        let text = if negative {
            format!("-{digits}")
        } else {
            digits.clone()
        };
        match u32::from_str_radix(&digits.replace('_', ""), 10) {
            Ok(v) if negative => {
                if v > 0x8000_0000 {
                    Token::new(TokenKind::Error, text, pos)
                } else {
                    Token::new(
                        TokenKind::Constant(Constant::Dec(-(v as i64) as i32)),
                        text,
                        pos,
                    )
                }
            }
            Ok(v) => Token::new(TokenKind::Constant(Constant::UDec(v)), text, pos),
            Err(_) => Token::new(TokenKind::Error, text, pos),
        }
    }

    fn lex_radix(&mut self, radix: u32, pos: Pos) -> Token {
        let mut lexeme = Vec::new();
        while let Some((_, ch)) = self
            .iter
            .next_if(|(_, ch)| ch.is_ascii_hexdigit() || *ch == '_')
        {
            lexeme.push(ch);
        }
        let digits: String = lexeme.iter().collect();
        let text = match radix {
            16 => format!("0x{digits}"),
            _ => format!("0b{digits}"),
        };
        match u32::from_str_radix(&digits.replace('_', ""), radix) {
            Ok(v) if radix == 16 => Token::new(TokenKind::Constant(Constant::Hex(v)), text, pos),
            Ok(v) => Token::new(TokenKind::Constant(Constant::Bin(v)), text, pos),
            Err(_) => Token::new(TokenKind::Error, text, pos),
        }
    }

    fn lex_char(&mut self, pos: Pos) -> Token {
        self.consume(); // opening '
        let Some((_, ch1)) = self.consume() else {
            return Token::new(TokenKind::Error, "'".into(), pos);
        };
        let value = if ch1 == '\\' {
            match self.consume() {
                Some((_, 'n')) => '\n',
                Some((_, 't')) => '\t',
                Some((_, 'r')) => '\r',
                Some((_, '\\')) => '\\',
                Some((_, '\'')) => '\'',
                Some((_, '0')) => '\0',
                _ => return Token::new(TokenKind::Error, "'\\".into(), pos),
            }
        } else {
            ch1
        };
        match self.consume() {
            Some((_, '\'')) => Token::new(
                TokenKind::Constant(Constant::Ascii(value)),
                format!("'{value}'"),
                pos,
            ),
            _ => Token::new(TokenKind::Error, format!("'{value}"), pos),
        }
    }

    fn lex_text(&mut self, pos: Pos) -> Token {
        self.consume(); // opening "
        let mut lexeme = Vec::new();
        let mut escape = false;
        let mut closed = false;
        while let Some((_, ch)) = self.consume() {
            if escape {
                match ch {
                    '\\' => lexeme.push('\\'),
                    'n' => lexeme.push('\n'),
                    't' => lexeme.push('\t'),
                    'r' => lexeme.push('\r'),
                    '0' => lexeme.push('\0'),
                    '"' => lexeme.push('"'),
                    ch => lexeme.push(ch),
                }
                escape = false;
            } else {
                match ch {
                    '"' => {
                        closed = true;
                        break;
                    }
                    '\\' => escape = true,
                    ch => lexeme.push(ch),
                }
            }
        }
        let text: String = lexeme.into_iter().collect();
        if closed {
            Token::new(
                TokenKind::Constant(Constant::Str(text.clone())),
                format!("\"{text}\""),
                pos,
            )
        } else {
            Token::new(TokenKind::Error, text, pos)
        }
    }
}

// ----------------------------------------------------------------------------
