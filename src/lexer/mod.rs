use std::str::CharIndices;

use crate::source::CodeSpan;

use self::{error::LexerError, tokens::Token};

pub mod error;
pub mod tokens;

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    src: &'a str,
    chars: std::iter::Peekable<CharIndices<'a>>,
    span: CodeSpan,
}

fn is_identifier(c: char) -> bool {
    matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '_')
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            chars: src.char_indices().peekable(),
            span: CodeSpan::ZEROSPAN,
        }
    }
    fn next_char(&mut self) -> Option<char> {
        self.chars.next().map(|v| v.1)
    }
    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|v| v.1)
    }
    fn peek_second(&self) -> Option<char> {
        let mut look = self.chars.clone();
        look.next();
        look.next().map(|v| v.1)
    }

    #[inline]
    pub fn span(&self) -> CodeSpan {
        self.span
    }
    #[inline]
    pub fn slice(&self) -> &'a str {
        &self.src[self.span.start..self.span.end]
    }

    fn update_span(&mut self) {
        self.span.end = if let Some(&(t, _)) = self.chars.peek() {
            t
        } else {
            self.src.len()
        };
    }

    fn skip_trivia(&mut self) {
        while let Some(&(idx, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.next_char();
                continue;
            }
            if c == '/' && self.peek_second() == Some('/') {
                while self.peek_char().is_some_and(|c| c != '\n') {
                    self.next_char();
                }
                continue;
            }
            self.span.start = idx;
            return;
        }
        self.span.start = self.src.len();
    }

    fn with_eq(&mut self, plain: Token, with_eq: Token) -> Token {
        if self.peek_char() == Some('=') {
            self.next_char();
            with_eq
        } else {
            plain
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, LexerError> {
        self.skip_trivia();

        let tok = match self.next_char() {
            Some('+') => self.with_eq(Token::Plus, Token::PlusEq),
            Some('-') => match self.peek_char() {
                Some('>') => {
                    self.next_char();
                    Token::Arrow
                }
                _ => self.with_eq(Token::Minus, Token::MinusEq),
            },
            Some('*') => self.with_eq(Token::Mult, Token::MultEq),
            Some('/') => self.with_eq(Token::Div, Token::DivEq),
            Some('%') => self.with_eq(Token::Mod, Token::ModEq),

            Some('(') => Token::OpenParen,
            Some(')') => Token::ClosedParen,
            Some('[') => Token::OpenSqBracket,
            Some(']') => Token::ClosedSqBracket,
            Some('{') => Token::OpenBracket,
            Some('}') => Token::ClosedBracket,
            Some(';') => Token::Semicolon,
            Some(':') => Token::Colon,
            Some('.') => Token::Period,
            Some(',') => Token::Comma,

            Some('=') => self.with_eq(Token::Assign, Token::Eq),
            Some('!') => self.with_eq(Token::Not, Token::NotEq),
            Some('>') => self.with_eq(Token::Gt, Token::Gte),
            Some('<') => self.with_eq(Token::Lt, Token::Lte),

            Some('&') if self.peek_char() == Some('&') => {
                self.next_char();
                Token::And
            }
            Some('|') if self.peek_char() == Some('|') => {
                self.next_char();
                Token::Or
            }

            Some(t) if t.is_ascii_digit() => {
                let mut is_decimal = false;
                loop {
                    if self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                        self.next_char();
                        continue;
                    }
                    if !is_decimal
                        && self.peek_char() == Some('.')
                        && self.peek_second().is_some_and(|c| c.is_ascii_digit())
                    {
                        self.next_char();
                        is_decimal = true;
                        continue;
                    }
                    break;
                }
                if is_decimal {
                    Token::Decimal
                } else {
                    Token::Int
                }
            }
            Some(t) if is_identifier(t) => {
                while self.peek_char().is_some_and(is_identifier) {
                    self.next_char();
                }
                self.update_span();

                match self.slice() {
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "if" => Token::If,
                    "else" => Token::Else,
                    "while" => Token::While,
                    "for" => Token::For,
                    "in" => Token::In,
                    "fun" => Token::Fun,
                    "inline" => Token::Inline,
                    "struct" => Token::Struct,
                    "const" => Token::Const,
                    "return" => Token::Return,
                    _ => Token::Identifier,
                }
            }
            Some('"') => {
                loop {
                    let Some(next) = self.next_char() else {
                        return Err(LexerError::UnterminatedString);
                    };
                    match next {
                        '\\' => match self.next_char() {
                            Some('"' | '\\' | 'n') => {}
                            Some(c) => return Err(LexerError::UnknownEscape(c)),
                            None => return Err(LexerError::UnterminatedString),
                        },
                        '"' => break,
                        _ => {}
                    }
                }
                Token::String
            }
            Some(t) => return Err(LexerError::UnknownChar(t)),
            None => return Ok(None),
        };
        Ok(Some(tok))
    }

    pub fn next(&mut self) -> Result<Option<Token>, LexerError> {
        self.span.start = self.span.end;
        let out = self.next_token();
        self.update_span();
        out
    }
}

/// Resolves the escapes of a string literal slice, quotes included.
pub fn unescape(literal: &str) -> String {
    let inner = &literal[1..literal.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(code: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(code);
        let mut out = vec![];
        while let Some(tok) = lexer.next().unwrap() {
            out.push(tok);
        }
        out
    }

    #[test]
    fn compound_operators_and_keywords() {
        assert_eq!(
            lex_all("sum += i; fun f() -> Number {} // trailing"),
            vec![
                Token::Identifier,
                Token::PlusEq,
                Token::Identifier,
                Token::Semicolon,
                Token::Fun,
                Token::Identifier,
                Token::OpenParen,
                Token::ClosedParen,
                Token::Arrow,
                Token::Identifier,
                Token::OpenBracket,
                Token::ClosedBracket,
            ]
        );
    }

    #[test]
    fn decimal_needs_a_digit_after_the_point() {
        assert_eq!(lex_all("1.5"), vec![Token::Decimal]);
        assert_eq!(
            lex_all("a.x"),
            vec![Token::Identifier, Token::Period, Token::Identifier]
        );
    }

    #[test]
    fn strings_and_escapes() {
        let mut lexer = Lexer::new(r#""a \"b\"""#);
        assert_eq!(lexer.next(), Ok(Some(Token::String)));
        assert_eq!(unescape(lexer.slice()), "a \"b\"");

        let mut lexer = Lexer::new(r#""open"#);
        assert_eq!(lexer.next(), Err(LexerError::UnterminatedString));
    }
}
