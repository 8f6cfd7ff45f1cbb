//! Tokenizer with Go's automatic semicolon insertion.

use crate::source::{FileId, Span};
use crate::token::{Token, TokenKind};

pub struct Lexer<'a> {
    src: &'a [u8],
    file: FileId,
    pos: u32,
    /// Kind of the last emitted significant token, for semicolon insertion.
    last: Option<TokenKind>,
}

impl<'a> Lexer<'a> {
    pub fn new(file: FileId, src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            file,
            pos: 0,
            last: None,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut out = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.kind == TokenKind::Eof;
            out.push(tok);
            if done {
                return Ok(out);
            }
        }
    }

    fn peek(&self) -> u8 {
        *self.src.get(self.pos as usize).unwrap_or(&0)
    }

    fn peek_at(&self, off: u32) -> u8 {
        *self.src.get((self.pos + off) as usize).unwrap_or(&0)
    }

    fn bump(&mut self) -> u8 {
        let b = self.peek();
        self.pos += 1;
        b
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(self.file, start, self.pos)
    }

    fn emit(&mut self, kind: TokenKind, start: u32) -> Token {
        self.last = Some(kind);
        Token {
            kind,
            span: self.span_from(start),
        }
    }

    fn next_token(&mut self) -> Result<Token, LexError> {
        loop {
            match self.peek() {
                0 if self.pos as usize >= self.src.len() => {
                    // A final statement without a trailing newline still ends.
                    if self.last.map(TokenKind::ends_statement).unwrap_or(false) {
                        self.last = None;
                        return Ok(Token {
                            kind: TokenKind::Semi,
                            span: self.span_from(self.pos),
                        });
                    }
                    return Ok(Token {
                        kind: TokenKind::Eof,
                        span: self.span_from(self.pos),
                    });
                }
                b'\n' => {
                    let start = self.pos;
                    self.bump();
                    if self.last.map(TokenKind::ends_statement).unwrap_or(false) {
                        self.last = None;
                        return Ok(Token {
                            kind: TokenKind::Semi,
                            span: Span::new(self.file, start, start + 1),
                        });
                    }
                }
                b' ' | b'\t' | b'\r' => {
                    self.bump();
                }
                b'/' if self.peek_at(1) == b'/' => {
                    while self.peek() != b'\n' && (self.pos as usize) < self.src.len() {
                        self.bump();
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    let start = self.pos;
                    self.bump();
                    self.bump();
                    loop {
                        if self.pos as usize >= self.src.len() {
                            return Err(LexError::new(self.span_from(start), "unterminated comment"));
                        }
                        if self.peek() == b'*' && self.peek_at(1) == b'/' {
                            self.bump();
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }

        let start = self.pos;
        let b = self.peek();
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while matches!(self.peek(), b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_') {
                    self.bump();
                }
                let text = &self.src[start as usize..self.pos as usize];
                let text = std::str::from_utf8(text).expect("ident bytes are ascii");
                let kind = TokenKind::keyword(text).unwrap_or(TokenKind::Ident);
                Ok(self.emit(kind, start))
            }
            b'0'..=b'9' => {
                let mut float = false;
                while self.peek().is_ascii_digit() {
                    self.bump();
                }
                if self.peek() == b'.' && self.peek_at(1).is_ascii_digit() {
                    float = true;
                    self.bump();
                    while self.peek().is_ascii_digit() {
                        self.bump();
                    }
                }
                let kind = if float { TokenKind::Float } else { TokenKind::Int };
                Ok(self.emit(kind, start))
            }
            b'"' => {
                self.bump();
                loop {
                    match self.peek() {
                        b'"' => {
                            self.bump();
                            break;
                        }
                        b'\\' => {
                            self.bump();
                            self.bump();
                        }
                        b'\n' | 0 => {
                            return Err(LexError::new(self.span_from(start), "unterminated string"))
                        }
                        _ => {
                            self.bump();
                        }
                    }
                }
                Ok(self.emit(TokenKind::String, start))
            }
            b'`' => {
                self.bump();
                loop {
                    match self.peek() {
                        b'`' => {
                            self.bump();
                            break;
                        }
                        0 if self.pos as usize >= self.src.len() => {
                            return Err(LexError::new(
                                self.span_from(start),
                                "unterminated raw string",
                            ))
                        }
                        _ => {
                            self.bump();
                        }
                    }
                }
                Ok(self.emit(TokenKind::RawString, start))
            }
            b'\'' => {
                self.bump();
                loop {
                    match self.peek() {
                        b'\'' => {
                            self.bump();
                            break;
                        }
                        b'\\' => {
                            self.bump();
                            self.bump();
                        }
                        b'\n' | 0 => {
                            return Err(LexError::new(self.span_from(start), "unterminated rune"))
                        }
                        _ => {
                            self.bump();
                        }
                    }
                }
                Ok(self.emit(TokenKind::Rune, start))
            }
            _ => self.operator(start),
        }
    }

    fn operator(&mut self, start: u32) -> Result<Token, LexError> {
        let b = self.bump();
        let kind = match b {
            b'+' if self.peek() == b'+' => {
                self.bump();
                TokenKind::Inc
            }
            b'+' => TokenKind::Plus,
            b'-' if self.peek() == b'-' => {
                self.bump();
                TokenKind::Dec
            }
            b'-' => TokenKind::Minus,
            b'*' => TokenKind::Star,
            b'/' => TokenKind::Slash,
            b'%' => TokenKind::Percent,
            b'&' if self.peek() == b'&' => {
                self.bump();
                TokenKind::AndAnd
            }
            b'&' => TokenKind::Amp,
            b'|' if self.peek() == b'|' => {
                self.bump();
                TokenKind::OrOr
            }
            b'|' => TokenKind::Pipe,
            b'^' => TokenKind::Caret,
            b'<' if self.peek() == b'-' => {
                self.bump();
                TokenKind::Arrow
            }
            b'<' if self.peek() == b'<' => {
                self.bump();
                TokenKind::Shl
            }
            b'<' if self.peek() == b'=' => {
                self.bump();
                TokenKind::LtEq
            }
            b'<' => TokenKind::Lt,
            b'>' if self.peek() == b'>' => {
                self.bump();
                TokenKind::Shr
            }
            b'>' if self.peek() == b'=' => {
                self.bump();
                TokenKind::GtEq
            }
            b'>' => TokenKind::Gt,
            b'=' if self.peek() == b'=' => {
                self.bump();
                TokenKind::EqEq
            }
            b'=' => TokenKind::Eq,
            b'!' if self.peek() == b'=' => {
                self.bump();
                TokenKind::NotEq
            }
            b'!' => TokenKind::Not,
            b':' if self.peek() == b'=' => {
                self.bump();
                TokenKind::ColonEq
            }
            b':' => TokenKind::Colon,
            b'.' if self.peek() == b'.' && self.peek_at(1) == b'.' => {
                self.bump();
                self.bump();
                TokenKind::Ellipsis
            }
            b'.' => TokenKind::Dot,
            b'(' => TokenKind::LParen,
            b')' => TokenKind::RParen,
            b'{' => TokenKind::LBrace,
            b'}' => TokenKind::RBrace,
            b'[' => TokenKind::LBrack,
            b']' => TokenKind::RBrack,
            b',' => TokenKind::Comma,
            b';' => TokenKind::Semi,
            other => {
                return Err(LexError::new(
                    self.span_from(start),
                    format!("unexpected character {:?}", other as char),
                ))
            }
        };
        Ok(self.emit(kind, start))
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct LexError {
    pub span: Span,
    pub message: String,
}

impl LexError {
    fn new(span: Span, message: impl Into<String>) -> Self {
        Self {
            span,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(FileId(0), src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn inserts_semicolons_at_newlines() {
        let ks = kinds("x := 1\ny := 2\n");
        assert_eq!(
            ks,
            vec![
                TokenKind::Ident,
                TokenKind::ColonEq,
                TokenKind::Int,
                TokenKind::Semi,
                TokenKind::Ident,
                TokenKind::ColonEq,
                TokenKind::Int,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn no_semicolon_after_operators() {
        let ks = kinds("x +\ny\n");
        assert_eq!(
            ks,
            vec![
                TokenKind::Ident,
                TokenKind::Plus,
                TokenKind::Ident,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn keywords_and_strings() {
        let ks = kinds("package main\nimport \"go.uber.org/zap\"\n");
        assert_eq!(
            ks,
            vec![
                TokenKind::KwPackage,
                TokenKind::Ident,
                TokenKind::Semi,
                TokenKind::KwImport,
                TokenKind::String,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn raw_string_tag() {
        let ks = kinds("`json:\"n\"`");
        assert_eq!(ks, vec![TokenKind::RawString, TokenKind::Semi, TokenKind::Eof]);
    }

    #[test]
    fn ellipsis_and_arrows() {
        let ks = kinds("...string <-chan int");
        assert_eq!(
            ks,
            vec![
                TokenKind::Ellipsis,
                TokenKind::Ident,
                TokenKind::Arrow,
                TokenKind::KwChan,
                TokenKind::Ident,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let ks = kinds("x // trailing\n/* block\n */ y\n");
        assert_eq!(
            ks,
            vec![
                TokenKind::Ident,
                TokenKind::Semi,
                TokenKind::Ident,
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }
}
