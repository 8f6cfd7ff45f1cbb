//! Token kinds for the Go subset.

use crate::source::Span;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Int,
    Float,
    /// Interpreted string literal, quotes included in the text.
    String,
    /// Raw (backtick) string literal, backticks included in the text.
    RawString,
    Rune,

    // Keywords.
    KwPackage,
    KwImport,
    KwVar,
    KwConst,
    KwType,
    KwFunc,
    KwReturn,
    KwIf,
    KwElse,
    KwFor,
    KwRange,
    KwStruct,
    KwInterface,
    KwMap,
    KwChan,
    KwGo,
    KwDefer,
    KwBreak,
    KwContinue,

    // Operators and delimiters.
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    AndAnd,
    OrOr,
    Arrow,    // <-
    Eq,       // =
    EqEq,     // ==
    NotEq,    // !=
    Lt,
    LtEq,
    Gt,
    GtEq,
    Not,      // !
    ColonEq,  // :=
    Ellipsis, // ...
    Inc,      // ++
    Dec,      // --
    Shl,      // <<
    Shr,      // >>
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBrack,
    RBrack,
    Comma,
    Dot,
    Semi,
    Colon,

    Eof,
}

impl TokenKind {
    pub fn keyword(ident: &str) -> Option<TokenKind> {
        Some(match ident {
            "package" => TokenKind::KwPackage,
            "import" => TokenKind::KwImport,
            "var" => TokenKind::KwVar,
            "const" => TokenKind::KwConst,
            "type" => TokenKind::KwType,
            "func" => TokenKind::KwFunc,
            "return" => TokenKind::KwReturn,
            "if" => TokenKind::KwIf,
            "else" => TokenKind::KwElse,
            "for" => TokenKind::KwFor,
            "range" => TokenKind::KwRange,
            "struct" => TokenKind::KwStruct,
            "interface" => TokenKind::KwInterface,
            "map" => TokenKind::KwMap,
            "chan" => TokenKind::KwChan,
            "go" => TokenKind::KwGo,
            "defer" => TokenKind::KwDefer,
            "break" => TokenKind::KwBreak,
            "continue" => TokenKind::KwContinue,
            _ => return None,
        })
    }

    /// True when a newline after a token of this kind terminates a
    /// statement (Go's automatic semicolon insertion rule).
    pub fn ends_statement(self) -> bool {
        matches!(
            self,
            TokenKind::Ident
                | TokenKind::Int
                | TokenKind::Float
                | TokenKind::String
                | TokenKind::RawString
                | TokenKind::Rune
                | TokenKind::KwReturn
                | TokenKind::KwBreak
                | TokenKind::KwContinue
                | TokenKind::Inc
                | TokenKind::Dec
                | TokenKind::RParen
                | TokenKind::RBrack
                | TokenKind::RBrace
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}
