//! Recursive-descent parser for the Go subset.
//!
//! Covers package/import clauses, var/const/type/func declarations, the
//! statement forms the rewriter cares about, and the complete type
//! grammar including variadic signatures, channel directions and struct
//! tags. Composite literals, switch/select, goto and embedded struct
//! fields are outside the analyzed subset.

use crate::ast::*;
use crate::lexer::{LexError, Lexer};
use crate::source::{FileId, Span};
use crate::token::{Token, TokenKind};

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub span: Span,
    pub message: String,
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError {
            span: e.span,
            message: e.message,
        }
    }
}

/// Parse one source file into the shared arena.
pub fn parse_file(ast: &mut Ast, file: FileId, text: &str) -> Result<AstFileId, ParseError> {
    let tokens = Lexer::new(file, text).tokenize()?;
    let mut p = Parser {
        ast,
        text,
        tokens,
        pos: 0,
    };
    p.file(file)
}

/// Parse a standalone type expression, e.g. one produced by the type
/// renderer. The whole input must be consumed.
pub fn parse_type_expr(ast: &mut Ast, text: &str) -> Result<TypeExprId, ParseError> {
    let tokens = Lexer::new(FileId(u32::MAX), text).tokenize()?;
    let mut p = Parser {
        ast,
        text,
        tokens,
        pos: 0,
    };
    let ty = p.type_expr()?;
    p.skip_semis();
    if p.peek() != TokenKind::Eof {
        return Err(p.error_here("trailing input after type expression"));
    }
    Ok(ty)
}

struct Parser<'a> {
    ast: &'a mut Ast,
    text: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

/// Raw parameter-list element before named/unnamed disambiguation.
struct RawParam {
    name: Option<(String, Span)>,
    ty: TypeExprId,
    variadic: bool,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> TokenKind {
        self.tokens[self.pos].kind
    }

    fn peek_at(&self, off: usize) -> TokenKind {
        self.tokens
            .get(self.pos + off)
            .map(|t| t.kind)
            .unwrap_or(TokenKind::Eof)
    }

    fn here(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos];
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ParseError> {
        if self.at(kind) {
            Ok(self.bump())
        } else {
            Err(self.error_here(format!("expected {:?}, found {:?}", kind, self.peek())))
        }
    }

    fn error_here(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            span: self.here(),
            message: message.into(),
        }
    }

    fn token_text(&self, t: Token) -> &'a str {
        &self.text[t.span.start as usize..t.span.end as usize]
    }

    fn skip_semis(&mut self) {
        while self.at(TokenKind::Semi) {
            self.bump();
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), ParseError> {
        let t = self.expect(TokenKind::Ident)?;
        Ok((self.token_text(t).to_string(), t.span))
    }

    // ----- file structure -----

    fn file(&mut self, source: FileId) -> Result<AstFileId, ParseError> {
        let file_start = self.here();
        self.skip_semis();
        self.expect(TokenKind::KwPackage)?;
        let (package_name, package_span) = self.expect_ident()?;
        self.skip_semis();

        let mut imports = Vec::new();
        while self.at(TokenKind::KwImport) {
            self.bump();
            if self.eat(TokenKind::LParen) {
                self.skip_semis();
                while !self.at(TokenKind::RParen) {
                    imports.push(self.import_spec()?);
                    self.skip_semis();
                }
                self.expect(TokenKind::RParen)?;
            } else {
                imports.push(self.import_spec()?);
            }
            self.skip_semis();
        }

        let mut decls = Vec::new();
        while !self.at(TokenKind::Eof) {
            decls.push(self.top_level_decl()?);
            self.skip_semis();
        }

        let span = file_start.to(self.here());
        Ok(self.ast.alloc_file(AstFile {
            source,
            package_name,
            package_span,
            imports,
            decls,
            span,
        }))
    }

    fn import_spec(&mut self) -> Result<Import, ParseError> {
        let start = self.here();
        let alias = if self.at(TokenKind::Ident) {
            let (name, _) = self.expect_ident()?;
            Some(name)
        } else {
            None
        };
        let t = self.expect(TokenKind::String)?;
        let raw = self.token_text(t);
        let path = raw[1..raw.len() - 1].to_string();
        Ok(Import {
            alias,
            path,
            span: start.to(t.span),
        })
    }

    fn top_level_decl(&mut self) -> Result<DeclId, ParseError> {
        match self.peek() {
            TokenKind::KwVar => {
                let d = self.var_decl()?;
                Ok(self.ast.alloc_decl(Decl::Var(d)))
            }
            TokenKind::KwConst => {
                let d = self.var_decl()?;
                Ok(self.ast.alloc_decl(Decl::Const(d)))
            }
            TokenKind::KwType => {
                let d = self.type_decl()?;
                Ok(self.ast.alloc_decl(Decl::Type(d)))
            }
            TokenKind::KwFunc => {
                let d = self.func_decl()?;
                Ok(self.ast.alloc_decl(Decl::Func(d)))
            }
            other => Err(self.error_here(format!("expected declaration, found {other:?}"))),
        }
    }

    /// `var`/`const` declaration, grouped or single. The leading keyword
    /// is consumed here.
    fn var_decl(&mut self) -> Result<VarDecl, ParseError> {
        let start = self.here();
        self.bump(); // var or const
        if self.eat(TokenKind::LParen) {
            let mut specs = Vec::new();
            self.skip_semis();
            while !self.at(TokenKind::RParen) {
                specs.push(self.var_spec()?);
                self.skip_semis();
            }
            let end = self.expect(TokenKind::RParen)?.span;
            Ok(VarDecl {
                specs,
                grouped: true,
                span: start.to(end),
            })
        } else {
            let spec = self.var_spec()?;
            let span = start.to(spec.span);
            Ok(VarDecl {
                specs: vec![spec],
                grouped: false,
                span,
            })
        }
    }

    fn var_spec(&mut self) -> Result<VarSpec, ParseError> {
        let start = self.here();
        let mut names = Vec::new();
        loop {
            let (name, span) = self.expect_ident()?;
            names.push(self.ast.alloc_expr(Expr::Ident { name, span }));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        let ty = if !self.at(TokenKind::Eq) && !self.at(TokenKind::Semi) && !self.at(TokenKind::RParen)
        {
            Some(self.type_expr()?)
        } else {
            None
        };

        let mut values = Vec::new();
        if self.eat(TokenKind::Eq) {
            loop {
                values.push(self.expr()?);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }

        let end = match (values.last(), &ty) {
            (Some(&v), _) => self.ast.expr(v).span(),
            (None, Some(t)) => self.ast.type_expr(*t).span(),
            (None, None) => self.ast.expr(*names.last().expect("spec has names")).span(),
        };
        Ok(VarSpec {
            names,
            ty,
            values,
            span: start.to(end),
        })
    }

    fn type_decl(&mut self) -> Result<TypeDecl, ParseError> {
        let start = self.here();
        self.expect(TokenKind::KwType)?;
        let (name, name_span) = self.expect_ident()?;
        // Alias form `type A = B` is treated like a definition.
        self.eat(TokenKind::Eq);
        let ty = self.type_expr()?;
        let span = start.to(self.ast.type_expr(ty).span());
        Ok(TypeDecl {
            name,
            name_span,
            ty,
            span,
        })
    }

    fn func_decl(&mut self) -> Result<FuncDecl, ParseError> {
        let start = self.here();
        self.expect(TokenKind::KwFunc)?;

        let recv = if self.at(TokenKind::LParen) {
            // Distinguish a receiver from a parameter list by the token
            // after the matching paren: a receiver is followed by the
            // function name.
            Some(self.receiver()?)
        } else {
            None
        };

        let (name, name_span) = self.expect_ident()?;
        let sig = self.func_sig()?;
        let (body, end) = if self.at(TokenKind::LBrace) {
            let b = self.block()?;
            let end = self.ast.block(b).span;
            (Some(b), end)
        } else {
            (None, name_span)
        };
        Ok(FuncDecl {
            name,
            name_span,
            recv,
            sig,
            body,
            span: start.to(end),
        })
    }

    fn receiver(&mut self) -> Result<Param, ParseError> {
        self.expect(TokenKind::LParen)?;
        let (name, name_span) = self.expect_ident()?;
        let ty = self.type_expr()?;
        self.expect(TokenKind::RParen)?;
        Ok(Param {
            name: Some(name),
            name_span: Some(name_span),
            ty,
        })
    }

    fn func_sig(&mut self) -> Result<FuncSig, ParseError> {
        self.expect(TokenKind::LParen)?;
        let (params, variadic) = self.param_list()?;
        self.expect(TokenKind::RParen)?;

        let results = if self.at(TokenKind::LParen) {
            self.bump();
            let (rs, _) = self.param_list()?;
            self.expect(TokenKind::RParen)?;
            rs
        } else if self.starts_type() {
            let ty = self.type_expr()?;
            vec![Param {
                name: None,
                name_span: None,
                ty,
            }]
        } else {
            Vec::new()
        };

        Ok(FuncSig {
            params,
            results,
            variadic,
        })
    }

    /// Parse a comma-separated parameter list up to (not including) the
    /// closing paren. Go allows either all-named or all-unnamed lists;
    /// `(a, b int)` requires rewriting earlier bare identifiers into
    /// names once a `name type` pair is seen.
    fn param_list(&mut self) -> Result<(Vec<Param>, bool), ParseError> {
        let mut raw: Vec<RawParam> = Vec::new();
        let mut variadic = false;

        while !self.at(TokenKind::RParen) {
            let mut name = None;
            if self.at(TokenKind::Ident) {
                let next = self.peek_at(1);
                let names_a_type = matches!(
                    next,
                    TokenKind::Ident
                        | TokenKind::Star
                        | TokenKind::LBrack
                        | TokenKind::KwMap
                        | TokenKind::KwChan
                        | TokenKind::KwFunc
                        | TokenKind::KwInterface
                        | TokenKind::KwStruct
                        | TokenKind::Ellipsis
                        | TokenKind::Arrow
                );
                if names_a_type {
                    let (n, s) = self.expect_ident()?;
                    name = Some((n, s));
                }
            }
            let this_variadic = self.eat(TokenKind::Ellipsis);
            let ty = self.type_expr()?;
            if this_variadic {
                variadic = true;
            }
            raw.push(RawParam {
                name,
                ty,
                variadic: this_variadic,
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }

        if variadic && raw.last().map(|r| !r.variadic).unwrap_or(false) {
            return Err(self.error_here("variadic parameter must be last"));
        }

        // Named/unnamed fix-up: `(a, b int)` parses `a` as an unnamed
        // bare type first; once any element is named, bare-name elements
        // take the declared type of the next named element.
        let any_named = raw.iter().any(|r| r.name.is_some());
        let mut params = Vec::with_capacity(raw.len());
        if any_named {
            let mut carried: Option<TypeExprId> = None;
            for r in raw.into_iter().rev() {
                match r.name {
                    Some((name, name_span)) => {
                        carried = Some(r.ty);
                        params.push(Param {
                            name: Some(name),
                            name_span: Some(name_span),
                            ty: r.ty,
                        });
                    }
                    None => {
                        let (name, name_span) = match self.ast.type_expr(r.ty) {
                            TypeExpr::Name {
                                pkg: None,
                                name,
                                span,
                            } => (name.clone(), *span),
                            _ => return Err(self.error_here("mixed named and unnamed parameters")),
                        };
                        let ty = carried
                            .ok_or_else(|| self.error_here("parameter group without a type"))?;
                        params.push(Param {
                            name: Some(name),
                            name_span: Some(name_span),
                            ty,
                        });
                    }
                }
            }
            params.reverse();
        } else {
            for r in raw {
                params.push(Param {
                    name: None,
                    name_span: None,
                    ty: r.ty,
                });
            }
        }
        Ok((params, variadic))
    }

    fn starts_type(&self) -> bool {
        matches!(
            self.peek(),
            TokenKind::Ident
                | TokenKind::Star
                | TokenKind::LBrack
                | TokenKind::KwMap
                | TokenKind::KwChan
                | TokenKind::KwFunc
                | TokenKind::KwInterface
                | TokenKind::KwStruct
                | TokenKind::Arrow
        )
    }

    // ----- types -----

    fn type_expr(&mut self) -> Result<TypeExprId, ParseError> {
        let start = self.here();
        match self.peek() {
            TokenKind::Ident => {
                let (first, first_span) = self.expect_ident()?;
                if self.at(TokenKind::Dot) {
                    self.bump();
                    let (name, name_span) = self.expect_ident()?;
                    Ok(self.ast.alloc_type(TypeExpr::Name {
                        pkg: Some(first),
                        name,
                        span: first_span.to(name_span),
                    }))
                } else {
                    Ok(self.ast.alloc_type(TypeExpr::Name {
                        pkg: None,
                        name: first,
                        span: first_span,
                    }))
                }
            }
            TokenKind::Star => {
                self.bump();
                let elem = self.type_expr()?;
                let span = start.to(self.ast.type_expr(elem).span());
                Ok(self.ast.alloc_type(TypeExpr::Pointer { elem, span }))
            }
            TokenKind::LBrack => {
                self.bump();
                if self.eat(TokenKind::RBrack) {
                    let elem = self.type_expr()?;
                    let span = start.to(self.ast.type_expr(elem).span());
                    Ok(self.ast.alloc_type(TypeExpr::Slice { elem, span }))
                } else {
                    let len_tok = self.expect(TokenKind::Int)?;
                    let len = self.token_text(len_tok).to_string();
                    self.expect(TokenKind::RBrack)?;
                    let elem = self.type_expr()?;
                    let span = start.to(self.ast.type_expr(elem).span());
                    Ok(self.ast.alloc_type(TypeExpr::Array { len, elem, span }))
                }
            }
            TokenKind::KwMap => {
                self.bump();
                self.expect(TokenKind::LBrack)?;
                let key = self.type_expr()?;
                self.expect(TokenKind::RBrack)?;
                let value = self.type_expr()?;
                let span = start.to(self.ast.type_expr(value).span());
                Ok(self.ast.alloc_type(TypeExpr::Map { key, value, span }))
            }
            TokenKind::KwChan => {
                self.bump();
                let dir = if self.eat(TokenKind::Arrow) {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let elem = self.type_expr()?;
                let span = start.to(self.ast.type_expr(elem).span());
                Ok(self.ast.alloc_type(TypeExpr::Chan { dir, elem, span }))
            }
            TokenKind::Arrow => {
                self.bump();
                self.expect(TokenKind::KwChan)?;
                let elem = self.type_expr()?;
                let span = start.to(self.ast.type_expr(elem).span());
                Ok(self.ast.alloc_type(TypeExpr::Chan {
                    dir: ChanDir::Recv,
                    elem,
                    span,
                }))
            }
            TokenKind::KwFunc => {
                self.bump();
                let sig = self.func_sig()?;
                let span = start.to(self.tokens[self.pos.saturating_sub(1)].span);
                Ok(self.ast.alloc_type(TypeExpr::Func { sig, span }))
            }
            TokenKind::KwInterface => {
                self.bump();
                self.expect(TokenKind::LBrace)?;
                let mut methods = Vec::new();
                self.skip_semis();
                while !self.at(TokenKind::RBrace) {
                    let (name, name_span) = self.expect_ident()?;
                    let sig = self.func_sig()?;
                    methods.push(MethodField {
                        name,
                        name_span,
                        sig,
                    });
                    self.skip_semis();
                }
                let end = self.expect(TokenKind::RBrace)?.span;
                Ok(self.ast.alloc_type(TypeExpr::Interface {
                    methods,
                    span: start.to(end),
                }))
            }
            TokenKind::KwStruct => {
                self.bump();
                self.expect(TokenKind::LBrace)?;
                let mut fields = Vec::new();
                self.skip_semis();
                while !self.at(TokenKind::RBrace) {
                    fields.push(self.struct_field()?);
                    self.skip_semis();
                }
                let end = self.expect(TokenKind::RBrace)?.span;
                Ok(self.ast.alloc_type(TypeExpr::Struct {
                    fields,
                    span: start.to(end),
                }))
            }
            other => Err(self.error_here(format!("expected type, found {other:?}"))),
        }
    }

    fn struct_field(&mut self) -> Result<StructField, ParseError> {
        let start = self.here();
        let mut names = Vec::new();
        loop {
            let (name, _) = self.expect_ident()?;
            names.push(name);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        let ty = self.type_expr()?;
        let mut end = self.ast.type_expr(ty).span();
        let tag = if self.at(TokenKind::String) || self.at(TokenKind::RawString) {
            let t = self.bump();
            end = t.span;
            let raw = self.token_text(t);
            Some(unquote_tag(raw))
        } else {
            None
        };
        Ok(StructField {
            names,
            ty,
            tag,
            span: start.to(end),
        })
    }

    // ----- statements -----

    fn block(&mut self) -> Result<BlockId, ParseError> {
        let start = self.expect(TokenKind::LBrace)?.span;
        let mut stmts = Vec::new();
        self.skip_semis();
        while !self.at(TokenKind::RBrace) {
            stmts.push(self.stmt()?);
            self.skip_semis();
        }
        let end = self.expect(TokenKind::RBrace)?.span;
        Ok(self.ast.alloc_block(Block {
            stmts,
            span: start.to(end),
        }))
    }

    fn stmt(&mut self) -> Result<StmtId, ParseError> {
        match self.peek() {
            TokenKind::KwVar => {
                let d = self.var_decl()?;
                Ok(self.ast.alloc_stmt(Stmt::Var(d)))
            }
            TokenKind::KwConst => {
                let d = self.var_decl()?;
                Ok(self.ast.alloc_stmt(Stmt::Const(d)))
            }
            TokenKind::KwReturn => {
                let start = self.bump().span;
                let mut results = Vec::new();
                if !self.at(TokenKind::Semi) && !self.at(TokenKind::RBrace) {
                    loop {
                        results.push(self.expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                }
                let end = results
                    .last()
                    .map(|&e| self.ast.expr(e).span())
                    .unwrap_or(start);
                Ok(self.ast.alloc_stmt(Stmt::Return {
                    results,
                    span: start.to(end),
                }))
            }
            TokenKind::KwIf => self.if_stmt(),
            TokenKind::KwFor => self.for_stmt(),
            TokenKind::LBrace => {
                let b = self.block()?;
                Ok(self.ast.alloc_stmt(Stmt::Block(b)))
            }
            TokenKind::KwGo | TokenKind::KwDefer => {
                let start = self.here();
                let deferred = self.bump().kind == TokenKind::KwDefer;
                let call = self.expr()?;
                let span = start.to(self.ast.expr(call).span());
                Ok(self.ast.alloc_stmt(Stmt::Spawn {
                    deferred,
                    call,
                    span,
                }))
            }
            TokenKind::KwBreak | TokenKind::KwContinue => {
                let t = self.bump();
                Ok(self.ast.alloc_stmt(Stmt::Branch {
                    is_break: t.kind == TokenKind::KwBreak,
                    span: t.span,
                }))
            }
            _ => self.simple_stmt(),
        }
    }

    /// Expression statement, assignment, short var declaration or
    /// increment/decrement.
    fn simple_stmt(&mut self) -> Result<StmtId, ParseError> {
        let start = self.here();
        let mut exprs = vec![self.expr()?];
        while self.eat(TokenKind::Comma) {
            exprs.push(self.expr()?);
        }

        match self.peek() {
            TokenKind::ColonEq => {
                self.bump();
                let mut values = vec![self.expr()?];
                while self.eat(TokenKind::Comma) {
                    values.push(self.expr()?);
                }
                let span = start.to(self.ast.expr(*values.last().expect("values")).span());
                Ok(self.ast.alloc_stmt(Stmt::ShortVar {
                    names: exprs,
                    values,
                    span,
                }))
            }
            TokenKind::Eq => {
                self.bump();
                let mut rhs = vec![self.expr()?];
                while self.eat(TokenKind::Comma) {
                    rhs.push(self.expr()?);
                }
                let span = start.to(self.ast.expr(*rhs.last().expect("rhs")).span());
                Ok(self.ast.alloc_stmt(Stmt::Assign {
                    lhs: exprs,
                    rhs,
                    span,
                }))
            }
            TokenKind::Inc | TokenKind::Dec => {
                let t = self.bump();
                if exprs.len() != 1 {
                    return Err(self.error_here("++/-- requires a single operand"));
                }
                Ok(self.ast.alloc_stmt(Stmt::IncDec {
                    expr: exprs[0],
                    inc: t.kind == TokenKind::Inc,
                    span: start.to(t.span),
                }))
            }
            _ => {
                if exprs.len() != 1 {
                    return Err(self.error_here("expected := or = after expression list"));
                }
                Ok(self.ast.alloc_stmt(Stmt::Expr(exprs[0])))
            }
        }
    }

    fn if_stmt(&mut self) -> Result<StmtId, ParseError> {
        let start = self.expect(TokenKind::KwIf)?.span;
        let first = self.simple_stmt()?;
        let (init, cond) = if self.eat(TokenKind::Semi) {
            let cond = self.expr()?;
            (Some(first), cond)
        } else {
            match *self.ast.stmt(first) {
                Stmt::Expr(e) => (None, e),
                _ => return Err(self.error_here("expected condition expression")),
            }
        };
        let then = self.block()?;
        let mut end = self.ast.block(then).span;
        let els = if self.eat(TokenKind::KwElse) {
            let s = if self.at(TokenKind::KwIf) {
                self.if_stmt()?
            } else {
                let b = self.block()?;
                self.ast.alloc_stmt(Stmt::Block(b))
            };
            end = self.tokens[self.pos.saturating_sub(1)].span;
            Some(s)
        } else {
            None
        };
        Ok(self.ast.alloc_stmt(Stmt::If {
            init,
            cond,
            then,
            els,
            span: start.to(end),
        }))
    }

    fn for_stmt(&mut self) -> Result<StmtId, ParseError> {
        let start = self.expect(TokenKind::KwFor)?.span;
        if self.at(TokenKind::LBrace) {
            let body = self.block()?;
            let span = start.to(self.ast.block(body).span);
            return Ok(self.ast.alloc_stmt(Stmt::For {
                init: None,
                cond: None,
                post: None,
                body,
                span,
            }));
        }

        let first = self.simple_stmt()?;
        if self.eat(TokenKind::Semi) {
            let cond = if self.at(TokenKind::Semi) {
                None
            } else {
                Some(self.expr()?)
            };
            self.expect(TokenKind::Semi)?;
            let post = if self.at(TokenKind::LBrace) {
                None
            } else {
                Some(self.simple_stmt()?)
            };
            let body = self.block()?;
            let span = start.to(self.ast.block(body).span);
            Ok(self.ast.alloc_stmt(Stmt::For {
                init: Some(first),
                cond,
                post,
                body,
                span,
            }))
        } else {
            let cond = match *self.ast.stmt(first) {
                Stmt::Expr(e) => e,
                _ => return Err(self.error_here("expected loop condition")),
            };
            let body = self.block()?;
            let span = start.to(self.ast.block(body).span);
            Ok(self.ast.alloc_stmt(Stmt::For {
                init: None,
                cond: Some(cond),
                post: None,
                body,
                span,
            }))
        }
    }

    // ----- expressions -----

    fn expr(&mut self) -> Result<ExprId, ParseError> {
        self.binary_expr(0)
    }

    fn binary_expr(&mut self, min_prec: u8) -> Result<ExprId, ParseError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let (op, prec) = match self.peek() {
                TokenKind::OrOr => (BinaryOp::LogOr, 1),
                TokenKind::AndAnd => (BinaryOp::LogAnd, 2),
                TokenKind::EqEq => (BinaryOp::Eq, 3),
                TokenKind::NotEq => (BinaryOp::NotEq, 3),
                TokenKind::Lt => (BinaryOp::Lt, 3),
                TokenKind::LtEq => (BinaryOp::LtEq, 3),
                TokenKind::Gt => (BinaryOp::Gt, 3),
                TokenKind::GtEq => (BinaryOp::GtEq, 3),
                TokenKind::Plus => (BinaryOp::Add, 4),
                TokenKind::Minus => (BinaryOp::Sub, 4),
                TokenKind::Pipe => (BinaryOp::Or, 4),
                TokenKind::Caret => (BinaryOp::Xor, 4),
                TokenKind::Star => (BinaryOp::Mul, 5),
                TokenKind::Slash => (BinaryOp::Div, 5),
                TokenKind::Percent => (BinaryOp::Rem, 5),
                TokenKind::Shl => (BinaryOp::Shl, 5),
                TokenKind::Shr => (BinaryOp::Shr, 5),
                TokenKind::Amp => (BinaryOp::And, 5),
                _ => break,
            };
            if prec < min_prec {
                break;
            }
            self.bump();
            let rhs = self.binary_expr(prec + 1)?;
            let span = self.ast.expr(lhs).span().to(self.ast.expr(rhs).span());
            lhs = self.ast.alloc_expr(Expr::Binary { op, lhs, rhs, span });
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> Result<ExprId, ParseError> {
        let start = self.here();
        let op = match self.peek() {
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::Star => Some(UnaryOp::Deref),
            TokenKind::Amp => Some(UnaryOp::Addr),
            TokenKind::Arrow => {
                // `<-chan T` in value position is a type literal, not a
                // channel receive.
                if self.peek_at(1) == TokenKind::KwChan {
                    let ty = self.type_expr()?;
                    let span = self.ast.type_expr(ty).span();
                    return Ok(self.ast.alloc_expr(Expr::TypeLit { ty, span }));
                }
                Some(UnaryOp::Recv)
            }
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.unary_expr()?;
            let span = start.to(self.ast.expr(operand).span());
            return Ok(self.ast.alloc_expr(Expr::Unary { op, operand, span }));
        }
        self.postfix_expr()
    }

    fn postfix_expr(&mut self) -> Result<ExprId, ParseError> {
        let mut e = self.primary_expr()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.bump();
                    let (sel, sel_span) = self.expect_ident()?;
                    let span = self.ast.expr(e).span().to(sel_span);
                    e = self.ast.alloc_expr(Expr::Selector {
                        base: e,
                        sel,
                        sel_span,
                        span,
                    });
                }
                TokenKind::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    while !self.at(TokenKind::RParen) {
                        args.push(self.expr()?);
                        if !self.eat(TokenKind::Comma) {
                            break;
                        }
                    }
                    let end = self.expect(TokenKind::RParen)?.span;
                    let span = self.ast.expr(e).span().to(end);
                    e = self.ast.alloc_expr(Expr::Call { fun: e, args, span });
                }
                TokenKind::LBrack => {
                    self.bump();
                    let index = self.expr()?;
                    let end = self.expect(TokenKind::RBrack)?.span;
                    let span = self.ast.expr(e).span().to(end);
                    e = self.ast.alloc_expr(Expr::Index {
                        base: e,
                        index,
                        span,
                    });
                }
                _ => return Ok(e),
            }
        }
    }

    fn primary_expr(&mut self) -> Result<ExprId, ParseError> {
        let start = self.here();
        match self.peek() {
            TokenKind::Ident => {
                let t = self.bump();
                Ok(self.ast.alloc_expr(Expr::Ident {
                    name: self.token_text(t).to_string(),
                    span: t.span,
                }))
            }
            TokenKind::Int => {
                let t = self.bump();
                Ok(self.ast.alloc_expr(Expr::IntLit {
                    text: self.token_text(t).to_string(),
                    span: t.span,
                }))
            }
            TokenKind::Float => {
                let t = self.bump();
                Ok(self.ast.alloc_expr(Expr::FloatLit {
                    text: self.token_text(t).to_string(),
                    span: t.span,
                }))
            }
            TokenKind::String | TokenKind::RawString => {
                let t = self.bump();
                Ok(self.ast.alloc_expr(Expr::StringLit {
                    text: self.token_text(t).to_string(),
                    span: t.span,
                }))
            }
            TokenKind::Rune => {
                let t = self.bump();
                Ok(self.ast.alloc_expr(Expr::RuneLit {
                    text: self.token_text(t).to_string(),
                    span: t.span,
                }))
            }
            TokenKind::LParen => {
                self.bump();
                let inner = self.expr()?;
                let end = self.expect(TokenKind::RParen)?.span;
                Ok(self.ast.alloc_expr(Expr::Paren {
                    inner,
                    span: start.to(end),
                }))
            }
            TokenKind::KwFunc => {
                self.bump();
                let sig = self.func_sig()?;
                if self.at(TokenKind::LBrace) {
                    let body = self.block()?;
                    let span = start.to(self.ast.block(body).span);
                    Ok(self.ast.alloc_expr(Expr::FuncLit { sig, body, span }))
                } else {
                    let span = start.to(self.tokens[self.pos.saturating_sub(1)].span);
                    let ty = self.ast.alloc_type(TypeExpr::Func { sig, span });
                    Ok(self.ast.alloc_expr(Expr::TypeLit { ty, span }))
                }
            }
            TokenKind::LBrack
            | TokenKind::KwMap
            | TokenKind::KwChan
            | TokenKind::KwInterface
            | TokenKind::KwStruct => {
                let ty = self.type_expr()?;
                let span = self.ast.type_expr(ty).span();
                Ok(self.ast.alloc_expr(Expr::TypeLit { ty, span }))
            }
            other => Err(self.error_here(format!("expected expression, found {other:?}"))),
        }
    }
}

/// Strip the surrounding backticks or quotes from a struct tag literal.
fn unquote_tag(raw: &str) -> String {
    if raw.starts_with('`') {
        raw[1..raw.len() - 1].to_string()
    } else {
        // Interpreted string: undo the escapes produced by tag quoting.
        let inner = &raw[1..raw.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(n) = chars.next() {
                    match n {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        _ => out.push(n),
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> (Ast, AstFileId) {
        let mut ast = Ast::new();
        let id = parse_file(&mut ast, FileId(0), src).expect("parse");
        (ast, id)
    }

    #[test]
    fn parses_package_and_imports() {
        let (ast, id) = parse("package main\n\nimport (\n\tz \"go.uber.org/zap\"\n\t\"fmt\"\n)\n");
        let f = ast.file(id);
        assert_eq!(f.package_name, "main");
        assert_eq!(f.imports.len(), 2);
        assert_eq!(f.imports[0].local_name(), "z");
        assert_eq!(f.imports[1].local_name(), "fmt");
        assert_eq!(f.imports[1].path, "fmt");
    }

    #[test]
    fn parses_var_decl_forms() {
        let (ast, id) = parse(
            "package p\n\nvar a *T\nvar b = nil\nvar (\n\tc, d int\n\te error\n)\n\ntype T struct {\n\tN int\n\tm *int\n}\n",
        );
        let f = ast.file(id);
        assert_eq!(f.decls.len(), 4);
        match ast.decl(f.decls[2]) {
            Decl::Var(d) => {
                assert!(d.grouped);
                assert_eq!(d.specs.len(), 2);
                assert_eq!(d.specs[0].names.len(), 2);
                assert!(d.specs[0].values.is_empty());
            }
            other => panic!("expected var group, got {other:?}"),
        }
    }

    #[test]
    fn parses_func_with_results_and_body() {
        let (ast, id) = parse(
            "package p\n\nfunc h(n int) *T {\n\tif n%2 == 0 {\n\t\treturn gt\n\t}\n\treturn new(T)\n}\n",
        );
        let f = ast.file(id);
        match ast.decl(f.decls[0]) {
            Decl::Func(fd) => {
                assert_eq!(fd.name, "h");
                assert_eq!(fd.sig.params.len(), 1);
                assert_eq!(fd.sig.params[0].name.as_deref(), Some("n"));
                assert_eq!(fd.sig.results.len(), 1);
                assert!(fd.body.is_some());
            }
            other => panic!("expected func, got {other:?}"),
        }
    }

    #[test]
    fn parses_grouped_parameter_names() {
        let (ast, id) = parse("package p\n\nfunc f(a, b int, c string) {}\n");
        let f = ast.file(id);
        match ast.decl(f.decls[0]) {
            Decl::Func(fd) => {
                let names: Vec<_> = fd
                    .sig
                    .params
                    .iter()
                    .map(|p| p.name.as_deref().unwrap().to_string())
                    .collect();
                assert_eq!(names, vec!["a", "b", "c"]);
            }
            other => panic!("expected func, got {other:?}"),
        }
    }

    #[test]
    fn parses_variadic_interface_type() {
        let mut ast = Ast::new();
        let id = parse_type_expr(&mut ast, "interface{ F(int, ...string) (int) }").expect("type");
        match ast.type_expr(id) {
            TypeExpr::Interface { methods, .. } => {
                assert_eq!(methods.len(), 1);
                assert_eq!(methods[0].name, "F");
                assert!(methods[0].sig.variadic);
                assert_eq!(methods[0].sig.params.len(), 2);
                assert_eq!(methods[0].sig.results.len(), 1);
            }
            other => panic!("expected interface, got {other:?}"),
        }
    }

    #[test]
    fn parses_struct_tag() {
        let mut ast = Ast::new();
        let id =
            parse_type_expr(&mut ast, "struct{ N int \"json:\\\"n\\\"\"; S string }").expect("type");
        match ast.type_expr(id) {
            TypeExpr::Struct { fields, .. } => {
                assert_eq!(fields.len(), 2);
                assert_eq!(fields[0].tag.as_deref(), Some("json:\"n\""));
                assert_eq!(fields[1].tag, None);
            }
            other => panic!("expected struct, got {other:?}"),
        }
    }

    #[test]
    fn parses_chan_directions() {
        let mut ast = Ast::new();
        for (src, dir) in [
            ("chan int", ChanDir::Both),
            ("chan<- int", ChanDir::Send),
            ("<-chan int", ChanDir::Recv),
        ] {
            let id = parse_type_expr(&mut ast, src).expect(src);
            match ast.type_expr(id) {
                TypeExpr::Chan { dir: d, .. } => assert_eq!(*d, dir, "{src}"),
                other => panic!("expected chan for {src}, got {other:?}"),
            }
        }
    }

    #[test]
    fn parses_selector_call_chain() {
        let (ast, id) = parse("package p\n\nfunc main() {\n\tprintln(iface.F(10, \"a\"))\n}\n");
        let f = ast.file(id);
        match ast.decl(f.decls[0]) {
            Decl::Func(fd) => {
                let body = ast.block(fd.body.unwrap());
                assert_eq!(body.stmts.len(), 1);
            }
            other => panic!("expected func, got {other:?}"),
        }
    }

    #[test]
    fn parses_short_var_and_if_init() {
        let (_, _) = parse(
            "package p\n\nfunc f() {\n\tt2 := h(2)\n\tif v := g(); v != nil {\n\t\tprintln(t2)\n\t}\n}\n",
        );
    }

    #[test]
    fn parses_func_literal() {
        let (ast, id) = parse("package p\n\nvar f = func(x int) int {\n\treturn x\n}\n");
        let f = ast.file(id);
        match ast.decl(f.decls[0]) {
            Decl::Var(d) => match ast.expr(d.specs[0].values[0]) {
                Expr::FuncLit { sig, .. } => assert_eq!(sig.params.len(), 1),
                other => panic!("expected func literal, got {other:?}"),
            },
            other => panic!("expected var, got {other:?}"),
        }
    }

    #[test]
    fn rejects_garbage() {
        let mut ast = Ast::new();
        assert!(parse_file(&mut ast, FileId(0), "package p\n\nvar = 3\n").is_err());
        assert!(parse_type_expr(&mut ast, "struct{").is_err());
    }
}
