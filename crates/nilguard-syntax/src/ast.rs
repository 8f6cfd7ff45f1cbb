//! AST arena for the Go subset.
//!
//! Nodes live in one arena per load so that side tables (types, object
//! resolution, SSA values) can key on plain ids. The rewriter allocates
//! replacement nodes into the same arena.

use crate::source::{FileId, Span};

macro_rules! arena_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);
    };
}

arena_id!(ExprId);
arena_id!(StmtId);
arena_id!(TypeExprId);
arena_id!(DeclId);
arena_id!(BlockId);
arena_id!(AstFileId);

/// One parsed (or synthesized) source file.
#[derive(Debug, Clone)]
pub struct AstFile {
    pub source: FileId,
    pub package_name: String,
    pub package_span: Span,
    pub imports: Vec<Import>,
    pub decls: Vec<DeclId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Import {
    pub alias: Option<String>,
    /// Import path without quotes.
    pub path: String,
    pub span: Span,
}

impl Import {
    /// Name the import binds in file scope: the alias, or the final
    /// path component.
    pub fn local_name(&self) -> &str {
        match &self.alias {
            Some(a) => a,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Decl {
    Var(VarDecl),
    Const(VarDecl),
    Type(TypeDecl),
    Func(FuncDecl),
}

/// `var` declaration, possibly a parenthesized group.
#[derive(Debug, Clone)]
pub struct VarDecl {
    pub specs: Vec<VarSpec>,
    pub grouped: bool,
    pub span: Span,
}

/// One `names [type] [= values]` spec inside a var declaration.
#[derive(Debug, Clone)]
pub struct VarSpec {
    /// Identifier expressions, one per declared name.
    pub names: Vec<ExprId>,
    pub ty: Option<TypeExprId>,
    pub values: Vec<ExprId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub name: String,
    pub name_span: Span,
    pub ty: TypeExprId,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub name: String,
    pub name_span: Span,
    pub recv: Option<Param>,
    pub sig: FuncSig,
    pub body: Option<BlockId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FuncSig {
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    /// Last parameter is `...T`.
    pub variadic: bool,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Option<String>,
    pub name_span: Option<Span>,
    pub ty: TypeExprId,
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<StmtId>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var(VarDecl),
    Const(VarDecl),
    ShortVar {
        names: Vec<ExprId>,
        values: Vec<ExprId>,
        span: Span,
    },
    Assign {
        lhs: Vec<ExprId>,
        rhs: Vec<ExprId>,
        span: Span,
    },
    Expr(ExprId),
    Return {
        results: Vec<ExprId>,
        span: Span,
    },
    If {
        init: Option<StmtId>,
        cond: ExprId,
        then: BlockId,
        /// Block statement or a chained `if`.
        els: Option<StmtId>,
        span: Span,
    },
    For {
        init: Option<StmtId>,
        cond: Option<ExprId>,
        post: Option<StmtId>,
        body: BlockId,
        span: Span,
    },
    Block(BlockId),
    IncDec {
        expr: ExprId,
        inc: bool,
        span: Span,
    },
    /// `go` or `defer` call statement.
    Spawn {
        deferred: bool,
        call: ExprId,
        span: Span,
    },
    /// `break` or `continue`.
    Branch {
        is_break: bool,
        span: Span,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,   // -
    Not,   // !
    Deref, // *
    Addr,  // &
    Recv,  // <-
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    LogAnd,
    LogOr,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Ident {
        name: String,
        span: Span,
    },
    IntLit {
        text: String,
        span: Span,
    },
    FloatLit {
        text: String,
        span: Span,
    },
    /// Literal text as written, quotes included.
    StringLit {
        text: String,
        span: Span,
    },
    RuneLit {
        text: String,
        span: Span,
    },
    Selector {
        base: ExprId,
        sel: String,
        sel_span: Span,
        span: Span,
    },
    Call {
        fun: ExprId,
        args: Vec<ExprId>,
        span: Span,
    },
    Index {
        base: ExprId,
        index: ExprId,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: ExprId,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
        span: Span,
    },
    Paren {
        inner: ExprId,
        span: Span,
    },
    FuncLit {
        sig: FuncSig,
        body: BlockId,
        span: Span,
    },
    /// A type expression in value position (argument of `new`/`make`).
    TypeLit {
        ty: TypeExprId,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Ident { span, .. }
            | Expr::IntLit { span, .. }
            | Expr::FloatLit { span, .. }
            | Expr::StringLit { span, .. }
            | Expr::RuneLit { span, .. }
            | Expr::Selector { span, .. }
            | Expr::Call { span, .. }
            | Expr::Index { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Paren { span, .. }
            | Expr::FuncLit { span, .. }
            | Expr::TypeLit { span, .. } => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChanDir {
    Both,
    Send,
    Recv,
}

#[derive(Debug, Clone)]
pub struct MethodField {
    pub name: String,
    pub name_span: Span,
    pub sig: FuncSig,
}

#[derive(Debug, Clone)]
pub struct StructField {
    pub names: Vec<String>,
    pub ty: TypeExprId,
    /// Tag content without surrounding quotes/backticks.
    pub tag: Option<String>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    /// `T` or `pkg.T`.
    Name {
        pkg: Option<String>,
        name: String,
        span: Span,
    },
    Pointer {
        elem: TypeExprId,
        span: Span,
    },
    Slice {
        elem: TypeExprId,
        span: Span,
    },
    Array {
        len: String,
        elem: TypeExprId,
        span: Span,
    },
    Map {
        key: TypeExprId,
        value: TypeExprId,
        span: Span,
    },
    Chan {
        dir: ChanDir,
        elem: TypeExprId,
        span: Span,
    },
    Func {
        sig: FuncSig,
        span: Span,
    },
    Interface {
        methods: Vec<MethodField>,
        span: Span,
    },
    Struct {
        fields: Vec<StructField>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Name { span, .. }
            | TypeExpr::Pointer { span, .. }
            | TypeExpr::Slice { span, .. }
            | TypeExpr::Array { span, .. }
            | TypeExpr::Map { span, .. }
            | TypeExpr::Chan { span, .. }
            | TypeExpr::Func { span, .. }
            | TypeExpr::Interface { span, .. }
            | TypeExpr::Struct { span, .. } => *span,
        }
    }
}

/// Arena holding every node of a load.
#[derive(Debug, Default, Clone)]
pub struct Ast {
    pub exprs: Vec<Expr>,
    pub stmts: Vec<Stmt>,
    pub types: Vec<TypeExpr>,
    pub decls: Vec<Decl>,
    pub blocks: Vec<Block>,
    pub files: Vec<AstFile>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_expr(&mut self, e: Expr) -> ExprId {
        self.exprs.push(e);
        ExprId(self.exprs.len() as u32 - 1)
    }

    pub fn alloc_stmt(&mut self, s: Stmt) -> StmtId {
        self.stmts.push(s);
        StmtId(self.stmts.len() as u32 - 1)
    }

    pub fn alloc_type(&mut self, t: TypeExpr) -> TypeExprId {
        self.types.push(t);
        TypeExprId(self.types.len() as u32 - 1)
    }

    pub fn alloc_decl(&mut self, d: Decl) -> DeclId {
        self.decls.push(d);
        DeclId(self.decls.len() as u32 - 1)
    }

    pub fn alloc_block(&mut self, b: Block) -> BlockId {
        self.blocks.push(b);
        BlockId(self.blocks.len() as u32 - 1)
    }

    pub fn alloc_file(&mut self, f: AstFile) -> AstFileId {
        self.files.push(f);
        AstFileId(self.files.len() as u32 - 1)
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn stmt(&self, id: StmtId) -> &Stmt {
        &self.stmts[id.0 as usize]
    }

    pub fn type_expr(&self, id: TypeExprId) -> &TypeExpr {
        &self.types[id.0 as usize]
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0 as usize]
    }

    pub fn file(&self, id: AstFileId) -> &AstFile {
        &self.files[id.0 as usize]
    }

    /// Identifier name if the expression is a plain identifier.
    pub fn as_ident(&self, id: ExprId) -> Option<&str> {
        match self.expr(id) {
            Expr::Ident { name, .. } => Some(name),
            _ => None,
        }
    }
}
