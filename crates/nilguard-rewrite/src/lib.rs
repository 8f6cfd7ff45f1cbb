//! The nil-less rewrite.
//!
//! Every `nil` literal in a value declaration or return statement, and
//! every implicit zero-value declaration, is replaced by a reference to
//! a named synthetic declaration. Pointer-kind types get a global
//! variable (`NilDecl`), inhabited types a zero constructor
//! (`ZeroDecl`). The rewritten tree is written to a scratch directory,
//! a companion declarations file is emitted per package, and the whole
//! scratch tree is re-loaded so that positions and resolution metadata
//! refer to what the analysis actually sees.

pub mod render;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use nilguard_load::{load, LoadConfig, LoadError, Package, Program};
use nilguard_syntax::{
    parse_type_expr, printer, Ast, AstFile, AstFileId, Block, BlockId, Decl, DeclId, Expr, ExprId,
    SourceMap, Span, Stmt, StmtId, VarDecl, VarSpec,
};
use nilguard_types::{can_point, ObjKind, ObjectArena, Type, TypeId, TypeInfo, TypeStore};

use render::{RenderError, TypeRenderer};

#[derive(Debug, thiserror::Error)]
pub enum RewriteError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("rewrite: {0}")]
    Rewrite(String),
    #[error("reload of rewritten tree failed: {0}")]
    Reload(#[source] LoadError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outcome of the rewrite: the re-loaded program plus the synthetic
/// name sets the propagation stage keys on.
pub struct RewriteResult {
    scratch: Option<tempfile::TempDir>,
    pub scratch_path: PathBuf,
    pub program: Program,
    /// Names of synthetic nil declarations.
    pub is_nil: HashSet<String>,
    /// Names of synthetic zero constructors.
    pub is_zero: HashSet<String>,
}

impl RewriteResult {
    /// Remove the scratch tree, reporting any I/O error. Dropping the
    /// result also removes it, silently.
    pub fn close(&mut self) -> std::io::Result<()> {
        match self.scratch.take() {
            Some(d) => d.close(),
            None => Ok(()),
        }
    }
}

/// Load the program under `cfg`, rewrite it nil-less into a scratch
/// directory, and re-load the scratch tree.
pub fn rewrite_and_reload(
    cfg: &LoadConfig,
    patterns: &[String],
) -> Result<RewriteResult, RewriteError> {
    let source = load(cfg, patterns)?;
    let scratch = tempfile::Builder::new().prefix("nilguard-").tempdir()?;
    tracing::debug!(scratch = %scratch.path().display(), "rewriting into scratch tree");

    fs::copy(&source.module.manifest, scratch.path().join("go.mod"))?;

    let mut is_nil = HashSet::new();
    let mut is_zero = HashSet::new();

    let Program {
        module: _,
        packages,
        mut ast,
        sources,
        store,
        objects,
        universe: _,
        info,
    } = source;

    for pkg in &packages {
        let mut replacer = Replacer {
            ast: &mut ast,
            info: &info,
            store: &store,
            objects: &objects,
            pkg,
            nil_decls: HashMap::new(),
            zero_decls: HashMap::new(),
            decls: Vec::new(),
            is_nil: &mut is_nil,
            is_zero: &mut is_zero,
            sig_stack: Vec::new(),
        };

        let mut new_files = Vec::with_capacity(pkg.files.len());
        for &fid in &pkg.files {
            new_files.push(replacer.rewrite_file(fid)?);
        }
        let synthetic = std::mem::take(&mut replacer.decls);
        drop(replacer);

        for new_fid in new_files {
            let rel = rel_path_of(&ast, &sources, new_fid);
            let out = scratch.path().join(&rel);
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(out, printer::print_file(&ast, new_fid))?;
        }

        if !synthetic.is_empty() {
            let (name, text) = decls_file(pkg, &synthetic);
            let dir = if pkg.rel_dir.is_empty() {
                scratch.path().to_path_buf()
            } else {
                scratch.path().join(&pkg.rel_dir)
            };
            fs::create_dir_all(&dir)?;
            fs::write(dir.join(name), text)?;
        }
    }

    let reload_cfg = LoadConfig {
        dir: scratch.path().to_path_buf(),
    };
    let program = load(&reload_cfg, patterns).map_err(RewriteError::Reload)?;

    Ok(RewriteResult {
        scratch_path: scratch.path().to_path_buf(),
        scratch: Some(scratch),
        program,
        is_nil,
        is_zero,
    })
}

fn rel_path_of(ast: &Ast, sources: &SourceMap, fid: AstFileId) -> String {
    sources.file(ast.file(fid).source).rel_path.clone()
}

#[derive(Debug, Clone)]
enum SyntheticKind {
    /// `var <name> = <init>`
    Nil { init: String },
    /// `func <name>() (_ <ty>) { return }`
    Zero { ty: String },
}

#[derive(Debug, Clone)]
struct SyntheticDecl {
    name: String,
    kind: SyntheticKind,
    imports: BTreeMap<String, String>,
}

struct Replacer<'a> {
    ast: &'a mut Ast,
    info: &'a TypeInfo,
    store: &'a TypeStore,
    objects: &'a ObjectArena,
    pkg: &'a Package,
    /// Memoized synthetic declarations, keyed by the realized type.
    nil_decls: HashMap<TypeId, String>,
    zero_decls: HashMap<TypeId, String>,
    decls: Vec<SyntheticDecl>,
    is_nil: &'a mut HashSet<String>,
    is_zero: &'a mut HashSet<String>,
    /// Signature types of the functions enclosing the current walk;
    /// function literals push on top of their parent.
    sig_stack: Vec<TypeId>,
}

impl<'a> Replacer<'a> {
    fn rewrite_file(&mut self, fid: AstFileId) -> Result<AstFileId, RewriteError> {
        let file = self.ast.file(fid).clone();
        let mut decls = Vec::with_capacity(file.decls.len());
        for &did in &file.decls {
            decls.push(self.rewrite_decl(did)?);
        }
        Ok(self.ast.alloc_file(AstFile { decls, ..file }))
    }

    fn rewrite_decl(&mut self, did: DeclId) -> Result<DeclId, RewriteError> {
        match self.ast.decl(did).clone() {
            Decl::Var(vd) => {
                let new = self.rewrite_var_decl(&vd)?;
                Ok(self.ast.alloc_decl(Decl::Var(new)))
            }
            Decl::Const(_) | Decl::Type(_) => Ok(did),
            Decl::Func(mut fd) => match fd.body {
                None => Ok(did),
                Some(body) => {
                    let sig = self.info.decl_sigs.get(&did).copied().ok_or_else(|| {
                        RewriteError::Rewrite(format!("no signature for func {}", fd.name))
                    })?;
                    self.sig_stack.push(sig);
                    let new_body = self.rewrite_block(body)?;
                    self.sig_stack.pop();
                    fd.body = Some(new_body);
                    Ok(self.ast.alloc_decl(Decl::Func(fd)))
                }
            },
        }
    }

    fn rewrite_var_decl(&mut self, vd: &VarDecl) -> Result<VarDecl, RewriteError> {
        let mut specs = Vec::with_capacity(vd.specs.len());
        for spec in &vd.specs {
            specs.push(self.rewrite_spec(spec)?);
        }
        Ok(VarDecl {
            specs,
            grouped: vd.grouped,
            span: vd.span,
        })
    }

    /// The two substitution rules for value declarations: replace `nil`
    /// initializers, and give implicit zero declarations one explicit
    /// initializer per name.
    fn rewrite_spec(&mut self, spec: &VarSpec) -> Result<VarSpec, RewriteError> {
        let mut new = spec.clone();
        if !spec.values.is_empty() && spec.names.len() == spec.values.len() {
            for (i, &v) in spec.values.iter().enumerate() {
                new.values[i] = if self.is_nil_ident(v) {
                    let ty = self.type_of(spec.names[i])?;
                    self.nil_value(ty, self.ast.expr(v).span())?
                } else {
                    self.rewrite_expr(v)?
                };
            }
        } else if spec.values.is_empty() {
            new.values = Vec::with_capacity(spec.names.len());
            for &name in &spec.names {
                let ty = self.type_of(name)?;
                let span = self.ast.expr(name).span();
                let value = if can_point(self.store, ty) {
                    self.nil_value(ty, span)?
                } else {
                    self.zero_value(ty, span)?
                };
                new.values.push(value);
            }
        } else {
            for (i, &v) in spec.values.iter().enumerate() {
                new.values[i] = self.rewrite_expr(v)?;
            }
        }
        Ok(new)
    }

    fn type_of(&self, expr: ExprId) -> Result<TypeId, RewriteError> {
        self.info.type_of(expr).ok_or_else(|| {
            RewriteError::Rewrite("declared name has no resolved type".to_string())
        })
    }

    fn is_nil_ident(&self, e: ExprId) -> bool {
        matches!(self.ast.expr(e), Expr::Ident { .. })
            && self
                .info
                .uses
                .get(&e)
                .map(|&o| matches!(self.objects.get(o).kind, ObjKind::Nil))
                .unwrap_or(false)
    }

    fn rewrite_block(&mut self, bid: BlockId) -> Result<BlockId, RewriteError> {
        let block = self.ast.block(bid).clone();
        let mut stmts = Vec::with_capacity(block.stmts.len());
        for &s in &block.stmts {
            stmts.push(self.rewrite_stmt(s)?);
        }
        Ok(self.ast.alloc_block(Block {
            stmts,
            span: block.span,
        }))
    }

    fn rewrite_stmt(&mut self, sid: StmtId) -> Result<StmtId, RewriteError> {
        let new = match self.ast.stmt(sid).clone() {
            Stmt::Var(vd) => Stmt::Var(self.rewrite_var_decl(&vd)?),
            s @ Stmt::Const(_) => s,
            Stmt::ShortVar { names, values, span } => {
                let values = self.rewrite_exprs(&values)?;
                Stmt::ShortVar { names, values, span }
            }
            Stmt::Assign { lhs, rhs, span } => {
                let rhs = self.rewrite_exprs(&rhs)?;
                Stmt::Assign { lhs, rhs, span }
            }
            Stmt::Expr(e) => Stmt::Expr(self.rewrite_expr(e)?),
            Stmt::Return { results, span } => return self.rewrite_return(&results, span),
            Stmt::If {
                init,
                cond,
                then,
                els,
                span,
            } => {
                let init = init.map(|s| self.rewrite_stmt(s)).transpose()?;
                let cond = self.rewrite_expr(cond)?;
                let then = self.rewrite_block(then)?;
                let els = els.map(|s| self.rewrite_stmt(s)).transpose()?;
                Stmt::If {
                    init,
                    cond,
                    then,
                    els,
                    span,
                }
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                span,
            } => {
                let init = init.map(|s| self.rewrite_stmt(s)).transpose()?;
                let cond = cond.map(|e| self.rewrite_expr(e)).transpose()?;
                let post = post.map(|s| self.rewrite_stmt(s)).transpose()?;
                let body = self.rewrite_block(body)?;
                Stmt::For {
                    init,
                    cond,
                    post,
                    body,
                    span,
                }
            }
            Stmt::Block(b) => Stmt::Block(self.rewrite_block(b)?),
            s @ Stmt::IncDec { .. } | s @ Stmt::Branch { .. } => s,
            Stmt::Spawn {
                deferred,
                call,
                span,
            } => Stmt::Spawn {
                deferred,
                call: self.rewrite_expr(call)?,
                span,
            },
        };
        Ok(self.ast.alloc_stmt(new))
    }

    /// Replace `nil` results with the NilDecl of the corresponding
    /// result position of the innermost enclosing function.
    fn rewrite_return(&mut self, results: &[ExprId], span: Span) -> Result<StmtId, RewriteError> {
        let sig_ty = *self
            .sig_stack
            .last()
            .ok_or_else(|| RewriteError::Rewrite("return outside any function".to_string()))?;
        let result_types = match self.store.ty(sig_ty) {
            Type::Signature(s) => s.results.clone(),
            _ => {
                return Err(RewriteError::Rewrite(
                    "enclosing function has no signature".to_string(),
                ))
            }
        };

        let mut new_results = Vec::with_capacity(results.len());
        for (i, &r) in results.iter().enumerate() {
            let value = if self.is_nil_ident(r) {
                let ty = *result_types.get(i).ok_or_else(|| {
                    RewriteError::Rewrite(format!(
                        "return has {} values but the function declares {} results",
                        results.len(),
                        result_types.len()
                    ))
                })?;
                self.nil_value(ty, self.ast.expr(r).span())?
            } else {
                self.rewrite_expr(r)?
            };
            new_results.push(value);
        }
        Ok(self.ast.alloc_stmt(Stmt::Return {
            results: new_results,
            span,
        }))
    }

    fn rewrite_exprs(&mut self, exprs: &[ExprId]) -> Result<Vec<ExprId>, RewriteError> {
        exprs.iter().map(|&e| self.rewrite_expr(e)).collect()
    }

    /// Expressions are left alone except that function literal bodies
    /// are walked (their returns and declarations follow the same
    /// substitution rules, against the literal's own signature).
    fn rewrite_expr(&mut self, eid: ExprId) -> Result<ExprId, RewriteError> {
        let new = match self.ast.expr(eid).clone() {
            Expr::FuncLit { sig, body, span } => {
                let sig_ty = self.type_of(eid)?;
                self.sig_stack.push(sig_ty);
                let body = self.rewrite_block(body)?;
                self.sig_stack.pop();
                Expr::FuncLit { sig, body, span }
            }
            Expr::Call { fun, args, span } => Expr::Call {
                fun: self.rewrite_expr(fun)?,
                args: self.rewrite_exprs(&args)?,
                span,
            },
            Expr::Selector {
                base,
                sel,
                sel_span,
                span,
            } => Expr::Selector {
                base: self.rewrite_expr(base)?,
                sel,
                sel_span,
                span,
            },
            Expr::Index { base, index, span } => Expr::Index {
                base: self.rewrite_expr(base)?,
                index: self.rewrite_expr(index)?,
                span,
            },
            Expr::Unary { op, operand, span } => Expr::Unary {
                op,
                operand: self.rewrite_expr(operand)?,
                span,
            },
            Expr::Binary { op, lhs, rhs, span } => Expr::Binary {
                op,
                lhs: self.rewrite_expr(lhs)?,
                rhs: self.rewrite_expr(rhs)?,
                span,
            },
            Expr::Paren { inner, span } => Expr::Paren {
                inner: self.rewrite_expr(inner)?,
                span,
            },
            _ => return Ok(eid),
        };
        Ok(self.ast.alloc_expr(new))
    }

    // ----- synthetic declarations -----

    /// Reference (creating on first use) the NilDecl for `ty`.
    fn nil_value(&mut self, ty: TypeId, span: Span) -> Result<ExprId, RewriteError> {
        if let Some(name) = self.nil_decls.get(&ty) {
            let name = name.clone();
            return Ok(self.ast.alloc_expr(Expr::Ident { name, span }));
        }

        let renderer = TypeRenderer::new(self.store, &self.pkg.pkg_path);
        let rendered = renderer.render(ty)?;
        self.validate(&rendered.text)?;

        // A pointer type gets a fresh allocation of its element; any
        // other pointer-kind type gets the zero value of a fresh cell.
        let (init, imports) = match self.store.ty(ty) {
            Type::Pointer { elem } => {
                let elem = renderer.render(*elem)?;
                self.validate(&elem.text)?;
                (format!("new({})", elem.text), elem.imports)
            }
            _ => (format!("*new({})", rendered.text), rendered.imports),
        };

        let name = self.unique_name("__nil", &rendered.text);
        self.nil_decls.insert(ty, name.clone());
        self.is_nil.insert(name.clone());
        self.decls.push(SyntheticDecl {
            name: name.clone(),
            kind: SyntheticKind::Nil { init },
            imports,
        });
        Ok(self.ast.alloc_expr(Expr::Ident { name, span }))
    }

    /// Reference (creating on first use) the ZeroDecl for `ty`,
    /// returning the call expression.
    fn zero_value(&mut self, ty: TypeId, span: Span) -> Result<ExprId, RewriteError> {
        let name = match self.zero_decls.get(&ty) {
            Some(name) => name.clone(),
            None => {
                let renderer = TypeRenderer::new(self.store, &self.pkg.pkg_path);
                let rendered = renderer.render(ty)?;
                self.validate(&rendered.text)?;
                let name = self.unique_name("__zero", &rendered.text);
                self.zero_decls.insert(ty, name.clone());
                self.is_zero.insert(name.clone());
                self.decls.push(SyntheticDecl {
                    name: name.clone(),
                    kind: SyntheticKind::Zero {
                        ty: rendered.text,
                    },
                    imports: rendered.imports,
                });
                name
            }
        };
        let fun = self.ast.alloc_expr(Expr::Ident { name, span });
        Ok(self.ast.alloc_expr(Expr::Call {
            fun,
            args: Vec::new(),
            span,
        }))
    }

    /// A rendered type that does not re-parse is a renderer bug.
    fn validate(&mut self, text: &str) -> Result<(), RewriteError> {
        parse_type_expr(self.ast, text)
            .map(|_| ())
            .map_err(|e| RenderError(format!("rendered type {text:?} does not parse: {e}")).into())
    }

    /// Deterministic synthetic name: package hash, type hash, and a
    /// disambiguator when the name is already bound.
    fn unique_name(&self, prefix: &str, ty_text: &str) -> String {
        let base = format!(
            "{prefix}_{:08x}_{:08x}",
            fnv1a(&self.pkg.pkg_path),
            fnv1a(ty_text)
        );
        let mut candidate = base.clone();
        let mut n = 0u32;
        while self.pkg.scope.contains_key(&candidate)
            || self.is_nil.contains(&candidate)
            || self.is_zero.contains(&candidate)
        {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        candidate
    }
}

fn fnv1a(s: &str) -> u32 {
    let mut h: u32 = 0x811c_9dc5;
    for b in s.bytes() {
        h ^= b as u32;
        h = h.wrapping_mul(0x0100_0193);
    }
    h
}

/// Build the companion declarations file for one package.
fn decls_file(pkg: &Package, decls: &[SyntheticDecl]) -> (String, String) {
    let mut imports: BTreeMap<String, String> = BTreeMap::new();
    for d in decls {
        for (path, qualifier) in &d.imports {
            imports.entry(path.clone()).or_insert_with(|| qualifier.clone());
        }
    }

    let mut text = format!("package {}\n", pkg.name);
    if !imports.is_empty() {
        text.push('\n');
        text.push_str("import (\n");
        for (path, qualifier) in &imports {
            text.push_str(&format!("\t{qualifier} {path:?}\n"));
        }
        text.push_str(")\n");
    }
    for d in decls {
        text.push('\n');
        match &d.kind {
            SyntheticKind::Nil { init } => {
                text.push_str(&format!("var {} = {}\n", d.name, init));
            }
            SyntheticKind::Zero { ty } => {
                text.push_str(&format!("func {}() (_ {}) {{ return }}\n", d.name, ty));
            }
        }
    }

    let name = format!("nilguard_decls_{:08x}.go", fnv1a(&pkg.pkg_path));
    (name, text)
}
