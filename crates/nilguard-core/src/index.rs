//! Selector indexing over the rewritten program.
//!
//! Walks every source file in load order and registers each selector
//! whose base is pointer-kind and resolvable to an SSA value. The
//! traversal order (package, file, position) is the order diagnostics
//! later emit in.

use std::collections::HashSet;

use nilguard_load::Program;
use nilguard_ssa::{SsaProgram, ValueId};
use nilguard_syntax::{Ast, Decl, Expr, ExprId, Stmt, StmtId};
use nilguard_types::can_point;

/// One registered selector.
#[derive(Debug, Clone)]
pub struct SelectorEntry {
    /// The selector expression itself.
    pub expr: ExprId,
    /// Its base expression (`X` in `X.f`).
    pub base: ExprId,
    /// Index of the enclosing package in the program.
    pub pkg_idx: usize,
    /// SSA value of the base.
    pub value: ValueId,
}

/// All registered selectors plus the deduplicated query list for the
/// pointer analyzer.
#[derive(Debug, Default)]
pub struct SelectorIndex {
    pub entries: Vec<SelectorEntry>,
    pub queries: Vec<ValueId>,
}

impl SelectorIndex {
    pub fn collect(program: &Program, ssa: &SsaProgram) -> SelectorIndex {
        let mut index = SelectorIndex::default();
        let mut seen: HashSet<ValueId> = HashSet::new();

        for (pkg_idx, pkg) in program.packages.iter().enumerate() {
            for &fid in &pkg.files {
                let mut selectors = Vec::new();
                let file = program.ast.file(fid);
                for &did in &file.decls {
                    collect_decl(&program.ast, did, &mut selectors);
                }

                for sel in selectors {
                    let Expr::Selector { base, .. } = program.ast.expr(sel) else {
                        continue;
                    };
                    let base = *base;
                    let Some(base_ty) = program.info.type_of(base) else {
                        continue;
                    };
                    if !can_point(&program.store, base_ty) {
                        continue;
                    }
                    let span = program.ast.expr(sel).span();
                    let Some(func) = ssa.enclosing_function(span.file, span) else {
                        continue;
                    };
                    let Some(value) = ssa.value_for_expr(func, base) else {
                        continue;
                    };
                    if seen.insert(value) {
                        index.queries.push(value);
                    }
                    index.entries.push(SelectorEntry {
                        expr: sel,
                        base,
                        pkg_idx,
                        value,
                    });
                }
            }
        }

        tracing::debug!(
            selectors = index.entries.len(),
            queries = index.queries.len(),
            "selector index built"
        );
        index
    }
}

fn collect_decl(ast: &Ast, did: nilguard_syntax::DeclId, out: &mut Vec<ExprId>) {
    match ast.decl(did) {
        Decl::Var(vd) | Decl::Const(vd) => {
            for spec in &vd.specs {
                for &v in &spec.values {
                    collect_expr(ast, v, out);
                }
            }
        }
        Decl::Type(_) => {}
        Decl::Func(fd) => {
            if let Some(body) = fd.body {
                collect_block(ast, body, out);
            }
        }
    }
}

fn collect_block(ast: &Ast, block: nilguard_syntax::BlockId, out: &mut Vec<ExprId>) {
    for &s in &ast.block(block).stmts {
        collect_stmt(ast, s, out);
    }
}

fn collect_stmt(ast: &Ast, sid: StmtId, out: &mut Vec<ExprId>) {
    match ast.stmt(sid) {
        Stmt::Var(vd) | Stmt::Const(vd) => {
            for spec in &vd.specs {
                for &v in &spec.values {
                    collect_expr(ast, v, out);
                }
            }
        }
        Stmt::ShortVar { values, .. } => {
            for &v in values {
                collect_expr(ast, v, out);
            }
        }
        Stmt::Assign { lhs, rhs, .. } => {
            for &e in lhs.iter().chain(rhs.iter()) {
                collect_expr(ast, e, out);
            }
        }
        Stmt::Expr(e) => collect_expr(ast, *e, out),
        Stmt::Return { results, .. } => {
            for &r in results {
                collect_expr(ast, r, out);
            }
        }
        Stmt::If {
            init,
            cond,
            then,
            els,
            ..
        } => {
            if let Some(init) = init {
                collect_stmt(ast, *init, out);
            }
            collect_expr(ast, *cond, out);
            collect_block(ast, *then, out);
            if let Some(els) = els {
                collect_stmt(ast, *els, out);
            }
        }
        Stmt::For {
            init,
            cond,
            post,
            body,
            ..
        } => {
            if let Some(init) = init {
                collect_stmt(ast, *init, out);
            }
            if let Some(cond) = cond {
                collect_expr(ast, *cond, out);
            }
            if let Some(post) = post {
                collect_stmt(ast, *post, out);
            }
            collect_block(ast, *body, out);
        }
        Stmt::Block(b) => collect_block(ast, *b, out),
        Stmt::IncDec { expr, .. } => collect_expr(ast, *expr, out),
        Stmt::Spawn { call, .. } => collect_expr(ast, *call, out),
        Stmt::Branch { .. } => {}
    }
}

fn collect_expr(ast: &Ast, eid: ExprId, out: &mut Vec<ExprId>) {
    match ast.expr(eid) {
        Expr::Selector { base, .. } => {
            out.push(eid);
            collect_expr(ast, *base, out);
        }
        Expr::Call { fun, args, .. } => {
            collect_expr(ast, *fun, out);
            for &a in args {
                collect_expr(ast, a, out);
            }
        }
        Expr::Index { base, index, .. } => {
            collect_expr(ast, *base, out);
            collect_expr(ast, *index, out);
        }
        Expr::Unary { operand, .. } => collect_expr(ast, *operand, out),
        Expr::Binary { lhs, rhs, .. } => {
            collect_expr(ast, *lhs, out);
            collect_expr(ast, *rhs, out);
        }
        Expr::Paren { inner, .. } => collect_expr(ast, *inner, out),
        Expr::FuncLit { body, .. } => collect_block(ast, *body, out),
        _ => {}
    }
}
