//! Two-pass package checker.
//!
//! Pass one declares package-level names (type names first, then
//! functions and variables, with lazily resolved initializer types so
//! declaration order between files does not matter). Pass two checks
//! function bodies. Imports that resolve to no loaded package become
//! opaque: their selected names type as opaque named types and never
//! error.

use std::collections::HashMap;

use nilguard_syntax::{
    Ast, AstFileId, Decl, Expr, ExprId, FuncSig, Span, Stmt, StmtId, TypeExpr, TypeExprId,
    UnaryOp, VarDecl, VarSpec,
};

use crate::info::{Initializer, TypeInfo};
use crate::objects::{Builtin, ObjId, ObjKind, Object, ObjectArena};
use crate::types::{BasicKind, FieldDef, NamedId, Signature, Type, TypeId, TypeStore};
use crate::universe::Universe;

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TypeError {
    pub span: Span,
    pub message: String,
}

/// Package-scope view exported to importers.
#[derive(Debug, Clone)]
pub struct PackageExports {
    pub name: String,
    pub path: String,
    pub scope: HashMap<String, ObjId>,
}

#[derive(Debug)]
pub struct CheckResult {
    pub info: TypeInfo,
    pub scope: HashMap<String, ObjId>,
    pub errors: Vec<TypeError>,
}

/// Check all files of one package. `siblings` maps import paths of
/// already-checked packages of the same load.
pub fn check_package(
    ast: &Ast,
    files: &[AstFileId],
    pkg_path: &str,
    store: &mut TypeStore,
    objs: &mut ObjectArena,
    universe: &Universe,
    siblings: &HashMap<String, PackageExports>,
) -> CheckResult {
    let mut c = Checker {
        ast,
        store,
        objs,
        universe,
        siblings,
        pkg_path: pkg_path.to_string(),
        files: files.to_vec(),
        file_imports: Vec::new(),
        scope: HashMap::new(),
        locals: Vec::new(),
        info: TypeInfo::new(),
        errors: Vec::new(),
        methods: HashMap::new(),
        globals: HashMap::new(),
        opaque_types: HashMap::new(),
        cur_file: 0,
    };
    c.run();
    CheckResult {
        info: c.info,
        scope: c.scope,
        errors: c.errors,
    }
}

#[derive(Debug, Clone)]
enum GlobalInit {
    Pending { value: ExprId, file_idx: usize },
    InProgress,
    Done,
}

struct Checker<'a> {
    ast: &'a Ast,
    store: &'a mut TypeStore,
    objs: &'a mut ObjectArena,
    universe: &'a Universe,
    siblings: &'a HashMap<String, PackageExports>,
    pkg_path: String,
    files: Vec<AstFileId>,
    /// Per file: local import name → (path, PkgName object).
    file_imports: Vec<HashMap<String, (String, ObjId)>>,
    /// Package scope.
    scope: HashMap<String, ObjId>,
    /// Function-local scope stack.
    locals: Vec<HashMap<String, ObjId>>,
    info: TypeInfo,
    errors: Vec<TypeError>,
    /// (named type, method name) → signature type.
    methods: HashMap<(NamedId, String), TypeId>,
    /// Lazily-typed package-level vars and consts.
    globals: HashMap<ObjId, GlobalInit>,
    /// Opaque foreign types, keyed by (import path, type name).
    opaque_types: HashMap<(String, String), TypeId>,
    cur_file: usize,
}

impl<'a> Checker<'a> {
    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.errors.push(TypeError {
            span,
            message: message.into(),
        });
    }

    fn run(&mut self) {
        self.collect_imports();
        self.declare_type_names();
        self.resolve_type_decls();
        self.declare_funcs_and_globals();
        self.resolve_globals_and_init_order();
        self.check_bodies();
    }

    // ----- declaration passes -----

    fn collect_imports(&mut self) {
        for (idx, &fid) in self.files.clone().iter().enumerate() {
            let mut map = HashMap::new();
            let file = self.ast.file(fid);
            for imp in &file.imports {
                let opaque = !self.siblings.contains_key(&imp.path);
                let obj = self.objs.alloc(Object {
                    name: imp.local_name().to_string(),
                    kind: ObjKind::PkgName {
                        path: imp.path.clone(),
                        opaque,
                    },
                    pkg_path: Some(self.pkg_path.clone()),
                });
                map.insert(imp.local_name().to_string(), (imp.path.clone(), obj));
            }
            self.file_imports.push(map);
            debug_assert_eq!(self.file_imports.len(), idx + 1);
        }
    }

    fn declare_type_names(&mut self) {
        for &fid in &self.files.clone() {
            let file = self.ast.file(fid);
            for &did in &file.decls {
                if let Decl::Type(td) = self.ast.decl(did) {
                    if self.scope.contains_key(&td.name) {
                        self.error(td.name_span, format!("{} redeclared", td.name));
                        continue;
                    }
                    let (_, ty) =
                        self.store
                            .new_named(td.name.clone(), Some(self.pkg_path.clone()), None);
                    let obj = self.objs.alloc(Object {
                        name: td.name.clone(),
                        kind: ObjKind::TypeName { ty },
                        pkg_path: Some(self.pkg_path.clone()),
                    });
                    self.scope.insert(td.name.clone(), obj);
                }
            }
        }
    }

    fn resolve_type_decls(&mut self) {
        for (idx, &fid) in self.files.clone().iter().enumerate() {
            self.cur_file = idx;
            let file = self.ast.file(fid);
            for &did in &file.decls {
                if let Decl::Type(td) = self.ast.decl(did) {
                    let underlying = self.resolve_type(td.ty);
                    if let Some(&obj) = self.scope.get(&td.name) {
                        if let Some(ty) = self.objs.get(obj).type_id() {
                            if let Type::Named(nid) = self.store.ty(ty).clone() {
                                self.store.set_underlying(nid, underlying);
                            }
                        }
                    }
                }
            }
        }
    }

    fn declare_funcs_and_globals(&mut self) {
        for (idx, &fid) in self.files.clone().iter().enumerate() {
            self.cur_file = idx;
            let file = self.ast.file(fid);
            for &did in &file.decls {
                match self.ast.decl(did) {
                    Decl::Func(fd) => {
                        let sig = self.resolve_sig(&fd.sig);
                        let obj = self.objs.alloc(Object {
                            name: fd.name.clone(),
                            kind: ObjKind::Func { sig },
                            pkg_path: Some(self.pkg_path.clone()),
                        });
                        self.info.decl_sigs.insert(did, sig);
                        self.info.decl_objs.insert(did, obj);
                        match &fd.recv {
                            None => {
                                if fd.name != "_" {
                                    self.scope.insert(fd.name.clone(), obj);
                                }
                            }
                            Some(recv) => {
                                let recv_ty = self.resolve_type(recv.ty);
                                if let Some(nid) = self.named_id_of(recv_ty) {
                                    self.methods.insert((nid, fd.name.clone()), sig);
                                }
                            }
                        }
                    }
                    Decl::Var(vd) => self.declare_global_specs(vd, idx, false),
                    Decl::Const(vd) => self.declare_global_specs(vd, idx, true),
                    Decl::Type(_) => {}
                }
            }
        }
    }

    fn declare_global_specs(&mut self, vd: &VarDecl, file_idx: usize, is_const: bool) {
        for spec in &vd.specs {
            let annotated = spec.ty.map(|t| {
                self.cur_file = file_idx;
                self.resolve_type(t)
            });
            let one_to_one = spec.names.len() == spec.values.len();
            for (i, &name_expr) in spec.names.iter().enumerate() {
                let name = match self.ast.as_ident(name_expr) {
                    Some(n) => n.to_string(),
                    None => continue,
                };
                let ty = annotated.unwrap_or_else(|| self.store.invalid());
                let kind = if is_const {
                    ObjKind::Const { ty }
                } else {
                    ObjKind::Var { ty, global: true }
                };
                let obj = self.objs.alloc(Object {
                    name: name.clone(),
                    kind,
                    pkg_path: Some(self.pkg_path.clone()),
                });
                if name != "_" {
                    self.scope.insert(name.clone(), obj);
                }
                self.info.defs.insert(name_expr, obj);
                if annotated.is_none() {
                    if one_to_one {
                        self.globals.insert(
                            obj,
                            GlobalInit::Pending {
                                value: spec.values[i],
                                file_idx,
                            },
                        );
                    } else if spec.values.is_empty() {
                        self.error(spec.span, format!("missing type or initializer for {name}"));
                    }
                }
            }
        }
    }

    /// Lazily compute the type of an unannotated package-level var or
    /// const from its initializer. Cycles resolve to the invalid type.
    fn resolve_global(&mut self, obj: ObjId) -> TypeId {
        match self.globals.get(&obj).cloned() {
            None | Some(GlobalInit::Done) => self
                .objs
                .get(obj)
                .type_id()
                .unwrap_or_else(|| self.store.invalid()),
            Some(GlobalInit::InProgress) => self.store.invalid(),
            Some(GlobalInit::Pending { value, file_idx }) => {
                self.globals.insert(obj, GlobalInit::InProgress);
                let saved = self.cur_file;
                self.cur_file = file_idx;
                let ty = self.check_expr(value);
                self.cur_file = saved;
                let ty = self.defaulted(ty);
                match &mut self.objs.get_mut(obj).kind {
                    ObjKind::Var { ty: slot, .. } | ObjKind::Const { ty: slot } => *slot = ty,
                    _ => {}
                }
                self.globals.insert(obj, GlobalInit::Done);
                ty
            }
        }
    }

    fn resolve_globals_and_init_order(&mut self) {
        for (idx, &fid) in self.files.clone().iter().enumerate() {
            self.cur_file = idx;
            let file = self.ast.file(fid);
            for &did in &file.decls {
                let vd = match self.ast.decl(did) {
                    Decl::Var(vd) | Decl::Const(vd) => vd.clone(),
                    _ => continue,
                };
                let is_var = matches!(self.ast.decl(did), Decl::Var(_));
                for spec in &vd.specs {
                    let lhs: Vec<ObjId> = spec
                        .names
                        .iter()
                        .filter_map(|n| self.info.defs.get(n).copied())
                        .collect();
                    for &obj in &lhs {
                        self.resolve_global(obj);
                    }
                    // Annotated initializer expressions still need types
                    // recorded for lowering.
                    for &v in &spec.values {
                        if !self.info.expr_types.contains_key(&v) {
                            self.check_expr(v);
                        }
                    }
                    // Record the type of every defining ident.
                    for &n in &spec.names {
                        if let Some(&obj) = self.info.defs.get(&n) {
                            let ty = self
                                .objs
                                .get(obj)
                                .type_id()
                                .unwrap_or_else(|| self.store.invalid());
                            self.info.expr_types.insert(n, ty);
                        }
                    }
                    if !is_var {
                        continue;
                    }
                    if spec.names.len() == spec.values.len() {
                        for (&n, &v) in spec.names.iter().zip(&spec.values) {
                            if let Some(&obj) = self.info.defs.get(&n) {
                                self.info.init_order.push(Initializer {
                                    lhs: vec![obj],
                                    rhs: Some(v),
                                });
                            }
                        }
                    } else {
                        self.info.init_order.push(Initializer {
                            lhs: lhs.clone(),
                            rhs: spec.values.first().copied(),
                        });
                    }
                }
            }
        }
    }

    fn check_bodies(&mut self) {
        for (idx, &fid) in self.files.clone().iter().enumerate() {
            self.cur_file = idx;
            let file = self.ast.file(fid);
            for &did in &file.decls {
                if let Decl::Func(fd) = self.ast.decl(did) {
                    let fd = fd.clone();
                    self.locals.clear();
                    self.locals.push(HashMap::new());
                    let mut index = 0usize;
                    if let Some(recv) = &fd.recv {
                        if let Some(obj) = self.declare_param(recv) {
                            self.info.param_objs.insert((did, index), obj);
                        }
                        index += 1;
                    }
                    for p in &fd.sig.params {
                        if let Some(obj) = self.declare_param(p) {
                            self.info.param_objs.insert((did, index), obj);
                        }
                        index += 1;
                    }
                    for r in &fd.sig.results {
                        self.declare_param(r);
                    }
                    if let Some(body) = fd.body {
                        self.check_block(body);
                    }
                    self.locals.clear();
                }
            }
        }
    }

    fn declare_param(&mut self, p: &nilguard_syntax::Param) -> Option<ObjId> {
        let ty = self.resolve_type(p.ty);
        let name = p.name.as_ref()?;
        if name == "_" {
            return None;
        }
        let obj = self.objs.alloc(Object {
            name: name.clone(),
            kind: ObjKind::Var { ty, global: false },
            pkg_path: None,
        });
        self.locals
            .last_mut()
            .expect("scope stack is not empty")
            .insert(name.clone(), obj);
        Some(obj)
    }

    // ----- statements -----

    fn check_block(&mut self, block: nilguard_syntax::BlockId) {
        self.locals.push(HashMap::new());
        for &s in &self.ast.block(block).stmts.clone() {
            self.check_stmt(s);
        }
        self.locals.pop();
    }

    fn check_stmt(&mut self, id: StmtId) {
        match self.ast.stmt(id).clone() {
            Stmt::Var(vd) | Stmt::Const(vd) => {
                for spec in &vd.specs {
                    self.check_local_spec(spec);
                }
            }
            Stmt::ShortVar { names, values, .. } => {
                let one_to_one = names.len() == values.len();
                let mut tys = Vec::with_capacity(values.len());
                for &v in &values {
                    tys.push(self.check_expr(v));
                }
                for (i, &n) in names.iter().enumerate() {
                    let ty = if one_to_one {
                        self.defaulted(tys[i])
                    } else {
                        self.store.invalid()
                    };
                    self.declare_local_ident(n, ty);
                }
            }
            Stmt::Assign { lhs, rhs, .. } => {
                for &e in lhs.iter().chain(rhs.iter()) {
                    self.check_expr(e);
                }
            }
            Stmt::Expr(e) => {
                self.check_expr(e);
            }
            Stmt::Return { results, .. } => {
                for &e in &results {
                    self.check_expr(e);
                }
            }
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => {
                self.locals.push(HashMap::new());
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                self.check_expr(cond);
                self.check_block(then);
                if let Some(els) = els {
                    self.check_stmt(els);
                }
                self.locals.pop();
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.locals.push(HashMap::new());
                if let Some(init) = init {
                    self.check_stmt(init);
                }
                if let Some(cond) = cond {
                    self.check_expr(cond);
                }
                if let Some(post) = post {
                    self.check_stmt(post);
                }
                self.check_block(body);
                self.locals.pop();
            }
            Stmt::Block(b) => self.check_block(b),
            Stmt::IncDec { expr, .. } => {
                self.check_expr(expr);
            }
            Stmt::Spawn { call, .. } => {
                self.check_expr(call);
            }
            Stmt::Branch { .. } => {}
        }
    }

    fn check_local_spec(&mut self, spec: &VarSpec) {
        let annotated = spec.ty.map(|t| self.resolve_type(t));
        let one_to_one = spec.names.len() == spec.values.len();
        let mut tys = Vec::with_capacity(spec.values.len());
        for &v in &spec.values {
            tys.push(self.check_expr(v));
        }
        for (i, &n) in spec.names.iter().enumerate() {
            let ty = match annotated {
                Some(t) => t,
                None if one_to_one => self.defaulted(tys[i]),
                None => {
                    if spec.values.is_empty() {
                        self.error(spec.span, "missing type or initializer");
                    }
                    self.store.invalid()
                }
            };
            self.declare_local_ident(n, ty);
        }
    }

    fn declare_local_ident(&mut self, name_expr: ExprId, ty: TypeId) {
        let name = match self.ast.as_ident(name_expr) {
            Some(n) => n.to_string(),
            None => return,
        };
        let obj = self.objs.alloc(Object {
            name: name.clone(),
            kind: ObjKind::Var { ty, global: false },
            pkg_path: None,
        });
        if name != "_" {
            self.locals
                .last_mut()
                .expect("scope stack is not empty")
                .insert(name, obj);
        }
        self.info.defs.insert(name_expr, obj);
        self.info.expr_types.insert(name_expr, ty);
    }

    // ----- expressions -----

    fn lookup(&self, name: &str) -> Option<ObjId> {
        for scope in self.locals.iter().rev() {
            if let Some(&o) = scope.get(name) {
                return Some(o);
            }
        }
        if let Some(&o) = self.scope.get(name) {
            return Some(o);
        }
        if let Some((_, o)) = self.file_imports.get(self.cur_file).and_then(|m| m.get(name)) {
            return Some(*o);
        }
        self.universe.scope.get(name).copied()
    }

    fn defaulted(&mut self, ty: TypeId) -> TypeId {
        if let Type::Basic(k) = self.store.ty(ty) {
            if k.is_untyped() {
                let def = k.default_kind();
                return self.store.basic(def);
            }
        }
        ty
    }

    fn check_expr(&mut self, id: ExprId) -> TypeId {
        let ty = self.check_expr_inner(id);
        self.info.expr_types.insert(id, ty);
        ty
    }

    fn check_expr_inner(&mut self, id: ExprId) -> TypeId {
        match self.ast.expr(id).clone() {
            Expr::Ident { name, span } => match self.lookup(&name) {
                Some(obj) => {
                    self.info.uses.insert(id, obj);
                    let kind = self.objs.get(obj).kind.clone();
                    match kind {
                        ObjKind::Var { global: true, .. } | ObjKind::Const { .. } => {
                            self.resolve_global(obj)
                        }
                        ObjKind::Var { ty, .. } => ty,
                        ObjKind::Func { sig } => sig,
                        ObjKind::TypeName { ty } => ty,
                        ObjKind::Nil => self.store.basic(BasicKind::UntypedNil),
                        ObjKind::Builtin(_) | ObjKind::PkgName { .. } => self.store.invalid(),
                    }
                }
                None => {
                    self.error(span, format!("undefined: {name}"));
                    self.store.invalid()
                }
            },
            Expr::IntLit { .. } => self.store.basic(BasicKind::UntypedInt),
            Expr::FloatLit { .. } => self.store.basic(BasicKind::UntypedFloat),
            Expr::StringLit { .. } => self.store.basic(BasicKind::UntypedString),
            Expr::RuneLit { .. } => self.store.basic(BasicKind::UntypedRune),
            Expr::Selector { base, ref sel, .. } => self.check_selector(id, base, sel),
            Expr::Call { fun, ref args, .. } => self.check_call(fun, args),
            Expr::Index { base, index, .. } => {
                let bt = self.check_expr(base);
                self.check_expr(index);
                match self.store.underlying(self.deref(bt)).clone() {
                    Type::Map { value, .. } => value,
                    Type::Slice { elem } | Type::Array { elem, .. } => elem,
                    Type::Basic(BasicKind::String) => self.store.basic(BasicKind::Uint8),
                    _ => self.store.invalid(),
                }
            }
            Expr::Unary { op, operand, .. } => {
                let ot = self.check_expr(operand);
                match op {
                    UnaryOp::Deref => match self.store.underlying(ot).clone() {
                        Type::Pointer { elem } => elem,
                        _ => self.store.invalid(),
                    },
                    UnaryOp::Addr => self.store.pointer(ot),
                    UnaryOp::Not => self.store.basic(BasicKind::Bool),
                    UnaryOp::Neg => ot,
                    UnaryOp::Recv => match self.store.underlying(ot).clone() {
                        Type::Chan { elem, .. } => elem,
                        _ => self.store.invalid(),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                let lt = self.check_expr(lhs);
                let rt = self.check_expr(rhs);
                use nilguard_syntax::BinaryOp::*;
                match op {
                    Eq | NotEq | Lt | LtEq | Gt | GtEq | LogAnd | LogOr => {
                        self.store.basic(BasicKind::Bool)
                    }
                    _ => {
                        let l_untyped = matches!(
                            self.store.ty(lt),
                            Type::Basic(k) if k.is_untyped()
                        );
                        if l_untyped {
                            rt
                        } else {
                            lt
                        }
                    }
                }
            }
            Expr::Paren { inner, .. } => self.check_expr(inner),
            Expr::FuncLit { ref sig, body, .. } => {
                let sig_ty = self.resolve_sig(sig);
                let saved: Vec<HashMap<String, ObjId>> = self.locals.clone();
                self.locals.push(HashMap::new());
                for (index, p) in sig.params.iter().enumerate() {
                    if let Some(obj) = self.declare_param(p) {
                        self.info.lit_param_objs.insert((id, index), obj);
                    }
                }
                for r in &sig.results {
                    self.declare_param(r);
                }
                self.check_block(body);
                self.locals = saved;
                sig_ty
            }
            Expr::TypeLit { ty, .. } => self.resolve_type(ty),
        }
    }

    fn deref(&self, ty: TypeId) -> TypeId {
        match self.store.underlying(ty) {
            Type::Pointer { elem } => *elem,
            _ => ty,
        }
    }

    fn check_selector(&mut self, sel_expr: ExprId, base: ExprId, sel: &str) -> TypeId {
        // Package-qualified reference?
        if let Expr::Ident { name, .. } = self.ast.expr(base).clone() {
            if let Some(obj) = self.lookup(&name) {
                if let ObjKind::PkgName { path, opaque } = self.objs.get(obj).kind.clone() {
                    self.info.uses.insert(base, obj);
                    let invalid = self.store.invalid();
                    self.info.expr_types.insert(base, invalid);
                    if opaque {
                        return self.store.invalid();
                    }
                    let target = self
                        .siblings
                        .get(&path)
                        .and_then(|p| p.scope.get(sel))
                        .copied();
                    return match target {
                        Some(t) => {
                            self.info.qualified_uses.insert(sel_expr, t);
                            match &self.objs.get(t).kind {
                                ObjKind::Var { ty, .. }
                                | ObjKind::Const { ty }
                                | ObjKind::TypeName { ty } => *ty,
                                ObjKind::Func { sig } => *sig,
                                _ => self.store.invalid(),
                            }
                        }
                        None => self.store.invalid(),
                    };
                }
            }
        }

        let base_ty = self.check_expr(base);
        let recv = self.deref(base_ty);

        // Methods on named types win over nothing; fields win over
        // methods cannot happen in valid Go, so order is irrelevant.
        if let Some(nid) = self.named_id_of(recv) {
            if let Some(&sig) = self.methods.get(&(nid, sel.to_string())) {
                return sig;
            }
        }
        match self.store.underlying(recv).clone() {
            Type::Struct { fields } => fields
                .iter()
                .find(|f| f.name == sel)
                .map(|f| f.ty)
                .unwrap_or_else(|| self.store.invalid()),
            Type::Interface { methods } => methods
                .iter()
                .find(|(n, _)| n == sel)
                .map(|(_, sig)| *sig)
                .unwrap_or_else(|| self.store.invalid()),
            // Opaque foreign types and everything else: unknown member,
            // typed invalid without an error.
            _ => self.store.invalid(),
        }
    }

    fn check_call(&mut self, fun: ExprId, args: &[ExprId]) -> TypeId {
        // Builtin?
        if let Expr::Ident { name, .. } = self.ast.expr(fun).clone() {
            if let Some(obj) = self.lookup(&name) {
                if let ObjKind::Builtin(b) = self.objs.get(obj).kind {
                    self.info.uses.insert(fun, obj);
                    let invalid = self.store.invalid();
                    self.info.expr_types.insert(fun, invalid);
                    return self.check_builtin_call(b, args);
                }
            }
        }

        let fun_ty = self.check_expr(fun);
        // Conversion: the callee names a type.
        let is_type = match self.ast.expr(fun) {
            Expr::Ident { .. } | Expr::Selector { .. } => self
                .info
                .uses
                .get(&fun)
                .map(|&o| matches!(self.objs.get(o).kind, ObjKind::TypeName { .. }))
                .unwrap_or(false),
            Expr::TypeLit { .. } => true,
            _ => false,
        };
        for &a in args {
            self.check_expr(a);
        }
        if is_type {
            return fun_ty;
        }
        match self.store.underlying(fun_ty).clone() {
            Type::Signature(sig) => match sig.results.len() {
                1 => sig.results[0],
                _ => self.store.invalid(),
            },
            _ => self.store.invalid(),
        }
    }

    fn check_builtin_call(&mut self, b: Builtin, args: &[ExprId]) -> TypeId {
        match b {
            Builtin::New => {
                let elem = args
                    .first()
                    .and_then(|&a| self.expr_as_type(a))
                    .unwrap_or_else(|| self.store.invalid());
                self.store.pointer(elem)
            }
            Builtin::Make => {
                let ty = args
                    .first()
                    .and_then(|&a| self.expr_as_type(a))
                    .unwrap_or_else(|| self.store.invalid());
                for &a in args.iter().skip(1) {
                    self.check_expr(a);
                }
                ty
            }
            Builtin::Len | Builtin::Cap => {
                for &a in args {
                    self.check_expr(a);
                }
                self.store.basic(BasicKind::Int)
            }
            Builtin::Append => {
                let mut it = args.iter();
                let first = it
                    .next()
                    .map(|&a| self.check_expr(a))
                    .unwrap_or_else(|| self.store.invalid());
                for &a in it {
                    self.check_expr(a);
                }
                first
            }
            Builtin::Println | Builtin::Print | Builtin::Panic => {
                for &a in args {
                    self.check_expr(a);
                }
                self.store.invalid()
            }
        }
    }

    /// Interpret an expression in type position (`new(T)`, conversions).
    fn expr_as_type(&mut self, id: ExprId) -> Option<TypeId> {
        match self.ast.expr(id).clone() {
            Expr::Ident { name, .. } => {
                let obj = self.lookup(&name)?;
                self.info.uses.insert(id, obj);
                match self.objs.get(obj).kind {
                    ObjKind::TypeName { ty } => {
                        self.info.expr_types.insert(id, ty);
                        Some(ty)
                    }
                    _ => None,
                }
            }
            Expr::Selector { base, ref sel, .. } => {
                let pkg_name = match self.ast.expr(base) {
                    Expr::Ident { name, .. } => name.clone(),
                    _ => return None,
                };
                let obj = self.lookup(&pkg_name)?;
                let (path, opaque) = match &self.objs.get(obj).kind {
                    ObjKind::PkgName { path, opaque } => (path.clone(), *opaque),
                    _ => return None,
                };
                self.info.uses.insert(base, obj);
                let ty = self.qualified_type(&pkg_name, &path, opaque, sel);
                self.info.expr_types.insert(id, ty);
                Some(ty)
            }
            Expr::Unary {
                op: UnaryOp::Deref,
                operand,
                ..
            } => {
                let elem = self.expr_as_type(operand)?;
                let ty = self.store.pointer(elem);
                self.info.expr_types.insert(id, ty);
                Some(ty)
            }
            Expr::Paren { inner, .. } => self.expr_as_type(inner),
            Expr::TypeLit { ty, .. } => {
                let t = self.resolve_type(ty);
                self.info.expr_types.insert(id, t);
                Some(t)
            }
            _ => None,
        }
    }

    fn named_id_of(&self, ty: TypeId) -> Option<NamedId> {
        match self.store.ty(ty) {
            Type::Named(nid) => Some(*nid),
            _ => None,
        }
    }

    // ----- types -----

    fn qualified_type(&mut self, qualifier: &str, path: &str, opaque: bool, name: &str) -> TypeId {
        if !opaque {
            if let Some(t) = self
                .siblings
                .get(path)
                .and_then(|p| p.scope.get(name))
                .copied()
            {
                if let ObjKind::TypeName { ty } = self.objs.get(t).kind {
                    return ty;
                }
            }
        }
        let key = (path.to_string(), name.to_string());
        if let Some(&ty) = self.opaque_types.get(&key) {
            return ty;
        }
        let (_, ty) = self.store.new_named(
            name.to_string(),
            Some(path.to_string()),
            Some(qualifier.to_string()),
        );
        self.opaque_types.insert(key, ty);
        ty
    }

    pub(crate) fn resolve_sig(&mut self, sig: &FuncSig) -> TypeId {
        let params: Vec<TypeId> = sig.params.iter().map(|p| self.resolve_type(p.ty)).collect();
        let results: Vec<TypeId> = sig
            .results
            .iter()
            .map(|r| self.resolve_type(r.ty))
            .collect();
        self.store.intern(Type::Signature(Signature {
            params,
            results,
            variadic: sig.variadic,
        }))
    }

    fn resolve_type(&mut self, id: TypeExprId) -> TypeId {
        match self.ast.type_expr(id).clone() {
            TypeExpr::Name { pkg: None, name, span } => {
                // Package scope first, then universe.
                if let Some(&obj) = self.scope.get(&name) {
                    if let ObjKind::TypeName { ty } = self.objs.get(obj).kind {
                        return ty;
                    }
                }
                if let Some(&obj) = self.universe.scope.get(&name) {
                    if let ObjKind::TypeName { ty } = self.objs.get(obj).kind {
                        return ty;
                    }
                }
                self.error(span, format!("undefined type: {name}"));
                self.store.invalid()
            }
            TypeExpr::Name {
                pkg: Some(q), name, span,
            } => {
                let imp = self
                    .file_imports
                    .get(self.cur_file)
                    .and_then(|m| m.get(&q))
                    .cloned();
                match imp {
                    Some((path, obj)) => {
                        let opaque = matches!(
                            self.objs.get(obj).kind,
                            ObjKind::PkgName { opaque: true, .. }
                        );
                        self.qualified_type(&q, &path, opaque, &name)
                    }
                    None => {
                        self.error(span, format!("undefined package: {q}"));
                        self.store.invalid()
                    }
                }
            }
            TypeExpr::Pointer { elem, .. } => {
                let e = self.resolve_type(elem);
                self.store.pointer(e)
            }
            TypeExpr::Slice { elem, .. } => {
                let e = self.resolve_type(elem);
                self.store.intern(Type::Slice { elem: e })
            }
            TypeExpr::Array { len, elem, span } => {
                let n = match len.parse::<u64>() {
                    Ok(n) => n,
                    Err(_) => {
                        self.error(span, format!("invalid array length {len}"));
                        0
                    }
                };
                let e = self.resolve_type(elem);
                self.store.intern(Type::Array { len: n, elem: e })
            }
            TypeExpr::Map { key, value, .. } => {
                let k = self.resolve_type(key);
                let v = self.resolve_type(value);
                self.store.intern(Type::Map { key: k, value: v })
            }
            TypeExpr::Chan { dir, elem, .. } => {
                let e = self.resolve_type(elem);
                self.store.intern(Type::Chan { dir, elem: e })
            }
            TypeExpr::Func { ref sig, .. } => self.resolve_sig(sig),
            TypeExpr::Interface { ref methods, .. } => {
                let ms: Vec<(String, TypeId)> = methods
                    .iter()
                    .map(|m| (m.name.clone(), self.resolve_sig(&m.sig)))
                    .collect();
                self.store.intern(Type::Interface { methods: ms })
            }
            TypeExpr::Struct { ref fields, .. } => {
                let mut fs = Vec::new();
                for f in fields {
                    let ty = self.resolve_type(f.ty);
                    for name in &f.names {
                        fs.push(FieldDef {
                            name: name.clone(),
                            ty,
                            tag: f.tag.clone(),
                        });
                    }
                }
                self.store.intern(Type::Struct { fields: fs })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::can_point;
    use nilguard_syntax::{parse_file, Ast, FileId};

    fn check(src: &str) -> (Ast, TypeStore, ObjectArena, CheckResult, Vec<AstFileId>) {
        let mut ast = Ast::new();
        let fid = parse_file(&mut ast, FileId(0), src).expect("parse");
        let mut store = TypeStore::new();
        let mut objs = ObjectArena::new();
        let universe = Universe::build(&mut store, &mut objs);
        let res = check_package(
            &ast,
            &[fid],
            "a",
            &mut store,
            &mut objs,
            &universe,
            &HashMap::new(),
        );
        (ast, store, objs, res, vec![fid])
    }

    #[test]
    fn resolves_struct_and_global() {
        let (_, store, objs, res, _) = check(
            "package main\n\ntype T struct {\n\tN int\n\tm *int\n}\n\nvar gt *T\n\nfunc main() {\n\tprintln(gt.N)\n}\n",
        );
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        let gt = res.scope["gt"];
        let ty = objs.get(gt).type_id().unwrap();
        assert!(can_point(&store, ty));
        assert!(matches!(store.ty(ty), Type::Pointer { .. }));
    }

    #[test]
    fn selector_types_resolve() {
        let (ast, store, _, res, files) = check(
            "package main\n\ntype T struct {\n\tN int\n}\n\nvar gt *T\n\nfunc main() {\n\tprintln(gt.N)\n}\n",
        );
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        // Find the selector gt.N and check its base type.
        let mut found = false;
        for (i, e) in ast.exprs.iter().enumerate() {
            if let Expr::Selector { base, sel, .. } = e {
                if sel == "N" {
                    let bt = res.info.expr_types[base];
                    assert!(can_point(&store, bt));
                    let nt = res.info.expr_types[&ExprId(i as u32)];
                    assert!(matches!(store.ty(nt), Type::Basic(BasicKind::Int)));
                    found = true;
                }
            }
        }
        assert!(found, "selector not found");
        let _ = files;
    }

    #[test]
    fn nil_resolves_to_nil_object() {
        let (ast, _, objs, res, _) =
            check("package p\n\nfunc g() *int {\n\treturn nil\n}\n");
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        let mut saw_nil = false;
        for (i, e) in ast.exprs.iter().enumerate() {
            if let Expr::Ident { name, .. } = e {
                if name == "nil" {
                    let obj = res.info.uses[&ExprId(i as u32)];
                    assert!(matches!(objs.get(obj).kind, ObjKind::Nil));
                    saw_nil = true;
                }
            }
        }
        assert!(saw_nil);
    }

    #[test]
    fn error_interface_method() {
        let (ast, store, _, res, _) = check(
            "package p\n\nfunc f() {\n\tvar err error\n\tprintln(err.Error())\n}\n",
        );
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        for e in &ast.exprs {
            if let Expr::Selector { base, sel, .. } = e {
                if sel == "Error" {
                    let bt = res.info.expr_types[base];
                    assert!(can_point(&store, bt), "error base should be pointer-kind");
                }
            }
        }
    }

    #[test]
    fn opaque_import_is_silent() {
        let (ast, store, _, res, _) = check(
            "package main\n\nimport \"go.uber.org/zap\"\n\nfunc main() {\n\tvar logger *zap.Logger\n\tprintln(logger.Info)\n}\n",
        );
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        for e in &ast.exprs {
            if let Expr::Selector { base, sel, .. } = e {
                if sel == "Info" {
                    let bt = res.info.expr_types[base];
                    assert!(can_point(&store, bt));
                }
            }
        }
    }

    #[test]
    fn undefined_name_is_an_error() {
        let (_, _, _, res, _) = check("package p\n\nfunc f() {\n\tprintln(zzz)\n}\n");
        assert_eq!(res.errors.len(), 1);
        assert!(res.errors[0].message.contains("undefined: zzz"));
    }

    #[test]
    fn unannotated_global_infers_from_sibling_decl() {
        // gt's type comes from __n which is declared later in the file.
        let (_, store, objs, res, _) = check(
            "package p\n\ntype T struct{ N int }\n\nvar gt = __n\n\nvar __n = *new(*T)\n",
        );
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        let gt = res.scope["gt"];
        let ty = objs.get(gt).type_id().unwrap();
        assert!(matches!(store.ty(ty), Type::Pointer { .. }));
        assert_eq!(res.info.init_order.len(), 2);
    }

    #[test]
    fn init_order_records_single_targets() {
        let (ast, _, objs, res, _) =
            check("package p\n\nvar a = 1\n\nvar b, c = 2, 3\n");
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        assert_eq!(res.info.init_order.len(), 3);
        for init in &res.info.init_order {
            assert_eq!(init.lhs.len(), 1);
            assert!(init.rhs.is_some());
        }
        let _ = (ast, objs);
    }

    #[test]
    fn variadic_interface_var() {
        let (_, store, objs, res, _) = check(
            "package p\n\nfunc f() {\n\tvar iface interface{ F(int, ...string) int }\n\tprintln(iface.F(10, \"a\"))\n}\n",
        );
        assert!(res.errors.is_empty(), "{:?}", res.errors);
        let _ = (store, objs);
    }
}
