//! Source printer for rewritten files and rendered expressions.
//!
//! Output follows gofmt conventions closely enough to re-parse: tabs for
//! indentation, one statement per line, grouped declarations in parens.

use crate::ast::*;

/// Print a whole file back to Go source.
pub fn print_file(ast: &Ast, file: AstFileId) -> String {
    let mut p = Printer {
        ast,
        out: String::new(),
        indent: 0,
    };
    p.file(ast.file(file));
    p.out
}

/// Print a single expression, e.g. a selector for a diagnostic line.
pub fn print_expr(ast: &Ast, expr: ExprId) -> String {
    let mut p = Printer {
        ast,
        out: String::new(),
        indent: 0,
    };
    p.expr(expr);
    p.out
}

/// Print a type expression.
pub fn print_type(ast: &Ast, ty: TypeExprId) -> String {
    let mut p = Printer {
        ast,
        out: String::new(),
        indent: 0,
    };
    p.type_expr(ty);
    p.out
}

struct Printer<'a> {
    ast: &'a Ast,
    out: String,
    indent: usize,
}

impl<'a> Printer<'a> {
    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn newline(&mut self) {
        self.out.push('\n');
        for _ in 0..self.indent {
            self.out.push('\t');
        }
    }

    fn file(&mut self, f: &AstFile) {
        self.push("package ");
        self.push(&f.package_name);
        self.push("\n");

        if !f.imports.is_empty() {
            self.push("\n");
            if f.imports.len() == 1 {
                let imp = &f.imports[0];
                self.push("import ");
                if let Some(a) = &imp.alias {
                    self.push(a);
                    self.push(" ");
                }
                self.push(&format!("{:?}", imp.path));
                self.push("\n");
            } else {
                self.push("import (\n");
                for imp in &f.imports {
                    self.push("\t");
                    if let Some(a) = &imp.alias {
                        self.push(a);
                        self.push(" ");
                    }
                    self.push(&format!("{:?}", imp.path));
                    self.push("\n");
                }
                self.push(")\n");
            }
        }

        for &d in &f.decls {
            self.push("\n");
            self.decl(d);
            self.push("\n");
        }
    }

    fn decl(&mut self, id: DeclId) {
        match self.ast.decl(id) {
            Decl::Var(d) => self.var_decl("var", d),
            Decl::Const(d) => self.var_decl("const", d),
            Decl::Type(d) => {
                self.push("type ");
                self.push(&d.name);
                self.push(" ");
                self.type_expr(d.ty);
            }
            Decl::Func(d) => {
                self.push("func ");
                if let Some(recv) = &d.recv {
                    self.push("(");
                    if let Some(n) = &recv.name {
                        self.push(n);
                        self.push(" ");
                    }
                    self.type_expr(recv.ty);
                    self.push(") ");
                }
                self.push(&d.name);
                self.func_sig(&d.sig);
                if let Some(body) = d.body {
                    self.push(" ");
                    self.block(body);
                }
            }
        }
    }

    fn var_decl(&mut self, kw: &str, d: &VarDecl) {
        if d.grouped {
            self.push(kw);
            self.push(" (");
            self.indent += 1;
            for spec in &d.specs {
                self.newline();
                self.var_spec(spec);
            }
            self.indent -= 1;
            self.newline();
            self.push(")");
        } else {
            self.push(kw);
            self.push(" ");
            self.var_spec(&d.specs[0]);
        }
    }

    fn var_spec(&mut self, spec: &VarSpec) {
        for (i, &n) in spec.names.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.expr(n);
        }
        if let Some(ty) = spec.ty {
            self.push(" ");
            self.type_expr(ty);
        }
        if !spec.values.is_empty() {
            self.push(" = ");
            for (i, &v) in spec.values.iter().enumerate() {
                if i > 0 {
                    self.push(", ");
                }
                self.expr(v);
            }
        }
    }

    fn func_sig(&mut self, sig: &FuncSig) {
        self.push("(");
        for (i, p) in sig.params.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            if let Some(n) = &p.name {
                self.push(n);
                self.push(" ");
            }
            if sig.variadic && i == sig.params.len() - 1 {
                self.push("...");
            }
            self.type_expr(p.ty);
        }
        self.push(")");
        match sig.results.len() {
            0 => {}
            1 if sig.results[0].name.is_none() => {
                self.push(" ");
                self.type_expr(sig.results[0].ty);
            }
            _ => {
                self.push(" (");
                for (i, r) in sig.results.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    if let Some(n) = &r.name {
                        self.push(n);
                        self.push(" ");
                    }
                    self.type_expr(r.ty);
                }
                self.push(")");
            }
        }
    }

    fn block(&mut self, id: BlockId) {
        let b = self.ast.block(id);
        if b.stmts.is_empty() {
            self.push("{}");
            return;
        }
        self.push("{");
        self.indent += 1;
        for &s in &b.stmts {
            self.newline();
            self.stmt(s);
        }
        self.indent -= 1;
        self.newline();
        self.push("}");
    }

    fn stmt(&mut self, id: StmtId) {
        match self.ast.stmt(id) {
            Stmt::Var(d) => self.var_decl("var", d),
            Stmt::Const(d) => self.var_decl("const", d),
            Stmt::ShortVar { names, values, .. } => {
                for (i, &n) in names.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(n);
                }
                self.push(" := ");
                for (i, &v) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(v);
                }
            }
            Stmt::Assign { lhs, rhs, .. } => {
                for (i, &n) in lhs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(n);
                }
                self.push(" = ");
                for (i, &v) in rhs.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(v);
                }
            }
            Stmt::Expr(e) => self.expr(*e),
            Stmt::Return { results, .. } => {
                self.push("return");
                for (i, &r) in results.iter().enumerate() {
                    self.push(if i == 0 { " " } else { ", " });
                    self.expr(r);
                }
            }
            Stmt::If {
                init,
                cond,
                then,
                els,
                ..
            } => {
                self.push("if ");
                if let Some(init) = init {
                    self.stmt(*init);
                    self.push("; ");
                }
                self.expr(*cond);
                self.push(" ");
                self.block(*then);
                if let Some(els) = els {
                    self.push(" else ");
                    self.stmt(*els);
                }
            }
            Stmt::For {
                init,
                cond,
                post,
                body,
                ..
            } => {
                self.push("for ");
                if init.is_some() || post.is_some() {
                    if let Some(init) = init {
                        self.stmt(*init);
                    }
                    self.push("; ");
                    if let Some(cond) = cond {
                        self.expr(*cond);
                    }
                    self.push("; ");
                    if let Some(post) = post {
                        self.stmt(*post);
                    }
                    self.push(" ");
                } else if let Some(cond) = cond {
                    self.expr(*cond);
                    self.push(" ");
                }
                self.block(*body);
            }
            Stmt::Block(b) => self.block(*b),
            Stmt::IncDec { expr, inc, .. } => {
                self.expr(*expr);
                self.push(if *inc { "++" } else { "--" });
            }
            Stmt::Spawn {
                deferred, call, ..
            } => {
                self.push(if *deferred { "defer " } else { "go " });
                self.expr(*call);
            }
            Stmt::Branch { is_break, .. } => {
                self.push(if *is_break { "break" } else { "continue" });
            }
        }
    }

    fn expr(&mut self, id: ExprId) {
        match self.ast.expr(id) {
            Expr::Ident { name, .. } => self.push(name),
            Expr::IntLit { text, .. }
            | Expr::FloatLit { text, .. }
            | Expr::StringLit { text, .. }
            | Expr::RuneLit { text, .. } => self.push(text),
            Expr::Selector { base, sel, .. } => {
                self.expr(*base);
                self.push(".");
                self.push(sel);
            }
            Expr::Call { fun, args, .. } => {
                self.expr(*fun);
                self.push("(");
                for (i, &a) in args.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.expr(a);
                }
                self.push(")");
            }
            Expr::Index { base, index, .. } => {
                self.expr(*base);
                self.push("[");
                self.expr(*index);
                self.push("]");
            }
            Expr::Unary { op, operand, .. } => {
                self.push(match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                    UnaryOp::Deref => "*",
                    UnaryOp::Addr => "&",
                    UnaryOp::Recv => "<-",
                });
                self.expr(*operand);
            }
            Expr::Binary { op, lhs, rhs, .. } => {
                self.expr(*lhs);
                self.push(match op {
                    BinaryOp::Add => " + ",
                    BinaryOp::Sub => " - ",
                    BinaryOp::Mul => " * ",
                    BinaryOp::Div => " / ",
                    BinaryOp::Rem => " % ",
                    BinaryOp::And => " & ",
                    BinaryOp::Or => " | ",
                    BinaryOp::Xor => " ^ ",
                    BinaryOp::Shl => " << ",
                    BinaryOp::Shr => " >> ",
                    BinaryOp::LogAnd => " && ",
                    BinaryOp::LogOr => " || ",
                    BinaryOp::Eq => " == ",
                    BinaryOp::NotEq => " != ",
                    BinaryOp::Lt => " < ",
                    BinaryOp::LtEq => " <= ",
                    BinaryOp::Gt => " > ",
                    BinaryOp::GtEq => " >= ",
                });
                self.expr(*rhs);
            }
            Expr::Paren { inner, .. } => {
                self.push("(");
                self.expr(*inner);
                self.push(")");
            }
            Expr::FuncLit { sig, body, .. } => {
                self.push("func");
                self.func_sig(sig);
                self.push(" ");
                self.block(*body);
            }
            Expr::TypeLit { ty, .. } => self.type_expr(*ty),
        }
    }

    fn type_expr(&mut self, id: TypeExprId) {
        match self.ast.type_expr(id) {
            TypeExpr::Name { pkg, name, .. } => {
                if let Some(pkg) = pkg {
                    self.push(pkg);
                    self.push(".");
                }
                self.push(name);
            }
            TypeExpr::Pointer { elem, .. } => {
                self.push("*");
                self.type_expr(*elem);
            }
            TypeExpr::Slice { elem, .. } => {
                self.push("[]");
                self.type_expr(*elem);
            }
            TypeExpr::Array { len, elem, .. } => {
                self.push("[");
                self.push(len);
                self.push("]");
                self.type_expr(*elem);
            }
            TypeExpr::Map { key, value, .. } => {
                self.push("map[");
                self.type_expr(*key);
                self.push("]");
                self.type_expr(*value);
            }
            TypeExpr::Chan { dir, elem, .. } => {
                self.push(match dir {
                    ChanDir::Both => "chan ",
                    ChanDir::Send => "chan<- ",
                    ChanDir::Recv => "<-chan ",
                });
                self.type_expr(*elem);
            }
            TypeExpr::Func { sig, .. } => {
                self.push("func");
                self.func_sig(sig);
            }
            TypeExpr::Interface { methods, .. } => {
                if methods.is_empty() {
                    self.push("interface{}");
                    return;
                }
                self.push("interface{ ");
                for (i, m) in methods.iter().enumerate() {
                    if i > 0 {
                        self.push("; ");
                    }
                    self.push(&m.name);
                    self.func_sig(&m.sig);
                }
                self.push(" }");
            }
            TypeExpr::Struct { fields, .. } => {
                if fields.is_empty() {
                    self.push("struct{}");
                    return;
                }
                self.push("struct {");
                self.indent += 1;
                for f in fields {
                    self.newline();
                    for (i, n) in f.names.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.push(n);
                    }
                    self.push(" ");
                    self.type_expr(f.ty);
                    if let Some(tag) = &f.tag {
                        self.push(" ");
                        self.push(&quote_tag(tag));
                    }
                }
                self.indent -= 1;
                self.newline();
                self.push("}");
            }
        }
    }
}

/// Quote a struct tag for printing. Backtick form is used unless the tag
/// itself contains a backtick.
fn quote_tag(tag: &str) -> String {
    if tag.contains('`') {
        format!("{tag:?}")
    } else {
        format!("`{tag}`")
    }
}
