//! SSA-ish program representation.
//!
//! Lowering is in naive form: local variables are cells (`Alloc`) with
//! explicit loads and stores, and there are no phi nodes. Consumers of
//! this IR are flow-insensitive, so block structure carries control
//! shape but no dataflow obligations. Debug references tie every
//! evaluated identifier to the SSA value it produced, which is how the
//! propagation stage maps values back to synthetic names.

use std::collections::HashMap;

use nilguard_syntax::{ExprId, FileId, Span, UnaryOp};
use nilguard_types::{Builtin, ObjId, TypeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callee {
    Static(FuncId),
    Builtin(Builtin),
    Dynamic(ValueId),
}

#[derive(Debug, Clone)]
pub enum ValueKind {
    Param {
        name: String,
        index: usize,
    },
    /// Address of a package-level variable's cell.
    Global {
        obj: ObjId,
        name: String,
        pkg_path: String,
    },
    Function {
        func: FuncId,
    },
    Closure {
        func: FuncId,
    },
    Const {
        text: String,
    },
    /// A cell: local variable, `new`, or `make` allocation.
    Alloc {
        heap: bool,
        name: Option<String>,
    },
    Load {
        addr: ValueId,
    },
    UnOp {
        op: UnaryOp,
        operand: ValueId,
    },
    BinOp {
        lhs: ValueId,
        rhs: ValueId,
    },
    FieldAddr {
        base: ValueId,
        field: String,
    },
    Call {
        callee: Callee,
        args: Vec<ValueId>,
    },
    /// Values the front end cannot see into (opaque package members).
    Opaque,
}

#[derive(Debug, Clone)]
pub struct ValueData {
    pub kind: ValueKind,
    pub ty: TypeId,
}

#[derive(Debug, Clone)]
pub enum Instr {
    /// An instruction producing the given value.
    Value(ValueId),
    Store {
        addr: ValueId,
        value: ValueId,
    },
    /// Ties a source expression to the value it evaluated to.
    DebugRef {
        expr: ExprId,
        /// Identifier name when the expression is a plain identifier.
        ident: Option<String>,
        value: ValueId,
    },
    Return {
        results: Vec<ValueId>,
    },
    Jump(BlockRef),
    CondJump {
        cond: ValueId,
        then_block: BlockRef,
        else_block: BlockRef,
    },
}

#[derive(Debug, Default, Clone)]
pub struct BasicBlock {
    pub instrs: Vec<InstrId>,
}

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub pkg_path: String,
    /// Source extent; synthetic init functions have none.
    pub file: Option<FileId>,
    pub span: Option<Span>,
    pub params: Vec<ValueId>,
    pub blocks: Vec<BasicBlock>,
    /// Expression → value, for `value_for_expr`.
    pub expr_values: HashMap<ExprId, ValueId>,
}

/// The lowered program. Values and instructions live in program-wide
/// arenas; functions own blocks of instruction ids.
#[derive(Debug, Default)]
pub struct SsaProgram {
    pub functions: Vec<Function>,
    pub values: Vec<ValueData>,
    pub instrs: Vec<Instr>,
    /// Package-level variable → its global cell value.
    pub globals: HashMap<ObjId, ValueId>,
    /// Single-target package initializers whose right-hand side is a
    /// plain identifier, by target object.
    pub init_idents: HashMap<ObjId, String>,
    /// Function object → lowered function.
    pub func_by_obj: HashMap<ObjId, FuncId>,
    /// Value → instructions mentioning it.
    referrers: HashMap<ValueId, Vec<InstrId>>,
}

impl SsaProgram {
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.0 as usize]
    }

    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id.0 as usize]
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.functions[id.0 as usize]
    }

    pub fn referrers(&self, v: ValueId) -> &[InstrId] {
        self.referrers.get(&v).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The SSA function for a declared function object.
    pub fn func_value(&self, obj: ObjId) -> Option<FuncId> {
        self.func_by_obj.get(&obj).copied()
    }

    /// The SSA value a source expression evaluated to, inside `f`.
    pub fn value_for_expr(&self, f: FuncId, expr: ExprId) -> Option<ValueId> {
        self.func(f).expr_values.get(&expr).copied()
    }

    /// Innermost function whose source extent contains `span`.
    pub fn enclosing_function(&self, file: FileId, span: Span) -> Option<FuncId> {
        let mut best: Option<(u32, FuncId)> = None;
        for (i, f) in self.functions.iter().enumerate() {
            let (Some(ffile), Some(fspan)) = (f.file, f.span) else {
                continue;
            };
            if ffile == file && fspan.contains(span) {
                let size = fspan.end - fspan.start;
                if best.map(|(s, _)| size < s).unwrap_or(true) {
                    best = Some((size, FuncId(i as u32)));
                }
            }
        }
        best.map(|(_, f)| f)
    }

    /// Values returned by any return statement of `f`.
    pub fn returns_of(&self, f: FuncId) -> Vec<Vec<ValueId>> {
        let mut out = Vec::new();
        for block in &self.func(f).blocks {
            for &iid in &block.instrs {
                if let Instr::Return { results } = self.instr(iid) {
                    out.push(results.clone());
                }
            }
        }
        out
    }

    pub(crate) fn push_value(&mut self, data: ValueData) -> ValueId {
        self.values.push(data);
        ValueId(self.values.len() as u32 - 1)
    }

    pub(crate) fn push_instr_raw(&mut self, instr: Instr) -> InstrId {
        let id = InstrId(self.instrs.len() as u32);
        let mut mention = |v: ValueId, referrers: &mut HashMap<ValueId, Vec<InstrId>>| {
            referrers.entry(v).or_default().push(id);
        };
        match &instr {
            Instr::Value(v) => {
                let mentioned: Vec<ValueId> = match &self.values[v.0 as usize].kind {
                    ValueKind::Load { addr } => vec![*addr],
                    ValueKind::UnOp { operand, .. } => vec![*operand],
                    ValueKind::BinOp { lhs, rhs } => vec![*lhs, *rhs],
                    ValueKind::FieldAddr { base, .. } => vec![*base],
                    ValueKind::Call { callee, args } => {
                        let mut m = args.clone();
                        if let Callee::Dynamic(f) = callee {
                            m.push(*f);
                        }
                        m
                    }
                    _ => vec![],
                };
                for m in mentioned {
                    mention(m, &mut self.referrers);
                }
            }
            Instr::Store { addr, value } => {
                mention(*addr, &mut self.referrers);
                mention(*value, &mut self.referrers);
            }
            Instr::DebugRef { value, .. } => mention(*value, &mut self.referrers),
            Instr::Return { results } => {
                for &r in results {
                    mention(r, &mut self.referrers);
                }
            }
            Instr::CondJump { cond, .. } => mention(*cond, &mut self.referrers),
            Instr::Jump(_) => {}
        }
        self.instrs.push(instr);
        id
    }
}
