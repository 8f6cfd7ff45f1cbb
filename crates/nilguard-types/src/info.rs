//! Resolution metadata produced by the checker.

use std::collections::HashMap;

use nilguard_syntax::{DeclId, ExprId};

use crate::objects::ObjId;
use crate::types::TypeId;

/// One package-level variable initialization, in source order.
#[derive(Debug, Clone)]
pub struct Initializer {
    pub lhs: Vec<ObjId>,
    pub rhs: Option<ExprId>,
}

/// Side tables mapping AST nodes to semantic facts. One instance per
/// load; packages merge into it as they are checked.
#[derive(Debug, Default)]
pub struct TypeInfo {
    /// Type of every checked expression.
    pub expr_types: HashMap<ExprId, TypeId>,
    /// Identifier expression → object it references.
    pub uses: HashMap<ExprId, ObjId>,
    /// Identifier expression → object it declares.
    pub defs: HashMap<ExprId, ObjId>,
    /// Qualified selector (`pkg.Name`) → object in the other package.
    pub qualified_uses: HashMap<ExprId, ObjId>,
    /// Signature type of each function declaration.
    pub decl_sigs: HashMap<DeclId, TypeId>,
    /// Function declaration → its function object.
    pub decl_objs: HashMap<DeclId, ObjId>,
    /// (function declaration, parameter index) → parameter object.
    /// A receiver occupies index 0 and shifts the parameters.
    pub param_objs: HashMap<(DeclId, usize), ObjId>,
    /// (function literal expression, parameter index) → parameter object.
    pub lit_param_objs: HashMap<(ExprId, usize), ObjId>,
    /// Package-level variable initializations, packages in load order.
    pub init_order: Vec<Initializer>,
}

impl TypeInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn type_of(&self, expr: ExprId) -> Option<TypeId> {
        self.expr_types.get(&expr).copied()
    }

    pub fn merge(&mut self, other: TypeInfo) {
        self.expr_types.extend(other.expr_types);
        self.uses.extend(other.uses);
        self.defs.extend(other.defs);
        self.qualified_uses.extend(other.qualified_uses);
        self.decl_sigs.extend(other.decl_sigs);
        self.decl_objs.extend(other.decl_objs);
        self.param_objs.extend(other.param_objs);
        self.lit_param_objs.extend(other.lit_param_objs);
        self.init_order.extend(other.init_order);
    }
}
