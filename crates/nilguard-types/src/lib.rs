//! Semantic types and the resolution pass for nilguard.
//!
//! The checker here is a resolver, not a conformance checker: it binds
//! every identifier to an object, computes a type for every expression,
//! and records package initialization order. Programs the Go compiler
//! would reject for reasons the nil analysis does not care about (unused
//! imports, arity mismatches) pass through untouched; unknown names and
//! malformed declarations are reported and aggregated into a load
//! failure.

pub mod checker;
pub mod info;
pub mod objects;
pub mod types;
pub mod universe;

pub use checker::{check_package, CheckResult, PackageExports, TypeError};
pub use info::{Initializer, TypeInfo};
pub use objects::{Builtin, ObjId, ObjKind, Object, ObjectArena};
pub use types::{can_point, BasicKind, FieldDef, NamedId, Signature, Type, TypeId, TypeStore};
