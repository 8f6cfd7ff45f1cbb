//! The universe scope: predeclared types, constants and builtins.

use std::collections::HashMap;

use crate::objects::{Builtin, ObjId, ObjKind, Object, ObjectArena};
use crate::types::{BasicKind, Signature, Type, TypeStore};

/// Predeclared names visible in every file.
#[derive(Debug)]
pub struct Universe {
    pub scope: HashMap<String, ObjId>,
    pub nil_obj: ObjId,
}

impl Universe {
    pub fn build(store: &mut TypeStore, objs: &mut ObjectArena) -> Universe {
        let mut scope = HashMap::new();

        let basics = [
            BasicKind::Bool,
            BasicKind::Int,
            BasicKind::Int8,
            BasicKind::Int16,
            BasicKind::Int32,
            BasicKind::Int64,
            BasicKind::Uint,
            BasicKind::Uint8,
            BasicKind::Uint16,
            BasicKind::Uint32,
            BasicKind::Uint64,
            BasicKind::Uintptr,
            BasicKind::Float32,
            BasicKind::Float64,
            BasicKind::String,
        ];
        for kind in basics {
            let ty = store.basic(kind);
            let id = objs.alloc(Object {
                name: kind.name().to_string(),
                kind: ObjKind::TypeName { ty },
                pkg_path: None,
            });
            scope.insert(kind.name().to_string(), id);
        }

        // Aliases.
        for (alias, kind) in [("byte", BasicKind::Uint8), ("rune", BasicKind::Int32)] {
            let ty = store.basic(kind);
            let id = objs.alloc(Object {
                name: alias.to_string(),
                kind: ObjKind::TypeName { ty },
                pkg_path: None,
            });
            scope.insert(alias.to_string(), id);
        }

        // error: named interface { Error() string }.
        let string_ty = store.basic(BasicKind::String);
        let error_sig = store.intern(Type::Signature(Signature {
            params: vec![],
            results: vec![string_ty],
            variadic: false,
        }));
        let error_iface = store.intern(Type::Interface {
            methods: vec![("Error".to_string(), error_sig)],
        });
        let (error_nid, error_ty) = store.new_named("error", None, None);
        store.set_underlying(error_nid, error_iface);
        let error_obj = objs.alloc(Object {
            name: "error".to_string(),
            kind: ObjKind::TypeName { ty: error_ty },
            pkg_path: None,
        });
        scope.insert("error".to_string(), error_obj);

        // any: alias for the empty interface.
        let empty_iface = store.intern(Type::Interface { methods: vec![] });
        let any_obj = objs.alloc(Object {
            name: "any".to_string(),
            kind: ObjKind::TypeName { ty: empty_iface },
            pkg_path: None,
        });
        scope.insert("any".to_string(), any_obj);

        let untyped_bool = store.basic(BasicKind::UntypedBool);
        for name in ["true", "false"] {
            let id = objs.alloc(Object {
                name: name.to_string(),
                kind: ObjKind::Const { ty: untyped_bool },
                pkg_path: None,
            });
            scope.insert(name.to_string(), id);
        }

        let nil_obj = objs.alloc(Object {
            name: "nil".to_string(),
            kind: ObjKind::Nil,
            pkg_path: None,
        });
        scope.insert("nil".to_string(), nil_obj);

        for (name, b) in [
            ("new", Builtin::New),
            ("make", Builtin::Make),
            ("len", Builtin::Len),
            ("cap", Builtin::Cap),
            ("append", Builtin::Append),
            ("println", Builtin::Println),
            ("print", Builtin::Print),
            ("panic", Builtin::Panic),
        ] {
            let id = objs.alloc(Object {
                name: name.to_string(),
                kind: ObjKind::Builtin(b),
                pkg_path: None,
            });
            scope.insert(name.to_string(), id);
        }

        Universe { scope, nil_obj }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::can_point;

    #[test]
    fn error_is_a_pointer_kind_interface() {
        let mut store = TypeStore::new();
        let mut objs = ObjectArena::new();
        let uni = Universe::build(&mut store, &mut objs);
        let err = uni.scope["error"];
        let ty = objs.get(err).type_id().unwrap();
        assert!(can_point(&store, ty));
        match store.underlying(ty) {
            Type::Interface { methods } => assert_eq!(methods[0].0, "Error"),
            other => panic!("expected interface, got {other:?}"),
        }
    }

    #[test]
    fn nil_and_builtins_present() {
        let mut store = TypeStore::new();
        let mut objs = ObjectArena::new();
        let uni = Universe::build(&mut store, &mut objs);
        assert!(matches!(objs.get(uni.nil_obj).kind, ObjKind::Nil));
        assert!(uni.scope.contains_key("new"));
        assert!(uni.scope.contains_key("println"));
        assert!(uni.scope.contains_key("byte"));
    }
}
