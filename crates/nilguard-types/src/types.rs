//! Interned semantic types.

use std::collections::HashMap;

use nilguard_syntax::ChanDir;

/// Index into [`TypeStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// Index of a named type definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamedId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Uintptr,
    Float32,
    Float64,
    String,
    UntypedBool,
    UntypedInt,
    UntypedFloat,
    UntypedRune,
    UntypedString,
    UntypedNil,
}

impl BasicKind {
    pub fn name(self) -> &'static str {
        match self {
            BasicKind::Bool => "bool",
            BasicKind::Int => "int",
            BasicKind::Int8 => "int8",
            BasicKind::Int16 => "int16",
            BasicKind::Int32 => "int32",
            BasicKind::Int64 => "int64",
            BasicKind::Uint => "uint",
            BasicKind::Uint8 => "uint8",
            BasicKind::Uint16 => "uint16",
            BasicKind::Uint32 => "uint32",
            BasicKind::Uint64 => "uint64",
            BasicKind::Uintptr => "uintptr",
            BasicKind::Float32 => "float32",
            BasicKind::Float64 => "float64",
            BasicKind::String => "string",
            BasicKind::UntypedBool => "untyped bool",
            BasicKind::UntypedInt => "untyped int",
            BasicKind::UntypedFloat => "untyped float",
            BasicKind::UntypedRune => "untyped rune",
            BasicKind::UntypedString => "untyped string",
            BasicKind::UntypedNil => "untyped nil",
        }
    }

    pub fn is_untyped(self) -> bool {
        matches!(
            self,
            BasicKind::UntypedBool
                | BasicKind::UntypedInt
                | BasicKind::UntypedFloat
                | BasicKind::UntypedRune
                | BasicKind::UntypedString
                | BasicKind::UntypedNil
        )
    }

    /// Default concrete type of an untyped constant.
    pub fn default_kind(self) -> BasicKind {
        match self {
            BasicKind::UntypedBool => BasicKind::Bool,
            BasicKind::UntypedInt => BasicKind::Int,
            BasicKind::UntypedFloat => BasicKind::Float64,
            BasicKind::UntypedRune => BasicKind::Int32,
            BasicKind::UntypedString => BasicKind::String,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: Vec<TypeId>,
    pub results: Vec<TypeId>,
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldDef {
    pub name: String,
    pub ty: TypeId,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Invalid,
    Basic(BasicKind),
    Named(NamedId),
    Pointer { elem: TypeId },
    Slice { elem: TypeId },
    Array { len: u64, elem: TypeId },
    Map { key: TypeId, value: TypeId },
    Chan { dir: ChanDir, elem: TypeId },
    Signature(Signature),
    Interface { methods: Vec<(String, TypeId)> },
    Struct { fields: Vec<FieldDef> },
}

/// A named type definition. `underlying` is patched once the right-hand
/// side of the type declaration has been resolved; opaque foreign types
/// keep `Invalid` underneath.
#[derive(Debug, Clone)]
pub struct NamedDef {
    pub name: String,
    /// Import path of the defining package; `None` for universe names.
    pub pkg_path: Option<String>,
    /// Qualifier to use when referencing the type from another package.
    pub qualifier: Option<String>,
    pub underlying: TypeId,
}

/// Hash-consed type storage shared by a whole load.
#[derive(Debug, Default)]
pub struct TypeStore {
    types: Vec<Type>,
    dedup: HashMap<Type, TypeId>,
    named: Vec<NamedDef>,
}

impl TypeStore {
    pub fn new() -> Self {
        let mut s = Self::default();
        // TypeId(0) is always Invalid.
        s.intern(Type::Invalid);
        s
    }

    pub fn invalid(&self) -> TypeId {
        TypeId(0)
    }

    pub fn intern(&mut self, ty: Type) -> TypeId {
        if let Some(&id) = self.dedup.get(&ty) {
            return id;
        }
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty.clone());
        self.dedup.insert(ty, id);
        id
    }

    pub fn basic(&mut self, kind: BasicKind) -> TypeId {
        self.intern(Type::Basic(kind))
    }

    pub fn pointer(&mut self, elem: TypeId) -> TypeId {
        self.intern(Type::Pointer { elem })
    }

    /// Allocate a fresh named type; `underlying` may be patched later.
    pub fn new_named(
        &mut self,
        name: impl Into<String>,
        pkg_path: Option<String>,
        qualifier: Option<String>,
    ) -> (NamedId, TypeId) {
        let nid = NamedId(self.named.len() as u32);
        let underlying = self.invalid();
        self.named.push(NamedDef {
            name: name.into(),
            pkg_path,
            qualifier,
            underlying,
        });
        let tid = self.intern(Type::Named(nid));
        (nid, tid)
    }

    pub fn set_underlying(&mut self, id: NamedId, underlying: TypeId) {
        self.named[id.0 as usize].underlying = underlying;
    }

    pub fn named_def(&self, id: NamedId) -> &NamedDef {
        &self.named[id.0 as usize]
    }

    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    /// Resolve through named types to the structural type beneath.
    pub fn underlying(&self, id: TypeId) -> &Type {
        let mut cur = id;
        for _ in 0..32 {
            match self.ty(cur) {
                Type::Named(nid) => cur = self.named_def(*nid).underlying,
                other => return other,
            }
        }
        self.ty(self.invalid())
    }

    /// Short human-readable form, for error messages.
    pub fn display(&self, id: TypeId) -> String {
        match self.ty(id) {
            Type::Invalid => "invalid type".to_string(),
            Type::Basic(k) => k.name().to_string(),
            Type::Named(nid) => {
                let def = self.named_def(*nid);
                match &def.qualifier {
                    Some(q) => format!("{q}.{}", def.name),
                    None => def.name.clone(),
                }
            }
            Type::Pointer { elem } => format!("*{}", self.display(*elem)),
            Type::Slice { elem } => format!("[]{}", self.display(*elem)),
            Type::Array { len, elem } => format!("[{len}]{}", self.display(*elem)),
            Type::Map { key, value } => {
                format!("map[{}]{}", self.display(*key), self.display(*value))
            }
            Type::Chan { dir, elem } => match dir {
                ChanDir::Both => format!("chan {}", self.display(*elem)),
                ChanDir::Send => format!("chan<- {}", self.display(*elem)),
                ChanDir::Recv => format!("<-chan {}", self.display(*elem)),
            },
            Type::Signature(_) => "func".to_string(),
            Type::Interface { .. } => "interface".to_string(),
            Type::Struct { .. } => "struct".to_string(),
        }
    }
}

/// True when values of the type have a nullable reference
/// representation: pointer, slice, map, channel, function or interface,
/// looking through named types.
pub fn can_point(store: &TypeStore, ty: TypeId) -> bool {
    matches!(
        store.underlying(ty),
        Type::Pointer { .. }
            | Type::Slice { .. }
            | Type::Map { .. }
            | Type::Chan { .. }
            | Type::Signature(_)
            | Type::Interface { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_dedups_composites() {
        let mut s = TypeStore::new();
        let int = s.basic(BasicKind::Int);
        let p1 = s.pointer(int);
        let p2 = s.pointer(int);
        assert_eq!(p1, p2);
    }

    #[test]
    fn named_types_are_distinct() {
        let mut s = TypeStore::new();
        let (_, t1) = s.new_named("T", Some("a".into()), None);
        let (_, t2) = s.new_named("T", Some("a".into()), None);
        assert_ne!(t1, t2);
    }

    #[test]
    fn can_point_kinds() {
        let mut s = TypeStore::new();
        let int = s.basic(BasicKind::Int);
        let ptr = s.pointer(int);
        let slice = s.intern(Type::Slice { elem: int });
        let m = s.intern(Type::Map {
            key: int,
            value: int,
        });
        let ch = s.intern(Type::Chan {
            dir: ChanDir::Both,
            elem: int,
        });
        let f = s.intern(Type::Signature(Signature {
            params: vec![],
            results: vec![],
            variadic: false,
        }));
        let iface = s.intern(Type::Interface { methods: vec![] });
        let st = s.intern(Type::Struct { fields: vec![] });

        for t in [ptr, slice, m, ch, f, iface] {
            assert!(can_point(&s, t), "{}", s.display(t));
        }
        assert!(!can_point(&s, int));
        assert!(!can_point(&s, st));
    }

    #[test]
    fn can_point_through_named() {
        let mut s = TypeStore::new();
        let int = s.basic(BasicKind::Int);
        let ptr = s.pointer(int);
        let (nid, named) = s.new_named("P", Some("a".into()), None);
        s.set_underlying(nid, ptr);
        assert!(can_point(&s, named));
    }

    #[test]
    fn untyped_defaults() {
        assert_eq!(BasicKind::UntypedInt.default_kind(), BasicKind::Int);
        assert_eq!(BasicKind::UntypedString.default_kind(), BasicKind::String);
        assert_eq!(BasicKind::UntypedRune.default_kind(), BasicKind::Int32);
    }
}
