//! Rendering semantic types back to source-level type expressions.
//!
//! The renderer produces text that must re-parse at the point of use in
//! the synthetic declarations file. Foreign named types render
//! qualified, and every qualification records the import path the decls
//! file needs.

use std::collections::BTreeMap;

use nilguard_syntax::ChanDir;
use nilguard_types::{BasicKind, Signature, Type, TypeId, TypeStore};

#[derive(Debug, Clone, thiserror::Error)]
#[error("cannot render type: {0}")]
pub struct RenderError(pub String);

/// A rendered type expression plus the imports it references, as
/// import path → qualifier used in the text.
#[derive(Debug, Clone)]
pub struct RenderedType {
    pub text: String,
    pub imports: BTreeMap<String, String>,
}

pub struct TypeRenderer<'a> {
    store: &'a TypeStore,
    /// Import path of the package the rendered text will live in.
    pkg_path: &'a str,
}

impl<'a> TypeRenderer<'a> {
    pub fn new(store: &'a TypeStore, pkg_path: &'a str) -> Self {
        Self { store, pkg_path }
    }

    pub fn render(&self, ty: TypeId) -> Result<RenderedType, RenderError> {
        let mut imports = BTreeMap::new();
        let text = self.render_inner(ty, &mut imports)?;
        Ok(RenderedType { text, imports })
    }

    fn render_inner(
        &self,
        ty: TypeId,
        imports: &mut BTreeMap<String, String>,
    ) -> Result<String, RenderError> {
        match self.store.ty(ty) {
            Type::Invalid => Err(RenderError("unresolved type".to_string())),
            Type::Basic(k) => {
                if k.is_untyped() {
                    let def = k.default_kind();
                    if def.is_untyped() {
                        return Err(RenderError(format!("{} has no concrete form", k.name())));
                    }
                    Ok(def.name().to_string())
                } else {
                    Ok(k.name().to_string())
                }
            }
            Type::Named(nid) => {
                let def = self.store.named_def(*nid);
                match &def.pkg_path {
                    None => Ok(def.name.clone()),
                    Some(p) if p == self.pkg_path => Ok(def.name.clone()),
                    Some(p) => {
                        let qualifier = def
                            .qualifier
                            .clone()
                            .unwrap_or_else(|| p.rsplit('/').next().unwrap_or(p).to_string());
                        imports.insert(p.clone(), qualifier.clone());
                        Ok(format!("{qualifier}.{}", def.name))
                    }
                }
            }
            Type::Pointer { elem } => Ok(format!("*{}", self.render_inner(*elem, imports)?)),
            Type::Slice { elem } => Ok(format!("[]{}", self.render_inner(*elem, imports)?)),
            Type::Array { len, elem } => {
                Ok(format!("[{len}]{}", self.render_inner(*elem, imports)?))
            }
            Type::Map { key, value } => Ok(format!(
                "map[{}]{}",
                self.render_inner(*key, imports)?,
                self.render_inner(*value, imports)?
            )),
            Type::Chan { dir, elem } => {
                let elem = self.render_inner(*elem, imports)?;
                Ok(match dir {
                    ChanDir::Both => format!("chan {elem}"),
                    ChanDir::Send => format!("chan<- {elem}"),
                    ChanDir::Recv => format!("<-chan {elem}"),
                })
            }
            Type::Signature(sig) => Ok(format!("func{}", self.render_sig(sig, imports)?)),
            Type::Interface { methods } => {
                if methods.is_empty() {
                    return Ok("interface{}".to_string());
                }
                let mut parts = Vec::with_capacity(methods.len());
                for (name, sig_ty) in methods {
                    let sig = match self.store.ty(*sig_ty) {
                        Type::Signature(s) => s.clone(),
                        _ => return Err(RenderError(format!("method {name} has no signature"))),
                    };
                    parts.push(format!("{name}{}", self.render_sig(&sig, imports)?));
                }
                Ok(format!("interface{{ {} }}", parts.join("; ")))
            }
            Type::Struct { fields } => {
                if fields.is_empty() {
                    return Ok("struct{}".to_string());
                }
                let mut parts = Vec::with_capacity(fields.len());
                for f in fields {
                    let mut s = format!("{} {}", f.name, self.render_inner(f.ty, imports)?);
                    if let Some(tag) = &f.tag {
                        if !tag.is_empty() {
                            s.push(' ');
                            s.push_str(&format!("{tag:?}"));
                        }
                    }
                    parts.push(s);
                }
                Ok(format!("struct{{ {} }}", parts.join("; ")))
            }
        }
    }

    fn render_sig(
        &self,
        sig: &Signature,
        imports: &mut BTreeMap<String, String>,
    ) -> Result<String, RenderError> {
        let mut params = Vec::with_capacity(sig.params.len());
        for (i, &p) in sig.params.iter().enumerate() {
            let mut t = self.render_inner(p, imports)?;
            if sig.variadic && i == sig.params.len() - 1 {
                // The variadic marker applies to the slice element.
                let elem = match self.store.ty(p) {
                    Type::Slice { elem } => Some(*elem),
                    _ => None,
                };
                t = match elem {
                    Some(e) => format!("...{}", self.render_inner(e, imports)?),
                    None => format!("...{t}"),
                };
            }
            params.push(t);
        }
        let mut results = Vec::with_capacity(sig.results.len());
        for &r in &sig.results {
            results.push(self.render_inner(r, imports)?);
        }
        Ok(format!("({}) ({})", params.join(","), results.join(",")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nilguard_syntax::{parse_type_expr, Ast};
    use nilguard_types::{FieldDef, ObjectArena, TypeStore};
    use nilguard_types::universe::Universe;

    fn store_with_universe() -> TypeStore {
        let mut store = TypeStore::new();
        let mut objs = ObjectArena::new();
        let _ = Universe::build(&mut store, &mut objs);
        store
    }

    fn assert_parses(text: &str) {
        let mut ast = Ast::new();
        parse_type_expr(&mut ast, text).unwrap_or_else(|e| panic!("{text}: {e}"));
    }

    #[test]
    fn renders_basic_and_untyped() {
        let mut s = store_with_universe();
        let int = s.basic(BasicKind::Int);
        let r = TypeRenderer::new(&s, "a");
        assert_eq!(r.render(int).unwrap().text, "int");
        let ui = s.basic(BasicKind::UntypedInt);
        assert_eq!(TypeRenderer::new(&s, "a").render(ui).unwrap().text, "int");
        let ur = s.basic(BasicKind::UntypedRune);
        assert_eq!(TypeRenderer::new(&s, "a").render(ur).unwrap().text, "int32");
    }

    #[test]
    fn renders_composites() {
        let mut s = store_with_universe();
        let int = s.basic(BasicKind::Int);
        let str_ = s.basic(BasicKind::String);
        let ptr = s.pointer(int);
        let slice = s.intern(Type::Slice { elem: ptr });
        let arr = s.intern(Type::Array { len: 4, elem: int });
        let map = s.intern(Type::Map {
            key: str_,
            value: slice,
        });
        let r = TypeRenderer::new(&s, "a");
        assert_eq!(r.render(ptr).unwrap().text, "*int");
        assert_eq!(r.render(slice).unwrap().text, "[]*int");
        assert_eq!(r.render(arr).unwrap().text, "[4]int");
        let m = r.render(map).unwrap().text;
        assert_eq!(m, "map[string][]*int");
        assert_parses(&m);
    }

    #[test]
    fn renders_chan_directions() {
        let mut s = store_with_universe();
        let int = s.basic(BasicKind::Int);
        for (dir, want) in [
            (ChanDir::Both, "chan int"),
            (ChanDir::Send, "chan<- int"),
            (ChanDir::Recv, "<-chan int"),
        ] {
            let c = s.intern(Type::Chan { dir, elem: int });
            let got = TypeRenderer::new(&s, "a").render(c).unwrap().text;
            assert_eq!(got, want);
            assert_parses(&got);
        }
    }

    #[test]
    fn renders_variadic_interface() {
        let mut s = store_with_universe();
        let int = s.basic(BasicKind::Int);
        let str_ = s.basic(BasicKind::String);
        let str_slice = s.intern(Type::Slice { elem: str_ });
        let sig = s.intern(Type::Signature(Signature {
            params: vec![int, str_slice],
            results: vec![int],
            variadic: true,
        }));
        let iface = s.intern(Type::Interface {
            methods: vec![("F".to_string(), sig)],
        });
        let got = TypeRenderer::new(&s, "a").render(iface).unwrap().text;
        assert_eq!(got, "interface{ F(int,...string) (int) }");
        assert_parses(&got);
    }

    #[test]
    fn renders_struct_with_tag() {
        let mut s = store_with_universe();
        let int = s.basic(BasicKind::Int);
        let str_ = s.basic(BasicKind::String);
        let st = s.intern(Type::Struct {
            fields: vec![
                FieldDef {
                    name: "N".to_string(),
                    ty: int,
                    tag: Some("json:\"n\"".to_string()),
                },
                FieldDef {
                    name: "S".to_string(),
                    ty: str_,
                    tag: None,
                },
            ],
        });
        let got = TypeRenderer::new(&s, "a").render(st).unwrap().text;
        assert_eq!(got, "struct{ N int \"json:\\\"n\\\"\"; S string }");
        assert_parses(&got);
    }

    #[test]
    fn qualifies_foreign_named_types() {
        let mut s = store_with_universe();
        let (_, logger) = s.new_named(
            "Logger",
            Some("go.uber.org/zap".to_string()),
            Some("zap".to_string()),
        );
        let ptr = s.pointer(logger);
        let r = TypeRenderer::new(&s, "a").render(ptr).unwrap();
        assert_eq!(r.text, "*zap.Logger");
        assert_eq!(r.imports.get("go.uber.org/zap").map(String::as_str), Some("zap"));
        assert_parses(&r.text);
    }

    #[test]
    fn same_package_named_renders_bare() {
        let mut s = store_with_universe();
        let (_, t) = s.new_named("T", Some("a".to_string()), None);
        let ptr = s.pointer(t);
        let r = TypeRenderer::new(&s, "a").render(ptr).unwrap();
        assert_eq!(r.text, "*T");
        assert!(r.imports.is_empty());
    }

    #[test]
    fn invalid_type_fails() {
        let s = store_with_universe();
        let r = TypeRenderer::new(&s, "a");
        assert!(r.render(TypeId(0)).is_err());
    }
}
