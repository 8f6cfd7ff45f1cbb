//! Nil-origin detection and propagation over points-to results.

use std::collections::HashSet;

use nilguard_pointer::PointerResult;
use nilguard_ssa::{Instr, SsaProgram, ValueId, ValueKind};

/// Values considered possibly nil. Grows monotonically while queries
/// are processed.
pub type NilSet = HashSet<ValueId>;

/// Apply the propagation rule to every query, in order: a query joins
/// the set when it is itself nil-origin, and an alias edge pulls in
/// both ends whenever the label's value is nil-origin.
pub fn propagate(
    ssa: &SsaProgram,
    nil_names: &HashSet<String>,
    result: &PointerResult,
    queries: &[ValueId],
) -> NilSet {
    let mut nils = NilSet::new();
    for &q in queries {
        if is_nil(ssa, nil_names, q) {
            nils.insert(q);
        }
        if let Some(set) = result.queries.get(&q) {
            for label in set.labels() {
                let lv = label.value();
                if is_nil(ssa, nil_names, lv) {
                    nils.insert(q);
                    nils.insert(lv);
                }
            }
        }
    }
    nils
}

/// Whether `v` traces back to a synthetic nil declaration. Each
/// top-level call carries its own visited set; re-entry through a
/// store/load cycle conservatively answers "not nil".
pub fn is_nil(ssa: &SsaProgram, nil_names: &HashSet<String>, v: ValueId) -> bool {
    let mut visited = HashSet::new();
    is_nil_rec(ssa, nil_names, v, &mut visited)
}

fn is_nil_rec(
    ssa: &SsaProgram,
    nil_names: &HashSet<String>,
    v: ValueId,
    visited: &mut HashSet<ValueId>,
) -> bool {
    if !visited.insert(v) {
        return false;
    }

    match &ssa.value(v).kind {
        // A dereference of a nil-origin cell or pointer.
        ValueKind::Load { addr } => {
            if is_nil_rec(ssa, nil_names, *addr, visited) {
                return true;
            }
        }
        // A global whose package initializer binds it to a synthetic
        // nil name.
        ValueKind::Global { obj, .. } => {
            if let Some(rhs) = ssa.init_idents.get(obj) {
                if nil_names.contains(rhs) {
                    return true;
                }
            }
        }
        _ => {}
    }

    for &iid in ssa.referrers(v) {
        match ssa.instr(iid) {
            // A debug reference naming a synthetic nil identifier.
            Instr::DebugRef {
                ident: Some(name),
                value,
                ..
            } if *value == v && nil_names.contains(name) => return true,
            // A store of a nil-origin value into this cell.
            Instr::Store { addr, value } if *addr == v => {
                if is_nil_rec(ssa, nil_names, *value, visited) {
                    return true;
                }
            }
            _ => {}
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use nilguard_load::LoadConfig;
    use nilguard_rewrite::rewrite_and_reload;
    use nilguard_ssa::build;
    use std::fs;
    use std::path::Path;

    fn write(dir: &Path, rel: &str, text: &str) {
        let p = dir.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(p, text).unwrap();
    }

    fn rewritten(src: &str) -> (nilguard_rewrite::RewriteResult, SsaProgram) {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "go.mod", "module a\n");
        write(tmp.path(), "main.go", src);
        let r = rewrite_and_reload(
            &LoadConfig {
                dir: tmp.path().to_path_buf(),
            },
            &[],
        )
        .unwrap();
        let ssa = build(&r.program).unwrap();
        (r, ssa)
    }

    fn value_named(ssa: &SsaProgram, name: &str) -> ValueId {
        for instr in &ssa.instrs {
            if let Instr::DebugRef {
                ident: Some(n),
                value,
                ..
            } = instr
            {
                if n == name {
                    return *value;
                }
            }
        }
        panic!("no debug ref for {name}");
    }

    #[test]
    fn local_nil_var_is_nil_origin() {
        let (r, ssa) = rewritten(
            "package main\n\nfunc main() {\n\tvar err error\n\tprintln(err.Error())\n}\n",
        );
        let err = value_named(&ssa, "err");
        assert!(is_nil(&ssa, &r.is_nil, err));
    }

    #[test]
    fn zero_global_is_nil_origin() {
        let (r, ssa) = rewritten(
            "package main\n\ntype T struct {\n\tN int\n}\n\nvar gt *T\n\nfunc main() {\n\tprintln(gt.N)\n}\n",
        );
        let gt = value_named(&ssa, "gt");
        assert!(is_nil(&ssa, &r.is_nil, gt));
    }

    #[test]
    fn fresh_alloc_is_not_nil_origin() {
        let (r, ssa) = rewritten(
            "package main\n\ntype T struct {\n\tN int\n}\n\nfunc main() {\n\tt := new(T)\n\tprintln(t.N)\n}\n",
        );
        let t = value_named(&ssa, "t");
        assert!(!is_nil(&ssa, &r.is_nil, t));
    }

    #[test]
    fn store_cycles_terminate() {
        // p = &p-style cycles must not loop the visited walk.
        let (r, ssa) = rewritten(
            "package main\n\ntype T struct {\n\tN int\n\tm *T\n}\n\nfunc main() {\n\tvar p *T\n\tfor i := 0; i < 3; i++ {\n\t\tp = p\n\t}\n\tprintln(p.N)\n}\n",
        );
        let p = value_named(&ssa, "p");
        // Terminates, and p is still nil-origin through its initializer.
        assert!(is_nil(&ssa, &r.is_nil, p));
    }

    #[test]
    fn propagation_is_monotone_and_keyed_on_labels() {
        let (r, ssa) = rewritten(
            "package main\n\ntype T struct {\n\tN int\n}\n\nvar gt *T\n\nfunc h(n int) *T {\n\tif n%2 == 0 {\n\t\treturn gt\n\t}\n\treturn new(T)\n}\n\nfunc main() {\n\tt2 := h(2)\n\tprintln(t2.N)\n}\n",
        );
        let t2 = value_named(&ssa, "t2");
        let gt = value_named(&ssa, "gt");
        let result = nilguard_pointer::analyze(&ssa, &[t2, gt]).unwrap();
        let nils = propagate(&ssa, &r.is_nil, &result, &[t2, gt]);
        assert!(nils.contains(&t2), "t2 aliases the nil-origin global");
        assert!(nils.contains(&gt));
    }
}
