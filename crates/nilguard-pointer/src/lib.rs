//! Andersen-style whole-program points-to analysis.
//!
//! Inclusion constraints over a unified node space: every SSA value is
//! a node, and allocation sites (cells, globals, functions) double as
//! the abstract objects that points-to sets contain. The solver is a
//! straightforward fixpoint over copy, load and store constraints —
//! analyzed programs are module-sized, so scalability tricks
//! (difference propagation, cycle collapsing) are deliberately absent.
//!
//! Sources of unsoundness, accepted and documented:
//! - dynamic and interface calls add no constraints;
//! - `append` and channel operations do not transfer element points-to
//!   sets;
//! - opaque package members are fresh, empty nodes.
//!
//! One deliberate coarsening: a load from a package-level variable also
//! yields the variable's own cell as a label. Package cells are mutable
//! from anywhere, including code outside the loaded set, so the cell
//! itself stays visible to consumers that need to reason about what a
//! chain of global reads may alias.

use std::collections::{BTreeSet, HashMap};

use nilguard_ssa::{Callee, Instr, SsaProgram, ValueId, ValueKind};

pub use nilguard_types::can_point;

#[derive(Debug, thiserror::Error)]
pub enum PointerError {
    #[error("points-to analysis requested no queries")]
    NoQueries,
}

/// One abstract object a value may point to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Label {
    value: ValueId,
}

impl Label {
    /// The SSA value of the allocation site or global cell.
    pub fn value(&self) -> ValueId {
        self.value
    }
}

/// Points-to set of one queried value.
#[derive(Debug, Clone, Default)]
pub struct PointsToSet {
    labels: Vec<Label>,
}

impl PointsToSet {
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Result of one analysis run: a points-to set per queried value.
#[derive(Debug, Default)]
pub struct PointerResult {
    pub queries: HashMap<ValueId, PointsToSet>,
}

/// Run the analysis and answer the given queries. Callers gate queries
/// on [`can_point`]; querying a non-pointer value is harmless and
/// yields an empty set.
pub fn analyze(ssa: &SsaProgram, queries: &[ValueId]) -> Result<PointerResult, PointerError> {
    if queries.is_empty() {
        return Err(PointerError::NoQueries);
    }

    let mut solver = Solver::default();
    solver.seed(ssa);
    solver.solve(ssa);

    let mut result = PointerResult::default();
    for &q in queries {
        let labels = solver
            .pts
            .get(&q)
            .map(|set| set.iter().map(|&value| Label { value }).collect())
            .unwrap_or_default();
        result.queries.insert(q, PointsToSet { labels });
    }
    tracing::debug!(queries = queries.len(), "points-to analysis complete");
    Ok(result)
}

#[derive(Debug, Default)]
struct Solver {
    /// value → objects it may point to.
    pts: HashMap<ValueId, BTreeSet<ValueId>>,
    /// object → objects its cell contents may point to.
    contents: HashMap<ValueId, BTreeSet<ValueId>>,
    /// pts(to) ⊇ pts(from).
    copies: Vec<(ValueId, ValueId)>,
    /// dst ⊇ contents(o) for every o in pts(addr).
    loads: Vec<(ValueId, ValueId)>,
    /// contents(o) ⊇ pts(src) for every o in pts(addr).
    stores: Vec<(ValueId, ValueId)>,
}

impl Solver {
    fn seed(&mut self, ssa: &SsaProgram) {
        for (i, v) in ssa.values.iter().enumerate() {
            let id = ValueId(i as u32);
            match &v.kind {
                ValueKind::Alloc { .. }
                | ValueKind::Global { .. }
                | ValueKind::Function { .. }
                | ValueKind::Closure { .. } => {
                    self.pts.entry(id).or_default().insert(id);
                }
                ValueKind::Load { addr } => self.loads.push((*addr, id)),
                ValueKind::FieldAddr { base, .. } => self.copies.push((*base, id)),
                ValueKind::Call {
                    callee: Callee::Static(f),
                    args,
                } => {
                    let callee = ssa.func(*f);
                    for (arg, param) in args.iter().zip(&callee.params) {
                        self.copies.push((*arg, *param));
                    }
                    for ret in ssa.returns_of(*f) {
                        // Single-result flow; the first value stands in
                        // for multi-result tuples.
                        if let Some(&r) = ret.first() {
                            self.copies.push((r, id));
                        }
                    }
                }
                _ => {}
            }
        }
        for instr in &ssa.instrs {
            if let Instr::Store { addr, value } = instr {
                self.stores.push((*addr, *value));
            }
        }
    }

    fn is_global(ssa: &SsaProgram, v: ValueId) -> bool {
        matches!(ssa.value(v).kind, ValueKind::Global { .. })
    }

    /// Naive fixpoint: apply every constraint until nothing grows.
    fn solve(&mut self, ssa: &SsaProgram) {
        loop {
            let mut changed = false;

            for &(from, to) in &self.copies {
                let add: Vec<ValueId> = self
                    .pts
                    .get(&from)
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default();
                if !add.is_empty() {
                    let dst = self.pts.entry(to).or_default();
                    for o in add {
                        changed |= dst.insert(o);
                    }
                }
            }

            for &(addr, src) in &self.stores {
                let objs: Vec<ValueId> = self
                    .pts
                    .get(&addr)
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default();
                let src_pts: Vec<ValueId> = self
                    .pts
                    .get(&src)
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default();
                if src_pts.is_empty() {
                    continue;
                }
                for o in objs {
                    let cell = self.contents.entry(o).or_default();
                    for &p in &src_pts {
                        changed |= cell.insert(p);
                    }
                }
            }

            for &(addr, dst) in &self.loads {
                let objs: Vec<ValueId> = self
                    .pts
                    .get(&addr)
                    .map(|s| s.iter().copied().collect())
                    .unwrap_or_default();
                for o in objs {
                    let mut add: Vec<ValueId> = self
                        .contents
                        .get(&o)
                        .map(|s| s.iter().copied().collect())
                        .unwrap_or_default();
                    if Self::is_global(ssa, o) {
                        add.push(o);
                    }
                    if !add.is_empty() {
                        let set = self.pts.entry(dst).or_default();
                        for p in add {
                            changed |= set.insert(p);
                        }
                    }
                }
            }

            if !changed {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nilguard_load::{load, LoadConfig};
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

    fn lower(src: &str) -> (nilguard_load::Program, SsaProgram) {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "go.mod", "module a\n");
        write(tmp.path(), "main.go", src);
        let prog = load(
            &LoadConfig {
                dir: tmp.path().to_path_buf(),
            },
            &[],
        )
        .unwrap();
        let ssa = build(&prog).unwrap();
        (prog, ssa)
    }

    /// Value of the first debug-ref whose identifier is `name`.
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
    fn alloc_flows_through_locals() {
        let (_, ssa) = lower(
            "package main\n\ntype T struct {\n\tN int\n}\n\nfunc main() {\n\tt := new(T)\n\tu := t\n\tprintln(u.N)\n}\n",
        );
        let u = value_named(&ssa, "u");
        let res = analyze(&ssa, &[u]).unwrap();
        let labels = res.queries[&u].labels();
        assert_eq!(labels.len(), 1);
        assert!(matches!(
            ssa.value(labels[0].value()).kind,
            ValueKind::Alloc { heap: true, .. }
        ));
    }

    #[test]
    fn param_receives_argument_objects() {
        let (_, ssa) = lower(
            "package main\n\ntype T struct {\n\tN int\n}\n\nfunc f(t *T) {\n\tprintln(t.N)\n}\n\nfunc main() {\n\tf(new(T))\n}\n",
        );
        let t = value_named(&ssa, "t");
        let res = analyze(&ssa, &[t]).unwrap();
        assert_eq!(res.queries[&t].labels().len(), 1);
    }

    #[test]
    fn call_result_carries_returned_allocs() {
        let (_, ssa) = lower(
            "package main\n\ntype T struct {\n\tN int\n}\n\nfunc g() *T {\n\treturn new(T)\n}\n\nfunc main() {\n\tt2 := g()\n\tprintln(t2.N)\n}\n",
        );
        let t2 = value_named(&ssa, "t2");
        let res = analyze(&ssa, &[t2]).unwrap();
        assert_eq!(res.queries[&t2].labels().len(), 1);
    }

    #[test]
    fn loads_from_globals_include_the_global_cell() {
        let (_, ssa) = lower(
            "package main\n\ntype T struct {\n\tN int\n}\n\nvar gt = new(T)\n\nfunc main() {\n\tprintln(gt.N)\n}\n",
        );
        let gt = value_named(&ssa, "gt");
        let res = analyze(&ssa, &[gt]).unwrap();
        let labels = res.queries[&gt].labels();
        assert!(
            labels
                .iter()
                .any(|l| matches!(ssa.value(l.value()).kind, ValueKind::Global { .. })),
            "global cell missing from {labels:?}"
        );
        assert!(
            labels
                .iter()
                .any(|l| matches!(ssa.value(l.value()).kind, ValueKind::Alloc { .. })),
            "stored alloc missing from {labels:?}"
        );
    }

    #[test]
    fn store_then_load_aliases() {
        let (_, ssa) = lower(
            "package main\n\ntype T struct {\n\tN int\n}\n\nfunc main() {\n\tvar p *T\n\tp = new(T)\n\tq := p\n\tprintln(q.N)\n}\n",
        );
        let q = value_named(&ssa, "q");
        let res = analyze(&ssa, &[q]).unwrap();
        assert!(!res.queries[&q].is_empty());
    }

    #[test]
    fn empty_query_list_is_an_error() {
        let (_, ssa) = lower("package main\n\nfunc main() {\n\tprintln(1)\n}\n");
        assert!(matches!(analyze(&ssa, &[]), Err(PointerError::NoQueries)));
    }

    #[test]
    fn conditional_return_merges_both_sources() {
        let (_, ssa) = lower(
            "package main\n\ntype T struct {\n\tN int\n}\n\nvar gt = new(T)\n\nfunc h(n int) *T {\n\tif n%2 == 0 {\n\t\treturn gt\n\t}\n\treturn new(T)\n}\n\nfunc main() {\n\tt2 := h(2)\n\tprintln(t2.N)\n}\n",
        );
        let t2 = value_named(&ssa, "t2");
        let res = analyze(&ssa, &[t2]).unwrap();
        let labels = res.queries[&t2].labels();
        // The fresh alloc in h, the alloc stored in gt, and the global
        // cell itself.
        assert!(labels.len() >= 2, "got {labels:?}");
        assert!(labels
            .iter()
            .any(|l| matches!(ssa.value(l.value()).kind, ValueKind::Global { .. })));
    }
}
