//! Analysis pipeline — rewrite, lower, query, propagate, emit.

pub mod diagnostic;
pub mod index;
pub mod propagate;

use std::path::PathBuf;

use nilguard_load::LoadConfig;
use nilguard_pointer::PointerError;
use nilguard_rewrite::{rewrite_and_reload, RewriteError, RewriteResult};
use nilguard_ssa::{build, SsaError};
use nilguard_syntax::printer;

pub use diagnostic::{format_json, format_lines, Diagnostic};
use index::SelectorIndex;

#[derive(Debug, thiserror::Error)]
pub enum NilguardError {
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    #[error(transparent)]
    Ssa(#[from] SsaError),
    #[error("pointer analysis: {0}")]
    Pointer(#[from] PointerError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("{primary} (additionally, scratch teardown failed: {teardown})")]
    Teardown {
        primary: Box<NilguardError>,
        teardown: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory of the program under analysis.
    pub dir: PathBuf,
    /// Package patterns; empty means the working directory itself.
    pub patterns: Vec<String>,
}

/// Analysis output: diagnostics in stable source order.
#[derive(Debug, Default)]
pub struct Analysis {
    pub diagnostics: Vec<Diagnostic>,
}

/// Run the whole pipeline. The scratch tree is removed on every exit
/// path; a teardown failure joins the primary error instead of
/// replacing it.
pub fn run(cfg: &Config) -> Result<Analysis, NilguardError> {
    let load_cfg = LoadConfig {
        dir: cfg.dir.clone(),
    };
    let mut rewritten = rewrite_and_reload(&load_cfg, &cfg.patterns)?;
    let outcome = analyze(&rewritten);
    let teardown = rewritten.close();
    match (outcome, teardown) {
        (Ok(a), Ok(())) => Ok(a),
        (Ok(_), Err(e)) => Err(NilguardError::Io(e)),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(t)) => Err(NilguardError::Teardown {
            primary: Box::new(e),
            teardown: t,
        }),
    }
}

fn analyze(rewritten: &RewriteResult) -> Result<Analysis, NilguardError> {
    let program = &rewritten.program;
    let ssa = build(program)?;
    let index = SelectorIndex::collect(program, &ssa);
    if index.queries.is_empty() {
        return Ok(Analysis::default());
    }

    let ptr = nilguard_pointer::analyze(&ssa, &index.queries)?;
    let nils = propagate::propagate(&ssa, &rewritten.is_nil, &ptr, &index.queries);

    let mut found = Vec::new();
    for entry in &index.entries {
        if !nils.contains(&entry.value) {
            continue;
        }
        let span = program.ast.expr(entry.expr).span();
        let file = program.sources.file(span.file);
        let lc = file.line_col(span.start);
        let pkg_path = &program.packages[entry.pkg_idx].pkg_path;
        found.push((
            entry.pkg_idx,
            span.file,
            span.start,
            Diagnostic {
                path: format!("{}/{}", pkg_path, file.base_name()).replace('\\', "/"),
                line: lc.line,
                col: lc.col,
                selector: printer::print_expr(&program.ast, entry.expr),
            },
        ));
    }

    // Total order: package index, file index, byte position.
    found.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));
    found.dedup_by(|a, b| a.3 == b.3);

    Ok(Analysis {
        diagnostics: found.into_iter().map(|(_, _, _, d)| d).collect(),
    })
}

#[cfg(test)]
mod fixture_tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write(dir: &Path, rel: &str, text: &str) {
        let p = dir.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(p, text).unwrap();
    }

    /// Run the whole pipeline over an in-memory module fixture.
    fn check(files: &[(&str, &str)]) -> Vec<Diagnostic> {
        let tmp = tempfile::tempdir().unwrap();
        for (rel, text) in files {
            write(tmp.path(), rel, text);
        }
        let analysis = run(&Config {
            dir: tmp.path().to_path_buf(),
            patterns: vec![],
        })
        .unwrap();
        analysis.diagnostics
    }

    /// Line/column values point into the printed scratch tree, so they
    /// shift whenever the printer does. Zero them before snapshotting;
    /// path, selector and emission order are the stable contract.
    fn redact_diags(diags: &mut [Diagnostic]) {
        for d in diags.iter_mut() {
            d.line = 0;
            d.col = 0;
        }
    }

    #[test]
    fn direct_nil_interface_dereference() {
        let mut diags = check(&[
            ("go.mod", "module a\n"),
            (
                "main.go",
                "package main\n\nfunc main() {\n\tvar err error\n\tprintln(err.Error())\n}\n",
            ),
        ]);
        redact_diags(&mut diags);
        insta::assert_yaml_snapshot!("direct_nil_interface_dereference", &diags);
    }

    #[test]
    fn zero_global_flagged_param_not() {
        let mut diags = check(&[
            ("go.mod", "module a\n"),
            (
                "main.go",
                "package main\n\ntype T struct {\n\tN int\n}\n\nvar gt *T\n\nfunc g() *T {\n\treturn nil\n}\n\nfunc f(t *T) {\n\tprintln(t.N)\n}\n\nfunc main() {\n\tf(g())\n\tprintln(gt.N)\n}\n",
            ),
        ]);
        // The parameter inside f is fed by a fresh allocation only and
        // must stay quiet.
        assert!(
            diags.iter().all(|d| d.selector != "t.N"),
            "parameter inside f flagged: {diags:?}"
        );
        redact_diags(&mut diags);
        insta::assert_yaml_snapshot!("zero_global_flagged_param_not", &diags);
    }

    #[test]
    fn conditional_global_alias_flagged() {
        let mut diags = check(&[
            ("go.mod", "module a\n"),
            (
                "main.go",
                "package main\n\ntype T struct {\n\tN int\n}\n\nvar gt *T\n\nfunc h(n int) *T {\n\tif n%2 == 0 {\n\t\treturn gt\n\t}\n\treturn new(T)\n}\n\nfunc main() {\n\tt2 := h(2)\n\tprintln(t2.N)\n\tprintln(gt.N)\n}\n",
            ),
        ]);
        redact_diags(&mut diags);
        insta::assert_yaml_snapshot!("conditional_global_alias_flagged", &diags);
    }

    #[test]
    fn no_nil_no_diagnostics() {
        let mut diags = check(&[
            ("go.mod", "module a\n"),
            (
                "main.go",
                "package main\n\ntype T struct {\n\tN int\n}\n\nfunc main() {\n\tt := new(T)\n\tprintln(t.N)\n}\n",
            ),
        ]);
        redact_diags(&mut diags);
        insta::assert_yaml_snapshot!("no_nil_no_diagnostics", &diags);
    }

    #[test]
    fn diagnostics_are_in_source_order() {
        let mut diags = check(&[
            ("go.mod", "module a\n"),
            (
                "main.go",
                "package main\n\nfunc main() {\n\tvar a error\n\tvar b error\n\tprintln(a.Error())\n\tprintln(b.Error())\n}\n",
            ),
        ]);
        redact_diags(&mut diags);
        insta::assert_yaml_snapshot!("diagnostics_are_in_source_order", &diags);
    }

    #[test]
    fn interface_variadic_method_flagged() {
        let mut diags = check(&[
            ("go.mod", "module a\n"),
            (
                "main.go",
                "package main\n\nfunc main() {\n\tvar iface interface{ F(int, ...string) int }\n\tprintln(iface.F(10, \"a\"))\n}\n",
            ),
        ]);
        redact_diags(&mut diags);
        insta::assert_yaml_snapshot!("interface_variadic_method_flagged", &diags);
    }

    #[test]
    fn anonymous_struct_with_tag_flagged() {
        let mut diags = check(&[
            ("go.mod", "module a\n"),
            (
                "main.go",
                "package main\n\nfunc main() {\n\tvar st *struct {\n\t\tN int `json:\"n\"`\n\t\tS string\n\t}\n\tprintln(st.N)\n}\n",
            ),
        ]);
        redact_diags(&mut diags);
        insta::assert_yaml_snapshot!("anonymous_struct_with_tag_flagged", &diags);
    }

    #[test]
    fn library_pointer_flagged() {
        let mut diags = check(&[
            ("go.mod", "module a\n"),
            (
                "main.go",
                "package main\n\nimport \"go.uber.org/zap\"\n\nfunc main() {\n\tvar logger *zap.Logger\n\tprintln(logger.Info)\n}\n",
            ),
        ]);
        redact_diags(&mut diags);
        insta::assert_yaml_snapshot!("library_pointer_flagged", &diags);
    }
}
