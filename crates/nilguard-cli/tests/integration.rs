use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

fn write(dir: &Path, rel: &str, text: &str) {
    let p = dir.join(rel);
    if let Some(parent) = p.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(p, text).unwrap();
}

fn nilguard() -> Command {
    Command::cargo_bin("nilguard").unwrap()
}

/// Sorted "may be nil" lines from a run over the given module files.
fn check_lines(files: &[(&str, &str)]) -> Vec<String> {
    let tmp = tempfile::tempdir().unwrap();
    for (rel, text) in files {
        write(tmp.path(), rel, text);
    }
    let out = nilguard()
        .args(["check", "--dir"])
        .arg(tmp.path())
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    let mut lines: Vec<String> = String::from_utf8(out.stdout)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    lines
}

#[test]
fn version_prints() {
    nilguard()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nilguard"));
}

#[test]
fn direct_nil_assignment() {
    let lines = check_lines(&[
        ("go.mod", "module a\n"),
        (
            "main.go",
            "package main\n\nfunc main() {\n\tvar err error\n\tprintln(err.Error())\n}\n",
        ),
    ]);
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("a/main.go:"), "{lines:?}");
    assert!(lines[0].ends_with("err.Error may be nil"), "{lines:?}");
}

#[test]
fn return_nil_aliasing() {
    let lines = check_lines(&[
        ("go.mod", "module a\n"),
        (
            "main.go",
            "package main\n\ntype T struct {\n\tN int\n}\n\nvar gt *T\n\nfunc g() *T {\n\treturn nil\n}\n\nfunc f(t *T) {\n\tprintln(t.N)\n}\n\nfunc main() {\n\tf(g())\n\tprintln(gt.N)\n}\n",
        ),
    ]);
    // The zero-valued global is flagged; the parameter inside f is not,
    // because g's alias reaches only a fresh allocation.
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("gt.N may be nil"), "{lines:?}");
}

#[test]
fn interface_with_variadic_method() {
    let lines = check_lines(&[
        ("go.mod", "module a\n"),
        (
            "main.go",
            "package main\n\nfunc main() {\n\tvar iface interface{ F(int, ...string) int }\n\tprintln(iface.F(10, \"a\"))\n}\n",
        ),
    ]);
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("iface.F may be nil"), "{lines:?}");
}

#[test]
fn anonymous_struct_with_tag() {
    let lines = check_lines(&[
        ("go.mod", "module a\n"),
        (
            "main.go",
            "package main\n\nfunc main() {\n\tvar st *struct {\n\t\tN int `json:\"n\"`\n\t\tS string\n\t}\n\tprintln(st.N)\n}\n",
        ),
    ]);
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("st.N may be nil"), "{lines:?}");
}

#[test]
fn library_pointer() {
    let lines = check_lines(&[
        ("go.mod", "module a\n"),
        (
            "main.go",
            "package main\n\nimport \"go.uber.org/zap\"\n\nfunc main() {\n\tvar logger *zap.Logger\n\tprintln(logger.Info)\n}\n",
        ),
    ]);
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("logger.Info may be nil"), "{lines:?}");
}

#[test]
fn conditional_return_of_global_or_fresh() {
    let lines = check_lines(&[
        ("go.mod", "module a\n"),
        (
            "main.go",
            "package main\n\ntype T struct {\n\tN int\n}\n\nvar gt *T\n\nfunc h(n int) *T {\n\tif n%2 == 0 {\n\t\treturn gt\n\t}\n\treturn new(T)\n}\n\nfunc main() {\n\tt2 := h(2)\n\tprintln(t2.N)\n}\n",
        ),
    ]);
    let joined = lines.join("\n");
    assert!(joined.contains("t2.N may be nil"), "{lines:?}");
}

/// Redact `:line:col` positions — they point into the printed scratch
/// tree and shift whenever the printer changes. Lines re-sort after
/// redaction so the snapshot order is stable too.
fn redact_positions(lines: &[String]) -> String {
    let mut out: Vec<String> = lines
        .iter()
        .map(|line| match (line.find(':'), line.find(' ')) {
            (Some(c), Some(s)) if c < s => format!("{}:[pos]{}", &line[..c], &line[s..]),
            _ => line.clone(),
        })
        .collect();
    out.sort();
    out.join("\n")
}

#[test]
fn whole_testdata_program() {
    // The classic combined program: every local nil, the zero global
    // and the conditional alias are flagged; the parameter fed by
    // fresh allocations is not.
    let lines = check_lines(&[
        ("go.mod", "module a\n"),
        (
            "main.go",
            concat!(
                "package main\n\n",
                "type T struct {\n\tN int\n\tm *int\n}\n\n",
                "var gt *T\n\n",
                "func main() {\n",
                "\tf(new(T))\n",
                "\tf(g())\n",
                "\tprintln(gt.N)\n",
                "\tvar t *T\n",
                "\tprintln(t.N)\n",
                "\tt2 := h(2)\n",
                "\tprintln(t2.N)\n",
                "\tvar err error\n",
                "\tprintln(err.Error())\n",
                "}\n\n",
                "func f(t *T) {\n\tprintln(t.N)\n}\n\n",
                "func g() *T {\n\treturn nil\n}\n\n",
                "func h(n int) *T {\n\tif n%2 == 0 {\n\t\treturn gt\n\t}\n\treturn new(T)\n}\n",
            ),
        ),
    ]);
    // Exactly one bare `t.N` finding: main's nil local. The `t.N`
    // inside f is fed by fresh allocations and stays quiet.
    let t_n = lines
        .iter()
        .filter(|l| l.contains(" t.N may be nil"))
        .count();
    assert_eq!(t_n, 1, "parameter inside f must not be flagged: {lines:?}");
    insta::assert_snapshot!("whole_testdata_program", redact_positions(&lines));
}

#[test]
fn clean_program_exits_zero_with_no_output() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "go.mod", "module clean\n");
    write(
        tmp.path(),
        "main.go",
        "package main\n\nfunc main() {\n\tx := 1\n\tprintln(x)\n}\n",
    );
    nilguard()
        .args(["check", "--dir"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn missing_module_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "main.go", "package main\n\nfunc main() {}\n");
    nilguard()
        .args(["check", "--dir"])
        .arg(tmp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::starts_with("Error: "));
}

#[test]
fn type_errors_are_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "go.mod", "module bad\n");
    write(
        tmp.path(),
        "main.go",
        "package main\n\nfunc main() {\n\tprintln(zzz)\n}\n",
    );
    nilguard()
        .args(["check", "--dir"])
        .arg(tmp.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("undefined: zzz"));
}

#[test]
fn json_format() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "go.mod", "module a\n");
    write(
        tmp.path(),
        "main.go",
        "package main\n\nfunc main() {\n\tvar err error\n\tprintln(err.Error())\n}\n",
    );
    nilguard()
        .args(["check", "--format", "json", "--dir"])
        .arg(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"selector\": \"err.Error\""));
}

#[test]
fn recursive_pattern_spans_packages() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "go.mod", "module m\n");
    write(
        tmp.path(),
        "main.go",
        "package main\n\nfunc main() {\n\tvar err error\n\tprintln(err.Error())\n}\n",
    );
    write(
        tmp.path(),
        "sub/s.go",
        "package sub\n\nfunc S() {\n\tvar err error\n\tprintln(err.Error())\n}\n",
    );
    let out = nilguard()
        .args(["check", "./...", "--dir"])
        .arg(tmp.path())
        .output()
        .unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("m/main.go:"), "{stdout}");
    assert!(stdout.contains("m/sub/s.go:"), "{stdout}");
}
