//! Program loading: file discovery, module manifest, parse and check.
//!
//! `load` walks the working directory for `.go` files, groups them into
//! packages by directory, parses everything into one AST arena and
//! type-checks package by package. Imports that name another package of
//! the same module resolve to it when it was checked first (directory
//! order guarantees parents before children); anything else loads as an
//! opaque package.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use nilguard_syntax::{parse_file, Ast, AstFileId, SourceFile, SourceMap, Span};
use nilguard_types::checker::{check_package, PackageExports};
use nilguard_types::universe::Universe;
use nilguard_types::{ObjId, ObjectArena, TypeInfo, TypeStore};

/// Go module described by a `go.mod` manifest.
#[derive(Debug, Clone)]
pub struct Module {
    pub path: String,
    pub manifest: PathBuf,
}

/// One loaded, checked package.
#[derive(Debug)]
pub struct Package {
    pub name: String,
    /// Module-qualified import path.
    pub pkg_path: String,
    /// Directory relative to the load root ("" for the root itself).
    pub rel_dir: String,
    pub files: Vec<AstFileId>,
    /// Package scope, for synthetic-name collision checks.
    pub scope: HashMap<String, ObjId>,
}

/// A whole loaded program: every package of the main module plus the
/// shared arenas the side tables key into.
pub struct Program {
    pub module: Module,
    pub packages: Vec<Package>,
    pub ast: Ast,
    pub sources: SourceMap,
    pub store: TypeStore,
    pub objects: ObjectArena,
    pub universe: Universe,
    pub info: TypeInfo,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("module", &self.module.path)
            .field("packages", &self.packages.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Working directory holding the module.
    pub dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("cannot find main module: no go.mod under {0}")]
    ModuleMissing(PathBuf),
    #[error("no packages matched {0:?}")]
    NoPackages(Vec<String>),
    #[error("{path}: {message}")]
    Syntax { path: String, message: String },
    /// Aggregated type errors across all packages.
    #[error("{}", format_type_errors(.0))]
    TypeErrors(Vec<String>),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn format_type_errors(errs: &[String]) -> String {
    errs.join("\n")
}

/// Load, parse and type-check the packages matched by `patterns` under
/// `cfg.dir`. An empty pattern list means the root package (`.`).
pub fn load(cfg: &LoadConfig, patterns: &[String]) -> Result<Program, LoadError> {
    let module = read_module(&cfg.dir)?;
    let dirs = match_patterns(&cfg.dir, patterns)?;
    if dirs.is_empty() {
        return Err(LoadError::NoPackages(patterns.to_vec()));
    }

    let mut ast = Ast::new();
    let mut sources = SourceMap::new();
    let mut store = TypeStore::new();
    let mut objects = ObjectArena::new();
    let universe = Universe::build(&mut store, &mut objects);
    let mut info = TypeInfo::new();

    let mut packages = Vec::new();
    let mut exports: HashMap<String, PackageExports> = HashMap::new();
    let mut pkg_errors: Vec<String> = Vec::new();

    for rel_dir in dirs {
        let abs = cfg.dir.join(&rel_dir);
        let mut go_files: Vec<PathBuf> = fs::read_dir(&abs)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "go").unwrap_or(false))
            .collect();
        go_files.sort();
        if go_files.is_empty() {
            continue;
        }

        let mut file_ids = Vec::new();
        let mut pkg_name = String::new();
        for path in &go_files {
            let text = fs::read_to_string(path)?;
            let rel_path = rel_file_path(&rel_dir, path);
            let fid = sources.add(SourceFile::new(rel_path.clone(), text));
            let text = sources.file(fid).text.clone();
            let ast_file = parse_file(&mut ast, fid, &text).map_err(|e| LoadError::Syntax {
                path: rel_path.clone(),
                message: format!("{}: {}", describe_pos(&sources, e.span), e.message),
            })?;
            if pkg_name.is_empty() {
                pkg_name = ast.file(ast_file).package_name.clone();
            }
            file_ids.push(ast_file);
        }

        let pkg_path = if rel_dir.is_empty() {
            module.path.clone()
        } else {
            format!("{}/{}", module.path, rel_dir)
        };
        tracing::debug!(package = %pkg_path, files = file_ids.len(), "checking package");

        let result = check_package(
            &ast,
            &file_ids,
            &pkg_path,
            &mut store,
            &mut objects,
            &universe,
            &exports,
        );
        if !result.errors.is_empty() {
            // Keep checking the remaining packages so one load surfaces
            // every package's errors at once.
            pkg_errors.extend(
                result
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", describe_pos(&sources, e.span), e.message)),
            );
            continue;
        }
        exports.insert(
            pkg_path.clone(),
            PackageExports {
                name: pkg_name.clone(),
                path: pkg_path.clone(),
                scope: result.scope.clone(),
            },
        );
        info.merge(result.info);
        packages.push(Package {
            name: pkg_name,
            pkg_path,
            rel_dir,
            files: file_ids,
            scope: result.scope,
        });
    }

    if !pkg_errors.is_empty() {
        return Err(LoadError::TypeErrors(pkg_errors));
    }
    if packages.is_empty() {
        return Err(LoadError::NoPackages(patterns.to_vec()));
    }

    Ok(Program {
        module,
        packages,
        ast,
        sources,
        store,
        objects,
        universe,
        info,
    })
}

fn describe_pos(sources: &SourceMap, span: Span) -> String {
    if span.file.0 == u32::MAX {
        return "<generated>".to_string();
    }
    let f = sources.file(span.file);
    let lc = f.line_col(span.start);
    format!("{}:{}:{}", f.rel_path, lc.line, lc.col)
}

fn rel_file_path(rel_dir: &str, path: &Path) -> String {
    let base = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if rel_dir.is_empty() {
        base
    } else {
        format!("{rel_dir}/{base}")
    }
}

/// Parse the `module` directive out of `go.mod`.
fn read_module(dir: &Path) -> Result<Module, LoadError> {
    let manifest = dir.join("go.mod");
    let text = match fs::read_to_string(&manifest) {
        Ok(t) => t,
        Err(_) => return Err(LoadError::ModuleMissing(dir.to_path_buf())),
    };
    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("module") {
            if rest.starts_with(char::is_whitespace) {
                let path = rest.trim().trim_matches('"').to_string();
                if !path.is_empty() {
                    return Ok(Module { path, manifest });
                }
            }
        }
    }
    Err(LoadError::ModuleMissing(dir.to_path_buf()))
}

/// Resolve package patterns to directories relative to the root.
/// Supported: `.` (root), `./...` (every directory with Go files),
/// and plain relative directories like `./sub` or `sub`.
fn match_patterns(root: &Path, patterns: &[String]) -> Result<Vec<String>, LoadError> {
    let defaults = [".".to_string()];
    let patterns: &[String] = if patterns.is_empty() {
        &defaults
    } else {
        patterns
    };

    let mut dirs: Vec<String> = Vec::new();
    let mut push = |d: String| {
        if !dirs.contains(&d) {
            dirs.push(d);
        }
    };

    for pat in patterns {
        let pat = pat.as_str();
        if pat == "." || pat == "./" {
            push(String::new());
        } else if pat == "./..." || pat == "..." {
            let mut found: Vec<String> = Vec::new();
            for entry in WalkDir::new(root)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if entry.file_type().is_file()
                    && entry.path().extension().map(|e| e == "go").unwrap_or(false)
                {
                    let parent = entry
                        .path()
                        .parent()
                        .and_then(|p| p.strip_prefix(root).ok())
                        .map(|p| p.to_string_lossy().replace('\\', "/"))
                        .unwrap_or_default();
                    if !found.contains(&parent) {
                        found.push(parent);
                    }
                }
            }
            found.sort();
            for d in found {
                push(d);
            }
        } else {
            let clean = pat.trim_start_matches("./").trim_end_matches('/');
            push(clean.replace('\\', "/"));
        }
    }
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, text: &str) {
        let p = dir.join(rel);
        if let Some(parent) = p.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(p, text).unwrap();
    }

    #[test]
    fn loads_single_package() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "go.mod", "module a\n\ngo 1.22\n");
        write(
            tmp.path(),
            "main.go",
            "package main\n\nfunc main() {\n\tprintln(1)\n}\n",
        );
        let prog = load(
            &LoadConfig {
                dir: tmp.path().to_path_buf(),
            },
            &[],
        )
        .unwrap();
        assert_eq!(prog.module.path, "a");
        assert_eq!(prog.packages.len(), 1);
        assert_eq!(prog.packages[0].name, "main");
        assert_eq!(prog.packages[0].pkg_path, "a");
    }

    #[test]
    fn recursive_pattern_finds_subpackages() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "go.mod", "module m\n");
        write(tmp.path(), "main.go", "package main\n\nfunc main() {}\n");
        write(tmp.path(), "sub/s.go", "package sub\n\nvar X = 1\n");
        let prog = load(
            &LoadConfig {
                dir: tmp.path().to_path_buf(),
            },
            &["./...".to_string()],
        )
        .unwrap();
        assert_eq!(prog.packages.len(), 2);
        assert_eq!(prog.packages[1].pkg_path, "m/sub");
        assert_eq!(prog.packages[1].rel_dir, "sub");
    }

    #[test]
    fn missing_module_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "main.go", "package main\n\nfunc main() {}\n");
        let err = load(
            &LoadConfig {
                dir: tmp.path().to_path_buf(),
            },
            &[],
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::ModuleMissing(_)));
    }

    #[test]
    fn type_errors_are_aggregated() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "go.mod", "module bad\n");
        write(
            tmp.path(),
            "main.go",
            "package main\n\nfunc main() {\n\tprintln(zzz)\n\tprintln(yyy)\n}\n",
        );
        let err = load(
            &LoadConfig {
                dir: tmp.path().to_path_buf(),
            },
            &[],
        )
        .unwrap_err();
        match err {
            LoadError::TypeErrors(msgs) => {
                assert_eq!(msgs.len(), 2);
                assert!(msgs[0].contains("undefined: zzz"));
                assert!(msgs[0].contains("main.go:4"));
            }
            other => panic!("expected type errors, got {other:?}"),
        }
    }

    #[test]
    fn type_errors_aggregate_across_packages() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "go.mod", "module bad\n");
        write(
            tmp.path(),
            "main.go",
            "package main\n\nfunc main() {\n\tprintln(zzz)\n}\n",
        );
        write(
            tmp.path(),
            "sub/s.go",
            "package sub\n\nfunc S() {\n\tprintln(yyy)\n}\n",
        );
        let err = load(
            &LoadConfig {
                dir: tmp.path().to_path_buf(),
            },
            &["./...".to_string()],
        )
        .unwrap_err();
        match err {
            LoadError::TypeErrors(msgs) => {
                assert_eq!(msgs.len(), 2, "{msgs:?}");
                assert!(msgs[0].contains("main.go:4"), "{msgs:?}");
                assert!(msgs[0].contains("undefined: zzz"), "{msgs:?}");
                assert!(msgs[1].contains("sub/s.go:4"), "{msgs:?}");
                assert!(msgs[1].contains("undefined: yyy"), "{msgs:?}");
            }
            other => panic!("expected aggregated type errors, got {other:?}"),
        }
    }

    #[test]
    fn opaque_imports_load_cleanly() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "go.mod", "module a\n");
        write(
            tmp.path(),
            "main.go",
            "package main\n\nimport \"go.uber.org/zap\"\n\nfunc main() {\n\tvar logger *zap.Logger\n\tprintln(logger)\n}\n",
        );
        let prog = load(
            &LoadConfig {
                dir: tmp.path().to_path_buf(),
            },
            &[],
        )
        .unwrap();
        assert_eq!(prog.packages.len(), 1);
    }
}
