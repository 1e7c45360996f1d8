mod common;

use std::path::Path;
use std::process::Command;

use common::*;
use nefc::compiler::ast::{Expr, Import, Stmt};
use nefc::compiler::builtins::UTIL_PKG;
use nefc::compiler::types::Type;
use nefc::smartcontract::{Manifest, Nef};

fn nefc(args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_nefc"))
        .args(args)
        .output()
        .expect("failed to execute nefc");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn write_unit(dir: &Path, body: Vec<Stmt>) -> String {
    let u = unit(file(
        vec![Import::new(UTIL_PKG)],
        vec![func("Main", vec![], Type::Int, body)],
    ));
    let path = dir.join("foo.json");
    std::fs::write(&path, serde_json::to_string_pretty(&u).unwrap()).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_compile_writes_nef_and_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let unit_path = write_unit(dir.path(), vec![Stmt::ret(Expr::int(42))]);
    std::fs::write(dir.path().join("foo.toml"), "name = \"Answer\"\n").unwrap();

    let (_, stderr, success) = nefc(&["compile", &unit_path, "--dump-bytecode", "--debug"]);
    assert!(success, "compile should succeed, stderr:\n{}", stderr);
    assert!(stderr.contains("RET"), "bytecode listing expected on stderr:\n{}", stderr);

    let nef = Nef::from_bytes(&std::fs::read(dir.path().join("foo.nef")).unwrap()).unwrap();
    assert!(nef.compiler.starts_with("nefc-"));
    let manifest: Manifest =
        serde_json::from_str(&std::fs::read_to_string(dir.path().join("foo.manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest.name, "Answer");
    assert!(manifest.abi.method("main", Some(0)).is_some());
    assert!(dir.path().join("foo.debug.json").exists());

    let nef_path = dir.path().join("foo.nef");
    let (stdout, _, success) = nefc(&["dump", nef_path.to_str().unwrap()]);
    assert!(success);
    assert!(stdout.contains("PUSHINT8 42"), "{}", stdout);
}

#[test]
fn test_check_reports_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let unit_path = write_unit(
        dir.path(),
        vec![Stmt::ret(Expr::call(
            Expr::selector("util", "FromAddress"),
            vec![Expr::str("bogus")],
        ))],
    );
    let (_, stderr, success) = nefc(&["check", &unit_path]);
    assert!(!success, "check should fail");
    assert!(stderr.contains("foo.go"), "{}", stderr);
    assert!(stderr.contains("invalid address"), "{}", stderr);

    let ok_path = write_unit(dir.path(), vec![Stmt::ret(Expr::int(1))]);
    let (stdout, _, success) = nefc(&["check", &ok_path]);
    assert!(success);
    assert_eq!(stdout.trim(), "ok");
}
