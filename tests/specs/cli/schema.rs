//! `ctlwire schema` specs

use crate::prelude::*;
use ctlwire_core::test_support::SAMPLE_SCHEMAS;

fn schema_file() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schemas.toml");
    std::fs::write(&path, SAMPLE_SCHEMAS).unwrap();
    let path = path.display().to_string();
    (dir, path)
}

#[test]
fn prints_one_layout() {
    let (_dir, path) = schema_file();
    cli()
        .args(&["schema", &path, "endpoint"])
        .passes()
        .stdout_eq(
            "endpoint (35 bytes)\n\
             \x20     0  addr         addr (17 bytes)\n\
             \x20    17  port         u16 (2 bytes)\n\
             \x20    19  name         u8[16] (16 bytes)\n",
        );
}

#[test]
fn prints_every_layout_sorted() {
    let (_dir, path) = schema_file();
    let run = cli().args(&["schema", &path]).passes();
    let stdout = run.stdout();
    let endpoint = stdout.find("endpoint (").unwrap();
    let sid = stdout.find("session-id (").unwrap();
    let target = stdout.find("target (").unwrap();
    assert!(endpoint < sid && sid < target);
}

#[test]
fn json_output() {
    let (_dir, path) = schema_file();
    let run = cli()
        .args(&["schema", &path, "session-id", "-o", "json"])
        .passes();
    let json: serde_json::Value = serde_json::from_str(&run.stdout()).unwrap();
    assert_eq!(json[0]["name"], "session-id");
    assert_eq!(json[0]["size"], 4);
    assert_eq!(json[0]["fields"][0]["kind"], "u32");
}

#[test]
fn unknown_schema_fails() {
    let (_dir, path) = schema_file();
    cli()
        .args(&["schema", &path, "missing"])
        .fails()
        .code(1)
        .stderr_has("missing");
}

#[test]
fn invalid_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[schema.x]\nfields = [{ name = \"a\", type = \"int\" }]\n").unwrap();
    cli()
        .args(&["schema", &path.display().to_string()])
        .fails()
        .stderr_has("failed to load schema file");
}
