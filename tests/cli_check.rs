use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde_json::{Value, json};

struct Workspace {
    dir: tempfile::TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = format!(
            "[storage]\ndatabase_path = {:?}\n\n[logging]\nlevel = \"warn\"\n",
            dir.path().join("shifts.db").display().to_string()
        );
        std::fs::write(dir.path().join("shiftgen.toml"), config).unwrap();
        Self { dir }
    }

    fn write_json(&self, name: &str, value: &Value) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_shiftgen"))
            .arg("--config")
            .arg(self.dir.path().join("shiftgen.toml"))
            .args(args)
            .env_remove("SHIFTGEN_DB")
            .env_remove("SHIFTGEN_LOG")
            .output()
            .unwrap()
    }
}

fn path_arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn check_reports_inverted_shift_as_invalid_json() {
    let ws = Workspace::new();
    let candidate = ws.write_json(
        "candidate.json",
        &json!({
            "reasoning": "night swap",
            "entries": [
                {"staff_id": "s1", "date": "2025-03-03", "start_time": "18:00", "end_time": "09:00"}
            ]
        }),
    );

    let output = ws.run(&["check", "--period", "2025-03", "--candidate", path_arg(&candidate)]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let result: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["is_valid"], json!(false));
    assert_eq!(result["violations"][0]["constraint"], json!("time consistency"));
    assert_eq!(result["violations"][0]["kind"], json!("hard"));
}

#[test]
fn imported_catalog_is_used_by_check() {
    let ws = Workspace::new();
    let catalog = ws.write_json(
        "catalog.json",
        &json!({
            "period": "2025-03",
            "staff": [{"id": "s1", "name": "Aiko"}],
            "availability": [
                {"staff_id": "s1", "date": "2025-03-04", "kind": "unavailable"}
            ]
        }),
    );
    let import = ws.run(&["import", path_arg(&catalog)]);
    assert!(import.status.success(), "stderr: {}", String::from_utf8_lossy(&import.stderr));
    assert!(stdout(&import).contains("Imported"));

    let candidate = ws.write_json(
        "candidate.json",
        &json!({
            "entries": [
                {"staff_id": "s1", "date": "2025-03-03", "start_time": "09:00", "end_time": "17:00", "break_minutes": 60},
                {"staff_id": "s1", "date": "2025-03-04", "start_time": "09:00", "end_time": "17:00", "break_minutes": 60}
            ]
        }),
    );
    let output = ws.run(&["check", "--period", "2025-03", "--candidate", path_arg(&candidate)]);

    assert!(output.status.success());
    let result: Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(result["is_valid"], json!(false));
    let violations = result["violations"].as_array().unwrap();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0]["constraint"], json!("unavailable date"));
    assert_eq!(violations[0]["date"], json!("2025-03-04"));
}

#[test]
fn unknown_command_exits_with_usage_error() {
    let ws = Workspace::new();
    let output = ws.run(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
}
