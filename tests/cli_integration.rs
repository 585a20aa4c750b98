use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
    "active_drawing": "42",
    "drawings": [{
        "id": "42",
        "objects": [
            {"kind": "mark", "id": "1", "elements": [{"type": "text", "value": "ABC123"}]},
            {"kind": "mark", "id": "2", "elements": [{"type": "unformatted", "raw": "{XYZ}"}]},
            {"kind": "text", "id": "3", "text": "GRID LINE A"},
            {"kind": "part", "id": "10", "model_id": "m10"},
            {"kind": "part", "id": "11", "model_id": "m11"},
            {"kind": "part", "id": "12", "model_id": "m12"}
        ],
        "assemblies": [{
            "model": {"id": "a1", "properties": {"ASSEMBLY_POS": "B1"}},
            "main_part": "m10",
            "parts": ["m10", "m11", "m12"]
        }]
    }]
}"#;

fn fixture() -> Result<(TempDir, PathBuf, PathBuf), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let snapshot = dir.path().join("drawing.json");
    fs::write(&snapshot, SNAPSHOT)?;
    let config = dir.path().join("config.toml");
    fs::write(&config, "[display]\nshow_timing = false\n")?;
    Ok((dir, snapshot, config))
}

fn command(snapshot: &Path, config: &Path) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("drawing-search")?;
    cmd.env("NO_COLOR", "1")
        .arg("--snapshot")
        .arg(snapshot)
        .arg("--config")
        .arg(config);
    Ok(cmd)
}

#[test]
fn search_part_marks() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, snapshot, config) = fixture()?;

    command(&snapshot, &config)?
        .args(["search", "^ABC"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Found"))
        .stdout(predicate::str::contains("ABC123"))
        .stdout(predicate::str::contains("XYZ").not());

    command(&snapshot, &config)?
        .args(["search", "*123", "--wildcard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ABC123"));

    Ok(())
}

#[test]
fn search_text_notes() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, snapshot, config) = fixture()?;

    command(&snapshot, &config)?
        .args(["search", "grid", "--domain", "text", "--strategy", "contains"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GRID LINE A"));

    command(&snapshot, &config)?
        .args(["search", "nothing-like-this", "--domain", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches found"));

    Ok(())
}

#[test]
fn search_assemblies() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, snapshot, config) = fixture()?;

    command(&snapshot, &config)?
        .args(["search", "B1", "--domain", "assembly", "--strategy", "exact"])
        .assert()
        .success()
        .stdout(predicate::str::contains("model m10"))
        .stdout(predicate::str::contains("model m11").not());

    command(&snapshot, &config)?
        .args([
            "search",
            "b1",
            "--domain",
            "assembly",
            "--strategy",
            "exact",
            "--show-all-parts",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("model m11"))
        .stdout(predicate::str::contains("model m12"));

    command(&snapshot, &config)?
        .args(["search", "B1", "--domain", "model-object", "--strategy", "exact"])
        .assert()
        .success()
        .stdout(predicate::str::contains("model m10"))
        .stdout(predicate::str::contains("model m12").not());

    Ok(())
}

#[test]
fn dump_keys_and_positions() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, snapshot, config) = fixture()?;

    command(&snapshot, &config)?
        .args(["keys", "--relationships"])
        .assert()
        .success()
        .stdout(predicate::str::contains("drawing_object_1_drawing_42"))
        .stdout(predicate::str::contains("assembly_object_a1_drawing_42_main"))
        .stdout(predicate::str::contains("relationship_"));

    command(&snapshot, &config)?
        .arg("positions")
        .assert()
        .success()
        .stdout(predicate::str::contains("B1 (2)"));

    Ok(())
}

#[test]
fn metrics_are_printed_on_request() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, snapshot, config) = fixture()?;

    command(&snapshot, &config)?
        .args(["search", "ABC", "--metrics"])
        .assert()
        .success()
        .stdout(predicate::str::contains("searches_executed 1"))
        .stdout(predicate::str::contains("objects_cached 6"));

    Ok(())
}

#[test]
fn invalid_regex_fails() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, snapshot, config) = fixture()?;

    command(&snapshot, &config)?
        .args(["search", "(unclosed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Regex"));

    Ok(())
}

#[test]
fn missing_drawing_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let (_dir, snapshot, config) = fixture()?;

    command(&snapshot, &config)?
        .args(["--drawing", "7", "positions"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HostUnavailable"));

    Ok(())
}
