use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{tempdir, TempDir};

fn create_test_files(dir: &TempDir, files: &[(&str, &str)]) -> Result<()> {
    for (name, content) in files {
        let file_path = dir.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(file_path, content)?;
    }
    Ok(())
}

fn termscout() -> Result<Command> {
    let mut cmd = Command::cargo_bin("termscout")?;
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    Ok(cmd)
}

fn kras_corpus() -> Result<TempDir> {
    let dir = tempdir()?;
    create_test_files(
        &dir,
        &[
            ("a.txt", "nothing relevant"),
            ("b.txt", "KRAS KRAS KRAS"),
            ("c.txt", "KRAS KRAS KRAS KRAS KRAS KRAS KRAS"),
        ],
    )?;
    Ok(dir)
}

#[test]
fn test_scan_prints_presence_and_high_frequency() -> Result<()> {
    let dir = kras_corpus()?;

    termscout()?
        .args(["scan", "-q", "KRAS", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("     2  KRAS"))
        .stdout(predicate::str::contains("     1  KRAS  [c.txt]"))
        .stdout(predicate::str::contains("Scanned 3 files (0 skipped)"));
    Ok(())
}

#[test]
fn test_scan_json_output() -> Result<()> {
    let dir = kras_corpus()?;

    let output = termscout()?
        .args(["scan", "--json", "-q", "KRAS", "-q", "KRAS NOT BRAF", "-d"])
        .arg(dir.path())
        .output()?;
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    let queries = &value["statistics"]["queries"];
    assert_eq!(queries[0]["query"], "KRAS");
    assert_eq!(queries[0]["files_containing"], 2);
    assert_eq!(queries[1]["query"], "KRAS NOT BRAF");
    assert_eq!(queries[1]["high_frequency_files"][0], "c.txt");
    assert_eq!(value["files"].as_array().map(|f| f.len()), Some(3));
    Ok(())
}

#[test]
fn test_scan_with_query_file_and_threshold() -> Result<()> {
    let dir = kras_corpus()?;
    let query_file = dir.path().join("queries.list");
    fs::write(&query_file, "# mutations\nKRAS\n\nEGFR OR KRAS\n")?;

    termscout()?
        .args(["scan", "--threshold", "3", "--query-file"])
        .arg(&query_file)
        .arg("-d")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("score >= 3"))
        .stdout(predicate::str::contains("     2  KRAS  [b.txt, c.txt]"))
        .stdout(predicate::str::contains("     2  EGFR OR KRAS"));
    Ok(())
}

#[test]
fn test_scan_reports_rejected_queries() -> Result<()> {
    let dir = kras_corpus()?;

    termscout()?
        .args(["scan", "-q", "(KRAS AND", "-q", "KRAS", "-d"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Rejected queries:"))
        .stdout(predicate::str::contains("(KRAS AND"));

    termscout()?
        .args(["scan", "--strict", "-q", "(KRAS AND", "-q", "KRAS", "-d"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Malformed query"));
    Ok(())
}

#[test]
fn test_scan_missing_root_fails() -> Result<()> {
    let dir = tempdir()?;

    termscout()?
        .args(["scan", "-q", "KRAS", "-d"])
        .arg(dir.path().join("missing"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("scan of"));
    Ok(())
}

#[test]
fn test_scan_requires_queries() -> Result<()> {
    let dir = kras_corpus()?;

    termscout()?
        .current_dir(dir.path())
        .args(["scan", "-d", "."])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no queries given"));
    Ok(())
}

#[test]
fn test_scan_reads_config_file() -> Result<()> {
    let dir = kras_corpus()?;
    let config = dir.path().join("scan.yaml");
    fs::write(
        &config,
        format!(
            "root_path: \"{}\"\nqueries:\n  - \"KRAS\"\nhigh_frequency_threshold: 7\n",
            dir.path().display()
        ),
    )?;

    termscout()?
        .args(["scan", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("score >= 7"))
        .stdout(predicate::str::contains("     1  KRAS  [c.txt]"));
    Ok(())
}

#[test]
fn test_eval_single_file() -> Result<()> {
    let dir = tempdir()?;
    create_test_files(&dir, &[("paper.txt", "A A A A B C C")])?;

    termscout()?
        .arg("eval")
        .arg(dir.path().join("paper.txt"))
        .args(["-q", "(A OR B) AND C", "-q", "A OR (B AND C)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("     2  (A OR B) AND C"))
        .stdout(predicate::str::contains("     4  A OR (B AND C)"));
    Ok(())
}

#[test]
fn test_eval_invalid_utf8() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("latin1.txt");
    fs::write(&path, b"PTEN \xE9t\xE9 PTEN")?;

    termscout()?
        .arg("eval")
        .arg(&path)
        .args(["-q", "PTEN"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to score"));

    termscout()?
        .arg("eval")
        .arg(&path)
        .args(["-q", "PTEN", "--encoding", "lossy"])
        .assert()
        .success()
        .stdout(predicate::str::contains("     2  PTEN"));
    Ok(())
}

#[test]
fn test_check_queries() -> Result<()> {
    termscout()?
        .args(["check", "-q", "GSTP1 AND (PCR OR sequencing)"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ok  GSTP1 AND (PCR OR sequencing)"));

    termscout()?
        .args(["check", "-q", "A AND B", "-q", "A NOT B NOT C"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("error"))
        .stderr(predicate::str::contains("1 of 2 queries failed to parse"));
    Ok(())
}
