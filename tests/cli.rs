use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn docpress() -> Command {
    let mut cmd = Command::cargo_bin("docpress").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_input(dir: &Path, name: &str, json: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, json).unwrap();
    path
}

const REPORT: &str = r##"{
    "title": "Field Notes",
    "blocks": [
        {"type": "markdown", "title": "Day One", "content": "# Arrival\n\nRain.\n\n## Camp"},
        {"type": "code", "title": "Log", "content": "temp=12"}
    ]
}"##;

#[test]
fn outline_prints_the_planned_tree() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "notes.json", REPORT);
    docpress()
        .arg("outline")
        .arg(&input)
        .assert()
        .success()
        .stdout("Field Notes\n  Day One\n    Arrival\n      Camp\n  Log\n");
}

#[test]
fn outline_of_an_empty_document() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "empty.json", "{}");
    docpress()
        .arg("outline")
        .arg(&input)
        .assert()
        .success()
        .stdout("(no bookmarks)\n");
}

#[test]
fn render_then_inspect_with_the_text_backend() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "notes.json", REPORT);
    let output = dir.path().join("notes.pdf");

    docpress()
        .args(["render", "--backend", "text", "-o"])
        .arg(&output)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("notes.pdf").and(predicate::str::contains("sha256")));

    assert!(fs::read(&output).unwrap().starts_with(b"%PDF-"));

    docpress()
        .arg("inspect")
        .arg(&output)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Pages: 1")
                .and(predicate::str::contains("    Day One (p. 1)"))
                .and(predicate::str::contains("        Camp (p. 1)")),
        );
}

#[test]
fn several_inputs_are_named_after_their_titles() {
    let dir = TempDir::new().unwrap();
    let first = write_input(dir.path(), "a.json", REPORT);
    let second = write_input(dir.path(), "b.json", r#"{"title": "Q&A: 2024!!"}"#);
    let out_dir = dir.path().join("out");

    docpress()
        .args(["render", "--backend", "text", "--no-bookmarks", "--out-dir"])
        .arg(&out_dir)
        .arg(&first)
        .arg(&second)
        .assert()
        .success();

    assert!(out_dir.join("Field_Notes.pdf").is_file());
    assert!(out_dir.join("QA_2024.pdf").is_file());
}

#[test]
fn inputs_sharing_a_title_get_distinct_files() {
    let dir = TempDir::new().unwrap();
    let first = write_input(
        dir.path(),
        "a.json",
        r##"{"title": "Report", "blocks": [{"title": "First doc", "content": "one"}]}"##,
    );
    let second = write_input(
        dir.path(),
        "b.json",
        r##"{"title": "Report", "blocks": [{"title": "Second doc", "content": "two"}]}"##,
    );
    let out_dir = dir.path().join("out");

    docpress()
        .args(["render", "--backend", "text", "--out-dir"])
        .arg(&out_dir)
        .arg(&first)
        .arg(&second)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Report.pdf").and(predicate::str::contains("Report-2.pdf")),
        );

    for (file, block) in [("Report.pdf", "First doc"), ("Report-2.pdf", "Second doc")] {
        docpress()
            .arg("inspect")
            .arg(out_dir.join(file))
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("  {block} (p. 1)")));
    }
}

#[test]
fn keep_html_saves_the_composed_markup() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "notes.json", REPORT);
    let html_dir = dir.path().join("html");

    docpress()
        .args(["render", "--backend", "text", "--out-dir"])
        .arg(dir.path())
        .arg("--keep-html")
        .arg(&html_dir)
        .arg(&input)
        .assert()
        .success();

    let html = fs::read_to_string(html_dir.join("Field_Notes.html")).unwrap();
    assert!(html.contains("<h2 id=\"block-1\" class=\"block-title\">Day One</h2>"));
}

#[test]
fn malformed_json_fails() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "bad.json", "{\"title\": ");
    docpress()
        .args(["render", "--backend", "text"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:").and(predicate::str::contains("bad.json")));
}

#[test]
fn output_flag_rejects_several_inputs() {
    let dir = TempDir::new().unwrap();
    let a = write_input(dir.path(), "a.json", "{}");
    let b = write_input(dir.path(), "b.json", "{}");
    docpress()
        .args(["render", "-o", "x.pdf"])
        .arg(&a)
        .arg(&b)
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--out-dir"));
}

#[test]
fn unknown_config_keys_fail() {
    let dir = TempDir::new().unwrap();
    let input = write_input(dir.path(), "a.json", "{}");
    let config = write_input(dir.path(), "docpress.yaml", "backend: text\nfont: comic\n");
    docpress()
        .args(["render", "--config"])
        .arg(&config)
        .arg(&input)
        .current_dir(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("docpress.yaml"));
}

#[test]
fn inspect_rejects_non_pdf_files() {
    let dir = TempDir::new().unwrap();
    let bogus = write_input(dir.path(), "x.pdf", "not a pdf");
    docpress()
        .arg("inspect")
        .arg(&bogus)
        .assert()
        .failure()
        .stderr(predicate::str::contains("PDF_PARSE_FAILED"));
}

#[test]
fn selftest_writes_debug_pdf() {
    let dir = TempDir::new().unwrap();
    docpress()
        .args(["selftest", "--backend", "text"])
        .current_dir(dir.path())
        .assert()
        .success();
    assert!(dir.path().join("debug_test.pdf").is_file());
}
