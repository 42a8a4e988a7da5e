// We use assert_cmd for spawning the compiled binary and
// capturing stdout/stderr in a platform-agnostic way.
use assert_cmd::prelude::*;
use std::process::Command;
// Temporary on-disk fixtures so tests are hermetic.
use assert_fs::prelude::*;
// Structural assertions on the JSON output.
use serde_json::Value;
use predicates::prelude::*;

const SOURCE: &str = "\
def parse(text):
    return text.split()


def load(path):
    data = open(path).read()
    return parse(data)


def render(items):
    return ', '.join(items)
";

// Helper: a scratch directory with one Python file and no config
fn make_fixture() -> assert_fs::TempDir
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");
    tmp.child("mod.py")
        .write_str(SOURCE)
        .expect("write mod.py");
    tmp
}

fn haste(dir: &std::path::Path) -> Command
{
    let mut cmd = Command::cargo_bin("haste").expect("bin");
    cmd.current_dir(dir)
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn select_json_reports_content_and_metrics()
{
    let tmp = make_fixture();

    let assert = haste(tmp.path())
        .args(["select", "mod.py", "--query", "load", "--top-k", "1", "--json", "--quiet"])
        .assert()
        .success();

    let out = String::from_utf8(
        assert
            .get_output()
            .stdout
            .clone(),
    )
    .expect("utf8");
    let v: Value = serde_json::from_str(&out).expect("valid JSON");

    let content = v["content"]
        .as_str()
        .expect("content");
    assert!(content.contains("def load(path):"));
    assert!(content.contains("def parse(text):"));
    assert!(!content.contains("def render"));
    assert_eq!(v["metrics"]["retrieval_mode"], "bm25");
    assert_eq!(v["metrics"]["selected"], serde_json::json!(["parse", "load"]));
    assert!(
        v["metrics"]["original_tokens"]
            .as_u64()
            .unwrap_or(0)
            > 0
    );
}

#[test]
fn select_text_prints_summary_on_stderr()
{
    let tmp = make_fixture();

    haste(tmp.path())
        .args(["--no-color", "select", "mod.py", "-q", "render"])
        .assert()
        .success()
        .stdout(predicate::str::contains("def render(items):"))
        .stderr(predicate::str::contains("symbols,"));
}

#[test]
fn invalid_configuration_exits_with_code_2()
{
    let tmp = make_fixture();

    haste(tmp.path())
        .args(["select", "mod.py", "--query", "load", "--top-k", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("top_k"));
}

#[test]
fn syntax_error_exits_with_code_3()
{
    let tmp = make_fixture();
    tmp.child("bad.py")
        .write_str("def broken(:\n    pass\n")
        .expect("write bad.py");

    haste(tmp.path())
        .args(["--no-color", "select", "bad.py", "--query", "broken"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("bad.py"));
}

#[test]
fn config_file_is_picked_up()
{
    let tmp = make_fixture();
    tmp.child("haste.toml")
        .write_str("hard_cap = 1\n")
        .expect("write haste.toml");

    // One token of budget cannot hold any function
    haste(tmp.path())
        .args(["select", "mod.py", "--query", "load"])
        .assert()
        .code(4);
}

#[test]
fn init_writes_defaults_once()
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    haste(tmp.path())
        .args(["init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config file"));

    tmp.child("haste.toml")
        .assert(predicate::str::contains("top_k = 6"));

    haste(tmp.path())
        .args(["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    haste(tmp.path())
        .args(["init", "--force", "--quiet"])
        .assert()
        .success();
}

#[test]
fn batch_keeps_input_order()
{
    let tmp = make_fixture();
    tmp.child("jobs.jsonl")
        .write_str(
            "{\"file\": \"mod.py\", \"query\": \"render\"}\n\
             {\"file\": \"mod.py\", \"query\": \"load\", \"max_tokens\": 500}\n",
        )
        .expect("write jobs");

    let assert = haste(tmp.path())
        .args(["batch", "jobs.jsonl", "--json", "--quiet", "--top-k", "1"])
        .assert()
        .success();

    let out = String::from_utf8(
        assert
            .get_output()
            .stdout
            .clone(),
    )
    .expect("utf8");
    let lines: Vec<Value> = out
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();

    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["query"], "render");
    assert_eq!(lines[1]["query"], "load");
    assert!(
        lines[0]["content"]
            .as_str()
            .unwrap_or_default()
            .contains("def render")
    );
}

#[test]
fn completions_print_to_stdout()
{
    let tmp = assert_fs::TempDir::new().expect("tempdir");

    haste(tmp.path())
        .args(["completions", "bash", "--stdout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("haste"));
}
