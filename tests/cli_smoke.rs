use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use faqdex::{ContentStore, EntryId};
use serde_json::Value;

const FAQ_CSV: &str = "\
question,answer,tags
How do I reset my password?,Open settings and choose reset password.,account;security
Where can I park?,Visitor parking is behind the building.,office
What are the opening hours?,Nine to five on weekdays.,office;schedule
Can I bring a guest?,Yes; register them at reception.,office
";

fn faqdex_bin() -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(bin) = option_env!("CARGO_BIN_EXE_faqdex") {
        return Ok(PathBuf::from(bin));
    }

    let mut path = std::env::current_exe()?;
    path.pop();
    if path.ends_with("deps") {
        path.pop();
    }
    path.push("faqdex");

    if cfg!(windows) {
        path.set_extension("exe");
    }

    Ok(path)
}

fn run(data_dir: &Path, args: &[&str]) -> Result<Output, Box<dyn std::error::Error>> {
    Ok(Command::new(faqdex_bin()?)
        .args(args)
        .env("FAQDEX_DATA_DIR", data_dir)
        .env("FAQDEX_LOG", "warn")
        .output()?)
}

fn run_json(data_dir: &Path, args: &[&str]) -> Result<Value, Box<dyn std::error::Error>> {
    let output = run(data_dir, args)?;
    assert!(
        output.status.success(),
        "faqdex {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    Ok(serde_json::from_slice(&output.stdout)?)
}

fn import_fixture(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let csv = data_dir.join("faq.csv");
    std::fs::write(&csv, FAQ_CSV)?;
    let report = run_json(data_dir, &["import", csv.to_str().unwrap(), "--json"])?;
    assert_eq!(report["inserted"], 4);
    assert_eq!(report["indexed"], 4);
    Ok(())
}

#[test]
fn import_then_search_get_and_browse() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    import_fixture(tmp.path())?;

    let hits = run_json(tmp.path(), &["search", "reset password", "--json"])?;
    let hits = hits.as_array().expect("hits array");
    assert_eq!(hits[0]["id"], 1);
    assert_eq!(hits[0]["question"], "How do I reset my password?");

    let entry = run_json(tmp.path(), &["get", "#1", "--json"])?;
    assert_eq!(entry["answer"], "Open settings and choose reset password.");
    assert_eq!(entry["tags"], "account;security");

    let page = run_json(
        tmp.path(),
        &["browse", "office", "--page-size", "2", "--page", "2", "--json"],
    )?;
    assert_eq!(page["total"], 3);
    assert_eq!(page["page"], 1);
    let items = page["items"].as_array().expect("items array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], 2);

    let tags = run_json(tmp.path(), &["tags", "--json"])?;
    assert_eq!(
        tags,
        serde_json::json!(["account", "office", "schedule", "security"])
    );

    Ok(())
}

#[test]
fn short_queries_are_rejected_by_the_front_end() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    import_fixture(tmp.path())?;

    let output = run(tmp.path(), &["search", "ab"])?;
    assert!(!output.status.success());

    set_setting(tmp.path(), "min_query_chars", "2")?;
    let hits = run_json(tmp.path(), &["search", "pa", "--json"])?;
    assert!(!hits.as_array().expect("hits array").is_empty());
    Ok(())
}

fn set_setting(
    data_dir: &Path,
    key: &str,
    value: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = run(data_dir, &["settings", "set", key, value])?;
    assert!(output.status.success());
    Ok(())
}

#[test]
fn failed_import_keeps_previous_load() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    import_fixture(tmp.path())?;

    let bad = tmp.path().join("bad.csv");
    std::fs::write(&bad, "question,answer,tags\nFine?,Yes.,x\nBroken?,,y\n")?;
    let output = run(tmp.path(), &["import", bad.to_str().unwrap()])?;
    assert!(!output.status.success());

    let status = run_json(tmp.path(), &["status", "--json"])?;
    assert_eq!(status["data_dir_source"], "env");
    assert_eq!(status["entries"], 4);
    assert_eq!(status["generation"], 1);
    assert_eq!(status["stale"], false);
    Ok(())
}

#[test]
fn status_reports_stale_index_until_rebuild() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    import_fixture(tmp.path())?;

    {
        let store = ContentStore::open(&tmp.path().join("faq.redb"))?;
        store.replace_all(&[faqdex::EntryDraft::new("Fresh?", "Yes.", "")])?;
        assert!(store.get_by_id(EntryId(1))?.is_some());
    }

    let status = run_json(tmp.path(), &["status", "--json"])?;
    assert_eq!(status["stale"], true);

    let output = run(tmp.path(), &["rebuild"])?;
    assert!(output.status.success());

    let status = run_json(tmp.path(), &["status", "--json"])?;
    assert_eq!(status["stale"], false);
    assert_eq!(status["indexed_documents"], 1);

    let hits = run_json(tmp.path(), &["search", "fresh", "--json"])?;
    assert_eq!(hits[0]["id"], 1);
    Ok(())
}

#[test]
fn unknown_entry_is_an_error() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    import_fixture(tmp.path())?;

    let output = run(tmp.path(), &["get", "99"])?;
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("NotFound"));
    Ok(())
}

#[test]
fn far_out_pages_are_empty_not_fatal() -> Result<(), Box<dyn std::error::Error>> {
    let tmp = tempfile::tempdir()?;
    import_fixture(tmp.path())?;
    let last = usize::MAX.to_string();

    let output = run(tmp.path(), &["tags", "--page", &last])?;
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(!String::from_utf8_lossy(&output.stdout).contains("next:"));

    let output = run(tmp.path(), &["browse", "office", "--page", &last])?;
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("past the end"));

    let hits = run_json(
        tmp.path(),
        &["search", "office parking", "-n", &last, "--json"],
    )?;
    assert!(!hits.as_array().expect("hits array").is_empty());
    Ok(())
}
