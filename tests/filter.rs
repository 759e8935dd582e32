use anyhow::Result;

mod common;

use common::*;

#[test]
fn excludes_keeps_and_ignores_combine() -> Result<()> {
    let (_data_guard, data) = utf8_temp();
    let (_repo_guard, repo) = utf8_temp();
    write_file(&data.join("A.txt"), b"text");
    write_file(&data.join("A.log"), b"log");
    write_file(&data.join("TMP/B.txt"), b"scratch");

    dedub()?
        .args(["backup", "--exclude", "/TMP/", "--keep", "*.txt", "--ignore", "*.log"])
        .arg(&data)
        .arg(&repo)
        .assert()
        .success();

    let names = snapshot_names(&repo, "DEFAULT");
    let snapshot = load_snapshot(&repo, "DEFAULT", &names[0]);

    // Only A.txt made it: the log was ignored and TMP/ never traversed.
    assert_eq!(snapshot.folders.len(), 1);
    assert_eq!(snapshot.files.len(), 1);
    assert_eq!(snapshot.files[0].name, "A.txt");

    // The configuration rode along in the snapshot.
    assert_eq!(snapshot.folder_filters, vec!["/TMP/"]);
    assert_eq!(snapshot.folder_filter_is_inclusive, vec![false]);
    assert_eq!(snapshot.file_filters, vec!["*.txt", "*.log"]);
    assert_eq!(snapshot.file_filter_is_inclusive, vec![true, false]);
    Ok(())
}

#[test]
fn includes_reopen_excluded_trees_in_declaration_order() -> Result<()> {
    let (_data_guard, data) = utf8_temp();
    let (_repo_guard, repo) = utf8_temp();
    write_file(&data.join("KEEP/wanted.txt"), b"wanted");
    write_file(&data.join("OTHER/unwanted.txt"), b"unwanted");

    // Exclude everything, then re-include one tree. The include must win
    // because it comes later on the command line.
    dedub()?
        .args(["backup", "--exclude", "*", "--include", "/KEEP/"])
        .arg(&data)
        .arg(&repo)
        .assert()
        .success();

    let names = snapshot_names(&repo, "DEFAULT");
    let snapshot = load_snapshot(&repo, "DEFAULT", &names[0]);
    let folder_paths = snapshot
        .folders
        .iter()
        .map(|f| f.path.as_str())
        .collect::<Vec<_>>();
    assert_eq!(folder_paths, vec!["", "KEEP/"]);
    assert_eq!(snapshot.files.len(), 1);
    assert_eq!(snapshot.files[0].name, "wanted.txt");

    // Written the other way around, the exclusion has the last word.
    let (_repo2_guard, repo2) = utf8_temp();
    dedub()?
        .args(["backup", "--include", "/KEEP/", "--exclude", "*"])
        .arg(&data)
        .arg(&repo2)
        .assert()
        .success();
    let names = snapshot_names(&repo2, "DEFAULT");
    let snapshot = load_snapshot(&repo2, "DEFAULT", &names[0]);
    assert_eq!(snapshot.folders.len(), 1);
    assert!(snapshot.files.is_empty());
    Ok(())
}

#[test]
fn select_narrows_without_excluding() -> Result<()> {
    let (_data_guard, data) = utf8_temp();
    let (_repo_guard, repo) = utf8_temp();
    write_file(&data.join("main.rs"), b"fn main() {}");
    write_file(&data.join("notes.md"), b"# notes");
    write_file(&data.join("build.log"), b"noise");

    dedub()?
        .args(["backup", "--select", "*.rs", "--select", "*.md"])
        .arg(&data)
        .arg(&repo)
        .assert()
        .success();

    let names = snapshot_names(&repo, "DEFAULT");
    let snapshot = load_snapshot(&repo, "DEFAULT", &names[0]);
    let mut kept = snapshot
        .files
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>();
    kept.sort();
    assert_eq!(kept, vec!["main.rs", "notes.md"]);
    assert_eq!(snapshot.selected_file_filters, vec!["*.rs", "*.md"]);
    Ok(())
}
