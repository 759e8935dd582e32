use std::fs;

use anyhow::Result;
use predicates::prelude::*;

mod common;

use common::*;

#[test]
fn check_finds_missing_blobs() -> Result<()> {
    let (_data_guard, data) = utf8_temp();
    let (_repo_guard, repo) = utf8_temp();
    write_file(&data.join("precious.txt"), b"precious");

    dedub()?
        .arg("backup")
        .arg(&data)
        .arg(&repo)
        .assert()
        .success();

    dedub()?
        .arg("check")
        .arg(&data)
        .arg(&repo)
        .assert()
        .success()
        .stdout(predicate::str::contains("checks out"));

    // Vandalize the store and check again.
    let blobs = files_in(repo.join(dedub::store::STORE_DIR).as_std_path());
    assert_eq!(blobs.len(), 1);
    fs::remove_file(
        repo.join(dedub::store::STORE_DIR)
            .join(blobs[0].to_str().unwrap()),
    )?;

    dedub()?
        .arg("check")
        .arg(&data)
        .arg(&repo)
        .assert()
        .failure()
        .stderr(predicate::str::contains("*** ERROR : "));
    Ok(())
}

#[test]
fn compare_classifies_differences() -> Result<()> {
    let (_data_guard, data) = utf8_temp();
    let (_repo_guard, repo) = utf8_temp();
    write_file(&data.join("same.txt"), b"same");
    write_file(&data.join("changed.txt"), b"before");
    write_file(&data.join("doomed.txt"), b"doomed");
    write_file(&data.join("sub/inner.txt"), b"inner");

    dedub()?
        .arg("backup")
        .arg(&data)
        .arg(&repo)
        .assert()
        .success();

    // No differences right after a backup.
    dedub()?
        .arg("compare")
        .arg(&data)
        .arg(&repo)
        .assert()
        .success()
        .stdout(predicate::str::contains("No differences"));

    // Change a file, remove a file, remove a whole folder, add both kinds.
    write_file(&data.join("changed.txt"), b"after, and longer");
    fs::remove_file(data.join("doomed.txt"))?;
    fs::remove_file(data.join("sub/inner.txt"))?;
    fs::remove_dir(data.join("sub"))?;
    write_file(&data.join("added.txt"), b"added");
    write_file(&data.join("newdir/new.txt"), b"new");

    dedub()?
        .arg("compare")
        .arg(&data)
        .arg(&repo)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Changed archive file : changed.txt")
                .and(predicate::str::contains("Missing archive file : doomed.txt"))
                .and(predicate::str::contains("Missing archive file : sub/inner.txt"))
                .and(predicate::str::contains("Missing archive folder : sub/"))
                .and(predicate::str::contains("Missing data file : added.txt"))
                .and(predicate::str::contains("Missing data file : newdir/new.txt"))
                .and(predicate::str::contains("Missing data folder : newdir/"))
                .and(predicate::str::contains("Missing archive file : same.txt").not()),
        );

    // Compare mutates nothing: the "doomed" file is still gone, the added
    // one still there.
    assert!(!data.join("doomed.txt").exists());
    assert!(data.join("added.txt").exists());
    Ok(())
}

#[test]
fn list_and_find_take_globs() -> Result<()> {
    let (_data_guard, data) = utf8_temp();
    let (_repo_guard, repo) = utf8_temp();
    write_file(&data.join("report.txt"), b"report");
    write_file(&data.join("docs/guide.txt"), b"guide");

    dedub()?
        .arg("backup")
        .arg(&data)
        .arg(&repo)
        .arg("ALPHA")
        .assert()
        .success();
    dedub()?
        .arg("backup")
        .arg(&data)
        .arg(&repo)
        .arg("BETA")
        .assert()
        .success();

    dedub()?
        .arg("list")
        .arg(&repo)
        .assert()
        .success()
        .stdout(predicate::str::contains("ALPHA").and(predicate::str::contains("BETA")));

    dedub()?
        .args(["list"])
        .arg(&repo)
        .arg("A*")
        .assert()
        .success()
        .stdout(predicate::str::contains("ALPHA").and(predicate::str::contains("BETA").not()));

    // find prints the recorded tree of each matching snapshot.
    dedub()?
        .arg("find")
        .arg(&repo)
        .arg("BETA")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("BETA/")
                .and(predicate::str::contains("report.txt"))
                .and(predicate::str::contains("docs/"))
                .and(predicate::str::contains("docs/guide.txt")),
        );

    // A snapshot glob that matches nothing prints no files.
    dedub()?
        .arg("find")
        .arg(&repo)
        .arg("*")
        .arg("1999*")
        .assert()
        .success()
        .stdout(predicate::str::contains("report.txt").not());
    Ok(())
}

#[test]
fn read_only_commands_need_a_repository() -> Result<()> {
    let (_empty_guard, empty) = utf8_temp();

    for subcommand in ["list", "find"] {
        dedub()?
            .arg(subcommand)
            .arg(empty.join("nowhere"))
            .assert()
            .failure()
            .stderr(predicate::str::contains("*** ERROR : "));
    }

    let (_data_guard, data) = utf8_temp();
    dedub()?
        .arg("check")
        .arg(&data)
        .arg(empty.join("nowhere"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("*** ERROR : "));

    // An existing folder that isn't a repository is just as bad.
    dedub()?
        .arg("list")
        .arg(&empty)
        .assert()
        .failure()
        .stderr(predicate::str::contains("*** ERROR : "));
    Ok(())
}
