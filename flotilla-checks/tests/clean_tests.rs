//! Artifact discovery and removal.

use flotilla_checks::{clean_repo, ArtifactType, CleanOptions};
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;

fn fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    dir.child("src/__pycache__/mod.pyc").write_binary(&[0u8; 100]).unwrap();
    dir.child("pkg.egg-info/PKG-INFO").write_str("Name: pkg").unwrap();
    dir.child("node_modules/left-pad/index.js").write_binary(&[0u8; 300]).unwrap();
    dir.child("node_modules/left-pad/dist/out.js").write_binary(&[0u8; 50]).unwrap();
    dir.child(".git/objects/build/blob").write_str("x").unwrap();
    dir.child("src/main.py").write_str("print()").unwrap();
    dir
}

#[test]
fn dry_run_reports_without_deleting() {
    let dir = fixture();
    let result = clean_repo(dir.path(), "api", &CleanOptions::default()).unwrap();

    assert_eq!(result.items_found, 3);
    assert_eq!(result.items_removed, 0);
    assert_eq!(result.bytes_reclaimed, 100 + 9 + 300 + 50);
    assert!(result.details.iter().all(|d| d.starts_with("[DRY] Remove: ")));
    dir.child("node_modules").assert(predicate::path::exists());
}

#[test]
fn nested_matches_are_counted_once() {
    let dir = fixture();
    let options = CleanOptions {
        types: vec![ArtifactType::Node, ArtifactType::Build],
        dry_run: true,
    };
    let result = clean_repo(dir.path(), "api", &options).unwrap();
    assert_eq!(result.items_found, 1, "{:?}", result.details);
    assert_eq!(result.bytes_reclaimed, 350);
}

#[test]
fn removal_deletes_only_selected_types() {
    let dir = fixture();
    let options = CleanOptions {
        types: vec![ArtifactType::Python],
        dry_run: false,
    };
    let result = clean_repo(dir.path(), "api", &options).unwrap();

    assert_eq!(result.items_found, 2);
    assert_eq!(result.items_removed, 2);
    dir.child("src/__pycache__").assert(predicate::path::missing());
    dir.child("pkg.egg-info").assert(predicate::path::missing());
    dir.child("src/main.py").assert(predicate::path::exists());
    dir.child("node_modules").assert(predicate::path::exists());
}

#[test]
fn git_internals_are_never_touched() {
    let dir = fixture();
    let options = CleanOptions {
        types: vec![ArtifactType::Build],
        dry_run: false,
    };
    let result = clean_repo(dir.path(), "api", &options).unwrap();
    assert_eq!(result.items_found, 0);
    dir.child(".git/objects/build/blob").assert(predicate::path::exists());
}
