// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Integration tests for the compile and clean commands.

use std::fs;
use std::path::Path;

use tempfile::tempdir;

use shoes_cli::commands::clean::clean_project;
use shoes_cli::commands::compile::compile_project;
use shoes_cli::project::Project;

/// Create a test project structure in a temp directory
fn setup_project(dir: &Path) {
    fs::create_dir_all(dir.join("public/css/parts")).unwrap();
    fs::create_dir_all(dir.join("public/js")).unwrap();

    fs::write(dir.join("public/css/site.css"), ".site {\n  color: red;\n}\n").unwrap();
    fs::write(dir.join("public/css/parts/nav.css"), "nav { margin: 0px; }").unwrap();
    fs::write(dir.join("public/css/notes.txt"), "not a stylesheet").unwrap();
    fs::write(dir.join("public/js/app.js"), "var answer = 40 + 2;\n").unwrap();

    fs::write(
        dir.join("config.json"),
        r#"{ "default": {}, "production": { "production": true } }"#,
    )
    .unwrap();
}

#[tokio::test]
async fn test_compile_then_up_to_date() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    let project = Project::new(dir.path(), Some("production"));

    let reports = compile_project(&project, None).await.unwrap();
    let css = reports.iter().find(|(name, _)| *name == "css").unwrap().1;
    let js = reports.iter().find(|(name, _)| *name == "js").unwrap().1;
    assert_eq!(css.compiled, 2);
    assert_eq!(js.compiled, 1);

    assert_eq!(
        fs::read_to_string(dir.path().join("compiled/css/site.css")).unwrap(),
        ".site{color:red}"
    );
    assert!(dir.path().join("compiled/css/parts/nav.css").is_file());
    assert!(!dir.path().join("compiled/css/notes.txt").exists());

    let script = fs::read_to_string(dir.path().join("compiled/js/app.js")).unwrap();
    assert!(!script.trim().is_empty());
    assert!(script.contains("answer"));

    let again = compile_project(&project, None).await.unwrap();
    assert!(again.iter().all(|(_, report)| report.compiled == 0));
    assert_eq!(again.iter().map(|(_, report)| report.fresh).sum::<usize>(), 3);
}

#[tokio::test]
async fn test_clean_removes_compiled_output() {
    let dir = tempdir().unwrap();
    setup_project(dir.path());
    let project = Project::new(dir.path(), Some("default"));

    compile_project(&project, None).await.unwrap();
    let removed = clean_project(&project, None).unwrap();
    assert_eq!(removed, 3);
    assert!(dir.path().join("compiled/css").is_dir());
    assert!(!dir.path().join("compiled/css/site.css").exists());
    assert!(!dir.path().join("compiled/js/app.js").exists());
}
