// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Removes compiled assets.

use std::path::Path;

use console::style;
use shoes::assets::{clear_dir, COMPILED_SUBDIRS};

use crate::project::Project;

/// Empties `compiled/css` and `compiled/js`, returning how many entries
/// were removed.
pub fn clean_project(project: &Project, config: Option<&Path>) -> anyhow::Result<usize> {
    let app_config = project.load_config(config, false)?;
    let compiled = project.root().join(&app_config.compiled_dir);
    Ok(COMPILED_SUBDIRS
        .iter()
        .map(|subdir| clear_dir(&compiled.join(subdir), subdir))
        .sum())
}

/// Runs the clean command.
pub fn run(project: &Project, config: Option<&Path>) -> anyhow::Result<()> {
    let removed = clean_project(project, config)?;
    println!(
        "{} {}",
        style("✓").green(),
        style(format!("Removed {} compiled file(s)", removed)).dim()
    );
    Ok(())
}
