// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Ahead-of-time asset compilation.
//!
//! Compiles everything under `public/css` and `public/js` into `compiled/`,
//! so a production server never compiles on a request path.

use std::path::Path;
use std::time::Instant;

use console::style;
use shoes::{default_compilers, AssetCompiler, CompileReport};

use crate::project::Project;

/// Compiles the project's assets and returns one report per subdirectory.
pub async fn compile_project(
    project: &Project,
    config: Option<&Path>,
) -> anyhow::Result<Vec<(&'static str, CompileReport)>> {
    let app_config = project.load_config(config, false)?;
    let compiler = AssetCompiler::new(
        project.root().join(&app_config.static_dir),
        project.root().join(&app_config.compiled_dir),
        default_compilers(app_config.production)?,
    )?;

    let mut reports = Vec::new();
    for subdir in ["css", "js"] {
        reports.push((subdir, compiler.compile_tree(subdir).await?));
    }
    Ok(reports)
}

/// Runs the compile command.
pub async fn run(project: &Project, config: Option<&Path>) -> anyhow::Result<()> {
    println!(
        "{} {} ({})",
        style("Compiling assets in").cyan(),
        project.root().display(),
        style(project.env().name()).dim()
    );

    let start = Instant::now();
    let reports = match compile_project(project, config).await {
        Ok(reports) => reports,
        Err(e) => {
            println!("{} {}", style("✗").red(), style(format!("{:#}", e)).red());
            return Err(e);
        }
    };

    for (subdir, report) in reports {
        println!(
            "  {} {} compiled, {} up to date",
            style(format!("{}:", subdir)).green(),
            report.compiled,
            report.fresh
        );
    }
    println!(
        "{} {}",
        style("✓").green(),
        style(format!("Done in {}ms", start.elapsed().as_millis())).dim()
    );
    Ok(())
}
