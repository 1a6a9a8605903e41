//! Runtime context for CLI commands

use anyhow::{Context, Result};
use mx_core::Config;
use mx_engine::MetricEngine;
use std::path::{Path, PathBuf};

use crate::cli::GlobalArgs;

/// Loaded project configuration plus an engine over its definitions
pub(crate) struct ProjectContext {
    /// Project root directory
    pub root: PathBuf,

    /// Loaded configuration
    pub config: Config,

    /// Engine over the project's definitions and database
    pub engine: MetricEngine,

    /// Verbose output enabled
    pub verbose: bool,
}

impl ProjectContext {
    /// Load config, definitions, and the database from global arguments
    pub fn load(args: &GlobalArgs) -> Result<Self> {
        let root = PathBuf::from(&args.project_dir);

        // Load config from custom path or project directory
        let config = if let Some(config_path) = &args.config {
            Config::load(Path::new(config_path)).context("Failed to load configuration file")?
        } else {
            Config::load_from_dir(&root).context("Failed to load project configuration")?
        };

        let engine = MetricEngine::from_project(&root, &config).context("Failed to load project")?;

        let ctx = Self {
            root,
            config,
            engine,
            verbose: args.verbose,
        };
        ctx.verbose(&format!(
            "Loaded project '{}' from {} ({} definitions, dialect {})",
            ctx.config.name,
            ctx.root.display(),
            ctx.engine.definitions().len(),
            ctx.config.dialect
        ));
        Ok(ctx)
    }

    /// Print verbose output if enabled
    pub fn verbose(&self, msg: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", msg);
        }
    }
}
