//! Render Harness CLI
//!
//! Runs a renderer command against a test corpus and writes an HTML report.
//! Exits 0 when everything passed or was ignored, 1 on any failure, and -1
//! when the run itself could not complete.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use render_harness::{CommandRenderer, Harness, HarnessConfig};

/// Visual regression harness for style renderers
#[derive(Parser, Debug)]
#[command(name = "render-harness")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "render-harness.toml")]
    config: PathBuf,

    /// Test corpus root (one directory per group)
    #[arg(long, env = "RENDER_TESTS_ROOT")]
    root: Option<PathBuf>,

    /// Implementation under test
    #[arg(short, long, env = "RENDER_IMPLEMENTATION")]
    implementation: Option<String>,

    /// Only run these groups
    #[arg(short, long, value_delimiter = ',')]
    tests: Vec<String>,

    /// Directory served by the fixture server
    #[arg(long)]
    fixtures: Option<PathBuf>,

    /// Fixture server port
    #[arg(long)]
    port: Option<u16>,

    /// Per-test watchdog in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Renderer command and its arguments
    #[arg(last = true, required = true)]
    renderer: Vec<String>,
}

impl Cli {
    fn harness_config(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = HarnessConfig::load(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;

        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(implementation) = &self.implementation {
            config.implementation = implementation.clone();
        }
        if !self.tests.is_empty() {
            config.tests = Some(self.tests.clone());
        }
        if let Some(fixtures) = &self.fixtures {
            config.fixture.root = fixtures.clone();
        }
        if let Some(port) = self.port {
            config.fixture.port = port;
        }
        if let Some(timeout) = self.timeout {
            config.watchdog = timeout;
        }
        config.watchdog()?;

        Ok(config.with_update_from_env())
    }
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let config = cli.harness_config()?;
    debug!("Configuration: {:?}", config);

    let (program, args) = cli
        .renderer
        .split_first()
        .context("no renderer command given")?;
    let renderer = CommandRenderer::new(program, args.to_vec())
        .implementation(config.implementation.clone())
        .update(config.update);

    let verdict = Harness::new(config, Arc::new(renderer))?.run().await?;
    Ok(verdict.exit_code())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(-1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "render-harness",
            "--config",
            "/nonexistent/render-harness.toml",
            "--implementation",
            "refimpl",
            "--tests",
            "line-width,fill-color",
            "--port",
            "3901",
            "--timeout",
            "5",
            "--",
            "node",
            "render.js",
        ])
        .unwrap();

        let config = cli.harness_config().unwrap();
        assert_eq!(config.implementation, "refimpl");
        assert_eq!(
            config.tests,
            Some(vec!["line-width".to_string(), "fill-color".to_string()])
        );
        assert_eq!(config.fixture.port, 3901);
        assert_eq!(config.watchdog, 5.0);
        assert_eq!(cli.renderer, ["node", "render.js"]);
    }

    #[test]
    fn test_infinite_timeout_is_an_error() {
        let cli = Cli::try_parse_from([
            "render-harness",
            "--config",
            "/nonexistent/render-harness.toml",
            "--timeout",
            "inf",
            "--",
            "node",
        ])
        .unwrap();

        let err = cli.harness_config().unwrap_err();
        assert!(err.to_string().contains("watchdog"));
    }

    #[test]
    fn test_renderer_command_is_required() {
        assert!(Cli::try_parse_from(["render-harness"]).is_err());
    }
}
