//! Render Harness
//!
//! Visual regression harness for style-driven renderers. It:
//! - Discovers test groups (`style.json` + `info.json`) under a corpus root
//! - Serves local fixtures and rewrites `local://` URLs to point at them
//! - Runs each test through a caller-supplied [`Renderer`], one at a time,
//!   under a watchdog
//! - Classifies outcomes and writes an HTML report
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Harness                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  loader   discover_groups() -> [TestGroup]                  │
//! │           resolve_params(raw, implementation) -> TestParams │
//! │  server   localize_urls(style) -> style                     │
//! │  queue    Pipeline [StartServer, Run.., StopServer]         │
//! │  runner   TestRunner::run_one(case) -> TestParams           │
//! │  report   Tally, HandlebarsTemplate, Verdict                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod harness;
pub mod loader;
pub mod params;
pub mod queue;
pub mod report;
pub mod runner;
pub mod server;

pub use command::CommandRenderer;
pub use config::{FixtureConfig, HarnessConfig};
pub use error::{HarnessError, HarnessResult, RenderError};
pub use harness::Harness;
pub use params::{Bucket, Color, TestParams, Tolerance};
pub use report::Verdict;
pub use runner::{RenderOutcome, Renderer, TestCase, TestRunner};
pub use server::FixtureServer;
