//! External media tool integration.
//!
//! This crate provides:
//! - Deterministic argument synthesis for probe, trim, overlay, watermark
//!   and quality commands
//! - Watermark anchor placement
//! - A process runner with merged output capture and optional timeout
//! - Probe output parsing
//! - Language font resolution with download retry and fallback

pub mod command;
pub mod error;
pub mod fonts;
pub mod fs_utils;
pub mod probe;
pub mod retry;
pub mod runner;
pub mod synth;
pub mod watermark;

pub use command::ToolCommand;
pub use error::{MediaError, MediaResult};
pub use fonts::{
    FallbackChain, FontResolver, FontResolverConfig, FontSource, FontTable, WarmupReport,
};
pub use probe::{parse_probe_output, ProbeMetadata};
pub use retry::{retry_async, RetryConfig, RetryResult};
pub use runner::{ProcessRunner, ToolOutput, ToolRunner};
pub use synth::{drawtext_filter, escape_filter_value, CommandSynthesizer, ToolPaths};
pub use watermark::{watermark_position, Anchor};
