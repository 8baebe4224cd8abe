//! Runner configuration shared by the CLI and suite binaries.

use clap::ValueEnum;
use termcolor::ColorChoice;

/// Default ceiling on simultaneously running worker processes.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// How a nested suite's display name is composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ContextNaming {
    /// Prefix with the outermost open suite's context, whatever the depth.
    #[default]
    #[value(name = "root")]
    RootAncestor,
    /// Prefix with the immediate parent's context.
    Parent,
}

impl ContextNaming {
    /// The command-line spelling, as forwarded to worker processes.
    pub fn as_arg(self) -> &'static str {
        match self {
            ContextNaming::RootAncestor => "root",
            ContextNaming::Parent => "parent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolves to a `termcolor` choice, probing the terminal for `Auto`.
    pub fn choice(self) -> ColorChoice {
        match self {
            ColorMode::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
            ColorMode::Auto | ColorMode::Never => ColorChoice::Never,
            ColorMode::Always => ColorChoice::Always,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub max_workers: usize,
    pub color: ColorMode,
    pub naming: ContextNaming,
}

impl Config {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            color: ColorMode::default(),
            naming: ContextNaming::default(),
        }
    }
}
