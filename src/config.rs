use std::path::{Path, PathBuf};
use std::str::FromStr;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::errors::Errcode;
use crate::resolver::{ImportResolution, ImportResolver};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Nested,
    Expanded,
    Compact,
    Compressed,
}

impl OutputStyle {
    /// Case-insensitive, anything unknown is `Nested`.
    pub fn parse(s: &str) -> OutputStyle {
        match s.trim().to_ascii_lowercase().as_str() {
            "nested" => OutputStyle::Nested,
            "expanded" => OutputStyle::Expanded,
            "compact" => OutputStyle::Compact,
            "compressed" => OutputStyle::Compressed,
            other => {
                log::debug!("Unknown output style {other:?}, using nested");
                OutputStyle::Nested
            }
        }
    }

    pub fn as_native(&self) -> i32 {
        match self {
            OutputStyle::Nested => 0,
            OutputStyle::Expanded => 1,
            OutputStyle::Compact => 2,
            OutputStyle::Compressed => 3,
        }
    }

    pub fn from_native(style: i32) -> OutputStyle {
        match style {
            1 => OutputStyle::Expanded,
            2 => OutputStyle::Compact,
            3 => OutputStyle::Compressed,
            _ => OutputStyle::Nested,
        }
    }
}

impl FromStr for OutputStyle {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(OutputStyle::parse(s))
    }
}

impl From<String> for OutputStyle {
    fn from(value: String) -> Self {
        OutputStyle::parse(&value)
    }
}

impl std::fmt::Display for OutputStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OutputStyle::Nested => "nested",
            OutputStyle::Expanded => "expanded",
            OutputStyle::Compact => "compact",
            OutputStyle::Compressed => "compressed",
        };
        f.write_str(name)
    }
}

/// Settings of one transpiler. Read-only while a compilation runs.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub output_style: OutputStyle,

    /// Precision of floating point math, 0 keeps the compiler default.
    pub precision: i32,

    /// Directories searched when resolving imports.
    pub include_paths: Vec<PathBuf>,

    /// Consulted before the compiler looks imports up on disk.
    #[serde(skip)]
    pub import_resolver: Option<ImportResolver>,

    /// Input is written in the indented syntax.
    pub sass_syntax: bool,

    // Source maps, empty strings keep the compiler defaults
    pub source_map_filename: String,
    pub source_map_root: String,
    pub input_path: String,
    pub output_path: String,
    pub source_map_contents: bool,
    pub omit_source_map_url: bool,
    pub enable_embedded_source_map: bool,
}

impl Configuration {
    pub fn from_toml_file(path: &Path) -> Result<Configuration, Errcode> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Errcode::ConfigFileRead(path.to_path_buf(), e))?;
        let config = toml::from_str(&content)?;
        log::debug!("Loaded configuration from {path:?}");
        Ok(config)
    }

    pub fn from_args(args: &Args) -> Result<Configuration, Errcode> {
        let base = match args.config {
            Some(ref path) => Configuration::from_toml_file(path)?,
            None => Configuration::default(),
        };

        let mut include_paths = base.include_paths;
        include_paths.extend(args.load_path.iter().cloned());

        Ok(Configuration {
            output_style: args.style.unwrap_or(base.output_style),
            precision: args.precision.unwrap_or(base.precision),
            include_paths,
            sass_syntax: args.indented || base.sass_syntax,
            source_map_filename: args
                .sourcemap
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or(base.source_map_filename),
            source_map_root: args.sourcemap_root.clone().unwrap_or(base.source_map_root),
            input_path: args
                .input_path()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or(base.input_path),
            output_path: args
                .output
                .as_ref()
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or(base.output_path),
            source_map_contents: args.embed_sources || base.source_map_contents,
            omit_source_map_url: args.omit_sourcemap_url || base.omit_source_map_url,
            enable_embedded_source_map: args.embed_sourcemap || base.enable_embedded_source_map,

            // Static configs
            ..base
        })
    }

    pub fn init_logging(verbose: bool) {
        let mut builder = env_logger::Builder::new();
        if verbose {
            builder.filter_level(log::LevelFilter::Debug);
        } else {
            builder.filter_level(log::LevelFilter::Warn);
        }
        builder.parse_env("RUST_LOG");
        builder.init();
        log::debug!("Logging started");
    }

    pub fn with_style(mut self, style: OutputStyle) -> Self {
        self.output_style = style;
        self
    }

    pub fn with_precision(mut self, precision: i32) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_include_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.include_paths.push(path.into());
        self
    }

    pub fn with_resolver<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) -> ImportResolution + Send + Sync + 'static,
    {
        self.import_resolver = Some(ImportResolver::new(f));
        self
    }

    pub fn with_sass_syntax(mut self, sass_syntax: bool) -> Self {
        self.sass_syntax = sass_syntax;
        self
    }

    pub fn with_source_map<S: Into<String>>(mut self, filename: S) -> Self {
        self.source_map_filename = filename.into();
        self
    }
}

/// Compile a SCSS or indented Sass stylesheet to CSS
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Input stylesheet, `-` reads from stdin
    #[arg(default_value = "-")]
    pub input: PathBuf,

    /// Write the CSS there instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// nested, expanded, compact or compressed
    #[arg(short, long)]
    pub style: Option<OutputStyle>,

    #[arg(long)]
    pub precision: Option<i32>,

    /// Directory searched for imports, may be repeated
    #[arg(short = 'I', long = "load-path")]
    pub load_path: Vec<PathBuf>,

    /// Treat the input as indented syntax, implied by a `.sass` input
    #[arg(long)]
    pub indented: bool,

    /// Source map file to emit
    #[arg(long)]
    pub sourcemap: Option<PathBuf>,

    #[arg(long)]
    pub sourcemap_root: Option<String>,

    /// Embed the sources in the source map
    #[arg(long)]
    pub embed_sources: bool,

    /// Embed the source map in the CSS
    #[arg(long)]
    pub embed_sourcemap: bool,

    #[arg(long)]
    pub omit_sourcemap_url: bool,

    /// TOML configuration file, command line flags take precedence
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }

    pub fn input_path(&self) -> Option<&Path> {
        if self.reads_stdin() {
            None
        } else {
            Some(self.input.as_path())
        }
    }
}
