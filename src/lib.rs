//! Compile SCSS and indented Sass stylesheets through a pluggable compiler backend.
//!
//! ```no_run
//! use sassbridge::{Configuration, OutputStyle, Transpiler};
//!
//! let config = Configuration::default().with_style(OutputStyle::Compressed);
//! let transpiler = Transpiler::new(config)?;
//! let result = transpiler.execute("a { color: red }")?;
//! assert_eq!(result.css.trim(), "a{color:red}");
//! # Ok::<(), sassbridge::Errcode>(())
//! ```

pub mod backend;
pub mod config;
pub mod decode;
pub mod errors;
pub mod indented;
pub mod options;
pub mod resolver;
pub mod transpiler;

pub use backend::{Backend, Compiler, GrassBackend};
pub use config::{Args, Configuration, OutputStyle};
pub use decode::{CompileResult, SassError};
pub use errors::Errcode;
pub use resolver::{ImportResolution, ImportResolver, ResolverRegistry};
pub use transpiler::Transpiler;

/// Shorthand for [`Transpiler::new`].
pub fn new(config: Configuration) -> Result<Transpiler, Errcode> {
    Transpiler::new(config)
}
