use std::path::Path;
use std::time::Instant;

use crate::backend::{Backend, Compiler, DataContext, GrassBackend};
use crate::config::Configuration;
use crate::decode::{decode_error, CompileResult};
use crate::errors::Errcode;
use crate::indented::sass_to_scss;
use crate::options::translate;

/// Compiles stylesheets with a fixed configuration.
///
/// Every call to [`Transpiler::execute`] builds its own context and
/// compiler and releases both before returning, so one transpiler can be
/// shared between threads.
#[derive(Debug, Clone)]
pub struct Transpiler<B: Backend = GrassBackend> {
    config: Configuration,
    backend: B,
}

impl Transpiler<GrassBackend> {
    pub fn new(config: Configuration) -> Result<Transpiler<GrassBackend>, Errcode> {
        Transpiler::with_backend(config, GrassBackend::new())
    }
}

impl<B: Backend> Transpiler<B> {
    pub fn with_backend(config: Configuration, backend: B) -> Result<Transpiler<B>, Errcode> {
        Ok(Transpiler { config, backend })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Compiles `src`, written in the syntax the configuration selects.
    pub fn execute(&self, src: &str) -> Result<CompileResult, Errcode> {
        self.compile(src, self.config.sass_syntax)
    }

    /// Reads and compiles a file, `.sass` files are always indented syntax.
    pub fn execute_file(&self, path: &Path) -> Result<CompileResult, Errcode> {
        let src = std::fs::read_to_string(path)
            .map_err(|e| Errcode::InputRead(path.to_path_buf(), e))?;
        let indented = self.config.sass_syntax
            || path.extension().map(|ext| ext == "sass").unwrap_or(false);
        log::debug!("Compiling {path:?} (indented: {indented})");
        self.compile(&src, indented)
    }

    fn compile(&self, src: &str, indented: bool) -> Result<CompileResult, Errcode> {
        let tstart = Instant::now();

        let scss;
        let src = if indented {
            scss = sass_to_scss(src)?;
            log::debug!("Rewrote indented syntax in {:?}", tstart.elapsed());
            scss.as_str()
        } else {
            src
        };

        let mut data_ctx = DataContext::new(src.to_string());
        let mut opts = data_ctx.options();

        // Unregistered when the call returns, whatever the outcome
        let resolver_handle = self
            .config
            .import_resolver
            .clone()
            .map(|resolver| self.backend.registry().register(resolver));
        translate(
            &self.config,
            &mut opts,
            resolver_handle.as_ref().map(|h| h.index()),
        );
        data_ctx.set_options(opts);
        log::trace!("Data context built");

        let mut compiler = self.backend.make_data_compiler(data_ctx);
        log::trace!("Compiler built");

        compiler.parse();
        log::trace!("Stylesheet parsed");
        compiler.execute();
        log::trace!("Stylesheet executed");

        let ctx = compiler.context();
        if ctx.error_status() != 0 {
            let err = decode_error(ctx.error_json().unwrap_or_default());
            log::debug!("Compilation failed in {:?}: {err}", tstart.elapsed());
            return Err(Errcode::Compile(err));
        }

        let result = CompileResult::new(
            ctx.output_string().unwrap_or_default().to_string(),
            Some(compiler.options().source_map_file()),
            ctx.source_map_string(),
        );
        log::debug!("Compiled stylesheet in {:?}", tstart.elapsed());
        Ok(result)
    }
}
