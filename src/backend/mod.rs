use crate::options::SassOptions;
use crate::resolver::ResolverRegistry;

pub mod grass;

pub use self::grass::GrassBackend;

/// Compilation unit built from in-memory source text.
#[derive(Clone, Debug)]
pub struct DataContext {
    source: String,
    options: SassOptions,
}

impl DataContext {
    pub fn new(source: String) -> DataContext {
        DataContext {
            source,
            options: SassOptions::default(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Copy of the options, write them back with [`DataContext::set_options`].
    pub fn options(&self) -> SassOptions {
        self.options.clone()
    }

    pub fn set_options(&mut self, options: SassOptions) {
        self.options = options;
    }

    pub fn into_parts(self) -> (String, SassOptions) {
        (self.source, self.options)
    }
}

/// What a compiler exposes once it has executed.
#[derive(Clone, Debug, Default)]
pub struct ExecutionContext {
    output_string: Option<String>,
    source_map_string: Option<String>,
    error_status: i32,
    error_json: Option<String>,
}

impl ExecutionContext {
    pub fn succeeded(css: String, source_map: Option<String>) -> ExecutionContext {
        ExecutionContext {
            output_string: Some(css),
            source_map_string: source_map,
            error_status: 0,
            error_json: None,
        }
    }

    pub fn failed(status: i32, error_json: String) -> ExecutionContext {
        ExecutionContext {
            output_string: None,
            source_map_string: None,
            error_status: status,
            error_json: Some(error_json),
        }
    }

    pub fn output_string(&self) -> Option<&str> {
        self.output_string.as_deref()
    }

    pub fn source_map_string(&self) -> Option<&str> {
        self.source_map_string.as_deref()
    }

    pub fn error_status(&self) -> i32 {
        self.error_status
    }

    pub fn error_json(&self) -> Option<&str> {
        self.error_json.as_deref()
    }
}

/// Stylesheet compiler the transpiler drives.
pub trait Backend {
    type Compiler: Compiler;

    /// Table the import resolvers of this backend are registered in.
    fn registry(&self) -> &ResolverRegistry;

    fn make_data_compiler(&self, context: DataContext) -> Self::Compiler;
}

/// Compiler bound to one data context, released when dropped.
pub trait Compiler {
    /// Errors are recorded for [`Compiler::execute`], never raised here.
    fn parse(&mut self);

    fn execute(&mut self);

    fn context(&self) -> &ExecutionContext;

    /// Options as seen by the compiler after it ran.
    fn options(&self) -> &SassOptions;
}
