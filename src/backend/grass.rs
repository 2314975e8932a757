use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use super::{Backend, Compiler, DataContext, ExecutionContext};
use crate::config::OutputStyle;
use crate::options::{split_include_path, SassOptions, DEFAULT_PRECISION};
use crate::resolver::{ImportResolution, ImportResolver, ResolverRegistry};

pub const STATUS_ERROR: i32 = 1;
pub const STATUS_IO_ERROR: i32 = 2;
pub const STATUS_UNKNOWN: i32 = 5;

const STYLE_EXTENSIONS: [&str; 3] = ["scss", "sass", "css"];

/// Compiles with the `grass` crate, in process.
#[derive(Debug, Clone)]
pub struct GrassBackend {
    registry: Arc<ResolverRegistry>,
}

impl Default for GrassBackend {
    fn default() -> Self {
        GrassBackend::new()
    }
}

impl GrassBackend {
    /// Backend sharing the process-wide resolver table.
    pub fn new() -> GrassBackend {
        GrassBackend::with_registry(ResolverRegistry::global())
    }

    pub fn with_registry(registry: Arc<ResolverRegistry>) -> GrassBackend {
        GrassBackend { registry }
    }
}

impl Backend for GrassBackend {
    type Compiler = GrassCompiler;

    fn registry(&self) -> &ResolverRegistry {
        &self.registry
    }

    fn make_data_compiler(&self, context: DataContext) -> GrassCompiler {
        let (source, options) = context.into_parts();
        GrassCompiler {
            registry: self.registry.clone(),
            source,
            options,
            compiled: None,
            context: ExecutionContext::default(),
        }
    }
}

pub struct GrassCompiler {
    registry: Arc<ResolverRegistry>,
    source: String,
    options: SassOptions,
    compiled: Option<Result<String, Box<grass::Error>>>,
    context: ExecutionContext,
}

impl GrassCompiler {
    fn grass_style(&self) -> grass::OutputStyle {
        match OutputStyle::from_native(self.options.output_style()) {
            OutputStyle::Compressed => grass::OutputStyle::Compressed,
            OutputStyle::Nested | OutputStyle::Expanded | OutputStyle::Compact => {
                grass::OutputStyle::Expanded
            }
        }
    }

    fn log_ignored_options(&self) {
        if self.options.precision() != DEFAULT_PRECISION {
            log::debug!(
                "grass uses a fixed precision, ignoring precision {}",
                self.options.precision()
            );
        }
        if self.options.wants_source_map() {
            log::debug!("grass does not generate source maps, source map options ignored");
        }
        if self.options.source_comments() {
            log::debug!("grass does not emit source comments");
        }
    }
}

impl Compiler for GrassCompiler {
    // grass compiles in a single pass, the outcome is published by `execute`
    fn parse(&mut self) {
        let tstart = std::time::Instant::now();
        self.log_ignored_options();

        let resolver = self
            .options
            .importer()
            .and_then(|idx| self.registry.get(idx));
        let load_paths = split_include_path(self.options.include_path());
        let fs = ImporterFs::new(resolver, load_paths.clone());

        let options = load_paths.iter().fold(
            grass::Options::default().style(self.grass_style()).fs(&fs),
            |opts, path| opts.load_path(path),
        );
        let source = std::mem::take(&mut self.source);
        self.compiled = Some(grass::from_string(source, &options));
        log::debug!("grass compiled stylesheet in {:?}", tstart.elapsed());
    }

    fn execute(&mut self) {
        self.context = match self.compiled.take() {
            Some(Ok(css)) => ExecutionContext::succeeded(css, None),
            Some(Err(err)) => {
                let (status, payload) = error_payload(*err);
                ExecutionContext::failed(status, payload)
            }
            None => ExecutionContext::failed(
                STATUS_UNKNOWN,
                json!({
                    "status": STATUS_UNKNOWN,
                    "message": "stylesheet executed before being parsed",
                })
                .to_string(),
            ),
        };
    }

    fn context(&self) -> &ExecutionContext {
        &self.context
    }

    fn options(&self) -> &SassOptions {
        &self.options
    }
}

/// Error JSON in the shape the transpiler decodes, with 1-based positions.
fn error_payload(err: grass::Error) -> (i32, String) {
    let formatted = err.to_string();
    let payload = match err.kind() {
        grass::ErrorKind::ParseError { message, loc, .. } => json!({
            "status": STATUS_ERROR,
            "file": loc.file.name(),
            "line": loc.begin.line + 1,
            "column": loc.begin.column + 1,
            "message": message,
            "formatted": formatted,
        }),
        grass::ErrorKind::IoError(e) => json!({
            "status": STATUS_IO_ERROR,
            "message": e.to_string(),
            "formatted": formatted,
        }),
        grass::ErrorKind::FromUtf8Error(message) => json!({
            "status": STATUS_IO_ERROR,
            "message": message,
            "formatted": formatted,
        }),
        _ => json!({
            "status": STATUS_UNKNOWN,
            "message": formatted,
            "formatted": formatted,
        }),
    };
    let status = payload["status"].as_i64().unwrap_or(STATUS_UNKNOWN as i64) as i32;
    (status, payload.to_string())
}

#[derive(Debug, Clone)]
enum ImportSource {
    Contents { url: String, body: String },
    Redirect(PathBuf),
    Missing,
}

impl ImportSource {
    /// Extension grass has to see on the path to parse this source in the right syntax.
    fn extension(&self) -> Option<&'static str> {
        let url = match self {
            ImportSource::Contents { url, .. } => Path::new(url),
            ImportSource::Redirect(target) => target.as_path(),
            ImportSource::Missing => return None,
        };
        Some(match url.extension().and_then(|e| e.to_str()) {
            Some("sass") => "sass",
            Some("css") => "css",
            _ => "scss",
        })
    }

    fn served_at(&self, candidate: &Path) -> bool {
        let import_only = candidate
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.ends_with(".import"))
            .unwrap_or(false);
        match self.extension() {
            Some(ext) => !import_only && candidate.extension().and_then(|e| e.to_str()) == Some(ext),
            None => true,
        }
    }
}

/// A stylesheet grass has loaded, as the resolver names it.
#[derive(Debug, Clone)]
struct Loaded {
    dir: PathBuf,
    url: String,
}

/// Filesystem seen by grass: asks the import resolver first, then the disk.
///
/// grass tries several candidate paths per `@import`, starting with the
/// ones next to the importing stylesheet. The resolver is asked once per
/// import; the answer is kept until the next stylesheet is read.
#[derive(Debug)]
struct ImporterFs {
    resolver: Option<ImportResolver>,
    load_paths: Vec<PathBuf>,
    loaded: Mutex<Vec<Loaded>>,
    pending: Mutex<Option<(String, ImportResolution)>>,
    sources: Mutex<HashMap<PathBuf, ImportSource>>,
}

impl ImporterFs {
    fn new(resolver: Option<ImportResolver>, load_paths: Vec<PathBuf>) -> ImporterFs {
        ImporterFs {
            resolver,
            load_paths,
            loaded: Mutex::new(vec![Loaded {
                dir: PathBuf::new(),
                url: "stdin".to_string(),
            }]),
            pending: Mutex::new(None),
            sources: Mutex::new(HashMap::new()),
        }
    }

    /// Import URL a candidate path was derived from, and the stylesheet importing it.
    ///
    /// The importer is the latest loaded stylesheet living in the deepest
    /// directory containing the candidate. Stylesheets sharing a directory
    /// cannot be told apart, the most recent one wins.
    fn locate(&self, candidate: &Path) -> (String, String) {
        let dir = candidate.parent().unwrap_or_else(|| Path::new(""));
        let importer = self
            .loaded
            .lock()
            .iter()
            .filter(|s| dir.starts_with(&s.dir))
            .max_by_key(|s| s.dir.components().count())
            .cloned()
            .unwrap_or(Loaded {
                dir: PathBuf::new(),
                url: "stdin".to_string(),
            });
        let load_path = self
            .load_paths
            .iter()
            .filter(|base| dir.starts_with(base))
            .max_by_key(|base| base.components().count());
        let base = match load_path {
            Some(base) if base.components().count() > importer.dir.components().count() => {
                base.as_path()
            }
            _ => importer.dir.as_path(),
        };

        let relative = candidate.strip_prefix(base).unwrap_or(candidate);
        (import_url(relative), importer.url)
    }

    fn answer(&self, resolver: &ImportResolver, candidate: &Path) -> (String, ImportResolution) {
        let (url, prev) = self.locate(candidate);
        if let Some((ref pending, ref answer)) = *self.pending.lock() {
            if *pending == url {
                return (url, answer.clone());
            }
        }
        let answer = resolver.resolve(&url, &prev);
        log::trace!("Import resolver answered {url:?} (from {prev:?}): resolved={}", answer.resolved);
        *self.pending.lock() = Some((url.clone(), answer.clone()));
        (url, answer)
    }

    fn resolve(&self, resolver: &ImportResolver, path: &Path) -> Option<ImportSource> {
        let (url, answer) = self.answer(resolver, path);
        if !answer.resolved {
            return None;
        }

        let source = if !answer.body.is_empty() {
            ImportSource::Contents {
                url: if answer.url.is_empty() { url } else { answer.url },
                body: answer.body,
            }
        } else if !answer.url.is_empty() && Path::new(&answer.url).is_file() {
            ImportSource::Redirect(PathBuf::from(answer.url))
        } else {
            log::debug!("Import {url:?} redirected to missing file {:?}", answer.url);
            ImportSource::Missing
        };
        if !source.served_at(path) {
            return Some(ImportSource::Missing);
        }
        self.sources.lock().insert(path.to_path_buf(), source.clone());
        Some(source)
    }

    fn record_loaded(&self, path: &Path, url: String) {
        let dir = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
        self.loaded.lock().push(Loaded { dir, url });
        *self.pending.lock() = None;
    }
}

/// Strips what grass adds to an import URL: extension, `.import`, partial `_`, `/index`.
fn import_url(candidate: &Path) -> String {
    let mut url = candidate.to_path_buf();

    let has_style_ext = url
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| STYLE_EXTENSIONS.contains(&e))
        .unwrap_or(false);
    if has_style_ext {
        let stem = url
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let stem = stem.strip_suffix(".import").unwrap_or(stem).to_string();
        let has_parent = url
            .parent()
            .map(|p| !p.as_os_str().is_empty())
            .unwrap_or(false);
        if has_parent && (stem == "index" || stem == "_index") {
            url.pop();
        } else {
            url.set_file_name(stem.strip_prefix('_').unwrap_or(&stem));
        }
    }
    url.to_string_lossy().replace('\\', "/")
}

impl grass::Fs for ImporterFs {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        match self.resolver {
            Some(ref resolver) => match self.resolve(resolver, path) {
                Some(ImportSource::Missing) => false,
                Some(_) => true,
                None => path.is_file(),
            },
            None => path.is_file(),
        }
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        let source = self.sources.lock().remove(path);
        match source {
            Some(ImportSource::Contents { url, body }) => {
                self.record_loaded(path, url);
                Ok(body.into_bytes())
            }
            Some(ImportSource::Redirect(target)) => {
                self.record_loaded(path, target.to_string_lossy().to_string());
                std::fs::read(target)
            }
            _ => {
                self.record_loaded(path, path.to_string_lossy().to_string());
                std::fs::read(path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grass::Fs;

    fn fs_with(resolver: Option<ImportResolver>) -> ImporterFs {
        ImporterFs::new(resolver, vec![PathBuf::from("vendor/scss")])
    }

    #[test]
    fn import_url_strips_candidate_decorations() {
        let fs = fs_with(None);
        assert_eq!(fs.locate(Path::new("colors.scss")).0, "colors");
        assert_eq!(fs.locate(Path::new("_colors.scss")).0, "colors");
        assert_eq!(fs.locate(Path::new("theme/_colors.sass")).0, "theme/colors");
        assert_eq!(fs.locate(Path::new("theme/_index.scss")).0, "theme");
        assert_eq!(fs.locate(Path::new("vendor/scss/_grid.scss")).0, "grid");
        assert_eq!(fs.locate(Path::new("_colors.import.scss")).0, "colors");
        assert_eq!(fs.locate(Path::new("plain")).0, "plain");
    }

    #[test]
    fn resolver_contents_are_served() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = calls.clone();
        let fs = fs_with(Some(ImportResolver::new(move |url, prev| {
            seen.lock().push((url.to_string(), prev.to_string()));
            ImportResolution::contents(url, "$c: red;")
        })));

        assert!(!fs.is_file(Path::new("colors.import.sass")));
        assert!(!fs.is_file(Path::new("_colors.import.scss")));
        assert!(!fs.is_file(Path::new("colors.sass")));
        assert!(fs.is_file(Path::new("colors.scss")));
        assert!(fs.is_file(Path::new("_colors.scss")));
        assert_eq!(fs.read(Path::new("colors.scss")).unwrap(), b"$c: red;");
        // every candidate shares one answer
        assert_eq!(
            *calls.lock(),
            vec![("colors".to_string(), "stdin".to_string())]
        );
    }

    #[test]
    fn declined_import_falls_back_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("_base.scss");
        std::fs::write(&partial, "a{b:c}").unwrap();

        let fs = fs_with(Some(ImportResolver::new(|_, _| ImportResolution::declined())));
        assert!(fs.is_file(&partial));
        assert!(!fs.is_file(&dir.path().join("_other.scss")));
        assert_eq!(fs.read(&partial).unwrap(), b"a{b:c}");
    }

    #[test]
    fn redirect_to_missing_file_is_not_found() {
        let fs = fs_with(Some(ImportResolver::new(|_, _| {
            ImportResolution::redirect("/definitely/not/here.scss")
        })));
        assert!(!fs.is_file(Path::new("anything.scss")));
    }

    fn compile(fs: &ImporterFs, src: &str) -> Result<String, Box<grass::Error>> {
        let options = fs.load_paths.iter().fold(
            grass::Options::default()
                .style(grass::OutputStyle::Compressed)
                .fs(fs),
            |opts, path| opts.load_path(path),
        );
        grass::from_string(src.to_string(), &options)
    }

    fn recording(
        calls: &Arc<Mutex<Vec<(String, String)>>>,
        answer: impl Fn(&str) -> ImportResolution + Send + Sync + 'static,
    ) -> ImportResolver {
        let calls = calls.clone();
        ImportResolver::new(move |url, prev| {
            calls.lock().push((url.to_string(), prev.to_string()));
            answer(url)
        })
    }

    #[test]
    fn resolved_contents_compile_as_scss() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let fs = fs_with(Some(recording(&calls, |url| {
            ImportResolution::contents(url, ".x { a: b; }")
        })));

        let css = compile(&fs, "@import 'x';").unwrap();
        assert_eq!(css.trim_end(), ".x{a:b}");
        assert_eq!(*calls.lock(), vec![("x".to_string(), "stdin".to_string())]);
    }

    #[test]
    fn redirected_import_compiles_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("dark.scss");
        std::fs::write(&target, "body { background: black; }").unwrap();
        let target = target.to_string_lossy().to_string();

        let fs = fs_with(Some(ImportResolver::new(move |url, _| {
            if url == "theme" {
                ImportResolution::redirect(target.clone())
            } else {
                ImportResolution::declined()
            }
        })));
        let css = compile(&fs, "@import 'theme';").unwrap();
        assert_eq!(css.trim_end(), "body{background:black}");
    }

    #[test]
    fn previous_url_is_the_importing_stylesheet() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("_a.scss"), "@import 'c';").unwrap();
        std::fs::write(dir.path().join("_b.scss"), ".b{x:y}").unwrap();
        std::fs::write(dir.path().join("_c.scss"), ".c{x:y}").unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        let fs = ImporterFs::new(
            Some(recording(&calls, |_| ImportResolution::declined())),
            vec![dir.path().to_path_buf()],
        );
        let css = compile(&fs, "@import 'a';\n@import 'b';").unwrap();
        let (c, b) = (css.find(".c{x:y}").unwrap(), css.find(".b{x:y}").unwrap());
        assert!(c < b);

        let a = dir.path().join("_a.scss").to_string_lossy().to_string();
        assert_eq!(
            *calls.lock(),
            vec![
                ("a".to_string(), "stdin".to_string()),
                ("c".to_string(), a),
                ("b".to_string(), "stdin".to_string()),
            ]
        );
    }

    #[test]
    fn repeated_import_asks_resolver_again() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let fs = fs_with(Some(recording(&calls, |url| {
            ImportResolution::contents(url, ".x { a: b; }")
        })));

        compile(&fs, "@import 'x';\n@import 'x';").unwrap();
        assert_eq!(calls.lock().len(), 2);
    }

    #[test]
    fn error_payload_positions_are_one_based() {
        let err = grass::from_string("a {".to_string(), &grass::Options::default()).unwrap_err();
        let (status, payload) = error_payload(*err);
        let payload: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(status, STATUS_ERROR);
        assert_eq!(payload["status"], STATUS_ERROR);
        assert!(payload["line"].as_i64().unwrap() >= 1);
        assert!(payload["column"].as_i64().unwrap() >= 1);
        assert!(!payload["message"].as_str().unwrap().is_empty());
    }

    #[test]
    fn execute_without_parse_fails() {
        let backend = GrassBackend::with_registry(Arc::new(ResolverRegistry::new()));
        let mut compiler = backend.make_data_compiler(DataContext::new("a{b:c}".into()));
        compiler.execute();
        assert_eq!(compiler.context().error_status(), STATUS_UNKNOWN);
        assert!(compiler.context().output_string().is_none());
    }
}
