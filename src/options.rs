use std::path::PathBuf;

use crate::config::Configuration;
use crate::resolver::ResolverIndex;

#[cfg(windows)]
pub const PATH_LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const PATH_LIST_SEPARATOR: char = ':';

pub const DEFAULT_PRECISION: i32 = 10;

/// Options object attached to a data context.
///
/// Fields are only reachable through the setters and getters named after
/// the compiler entry points, the compiler decides what a value means.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SassOptions {
    precision: i32,
    output_style: i32,
    source_comments: bool,
    source_map_file: String,
    source_map_root: String,
    input_path: String,
    output_path: String,
    source_map_contents: bool,
    omit_source_map_url: bool,
    source_map_embed: bool,
    include_path: String,
    importer: Option<ResolverIndex>,
}

impl Default for SassOptions {
    fn default() -> Self {
        SassOptions {
            precision: DEFAULT_PRECISION,
            output_style: 0,
            source_comments: false,
            source_map_file: String::new(),
            source_map_root: String::new(),
            input_path: String::new(),
            output_path: String::new(),
            source_map_contents: false,
            omit_source_map_url: false,
            source_map_embed: false,
            include_path: String::new(),
            importer: None,
        }
    }
}

impl SassOptions {
    pub fn set_precision(&mut self, precision: i32) {
        self.precision = precision;
    }

    pub fn precision(&self) -> i32 {
        self.precision
    }

    pub fn set_output_style(&mut self, style: i32) {
        self.output_style = style;
    }

    pub fn output_style(&self) -> i32 {
        self.output_style
    }

    pub fn set_source_comments(&mut self, enabled: bool) {
        self.source_comments = enabled;
    }

    pub fn source_comments(&self) -> bool {
        self.source_comments
    }

    pub fn set_source_map_file<S: Into<String>>(&mut self, file: S) {
        self.source_map_file = file.into();
    }

    pub fn source_map_file(&self) -> &str {
        &self.source_map_file
    }

    pub fn set_source_map_root<S: Into<String>>(&mut self, root: S) {
        self.source_map_root = root.into();
    }

    pub fn source_map_root(&self) -> &str {
        &self.source_map_root
    }

    pub fn set_input_path<S: Into<String>>(&mut self, path: S) {
        self.input_path = path.into();
    }

    pub fn input_path(&self) -> &str {
        &self.input_path
    }

    pub fn set_output_path<S: Into<String>>(&mut self, path: S) {
        self.output_path = path.into();
    }

    pub fn output_path(&self) -> &str {
        &self.output_path
    }

    pub fn set_source_map_contents(&mut self, enabled: bool) {
        self.source_map_contents = enabled;
    }

    pub fn source_map_contents(&self) -> bool {
        self.source_map_contents
    }

    pub fn set_omit_source_map_url(&mut self, enabled: bool) {
        self.omit_source_map_url = enabled;
    }

    pub fn omit_source_map_url(&self) -> bool {
        self.omit_source_map_url
    }

    pub fn set_source_map_embed(&mut self, enabled: bool) {
        self.source_map_embed = enabled;
    }

    pub fn source_map_embed(&self) -> bool {
        self.source_map_embed
    }

    /// Include paths joined with [`PATH_LIST_SEPARATOR`].
    pub fn set_include_path<S: Into<String>>(&mut self, paths: S) {
        self.include_path = paths.into();
    }

    pub fn include_path(&self) -> &str {
        &self.include_path
    }

    pub fn set_importer(&mut self, importer: Option<ResolverIndex>) {
        self.importer = importer;
    }

    pub fn importer(&self) -> Option<ResolverIndex> {
        self.importer
    }

    pub fn wants_source_map(&self) -> bool {
        !self.source_map_file.is_empty() || self.source_map_embed
    }
}

pub fn join_include_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.to_string_lossy())
        .collect::<Vec<_>>()
        .join(&PATH_LIST_SEPARATOR.to_string())
}

pub fn split_include_path(joined: &str) -> Vec<PathBuf> {
    joined
        .split(PATH_LIST_SEPARATOR)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Copies a configuration onto the options of a data context.
///
/// Nothing is validated, the compiler gets the values as they are.
pub fn translate(config: &Configuration, opts: &mut SassOptions, importer: Option<ResolverIndex>) {
    if importer.is_some() {
        opts.set_importer(importer);
    }

    if config.precision != 0 {
        opts.set_precision(config.precision);
    }

    if !config.source_map_filename.is_empty() {
        opts.set_source_map_file(config.source_map_filename.as_str());
    }
    if !config.source_map_root.is_empty() {
        opts.set_source_map_root(config.source_map_root.as_str());
    }
    if !config.output_path.is_empty() {
        opts.set_output_path(config.output_path.as_str());
    }
    if !config.input_path.is_empty() {
        opts.set_input_path(config.input_path.as_str());
    }

    opts.set_source_map_contents(config.source_map_contents);
    opts.set_omit_source_map_url(config.omit_source_map_url);
    opts.set_source_map_embed(config.enable_embedded_source_map);
    opts.set_include_path(join_include_paths(&config.include_paths));
    opts.set_output_style(config.output_style.as_native());
    opts.set_source_comments(false);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputStyle;
    use crate::resolver::{ImportResolution, ImportResolver, ResolverRegistry};

    #[test]
    fn default_configuration_keeps_library_defaults() {
        let mut opts = SassOptions::default();
        opts.set_source_comments(true);
        translate(&Configuration::default(), &mut opts, None);

        assert_eq!(opts.precision(), DEFAULT_PRECISION);
        assert_eq!(opts.source_map_file(), "");
        assert_eq!(opts.include_path(), "");
        assert_eq!(opts.output_style(), 0);
        assert!(!opts.source_comments());
        assert!(opts.importer().is_none());
        assert!(!opts.wants_source_map());
    }

    #[test]
    fn empty_strings_do_not_override() {
        let mut opts = SassOptions::default();
        opts.set_source_map_root("/srv");
        translate(&Configuration::default(), &mut opts, None);
        assert_eq!(opts.source_map_root(), "/srv");
    }

    #[test]
    fn every_field_is_translated() {
        let config = Configuration {
            output_style: OutputStyle::Compressed,
            precision: 4,
            include_paths: vec!["a".into(), "b/c".into()],
            source_map_filename: "out.css.map".into(),
            source_map_root: "/root".into(),
            input_path: "in.scss".into(),
            output_path: "out.css".into(),
            source_map_contents: true,
            omit_source_map_url: true,
            enable_embedded_source_map: true,
            ..Default::default()
        };
        let registry = ResolverRegistry::new();
        let handle = registry.register(ImportResolver::new(|_, _| ImportResolution::declined()));

        let mut opts = SassOptions::default();
        translate(&config, &mut opts, Some(handle.index()));

        assert_eq!(opts.precision(), 4);
        assert_eq!(opts.output_style(), 3);
        assert_eq!(opts.source_map_file(), "out.css.map");
        assert_eq!(opts.source_map_root(), "/root");
        assert_eq!(opts.input_path(), "in.scss");
        assert_eq!(opts.output_path(), "out.css");
        assert!(opts.source_map_contents());
        assert!(opts.omit_source_map_url());
        assert!(opts.source_map_embed());
        assert_eq!(
            opts.include_path(),
            format!("a{PATH_LIST_SEPARATOR}b/c").as_str()
        );
        assert_eq!(opts.importer(), Some(handle.index()));
    }

    #[test]
    fn out_of_range_precision_is_passed_through() {
        let config = Configuration::default().with_precision(-3);
        let mut opts = SassOptions::default();
        translate(&config, &mut opts, None);
        assert_eq!(opts.precision(), -3);
    }

    #[test]
    fn include_path_split_inverts_join() {
        let paths = vec![PathBuf::from("scss"), PathBuf::from("vendor/bootstrap")];
        let joined = join_include_paths(&paths);
        assert_eq!(split_include_path(&joined), paths);
        assert!(split_include_path("").is_empty());
    }
}
