use serde::{Deserialize, Serialize};

pub const UNKNOWN_ERROR: &str = "unknown error";

/// Diagnostic reported by the compiler when a stylesheet fails to compile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("file {file:?}, line {line}, col {column}: {message}")]
#[serde(default)]
pub struct SassError {
    pub status: i32,
    pub column: i64,
    pub file: String,
    pub line: i64,
    pub message: String,
}

/// Decodes the JSON error payload of a failed compilation.
///
/// A payload that cannot be decoded still stands for a failed compilation,
/// so it becomes a generic error instead of a decoding failure.
pub fn decode_error(json: &str) -> SassError {
    match serde_json::from_str::<SassError>(json) {
        Ok(err) => err,
        Err(e) => {
            log::debug!("Undecodable error payload ({e}): {json:?}");
            SassError {
                message: UNKNOWN_ERROR.to_string(),
                ..Default::default()
            }
        }
    }
}

/// Output of a successful compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompileResult {
    pub css: String,

    // If source maps are configured
    pub source_map_filename: Option<String>,
    pub source_map_content: Option<String>,
}

impl CompileResult {
    pub fn new(css: String, map_file: Option<&str>, map_content: Option<&str>) -> CompileResult {
        let non_empty = |s: Option<&str>| s.filter(|s| !s.is_empty()).map(str::to_string);
        CompileResult {
            css,
            source_map_filename: non_empty(map_file),
            source_map_content: non_empty(map_content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_native_payload() {
        let err = decode_error(
            r#"{
                "status": 1,
                "file": "stdin",
                "line": 3,
                "column": 7,
                "message": "expected \"}\".",
                "formatted": "Error: expected \"}\"."
            }"#,
        );
        assert_eq!(err.status, 1);
        assert_eq!(err.file, "stdin");
        assert_eq!(err.line, 3);
        assert_eq!(err.column, 7);
        assert_eq!(err.message, "expected \"}\".");
    }

    #[test]
    fn invalid_json_is_unknown_error() {
        let err = decode_error("Segmentation fault");
        assert_eq!(
            err,
            SassError {
                message: UNKNOWN_ERROR.to_string(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn incomplete_payload_is_unknown_error() {
        let err = decode_error(r#"{"status": 1, "line": 4"#);
        assert_eq!(err.message, UNKNOWN_ERROR);
        assert_eq!(err.line, 0);
        assert_eq!(err.status, 0);

        let err = decode_error(r#"{"status": "bad", "message": "x"}"#);
        assert_eq!(err.message, UNKNOWN_ERROR);
    }

    #[test]
    fn missing_fields_are_zero() {
        let err = decode_error(r#"{"message": "Undefined mixin."}"#);
        assert_eq!(err.message, "Undefined mixin.");
        assert_eq!(err.line, 0);
        assert!(err.file.is_empty());
    }

    #[test]
    fn display_format() {
        let err = SassError {
            status: 1,
            column: 2,
            file: "main.scss".into(),
            line: 10,
            message: "Undefined variable.".into(),
        };
        assert_eq!(
            err.to_string(),
            "file \"main.scss\", line 10, col 2: Undefined variable."
        );
    }

    #[test]
    fn empty_source_map_fields_are_none() {
        let res = CompileResult::new("a{}".into(), Some(""), None);
        assert_eq!(res.source_map_filename, None);
        assert_eq!(res.source_map_content, None);
        let res = CompileResult::new("a{}".into(), Some("a.css.map"), Some("{}"));
        assert_eq!(res.source_map_filename.as_deref(), Some("a.css.map"));
    }
}
