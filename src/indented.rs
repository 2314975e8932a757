//! Rewrites the indented syntax into SCSS.
//!
//! The rewrite works line by line and keeps line numbers: line N of the
//! output holds line N of the input, with closing braces placed at the
//! start of the line that dedents. Blocks still open at the end of the
//! input are closed on one extra last line.

/// Indented source that cannot be rewritten mechanically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    /// 1-based
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    fn new<S: Into<String>>(idx: usize, message: S) -> SyntaxError {
        SyntaxError {
            line: idx + 1,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommentKind {
    Silent,
    Loud,
}

#[derive(Debug)]
struct Entry<'a> {
    idx: usize,
    indent: usize,
    text: &'a str,
}

fn is_indent(c: char) -> bool {
    c == ' ' || c == '\t'
}

fn leading_width(line: &str) -> usize {
    line.len() - line.trim_start_matches(is_indent).len()
}

fn indent_name(c: char) -> &'static str {
    if c == '\t' {
        "tabs"
    } else {
        "spaces"
    }
}

fn measure_indent(
    line: &str,
    idx: usize,
    indent_char: &mut Option<char>,
) -> Result<usize, SyntaxError> {
    let width = leading_width(line);
    let lead = &line[..width];
    if lead.contains(' ') && lead.contains('\t') {
        return Err(SyntaxError::new(idx, "tabs and spaces mixed in indentation"));
    }
    if let Some(c) = lead.chars().next() {
        match *indent_char {
            None => *indent_char = Some(c),
            Some(expected) if expected != c => {
                return Err(SyntaxError::new(
                    idx,
                    format!(
                        "indented with {} but the file uses {}",
                        indent_name(c),
                        indent_name(expected)
                    ),
                ))
            }
            Some(_) => {}
        }
    }
    Ok(width)
}

/// Splits `color: red // note` into the code and its trailing silent comment.
fn split_trailing_comment(text: &str) -> (&str, Option<&str>) {
    let bytes = text.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0i32;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(_) if b == b'\\' => i += 1,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth -= 1,
                b'/' if depth <= 0 && bytes.get(i + 1) == Some(&b'/') => {
                    return (text[..i].trim_end(), Some(&text[i..]));
                }
                _ => {}
            },
        }
        i += 1;
    }
    (text, None)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-'
}

fn at_rule_name(code: &str) -> Option<&str> {
    let rest = code.strip_prefix('@')?;
    let end = rest
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    Some(&rest[..end])
}

fn quote_imports(targets: &str) -> String {
    targets
        .split(',')
        .map(str::trim)
        .map(|t| {
            if t.starts_with('"') || t.starts_with('\'') || t.starts_with("url(") {
                t.to_string()
            } else {
                format!("\"{t}\"")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// `:color red` -> `color: red`
fn old_style_property(code: &str) -> Option<String> {
    let rest = code.strip_prefix(':')?;
    if !rest.starts_with(is_ident_start) {
        return None;
    }
    let (name, value) = rest.split_once(char::is_whitespace)?;
    if name.contains('(') || value.trim().is_empty() {
        return None;
    }
    Some(format!("{name}: {}", value.trim()))
}

fn convert_line(code: &str, opens: bool, idx: usize) -> Result<String, SyntaxError> {
    if let Some(rest) = code.strip_prefix('=') {
        return Ok(format!("@mixin {}", rest.trim_start()));
    }
    if let Some(rest) = code.strip_prefix('+') {
        if rest.starts_with(is_ident_start) {
            return Ok(format!("@include {rest}"));
        }
    }
    if code.starts_with('$') && code.contains(':') && opens {
        return Err(SyntaxError::new(
            idx,
            "nested content under a variable declaration",
        ));
    }
    if let Some(rule) = at_rule_name(code) {
        if matches!(rule, "import" | "use" | "forward") && opens {
            return Err(SyntaxError::new(idx, format!("nested content under @{rule}")));
        }
        if rule == "import" {
            let targets = code["@import".len()..].trim();
            if !targets.is_empty() {
                return Ok(format!("@import {}", quote_imports(targets)));
            }
        }
    }
    if !opens {
        if let Some(prop) = old_style_property(code) {
            return Ok(prop);
        }
    }
    Ok(code.to_string())
}

fn needs_semicolon(code: &str) -> bool {
    !(code.is_empty()
        || code.ends_with(',')
        || code.ends_with(';')
        || code.ends_with('{')
        || code.ends_with('}'))
}

/// Rewrites comment lines in place, returns the index of the comment's last line.
fn rewrite_comment(
    lines: &[&str],
    out: &mut [String],
    start: usize,
    indent: usize,
    kind: CommentKind,
) -> usize {
    let mut end = start;
    out[start] = lines[start].trim_end().to_string();
    for (j, line) in lines.iter().enumerate().skip(start + 1) {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        if leading_width(line) <= indent {
            break;
        }
        out[j] = match kind {
            CommentKind::Silent => format!("{}//{}", &line[..indent], &line[indent..]),
            CommentKind::Loud => line.to_string(),
        };
        end = j;
    }
    if kind == CommentKind::Loud && !out[end].ends_with("*/") {
        out[end].push_str(" */");
    }
    end
}

/// Converts indented-syntax source into the brace syntax.
pub fn sass_to_scss(src: &str) -> Result<String, SyntaxError> {
    let lines: Vec<&str> = src.lines().collect();
    let mut out = vec![String::new(); lines.len()];

    let mut indent_char = None;
    let mut entries = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        let line = lines[idx].trim_end();
        if line.trim().is_empty() {
            idx += 1;
            continue;
        }
        let indent = measure_indent(line, idx, &mut indent_char)?;
        let text = &line[indent..];
        let comment = if text.starts_with("//") {
            Some(CommentKind::Silent)
        } else if text.starts_with("/*") {
            Some(CommentKind::Loud)
        } else {
            None
        };
        match comment {
            Some(kind) => idx = rewrite_comment(&lines, &mut out, idx, indent, kind) + 1,
            None => {
                entries.push(Entry { idx, indent, text });
                idx += 1;
            }
        }
    }

    let mut levels = vec![0usize];
    for (k, entry) in entries.iter().enumerate() {
        let current = levels.last().copied().unwrap_or(0);
        if entry.indent > current {
            return Err(SyntaxError::new(entry.idx, "unexpected indentation"));
        }
        let mut closes = 0;
        while levels.len() > 1 && entry.indent < levels.last().copied().unwrap_or(0) {
            levels.pop();
            closes += 1;
        }
        if levels.last().copied() != Some(entry.indent) {
            return Err(SyntaxError::new(
                entry.idx,
                "dedent does not match any outer indentation level",
            ));
        }

        let child_indent = entries
            .get(k + 1)
            .map(|next| next.indent)
            .filter(|&n| n > entry.indent);
        let opens = child_indent.is_some();

        let (code, trailing) = split_trailing_comment(entry.text);
        let code = convert_line(code.trim_end(), opens, entry.idx)?;

        let mut line = String::new();
        if closes > 0 {
            line.push_str(&"}".repeat(closes));
            line.push(' ');
        }
        line.push_str(&lines[entry.idx][..entry.indent]);
        line.push_str(&code);
        if let Some(child) = child_indent {
            line.push_str(" {");
            levels.push(child);
        } else if needs_semicolon(&code) {
            line.push(';');
        }
        if let Some(comment) = trailing {
            line.push(' ');
            line.push_str(comment);
        }
        out[entry.idx] = line;
    }

    let mut scss = out.join("\n");
    if levels.len() > 1 {
        scss.push('\n');
        scss.push_str(&"}".repeat(levels.len() - 1));
    }
    scss.push('\n');
    Ok(scss)
}
