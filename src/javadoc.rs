//! Best-effort association of `/** ... */` blocks with declarations.
//!
//! Matching is textual: each target is rendered as a whitespace tolerant pattern and
//! compared against the declaration that follows every doc comment in the source.
//! Overloads that erase to the same parameter types resolve to the first match.

use std::sync::LazyLock;

use regex::{Regex, escape};
use tracing::debug;

use crate::descriptor::Type;
use crate::model::{ClassDetail, ClassKind, FieldModel, MethodModel};

static JAVADOC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*\*(.*?)\*/").expect("javadoc block pattern"));

const MODIFIERS: &str = r"(?:(?:public|protected|private|static|final|abstract|synchronized|native|default|strictfp|transient|volatile|sealed|non-sealed)\s+)*";
const QUALIFIER: &str = r"(?:[\w$]+\s*\.\s*)*";
const GENERICS: &str = r"(?:\s*<.*?>)?";

/// Return the cleaned body of the first doc comment whose declaration matches `pattern`.
pub(crate) fn find_javadoc(source: &str, pattern: &str) -> String {
    let target = match Regex::new(pattern) {
        Ok(target) => target,
        Err(err) => {
            debug!(pattern, error = %err, "unusable declaration pattern");
            return String::new();
        }
    };

    for captures in JAVADOC_RE.captures_iter(source) {
        let (Some(block), Some(body)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let Some((raw, declaration)) = split_declaration(&source[block.end()..]) else {
            continue;
        };
        // Another comment sits between this block and the declaration.
        if raw.contains("/*") {
            continue;
        }
        if target.is_match(declaration.trim()) {
            return clean_body(body.as_str());
        }
    }
    String::new()
}

pub(crate) fn class_pattern(name: &str, kind: ClassKind) -> String {
    let keyword = match kind {
        ClassKind::Interface => "interface",
        ClassKind::Enum => "enum",
        ClassKind::Normal | ClassKind::Final | ClassKind::Abstract => "(?:class|record)",
    };
    format!(
        r"(?s)^{MODIFIERS}{keyword}\s+{}\b{GENERICS}(?:\s*\(.*\))?(?:\s+(?:extends|implements|permits)\b.*)?$",
        escape(name)
    )
}

pub(crate) fn field_pattern(field: &FieldModel) -> String {
    format!(
        r"(?s)^{MODIFIERS}{}\s+{}\s*(?:=.*)?$",
        type_pattern(&field.ty),
        escape(&field.element.name)
    )
}

/// Static initializers have no declaration to attach a comment to.
pub(crate) fn method_pattern(method: &MethodModel) -> Option<String> {
    if method.is_static_initializer() {
        return None;
    }
    let params: Vec<String> = method
        .params
        .iter()
        .map(|param| {
            let name = if param.name.is_empty() {
                r"[\w$]+".to_string()
            } else {
                escape(&param.name)
            };
            format!(r"(?:final\s+)?{}\s+{name}", type_pattern(&param.ty))
        })
        .collect();
    let params = params.join(r"\s*,\s*");

    let head = if method.is_constructor() {
        escape(&ClassDetail::parse(&method.element.owner).name)
    } else {
        format!(
            r"{}\s+{}",
            type_pattern(&method.return_type),
            escape(&method.element.name)
        )
    };
    Some(format!(
        r"(?s)^{MODIFIERS}(?:<.*?>\s*)?{head}\s*\(\s*{params}\s*\)(?:\s*\[\s*\])*\s*(?:throws\b.*)?$"
    ))
}

/// `Outer$Inner` accepts `Inner`, `Outer.Inner` and any package qualification.
fn type_pattern(ty: &Type) -> String {
    let base = match (ty.class_name(), ty.primitive()) {
        (Some("java/lang/Object"), _) => r"[\w$]+(?:\s*\.\s*[\w$]+)*".to_string(),
        (Some(name), _) => {
            let simple = name.rsplit('/').next().unwrap_or(name);
            let mut segments: Vec<&str> = simple.split('$').collect();
            let last = segments.pop().unwrap_or(simple);
            let outers: String = segments
                .iter()
                .map(|segment| format!(r"(?:{}\s*\.\s*)?", escape(segment)))
                .collect();
            format!("{QUALIFIER}{outers}{}", escape(last))
        }
        (None, Some(kind)) => kind.keyword().to_string(),
        (None, None) => escape(&ty.pretty),
    };

    let mut out = format!("{base}{GENERICS}");
    if ty.array_dimensions > 0 {
        let brackets = r"\s*\[\s*\]";
        let array = brackets.repeat(ty.array_dimensions);
        let varargs = brackets.repeat(ty.array_dimensions - 1);
        out.push_str(&format!(r"(?:{array}|{varargs}\s*\.\.\.)"));
    }
    out
}

/// Text up to the first `;`, `{` or `}` outside annotation arguments, returned raw and
/// with annotations removed. `None` when no terminator follows or an argument list is
/// unbalanced.
fn split_declaration(rest: &str) -> Option<(&str, String)> {
    let bytes = rest.as_bytes();
    let mut declaration = String::new();
    let mut index = 0;
    while let Some(current) = rest[index..].chars().next() {
        match current {
            ';' | '{' | '}' => return Some((&rest[..index], declaration)),
            '@' => {
                let name_end = skip_while(bytes, index + 1, |byte| {
                    byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'$' | b'.')
                });
                if &rest[index + 1..name_end] == "interface" {
                    declaration.push_str("interface");
                    index = name_end;
                    continue;
                }
                let after_space = skip_while(bytes, name_end, |byte| byte.is_ascii_whitespace());
                index = match bytes.get(after_space) {
                    Some(b'(') => skip_arguments(bytes, after_space)?,
                    _ => name_end,
                };
                declaration.push(' ');
            }
            _ => {
                declaration.push(current);
                index += current.len_utf8();
            }
        }
    }
    None
}

fn skip_while(bytes: &[u8], mut index: usize, accept: impl Fn(u8) -> bool) -> usize {
    while bytes.get(index).is_some_and(|byte| accept(*byte)) {
        index += 1;
    }
    index
}

/// Index just past the `)` closing the argument list opened at `open`.
fn skip_arguments(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut index = open;
    while let Some(&byte) = bytes.get(index) {
        match quote {
            Some(_) if byte == b'\\' => index += 1,
            Some(delimiter) if byte == delimiter => quote = None,
            Some(_) => {}
            None => match byte {
                b'"' | b'\'' => quote = Some(byte),
                b'(' => depth += 1,
                b')' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(index + 1);
                    }
                }
                _ => {}
            },
        }
        index += 1;
    }
    None
}

fn clean_body(raw: &str) -> String {
    let mut lines: Vec<&str> = raw
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix('*').map(str::trim).unwrap_or(line)
        })
        .collect();
    while lines
        .last()
        .is_some_and(|line| line.is_empty() || *line == "@Override")
    {
        lines.pop();
    }
    let start = lines.iter().position(|line| !line.is_empty()).unwrap_or(lines.len());
    lines[start..].join("\n")
}
