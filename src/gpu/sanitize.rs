// ============================================================================
// SHADER SANITATION: small allowlist of textual fixes before compilation
// ============================================================================
//
// Generated fragment text often arrives wrapped in Markdown fences or written
// with GLSL habits.  This pass fixes exactly three things and nothing else:
//
//   1. surrounding ``` fences are stripped
//   2. `float(` / `int(` become `f32(` / `i32(`
//   3. abs/min/max/clamp/sign calls that mix an integer loop index with a
//      float operand get every argument wrapped in `f32(...)`
//
// Integer-only calls like `min(i, 3)` are valid WGSL and stay as written.
// `coerce_integer_builtins` is the wider form of (3) for sources that fail
// to compile as given; the loader retries with it and keeps the original
// diagnostic if that does not help.  Everything else is left for the
// compiler to report.

use std::fmt;

const COERCE_BUILTINS: [&str; 5] = ["abs", "min", "max", "clamp", "sign"];

/// Which builtin calls with a bare loop index get coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Coercion {
    /// Only when another argument is already a float expression.
    MixedFloat,
    /// Every call, including integer-only ones.
    AnyIndex,
}

/// One kind of fix applied to the text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rewrite {
    StrippedCodeFence,
    ScalarCast { count: usize },
    IntegerCoercion { count: usize },
}

impl fmt::Display for Rewrite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rewrite::StrippedCodeFence => write!(f, "stripped code fence"),
            Rewrite::ScalarCast { count } => write!(f, "{count} GLSL scalar cast(s) renamed"),
            Rewrite::IntegerCoercion { count } => write!(f, "{count} builtin call(s) coerced to f32"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sanitized {
    pub source: String,
    pub rewrites: Vec<Rewrite>,
}

impl Sanitized {
    pub fn is_unchanged(&self) -> bool {
        self.rewrites.is_empty()
    }
}

pub fn sanitize(source: &str) -> Sanitized {
    let mut rewrites = Vec::new();

    let mut text = match strip_code_fences(source) {
        Some(body) => {
            rewrites.push(Rewrite::StrippedCodeFence);
            body
        }
        None => source.to_string(),
    };

    let (renamed, casts) = rename_scalar_casts(&text);
    if casts > 0 {
        text = renamed;
        rewrites.push(Rewrite::ScalarCast { count: casts });
    }

    let indices = integer_loop_indices(&text);
    if !indices.is_empty() {
        let mut count = 0;
        let coerced = coerce_calls(&text, &indices, Coercion::MixedFloat, &mut count);
        if count > 0 {
            text = coerced;
            rewrites.push(Rewrite::IntegerCoercion { count });
        }
    }

    Sanitized { source: text, rewrites }
}

/// Coerce every abs/min/max/clamp/sign call that takes a bare integer loop
/// index, float operand or not.  `None` when nothing would change.
pub fn coerce_integer_builtins(source: &str) -> Option<(String, Rewrite)> {
    let indices = integer_loop_indices(source);
    if indices.is_empty() {
        return None;
    }
    let mut count = 0;
    let coerced = coerce_calls(source, &indices, Coercion::AnyIndex, &mut count);
    (count > 0).then_some((coerced, Rewrite::IntegerCoercion { count }))
}

/// Body of the first fenced block, if the text contains a fence.
fn strip_code_fences(src: &str) -> Option<String> {
    let start = src.find("```")?;
    let after_marker = &src[start + 3..];
    // Skip the info string (`wgsl`, `rust`, ...).
    let body_start = after_marker.find('\n').map(|i| i + 1).unwrap_or(after_marker.len());
    let body = &after_marker[body_start..];
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    Some(body.to_string())
}

// ----------------------------------------------------------------------------
// Tokens
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokKind {
    Ident,
    Number,
    Punct,
}

#[derive(Clone, Copy, Debug)]
struct Tok<'a> {
    kind: TokKind,
    text: &'a str,
    start: usize,
    end: usize,
}

/// Identifier / number / single-char punctuation, skipping whitespace and
/// comments.  Just enough lexing to find calls and loop headers.
fn tokenize(src: &str) -> Vec<Tok<'_>> {
    let bytes = src.as_bytes();
    let len = bytes.len();
    let mut toks = Vec::new();
    let mut i = 0;

    while i < len {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if c == b'/' && bytes.get(i + 1) == Some(&b'/') {
            while i < len && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }
        if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i < len && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                i += 1;
            }
            i = (i + 2).min(len);
            continue;
        }

        let start = i;
        let kind = if c.is_ascii_alphabetic() || c == b'_' {
            while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            TokKind::Ident
        } else if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'.') {
                i += 1;
            }
            TokKind::Number
        } else {
            i += src[i..].chars().next().map(char::len_utf8).unwrap_or(1);
            TokKind::Punct
        };
        toks.push(Tok { kind, text: &src[start..i], start, end: i });
    }
    toks
}

/// Index of the `)` matching the `(` at `open`.
fn matching_paren(toks: &[Tok<'_>], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (k, t) in toks.iter().enumerate().skip(open) {
        match t.text {
            "(" => depth += 1,
            ")" => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(k);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_call_of(toks: &[Tok<'_>], k: usize, names: &[&str]) -> bool {
    let t = &toks[k];
    t.kind == TokKind::Ident
        && names.contains(&t.text)
        && toks.get(k + 1).is_some_and(|n| n.text == "(")
        && !(k > 0 && toks[k - 1].text == ".")
}

// ----------------------------------------------------------------------------
// Rewrites
// ----------------------------------------------------------------------------

fn rename_scalar_casts(src: &str) -> (String, usize) {
    let toks = tokenize(src);
    let mut out = String::with_capacity(src.len());
    let mut cursor = 0;
    let mut count = 0;
    for k in 0..toks.len() {
        if !is_call_of(&toks, k, &["float", "int"]) {
            continue;
        }
        let t = &toks[k];
        out.push_str(&src[cursor..t.start]);
        out.push_str(if t.text == "float" { "f32" } else { "i32" });
        cursor = t.end;
        count += 1;
    }
    out.push_str(&src[cursor..]);
    (out, count)
}

fn is_int_literal(text: &str) -> bool {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit() || c == 'i' || c == 'u');
    }
    text.starts_with(|c: char| c.is_ascii_digit()) && text.chars().all(|c| c.is_ascii_digit() || c == 'i' || c == 'u')
}

/// Names declared as integer loop counters: `for (var i: i32 ...` or
/// `for (var i = 0; ...`.
fn integer_loop_indices(src: &str) -> Vec<String> {
    let toks = tokenize(src);
    let mut names = Vec::new();
    for k in 0..toks.len() {
        let window = &toks[k..];
        if window.len() < 6
            || window[0].text != "for"
            || window[1].text != "("
            || window[2].text != "var"
            || window[3].kind != TokKind::Ident
        {
            continue;
        }
        let is_int = match window[4].text {
            ":" => matches!(window[5].text, "i32" | "u32"),
            "=" => window[5].kind == TokKind::Number && is_int_literal(window[5].text),
            _ => false,
        };
        if is_int && !names.iter().any(|n| n == window[3].text) {
            names.push(window[3].text.to_string());
        }
    }
    names
}

/// Top-level comma-separated argument ranges of `inner`.
fn split_args(inner: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for t in tokenize(inner) {
        match t.text {
            "(" | "[" => depth += 1,
            ")" | "]" => depth -= 1,
            "," if depth == 0 => {
                args.push(&inner[start..t.start]);
                start = t.end;
            }
            _ => {}
        }
    }
    args.push(&inner[start..]);
    args
}

fn is_vector_arg(arg: &str) -> bool {
    let toks = tokenize(arg);
    toks.first().is_some_and(|t| {
        t.kind == TokKind::Ident
            && t.text.starts_with("vec")
            && t.text[3..].starts_with(|c: char| c.is_ascii_digit())
    })
}

fn is_float_literal(text: &str) -> bool {
    if text.starts_with("0x") || text.starts_with("0X") {
        return false;
    }
    text.contains(['.', 'e', 'E']) || text.ends_with('f') || text.ends_with('h')
}

/// Does `arg` contain a float literal or an `f32(...)` value?  Integer
/// conversions are opaque: `i32(2.5)` is an integer.
fn has_float_operand(arg: &str) -> bool {
    let toks = tokenize(arg);
    let mut k = 0;
    while k < toks.len() {
        if is_call_of(&toks, k, &["i32", "u32", "bool"]) {
            match matching_paren(&toks, k + 1) {
                Some(close) => {
                    k = close + 1;
                    continue;
                }
                None => return false,
            }
        }
        let t = &toks[k];
        if (t.kind == TokKind::Number && is_float_literal(t.text)) || is_call_of(&toks, k, &["f32", "f16"]) {
            return true;
        }
        k += 1;
    }
    false
}

fn is_coerced_arg(arg: &str) -> bool {
    let toks = tokenize(arg);
    toks.len() >= 3
        && toks[0].text == "f32"
        && toks[1].text == "("
        && matching_paren(&toks, 1) == Some(toks.len() - 1)
}

/// Does `arg` mention a loop index outside an `f32(...)` wrapper?
fn references_bare_index(arg: &str, indices: &[String]) -> bool {
    let toks = tokenize(arg);
    let mut k = 0;
    while k < toks.len() {
        if is_call_of(&toks, k, &["f32"]) {
            match matching_paren(&toks, k + 1) {
                Some(close) => {
                    k = close + 1;
                    continue;
                }
                None => return false,
            }
        }
        if toks[k].kind == TokKind::Ident && indices.iter().any(|n| n == toks[k].text) {
            return true;
        }
        k += 1;
    }
    false
}

fn wrap_f32(arg: &str) -> String {
    let core = arg.trim();
    if core.is_empty() {
        return arg.to_string();
    }
    let lead = &arg[..arg.len() - arg.trim_start().len()];
    let trail = &arg[arg.trim_end().len()..];
    format!("{lead}f32({core}){trail}")
}

fn coerce_calls(src: &str, indices: &[String], mode: Coercion, count: &mut usize) -> String {
    let toks = tokenize(src);
    let mut out = String::with_capacity(src.len() + 16);
    let mut cursor = 0;
    let mut k = 0;

    while k < toks.len() {
        if !is_call_of(&toks, k, &COERCE_BUILTINS) {
            k += 1;
            continue;
        }
        let Some(close) = matching_paren(&toks, k + 1) else {
            k += 1;
            continue;
        };
        let open_end = toks[k + 1].end;
        let inner = &src[open_end..toks[close].start];

        // Inner calls first; a coerced inner call no longer exposes the index.
        let args: Vec<String> = split_args(inner)
            .into_iter()
            .map(|a| coerce_calls(a, indices, mode, count))
            .collect();

        let qualifies = !args.iter().any(|a| is_vector_arg(a))
            && args.iter().any(|a| references_bare_index(a, indices))
            && (mode == Coercion::AnyIndex || args.iter().any(|a| has_float_operand(a)));

        out.push_str(&src[cursor..open_end]);
        if qualifies {
            let wrapped: Vec<String> = args
                .iter()
                .map(|a| if is_coerced_arg(a) { a.clone() } else { wrap_f32(a) })
                .collect();
            out.push_str(&wrapped.join(","));
            *count += 1;
        } else {
            out.push_str(&args.join(","));
        }
        cursor = toks[close].start;
        k = close;
    }
    out.push_str(&src[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LOOP: &str = "for (var i = 0; i < 4; i++) {\n";

    #[test]
    fn strips_fences_with_language_tag() {
        let s = sanitize("Here you go:\n```wgsl\n@fragment\nfn fs_main() {}\n```\nEnjoy!");
        assert_eq!(s.source, "@fragment\nfn fs_main() {}\n");
        assert_eq!(s.rewrites, vec![Rewrite::StrippedCodeFence]);
    }

    #[test]
    fn renames_glsl_casts_only_at_call_sites() {
        let s = sanitize("let a = float(x) + f32(int(y));\nlet floaty = myfloat(1); // float(z)");
        assert_eq!(s.source, "let a = f32(x) + f32(i32(y));\nlet floaty = myfloat(1); // float(z)");
        assert_eq!(s.rewrites, vec![Rewrite::ScalarCast { count: 2 }]);
    }

    #[test]
    fn coerces_builtin_mixing_index_and_float() {
        let src = format!("{LOOP}    acc += min(i, 2.5) * 0.5;\n}}");
        let s = sanitize(&src);
        assert!(s.source.contains("min(f32(i), f32(2.5))"), "{}", s.source);
        assert_eq!(s.rewrites, vec![Rewrite::IntegerCoercion { count: 1 }]);
    }

    #[test]
    fn wraps_every_argument() {
        let src = format!("{LOOP}    let t = clamp(i, 0, 2.5);\n}}");
        let s = sanitize(&src);
        assert!(s.source.contains("clamp(f32(i), f32(0), f32(2.5))"), "{}", s.source);
    }

    #[test]
    fn integer_only_calls_are_left_alone() {
        let src = format!("{LOOP}    acc += w[min(i, 3)] + f32(abs(i - 2)) + f32(clamp(i, 0, i32(2.5)));\n}}");
        assert!(sanitize(&src).is_unchanged());
    }

    #[test]
    fn wide_coercion_covers_integer_only_calls() {
        let src = format!("{LOOP}    acc += abs(i - 2) * 0.5;\n}}");
        assert!(sanitize(&src).is_unchanged());
        let (coerced, rewrite) = coerce_integer_builtins(&src).unwrap();
        assert!(coerced.contains("abs(f32(i - 2))"), "{coerced}");
        assert_eq!(rewrite, Rewrite::IntegerCoercion { count: 1 });
        assert!(coerce_integer_builtins("let a = abs(x);").is_none());
    }

    #[test]
    fn typed_loop_header_is_recognised() {
        let src = "for (var k: i32 = 0; k < 3; k++) { m = max(k, 0.5); }";
        let s = sanitize(src);
        assert!(s.source.contains("max(f32(k), f32(0.5))"), "{}", s.source);
    }

    #[test]
    fn float_loop_index_is_ignored() {
        let src = "for (var t = 0.0; t < 1.0; t += 0.1) { m = max(t, 0.5); }";
        assert!(sanitize(src).is_unchanged());
    }

    #[test]
    fn integer_inner_call_is_wrapped_whole() {
        let src = format!("{LOOP}    let m = max(abs(i), 1.0);\n}}");
        let s = sanitize(&src);
        assert!(s.source.contains("max(f32(abs(i)), f32(1.0))"), "{}", s.source);
        assert_eq!(s.rewrites, vec![Rewrite::IntegerCoercion { count: 1 }]);
    }

    #[test]
    fn vector_calls_are_left_alone() {
        let src = format!("{LOOP}    let v = max(vec2<f32>(f32(i)), p);\n    let w = min(vec3(1.0), q * f32(i));\n}}");
        assert!(sanitize(&src).is_unchanged());
    }

    #[test]
    fn already_coerced_calls_are_left_alone() {
        let src = format!("{LOOP}    let m = abs(f32(i) - 1.5);\n    let n = min(f32(i), 2.0);\n}}");
        assert!(sanitize(&src).is_unchanged());
    }

    #[test]
    fn valid_fragment_passes_through() {
        let src = crate::gpu::shaders::PASSTHROUGH_FRAGMENT;
        let s = sanitize(src);
        assert!(s.is_unchanged());
        assert_eq!(s.source, src);
    }

    #[test]
    fn sanitizing_twice_changes_nothing() {
        let src = format!("```\n{LOOP}    let a = float(i) + abs(i) + clamp(i, 0, int(3.0));\n}}\n```");
        let once = sanitize(&src);
        let twice = sanitize(&once.source);
        assert!(twice.is_unchanged(), "{:?}", twice.rewrites);
        assert_eq!(twice.source, once.source);
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(parts in proptest::collection::vec(prop_oneof![
            Just("let a = abs(i);"),
            Just("let b = min(i, 2.0);"),
            Just("let c = float(i) * 0.5;"),
            Just("let d = max(abs(i - 1), int(2));"),
            Just("let e = sign(vec2<f32>(1.0));"),
            Just("// clamp(i, 0, 1)"),
            Just("let f = clamp(x, 0.0, 1.0);"),
        ], 0..8)) {
            let src = format!("{LOOP}{}\n}}", parts.join("\n"));
            let once = sanitize(&src);
            let twice = sanitize(&once.source);
            prop_assert!(twice.is_unchanged());
        }
    }
}
