//! Helpers for writing Rust source text.
//!
//! Emitted code imports the runtime prelude; every snippet here refers to its
//! items unqualified.

use std::fmt::Write as _;

use mlang_core::{Coercion, Literal};

/// Identifier of a source-level name in emitted code.
pub fn local(name: &str) -> String {
    format!("id_{name}")
}

/// A string literal.
pub fn string(s: &str) -> String {
    format!("{s:?}")
}

/// An expression building `lit` as a runtime value.
pub fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Int(v) => format!("Value::int({v})"),
        Literal::Real(v) => {
            let v = v.0;
            let repr = if v.is_nan() {
                "f64::NAN".to_string()
            } else if v == f64::INFINITY {
                "f64::INFINITY".to_string()
            } else if v == f64::NEG_INFINITY {
                "f64::NEG_INFINITY".to_string()
            } else {
                format!("{v:?}")
            };
            format!("Value::real({repr})")
        }
        Literal::Bool(v) => format!("Value::Bool({v})"),
        Literal::Char(c) => format!("Value::Char({c:?})"),
    }
}

/// An expression building `plan` as a runtime [`Coercion`].
pub fn coercion(plan: &Coercion) -> String {
    let mut out = String::new();
    write_coercion(&mut out, plan);
    out
}

fn write_coercion(out: &mut String, plan: &Coercion) {
    match plan {
        Coercion::Direct => out.push_str("Coercion::Direct"),
        Coercion::Bounded { l, r } => {
            let _ = write!(out, "Coercion::Bounded {{ l: {l}, r: {r} }}");
        }
        Coercion::Tuple(items) => write_list(out, "Coercion::Tuple", items),
        Coercion::Union(arms) => write_list(out, "Coercion::Union", arms),
        Coercion::Array { length, element } => {
            let _ = write!(out, "Coercion::Array {{ length: {length}, element: Box::new(");
            write_coercion(out, element);
            out.push_str(") }");
        }
        Coercion::List(element) => {
            out.push_str("Coercion::List(Box::new(");
            write_coercion(out, element);
            out.push_str("))");
        }
        Coercion::Map { key, value } => {
            out.push_str("Coercion::Map { key: Box::new(");
            write_coercion(out, key);
            out.push_str("), value: Box::new(");
            write_coercion(out, value);
            out.push_str(") }");
        }
        Coercion::Struct(fields) => {
            out.push_str("Coercion::Struct(vec![");
            for (i, (name, field)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "({}.to_string(), ", string(name));
                write_coercion(out, field);
                out.push(')');
            }
            out.push_str("])");
        }
        Coercion::Inj { index, inner } => {
            let _ = write!(out, "Coercion::Inj {{ index: {index}, inner: Box::new(");
            write_coercion(out, inner);
            out.push_str(") }");
        }
    }
}

fn write_list(out: &mut String, ctor: &str, items: &[Coercion]) {
    out.push_str(ctor);
    out.push_str("(vec![");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        write_coercion(out, item);
    }
    out.push_str("])");
}

/// An expression applying `plan` to the value `code`.
///
/// Direct plans leave the value untouched.
pub fn apply(code: &str, plan: &Coercion) -> String {
    if plan.is_direct() {
        code.to_string()
    } else {
        format!("convert(&({code}), &{})?", coercion(plan))
    }
}

/// `vec![a, b, ...]`
pub fn vec_of(items: &[String]) -> String {
    format!("vec![{}]", items.join(", "))
}

// ============================================================================
// CodeWriter
// ============================================================================

const INDENT: &str = "    ";

/// Line-oriented source buffer with indentation tracking.
#[derive(Debug, Clone, Default)]
pub struct CodeWriter {
    lines: Vec<String>,
    depth: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if text.is_empty() {
            self.lines.push(String::new());
        } else {
            self.lines.push(format!("{}{text}", INDENT.repeat(self.depth)));
        }
    }

    /// Write `text` and indent what follows.
    pub fn open(&mut self, text: impl AsRef<str>) {
        self.line(text);
        self.depth += 1;
    }

    /// Dedent, then write `text`.
    pub fn close(&mut self, text: impl AsRef<str>) {
        self.depth = self.depth.saturating_sub(1);
        self.line(text);
    }

    /// Append another buffer's lines at the current indentation.
    pub fn append(&mut self, other: CodeWriter) {
        let prefix = INDENT.repeat(self.depth);
        for line in other.lines {
            if line.is_empty() {
                self.lines.push(line);
            } else {
                self.lines.push(format!("{prefix}{line}"));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn finish(self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals() {
        assert_eq!(literal(&Literal::Int(-3)), "Value::int(-3)");
        assert_eq!(literal(&Literal::Real(2.0.into())), "Value::real(2.0)");
        assert_eq!(
            literal(&Literal::Real(f64::NAN.into())),
            "Value::real(f64::NAN)"
        );
        assert_eq!(literal(&Literal::Char('\'')), "Value::Char('\\'')");
    }

    #[test]
    fn coercion_expressions() {
        let plan = Coercion::Struct(vec![
            (
                "a".into(),
                Coercion::Inj {
                    index: 1,
                    inner: Box::new(Coercion::Bounded { l: 0, r: 3 }),
                },
            ),
            ("b".into(), Coercion::List(Box::new(Coercion::Direct))),
        ]);
        assert_eq!(
            coercion(&plan),
            "Coercion::Struct(vec![(\"a\".to_string(), Coercion::Inj { index: 1, inner: \
             Box::new(Coercion::Bounded { l: 0, r: 3 }) }), (\"b\".to_string(), \
             Coercion::List(Box::new(Coercion::Direct)))])"
        );
        assert_eq!(apply("x", &Coercion::Direct), "x");
        assert_eq!(
            apply("x", &Coercion::Tuple(vec![])),
            "convert(&(x), &Coercion::Tuple(vec![]))?"
        );
    }

    #[test]
    fn writer_indents_blocks() {
        let mut inner = CodeWriter::new();
        inner.line("b();");
        let mut w = CodeWriter::new();
        w.open("fn f() {");
        w.line("a();");
        w.append(inner);
        w.close("}");
        assert_eq!(w.finish(), "fn f() {\n    a();\n    b();\n}\n");
    }
}
