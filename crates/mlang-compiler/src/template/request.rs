//! Expansion requests.

use std::fmt;

use mlang_core::TemplateArg;

/// A request for the expansion of declaration `name` with resolved `args`.
///
/// Two requests are the same expansion exactly when they are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpansionRequest {
    pub name: String,
    pub args: Vec<TemplateArg>,
}

impl ExpansionRequest {
    pub fn new(name: impl Into<String>, args: Vec<TemplateArg>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// A request for a non-generic declaration.
    pub fn plain(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }
}

impl fmt::Display for ExpansionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.args.is_empty() {
            return Ok(());
        }
        f.write_str("<")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(">")
    }
}

#[cfg(test)]
mod tests {
    use mlang_core::{Literal, TypeTree};

    use super::*;

    #[test]
    fn display_lists_arguments() {
        let req = ExpansionRequest::new(
            "Buffer",
            vec![
                TemplateArg::Type(TypeTree::Int),
                TemplateArg::Value(Literal::Int(3)),
            ],
        );
        assert_eq!(req.to_string(), "Buffer<int, 3>");
        assert_eq!(ExpansionRequest::plain("Main").to_string(), "Main");
    }
}
