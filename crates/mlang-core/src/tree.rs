//! Generic attributed syntax tree.
//!
//! This is the input contract with the external lexer and grammar parser: every
//! node carries a kind name, a bag of attributes and an ordered list of
//! children. Nothing here knows what the kinds mean; [`crate::ast`] turns a
//! tree into typed declarations and rejects unknown kinds.
//!
//! Two copy depths exist. [`AttributedTree::copy`] rebuilds the node structure
//! but shares tree-valued attribute payloads; [`AttributedTree::deep_copy`]
//! also clones those payloads.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ordered_float::OrderedFloat;

/// An attribute value attached to a tree node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttrValue {
    Int(i64),
    Real(OrderedFloat<f64>),
    Bool(bool),
    Char(char),
    Str(String),
    /// Ordered list of names (struct field lists).
    Names(Vec<String>),
    /// A nested tree, e.g. the initializer term of an `init` type.
    Tree(Arc<AttributedTree>),
}

impl AttrValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_names(&self) -> Option<&[String]> {
        match self {
            AttrValue::Names(names) => Some(names),
            _ => None,
        }
    }

    pub fn as_tree(&self) -> Option<&AttributedTree> {
        match self {
            AttrValue::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    fn deep_copy(&self) -> Self {
        match self {
            AttrValue::Tree(tree) => AttrValue::Tree(Arc::new(tree.deep_copy())),
            other => other.clone(),
        }
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Real(OrderedFloat(v))
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<char> for AttrValue {
    fn from(v: char) -> Self {
        AttrValue::Char(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Str(v)
    }
}

impl From<AttributedTree> for AttrValue {
    fn from(v: AttributedTree) -> Self {
        AttrValue::Tree(Arc::new(v))
    }
}

/// A node of the generic syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributedTree {
    /// Node kind name as produced by the grammar (`var_decl`, `IDENTIFIER`, ...).
    pub name: String,
    pub attributes: BTreeMap<String, AttrValue>,
    pub children: Vec<AttributedTree>,
}

impl AttributedTree {
    /// Create a node with no attributes or children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// An `IDENTIFIER` leaf.
    pub fn identifier(value: impl Into<String>) -> Self {
        Self::new("IDENTIFIER").with_attr("value", AttrValue::Str(value.into()))
    }

    /// A `VALUE` leaf.
    pub fn value(value: impl Into<AttrValue>) -> Self {
        Self::new("VALUE").with_attr("value", value)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: AttributedTree) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = AttributedTree>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn n_children(&self) -> usize {
        self.children.len()
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    pub fn has_attr(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// First child with the given kind name.
    pub fn child_by_name(&self, name: &str) -> Option<&AttributedTree> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All children with the given kind name, in order.
    pub fn children_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = &'a AttributedTree> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Structural copy. Tree-valued attributes are shared with `self`.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Copy that also clones tree-valued attribute payloads.
    pub fn deep_copy(&self) -> Self {
        Self {
            name: self.name.clone(),
            attributes: self
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.deep_copy()))
                .collect(),
            children: self.children.iter().map(AttributedTree::deep_copy).collect(),
        }
    }
}

impl fmt::Display for AttributedTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree({}, [", self.name)?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{child}")?;
        }
        write!(f, "])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init_type() -> AttributedTree {
        AttributedTree::new("init")
            .with_attr("term", AttributedTree::value(3i64))
            .with_child(AttributedTree::new("int"))
    }

    #[test]
    fn copy_shares_tree_attributes() {
        let original = init_type();
        let copy = original.copy();
        let (Some(AttrValue::Tree(a)), Some(AttrValue::Tree(b))) =
            (original.attr("term"), copy.attr("term"))
        else {
            panic!("term attribute missing");
        };
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(original, copy);
    }

    #[test]
    fn deep_copy_clones_tree_attributes() {
        let original = init_type();
        let copy = original.deep_copy();
        let (Some(AttrValue::Tree(a)), Some(AttrValue::Tree(b))) =
            (original.attr("term"), copy.attr("term"))
        else {
            panic!("term attribute missing");
        };
        assert!(!Arc::ptr_eq(a, b));
        assert_eq!(original, copy);
    }

    #[test]
    fn mutating_copy_leaves_original() {
        let original = AttributedTree::new("tuple")
            .with_child(AttributedTree::new("int"))
            .with_child(AttributedTree::new("bool"));
        let mut copy = original.copy();
        copy.children[0].name = "real".to_string();
        copy.children.pop();

        assert_eq!(original.n_children(), 2);
        assert_eq!(original.children[0].name, "int");
    }

    #[test]
    fn child_lookup_by_name() {
        let tree = AttributedTree::new("assign_stmt")
            .with_child(AttributedTree::new("lhs"))
            .with_child(AttributedTree::new("rhs"));
        assert!(tree.child_by_name("rhs").is_some());
        assert!(tree.child_by_name("guard").is_none());
        assert_eq!(tree.children_by_name("lhs").count(), 1);
    }
}
