//! Wiring tables of component instances.

use mlang_core::NameError;
use mlang_core::ast::Category;

/// Maps each port of one component instance to the communication node it
/// is wired to.
///
/// Ports keep their declaration order, which is the positional order of the
/// emitted call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTable {
    actual_name: String,
    category: Category,
    ports: Vec<(String, Option<String>)>,
}

impl ConnectionTable {
    pub fn new(
        actual_name: impl Into<String>,
        category: Category,
        ports: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            actual_name: actual_name.into(),
            category,
            ports: ports.into_iter().map(|p| (p, None)).collect(),
        }
    }

    pub fn actual_name(&self) -> &str {
        &self.actual_name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Port names in declaration order.
    pub fn ports(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(|(p, _)| p.as_str())
    }

    pub fn node(&self, port: &str) -> Option<&str> {
        self.ports
            .iter()
            .find(|(p, _)| p == port)
            .and_then(|(_, node)| node.as_deref())
    }

    /// Wire `port` to the node emitted as `node`. Rewiring replaces the
    /// previous node.
    pub fn set_node(&mut self, port: &str, node: impl Into<String>) -> Result<(), NameError> {
        let slot = self
            .ports
            .iter_mut()
            .find(|(p, _)| p == port)
            .ok_or_else(|| NameError::UnknownPort(port.to_string()))?;
        slot.1 = Some(node.into());
        Ok(())
    }

    /// Wire the `index`-th port.
    pub fn set_node_at(&mut self, index: usize, node: impl Into<String>) -> Option<()> {
        self.ports.get_mut(index)?.1 = Some(node.into());
        Some(())
    }

    pub fn is_complete(&self) -> bool {
        self.ports.iter().all(|(_, node)| node.is_some())
    }

    /// The call expression starting the instance `instance`.
    ///
    /// Automata take a fresh `Unit` for `party` and a handle
    /// to each node bound to that party; systems take shared handles.
    pub fn translate(&self, instance: &str, party: &str) -> Result<String, NameError> {
        let mut args = Vec::with_capacity(self.ports.len() + 1);
        if self.category == Category::Automaton {
            args.push(format!("Unit::new({party})"));
        }
        for (port, node) in &self.ports {
            let node = node.as_deref().ok_or_else(|| NameError::UnboundPort {
                instance: instance.to_string(),
                port: port.clone(),
            })?;
            match self.category {
                Category::Automaton => args.push(format!("{node}.bind({party})")),
                _ => args.push(format!("{node}.clone()")),
            }
        }
        Ok(format!("{}({})", self.actual_name, args.join(", ")))
    }
}
