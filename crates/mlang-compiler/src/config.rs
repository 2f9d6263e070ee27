//! Compiler configuration.

/// Upper bound on the number of expansions one compilation may create.
pub const DEFAULT_MAX_EXPANSIONS: usize = 4096;

/// Path under which emitted code imports the runtime library.
pub const DEFAULT_RUNTIME_CRATE: &str = "mlang_runtime";

/// Knobs of one compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Creating more expansions than this is reported as resource
    /// exhaustion.
    pub max_expansions: usize,
    /// Declarations that seed the worklist. Empty means every non-generic
    /// declaration, in declaration order.
    pub entry_points: Vec<String>,
    /// Crate path of the runtime library in the emitted `use` line.
    pub runtime_crate: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            entry_points: Vec::new(),
            runtime_crate: DEFAULT_RUNTIME_CRATE.to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_expansions(mut self, limit: usize) -> Self {
        self.max_expansions = limit;
        self
    }

    pub fn with_entry_point(mut self, name: impl Into<String>) -> Self {
        self.entry_points.push(name.into());
        self
    }

    pub fn with_runtime_crate(mut self, path: impl Into<String>) -> Self {
        self.runtime_crate = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = CompilerConfig::new()
            .with_max_expansions(8)
            .with_entry_point("Main")
            .with_runtime_crate("crate::rt");
        assert_eq!(config.max_expansions, 8);
        assert_eq!(config.entry_points, vec!["Main".to_string()]);
        assert_eq!(config.runtime_crate, "crate::rt");
        assert_eq!(CompilerConfig::default().max_expansions, DEFAULT_MAX_EXPANSIONS);
    }
}
