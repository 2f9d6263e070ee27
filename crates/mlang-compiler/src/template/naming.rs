//! Generated names of expansions.
//!
//! An expansion of declaration `name` is called `m_<counter>_<name>`, where
//! `counter` is the number of expansions of `name` created before it. The
//! declaration name can be read back from a generated name.

/// Name of the `counter`-th expansion of `name`.
pub fn expansion_name(counter: usize, name: &str) -> String {
    format!("m_{counter}_{name}")
}

/// Recover the declaration name from a generated expansion name.
///
/// Returns `None` for names that were not produced by [`expansion_name`].
pub fn infer_original_name(actual: &str) -> Option<&str> {
    let rest = actual.strip_prefix("m_")?;
    let (counter, name) = rest.split_once('_')?;
    if counter.is_empty() || !counter.bytes().all(|b| b.is_ascii_digit()) || name.is_empty() {
        return None;
    }
    Some(name)
}
