//! Named instructions outside the operator tables, addressed with the
//! `:{name}` syntax.

pub mod json;

use crate::interp::{Runtime, RuntimeError, Stack};

pub type ExtFn = fn(&mut Runtime, &mut Stack) -> Result<(), RuntimeError>;

static REGISTRY: &[(&str, ExtFn)] = &[
    ("json.dumps", json::dumps),
    ("json.loads", json::loads),
];

/// The registry's own copy of a known name, so instructions can hold a
/// `&'static str` without tying blocks to the source text.
pub fn canonical(name: &str) -> Option<&'static str> {
    REGISTRY.iter().find(|(n, _)| *n == name).map(|(n, _)| *n)
}

pub fn find(name: &str) -> Option<ExtFn> {
    REGISTRY.iter().find(|(n, _)| *n == name).map(|(_, f)| *f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup() {
        assert!(find("json.dumps").is_some());
        assert!(find("json.nope").is_none());
        assert_eq!(canonical("json.loads"), Some("json.loads"));
    }
}
