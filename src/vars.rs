//! Environment variable access.
//!
//! Code that reads process environment variables takes an [`EnvVars`] so tests
//! can supply a fixed set instead of mutating the real environment.

use std::collections::HashMap;

/// Read-only view of environment variables.
pub trait EnvVars: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;

    /// True when the variable is set to a non-empty value.
    fn is_set(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_empty())
    }

    /// Parse a boolean flag (`true`/`false`/`1`/`0`, case-insensitive).
    fn get_bool(&self, name: &str) -> Option<bool> {
        match self.get(name)?.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        }
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvVars for ProcessEnv {
    fn get(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvVars for HashMap<String, String> {
    fn get(&self, name: &str) -> Option<String> {
        HashMap::get(self, name).cloned()
    }
}

/// Build a fixed environment from pairs.
pub fn fixed_env<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_env_flags() {
        let env = fixed_env([("A", "true"), ("B", "0"), ("C", ""), ("D", "maybe")]);
        assert_eq!(env.get_bool("A"), Some(true));
        assert_eq!(env.get_bool("B"), Some(false));
        assert!(!env.is_set("C"));
        assert_eq!(env.get_bool("D"), None);
        assert_eq!(env.get_bool("missing"), None);
    }
}
