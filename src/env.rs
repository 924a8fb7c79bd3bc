//! Environment snapshot and typed lookups.
//!
//! Settings are read once from a snapshot of the process environment.  Every
//! lookup takes a primary name and a list of aliases; the first non-empty value
//! wins.  Lookups never fail: a missing or unparseable value yields the default.

use std::collections::HashMap;

/// Strings that resolve to `true` (compared case-insensitively, after trimming).
const TRUTHY: &[&str] = &["1", "true", "yes", "y", "on"];

/// An immutable snapshot of environment variables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Snapshots the current process environment.
    ///
    /// Variables whose name or value is not valid Unicode are skipped.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars_os()
                .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
                .collect(),
        }
    }

    /// Builds a snapshot from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Returns the raw value of `name`, if set.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Returns the first non-empty value among `name` and then `aliases`.
    pub fn first_nonempty(&self, name: &str, aliases: &[&str]) -> Option<&str> {
        std::iter::once(name)
            .chain(aliases.iter().copied())
            .filter_map(|n| self.get(n))
            .find(|v| !v.is_empty())
    }

    /// Resolves a string setting, falling back to `default`.
    pub fn resolve(&self, name: &str, aliases: &[&str], default: &str) -> String {
        self.first_nonempty(name, aliases)
            .unwrap_or(default)
            .to_string()
    }

    /// Resolves an optional string setting.  Whitespace around the value is
    /// trimmed and a value that is blank after trimming counts as unset.
    pub fn resolve_opt(&self, name: &str, aliases: &[&str]) -> Option<String> {
        std::iter::once(name)
            .chain(aliases.iter().copied())
            .filter_map(|n| self.get(n))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .map(String::from)
    }

    /// Resolves a boolean setting.
    ///
    /// Unset or blank yields `default`; otherwise the value is true iff it is
    /// one of `1`, `true`, `yes`, `y`, `on` in any case.
    pub fn resolve_bool(&self, name: &str, aliases: &[&str], default: bool) -> bool {
        match self.resolve_opt(name, aliases) {
            Some(value) => parse_truthy(&value),
            None => default,
        }
    }

    /// Resolves a base-10 integer setting, yielding `default` when unset or
    /// unparseable.
    pub fn resolve_int(&self, name: &str, aliases: &[&str], default: i64) -> i64 {
        self.resolve_opt(name, aliases)
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(default)
    }
}

fn parse_truthy(value: &str) -> bool {
    let value = value.trim().to_lowercase();
    TRUTHY.contains(&value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_primary_then_aliases() {
        let env = Environment::from_pairs([("B", "from-b"), ("C", "from-c")]);
        assert_eq!(env.resolve("A", &["B", "C"], "dflt"), "from-b");
        assert_eq!(env.resolve("C", &["B"], "dflt"), "from-c");
        assert_eq!(env.resolve("X", &["Y"], "dflt"), "dflt");
    }

    #[test]
    fn empty_values_are_skipped() {
        let env = Environment::from_pairs([("A", ""), ("B", "value")]);
        assert_eq!(env.resolve("A", &["B"], "dflt"), "value");
        assert_eq!(env.first_nonempty("A", &[]), None);
    }

    #[test]
    fn resolve_opt_treats_blank_as_unset() {
        let env = Environment::from_pairs([("A", "   "), ("B", " value ")]);
        assert_eq!(env.resolve_opt("A", &[]), None);
        assert_eq!(env.resolve_opt("A", &["B"]), Some("value".to_string()));
    }

    #[test]
    fn booleans() {
        let env = Environment::from_pairs([
            ("YES", "YES"),
            ("ON", "On"),
            ("ONE", "1"),
            ("Y", " y "),
            ("ZERO", "0"),
            ("FALSE", "false"),
            ("JUNK", "maybe"),
        ]);
        assert!(env.resolve_bool("YES", &[], false));
        assert!(env.resolve_bool("ON", &[], false));
        assert!(env.resolve_bool("ONE", &[], false));
        assert!(env.resolve_bool("Y", &[], false));
        assert!(!env.resolve_bool("ZERO", &[], false));
        assert!(!env.resolve_bool("FALSE", &[], false));
        assert!(!env.resolve_bool("UNSET", &[], false));
        assert!(!env.resolve_bool("JUNK", &[], true));
        assert!(env.resolve_bool("UNSET", &[], true));
    }

    #[test]
    fn blank_booleans_use_alias_or_default() {
        let env = Environment::from_pairs([("BLANK", "  "), ("ALIAS", "false"), ("ON", "on")]);
        assert!(env.resolve_bool("BLANK", &[], true));
        assert!(!env.resolve_bool("BLANK", &[], false));
        assert!(!env.resolve_bool("BLANK", &["ALIAS"], true));
        assert!(env.resolve_bool("BLANK", &["ON"], false));
    }

    #[test]
    fn blank_integers_use_alias() {
        let env = Environment::from_pairs([("BLANK", " "), ("ALIAS", "9")]);
        assert_eq!(env.resolve_int("BLANK", &["ALIAS"], 3), 9);
    }

    #[test]
    fn integers_fall_back_on_garbage() {
        let env = Environment::from_pairs([("N", " 7 "), ("BAD", "three"), ("NEG", "-2")]);
        assert_eq!(env.resolve_int("N", &[], 3), 7);
        assert_eq!(env.resolve_int("BAD", &[], 3), 3);
        assert_eq!(env.resolve_int("BAD", &[], 5), 5);
        assert_eq!(env.resolve_int("NEG", &[], 5), -2);
        assert_eq!(env.resolve_int("UNSET", &[], 5), 5);
    }
}
