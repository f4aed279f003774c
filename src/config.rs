//! Instrumentation configuration
//!
//! Controls which call sites are eligible for replacement, whether replaced calls create
//! coverage objectives, and how many threads rewrite method bodies.

/// Configuration for rewriting call sites into replacement calls
///
/// # Examples
///
/// ```rust
/// use classweave::InstrumentationConfig;
///
/// let config = InstrumentationConfig::without_registration();
/// assert!(!config.register_new_targets);
/// assert!(config.is_replaceable_owner("java/lang/String"));
/// assert!(!config.is_replaceable_owner("com/example/Service"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentationConfig {
    /// Register a true and a false objective per replaced call and pass the objective template
    /// to the replacement. When disabled, the replacement receives `null` as correlation id.
    pub register_new_targets: bool,

    /// Owner name prefixes (internal form) of the standard runtime library
    /// Calls into any other owner are never replaced
    pub replaceable_prefixes: Vec<String>,

    /// Decode and rewrite the methods of a class on the rayon thread pool
    pub parallel: bool,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            register_new_targets: true,
            replaceable_prefixes: vec!["java/".to_string()],
            parallel: true,
        }
    }
}

impl InstrumentationConfig {
    /// Creates a configuration that replaces calls without creating objectives
    ///
    /// Used when classes are instrumented again after the objectives were collected, e.g. when a
    /// class loader defines an already analysed class a second time.
    #[must_use]
    pub fn without_registration() -> Self {
        Self {
            register_new_targets: false,
            ..Self::default()
        }
    }

    /// Creates a configuration that rewrites all methods on the calling thread
    #[must_use]
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Self::default()
        }
    }

    /// Returns `true` if calls into `owner` may be replaced
    #[must_use]
    pub fn is_replaceable_owner(&self, owner: &str) -> bool {
        self.replaceable_prefixes
            .iter()
            .any(|prefix| owner.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets() {
        let config = InstrumentationConfig::default();
        assert!(config.register_new_targets);
        assert!(config.parallel);

        assert!(!InstrumentationConfig::without_registration().register_new_targets);
        assert!(InstrumentationConfig::without_registration().parallel);

        let sequential = InstrumentationConfig::sequential();
        assert!(!sequential.parallel);
        assert!(sequential.register_new_targets);
    }

    #[test]
    fn owner_prefixes() {
        let mut config = InstrumentationConfig::default();
        assert!(config.is_replaceable_owner("java/util/ArrayList"));
        assert!(!config.is_replaceable_owner("javax/servlet/Servlet"));
        assert!(!config.is_replaceable_owner("kotlin/text/StringsKt"));

        config.replaceable_prefixes.push("kotlin/".to_string());
        assert!(config.is_replaceable_owner("kotlin/text/StringsKt"));

        config.replaceable_prefixes.clear();
        assert!(!config.is_replaceable_owner("java/lang/String"));
    }
}
