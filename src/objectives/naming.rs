//! Deterministic coverage-objective identifiers.
//!
//! Identifiers are built from the position of a replaced call: the enclosing class, the source
//! line and the index of the call among the replaced calls of that line. The template is what the
//! rewritten code passes to the replacement as correlation id; the two outcome identifiers extend
//! it with the replacement category and the outcome.
//!
//! The line is zero-padded so identifiers of one class sort by line.

use crate::replacement::ReplacementCategory;

/// Prefix shared by every identifier of a replaced call.
pub const METHOD_REPLACEMENT: &str = "MethodReplacement";

/// Width the line number is padded to.
pub const LINE_PADDING: usize = 5;

/// Converts an internal class name (`com/foo/Bar`) to its dotted form (`com.foo.Bar`).
#[must_use]
pub fn dotted_class_name(internal_name: &str) -> String {
    internal_name.replace('/', ".")
}

/// Builds the identifier template for the `index`-th replaced call on `line` of `class_name`.
///
/// # Examples
///
/// ```rust
/// use classweave::objectives::naming::template;
///
/// assert_eq!(
///     template("com/foo/Bar", 10, 0),
///     "MethodReplacement_at_com.foo.Bar_00010_0"
/// );
/// ```
#[must_use]
pub fn template(class_name: &str, line: u32, index: u32) -> String {
    format!(
        "{METHOD_REPLACEMENT}_at_{}_{:0width$}_{}",
        dotted_class_name(class_name),
        line,
        index,
        width = LINE_PADDING
    )
}

/// Builds the identifier for one outcome of the call a template names.
///
/// # Examples
///
/// ```rust
/// use classweave::{objectives::naming::with_outcome, replacement::ReplacementCategory};
///
/// assert_eq!(
///     with_outcome("MethodReplacement_at_A_00001_0", true, ReplacementCategory::Boolean),
///     "MethodReplacement_at_A_00001_0_BOOLEAN_true"
/// );
/// ```
#[must_use]
pub fn with_outcome(template: &str, outcome: bool, category: ReplacementCategory) -> String {
    format!("{template}_{category}_{outcome}")
}
