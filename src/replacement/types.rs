use strum::{Display, EnumCount, EnumIter};

use crate::{
    descriptor::{FieldType, MethodDescriptor},
    Result,
};

/// Internal name of the correlation-id parameter type every replacement declares last.
pub const CORRELATION_ID_TYPE: &str = "java/lang/String";

/// The kind of coverage objectives a replacement reports.
///
/// The category becomes part of every outcome identifier, which keeps objectives of different
/// replacements for the same call position apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumCount)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ReplacementCategory {
    /// A boolean result, e.g. `String.equals`
    Boolean,
    /// Whether the original call throws, e.g. `Integer.parseInt`
    Exception,
    /// Observes values without an outcome of its own
    Tracker,
}

/// A catalogued function standing in for a standard-library method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementCandidate {
    /// Internal name of the class declaring the replacement function
    pub declaring_class: String,
    /// Name of the replacement function itself
    pub name: String,
    /// Name of the original method this function replaces
    pub original_name: String,
    /// `true` if the original method is static, `false` if it is an instance method
    pub replacing_static: bool,
    /// Full descriptor of the replacement function, including receiver and correlation id
    pub descriptor: MethodDescriptor,
    /// Coverage objective category reported by the function
    pub category: ReplacementCategory,
}

impl ReplacementCandidate {
    /// Creates a candidate and checks that the descriptor can carry the calling convention.
    ///
    /// The replacement descriptor must end with a `String` correlation id, and a replacement for
    /// an instance method additionally takes the receiver as its first parameter.
    ///
    /// # Errors
    /// Returns [`crate::Error::InvalidDescriptor`] if `descriptor` does not parse, or
    /// [`crate::Error::Malformed`] if it lacks the receiver or correlation-id parameter.
    pub fn new(
        declaring_class: &str,
        name: &str,
        original_name: &str,
        replacing_static: bool,
        descriptor: &str,
        category: ReplacementCategory,
    ) -> Result<Self> {
        let parsed = MethodDescriptor::parse(descriptor)?;

        let required = if replacing_static { 1 } else { 2 };
        if parsed.parameters.len() < required {
            return Err(malformed_error!(
                "Replacement {}.{}{} needs at least {} parameters",
                declaring_class,
                name,
                descriptor,
                required
            ));
        }

        if parsed.parameters.last() != Some(&FieldType::Object(CORRELATION_ID_TYPE.to_string())) {
            return Err(malformed_error!(
                "Replacement {}.{}{} must take the correlation id as last parameter",
                declaring_class,
                name,
                descriptor
            ));
        }

        Ok(ReplacementCandidate {
            declaring_class: declaring_class.to_string(),
            name: name.to_string(),
            original_name: original_name.to_string(),
            replacing_static,
            descriptor: parsed,
            category,
        })
    }
}

/// A group of replacement functions for one standard-library type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementProvider {
    /// Internal name of the replaced type; the provider also applies to its subtypes
    pub target_type: String,
    /// Internal name of the class declaring the functions
    pub declaring_class: String,
    /// Functions in declaration order
    pub functions: Vec<ReplacementCandidate>,
}

impl ReplacementProvider {
    /// Creates an empty provider.
    #[must_use]
    pub fn new(target_type: &str, declaring_class: &str) -> Self {
        ReplacementProvider {
            target_type: target_type.to_string(),
            declaring_class: declaring_class.to_string(),
            functions: Vec::new(),
        }
    }

    /// Adds a replacement for an instance method. `descriptor` starts with the receiver.
    ///
    /// # Errors
    /// See [`ReplacementCandidate::new`].
    pub fn instance(
        mut self,
        name: &str,
        original_name: &str,
        descriptor: &str,
        category: ReplacementCategory,
    ) -> Result<Self> {
        let candidate = ReplacementCandidate::new(
            &self.declaring_class,
            name,
            original_name,
            false,
            descriptor,
            category,
        )?;
        self.functions.push(candidate);
        Ok(self)
    }

    /// Adds a replacement for a static method.
    ///
    /// # Errors
    /// See [`ReplacementCandidate::new`].
    pub fn static_method(
        mut self,
        name: &str,
        original_name: &str,
        descriptor: &str,
        category: ReplacementCategory,
    ) -> Result<Self> {
        let candidate = ReplacementCandidate::new(
            &self.declaring_class,
            name,
            original_name,
            true,
            descriptor,
            category,
        )?;
        self.functions.push(candidate);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn category_names_are_uppercase() {
        let names: Vec<String> = ReplacementCategory::iter().map(|c| c.to_string()).collect();
        assert_eq!(names, ["BOOLEAN", "EXCEPTION", "TRACKER"]);
        assert_eq!(ReplacementCategory::COUNT, 3);
    }

    #[test]
    fn instance_replacement_needs_receiver_and_id() {
        let provider = ReplacementProvider::new("java/lang/String", "test/StringReplacement")
            .instance(
                "equals",
                "equals",
                "(Ljava/lang/String;Ljava/lang/Object;Ljava/lang/String;)Z",
                ReplacementCategory::Boolean,
            )
            .unwrap();
        assert_eq!(provider.functions.len(), 1);
        assert_eq!(provider.functions[0].declaring_class, "test/StringReplacement");
        assert!(!provider.functions[0].replacing_static);

        let missing_receiver = ReplacementProvider::new("java/lang/String", "test/S").instance(
            "isEmpty",
            "isEmpty",
            "(Ljava/lang/String;)Z",
            ReplacementCategory::Boolean,
        );
        assert!(missing_receiver.is_err());
    }

    #[test]
    fn correlation_id_must_be_last() {
        let result = ReplacementCandidate::new(
            "test/IntegerReplacement",
            "parseInt",
            "parseInt",
            true,
            "(Ljava/lang/String;I)I",
            ReplacementCategory::Exception,
        );
        assert!(matches!(result, Err(crate::Error::Malformed { .. })));

        let result = ReplacementCandidate::new(
            "test/IntegerReplacement",
            "parseInt",
            "parseInt",
            true,
            "(Ljava/lang/String;",
            ReplacementCategory::Exception,
        );
        assert!(matches!(result, Err(crate::Error::InvalidDescriptor(_))));
    }
}
