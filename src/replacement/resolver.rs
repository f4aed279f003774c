//! Resolution of internal type names into runtime types with their ancestry.
//!
//! The registry applies a provider to its target type and to every subtype, so a call on
//! `java/util/ArrayList` finds `java/util/Collection` replacements. [`ClassResolver`] is the seam
//! where a host supplies that knowledge, usually from its class loading context. [`ClassHierarchy`]
//! is an in-memory implementation.
//!
//! A hand-written hierarchy never covers a whole runtime library. [`ClassHierarchy::standard`]
//! therefore treats undeclared types under `java/` as direct subclasses of `java/lang/Object`,
//! which is enough for the registry to conclude that no replacement applies to them.

use std::collections::{HashMap, HashSet};

use crate::{Error::ClassNotFound, Result};

const OBJECT_TYPE: &str = "java/lang/Object";

/// A resolved type and everything it is assignable to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeType {
    /// Internal name of the type
    pub name: String,
    /// Every superclass and every directly or indirectly implemented interface, nearest first
    pub ancestors: Vec<String>,
}

impl RuntimeType {
    /// Creates a runtime type.
    #[must_use]
    pub fn new(name: &str, ancestors: Vec<String>) -> Self {
        RuntimeType {
            name: name.to_string(),
            ancestors,
        }
    }

    /// The type itself followed by its ancestors.
    pub fn lineage(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.ancestors.iter().map(String::as_str))
    }

    /// Returns `true` if a value of this type can be assigned to `ty`.
    #[must_use]
    pub fn is_assignable_to(&self, ty: &str) -> bool {
        self.lineage().any(|name| name == ty)
    }
}

/// Resolves internal type names (`java/lang/String`) to [`RuntimeType`]s.
///
/// Implementations must be safe to share across the threads that rewrite method bodies.
pub trait ClassResolver: Send + Sync {
    /// Resolves `internal_name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::ClassNotFound`] if the type is unknown.
    fn resolve(&self, internal_name: &str) -> Result<RuntimeType>;
}

/// Declared supertypes of one class or interface
#[derive(Debug, Clone, Default)]
struct Declaration {
    super_name: Option<String>,
    interfaces: Vec<String>,
}

/// An in-memory class hierarchy.
///
/// Resolution is strict by default: an undeclared type is [`crate::Error::ClassNotFound`].
/// [`ClassHierarchy::assume_object_under`] relaxes this for whole namespaces.
///
/// # Examples
///
/// ```rust
/// use classweave::replacement::{ClassHierarchy, ClassResolver};
///
/// let hierarchy = ClassHierarchy::standard();
/// let list = hierarchy.resolve("java/util/ArrayList")?;
/// assert!(list.is_assignable_to("java/util/Collection"));
/// assert!(list.is_assignable_to("java/lang/Object"));
/// assert!(hierarchy.resolve("com/example/Missing").is_err());
///
/// let iterator = hierarchy.resolve("java/util/Iterator")?;
/// assert_eq!(iterator.ancestors, ["java/lang/Object"]);
/// # Ok::<(), classweave::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct ClassHierarchy {
    declarations: HashMap<String, Declaration>,
    /// Namespaces whose undeclared types resolve as plain `java/lang/Object` subclasses
    assumed_prefixes: Vec<String>,
}

impl ClassHierarchy {
    /// Creates an empty hierarchy.
    #[must_use]
    pub fn new() -> Self {
        ClassHierarchy::default()
    }

    /// Declares a type with its direct superclass and directly implemented interfaces.
    ///
    /// Interfaces are declared with `super_name` set to `None`.
    #[must_use]
    pub fn declare(mut self, name: &str, super_name: Option<&str>, interfaces: &[&str]) -> Self {
        self.declarations.insert(
            name.to_string(),
            Declaration {
                super_name: super_name.map(str::to_string),
                interfaces: interfaces.iter().map(|i| (*i).to_string()).collect(),
            },
        );
        self
    }

    /// Resolves undeclared types whose internal name starts with `prefix` as direct subclasses
    /// of `java/lang/Object` instead of failing.
    #[must_use]
    pub fn assume_object_under(mut self, prefix: &str) -> Self {
        self.assumed_prefixes.push(prefix.to_string());
        self
    }

    fn assumes_object(&self, internal_name: &str) -> bool {
        internal_name != OBJECT_TYPE
            && self
                .assumed_prefixes
                .iter()
                .any(|prefix| internal_name.starts_with(prefix.as_str()))
    }

    /// Number of declared types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.declarations.len()
    }

    /// Returns `true` if no type is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.declarations.is_empty()
    }

    /// The common standard-library types targeted by the built-in replacements.
    ///
    /// Any other type under `java/` resolves with `java/lang/Object` as its only ancestor.
    #[must_use]
    pub fn standard() -> Self {
        const OBJECT: Option<&str> = Some("java/lang/Object");

        ClassHierarchy::new()
            .assume_object_under("java/")
            .declare("java/lang/Object", None, &[])
            .declare("java/io/Serializable", None, &[])
            .declare("java/lang/Comparable", None, &[])
            .declare("java/lang/CharSequence", None, &[])
            .declare("java/lang/Iterable", None, &[])
            .declare("java/lang/Cloneable", None, &[])
            .declare(
                "java/lang/String",
                OBJECT,
                &["java/io/Serializable", "java/lang/Comparable", "java/lang/CharSequence"],
            )
            .declare("java/lang/StringBuilder", OBJECT, &["java/lang/CharSequence"])
            .declare("java/lang/Number", OBJECT, &["java/io/Serializable"])
            .declare("java/lang/Integer", Some("java/lang/Number"), &["java/lang/Comparable"])
            .declare("java/lang/Long", Some("java/lang/Number"), &["java/lang/Comparable"])
            .declare("java/lang/Double", Some("java/lang/Number"), &["java/lang/Comparable"])
            .declare("java/lang/Float", Some("java/lang/Number"), &["java/lang/Comparable"])
            .declare("java/lang/Short", Some("java/lang/Number"), &["java/lang/Comparable"])
            .declare("java/lang/Byte", Some("java/lang/Number"), &["java/lang/Comparable"])
            .declare(
                "java/lang/Boolean",
                OBJECT,
                &["java/io/Serializable", "java/lang/Comparable"],
            )
            .declare(
                "java/lang/Character",
                OBJECT,
                &["java/io/Serializable", "java/lang/Comparable"],
            )
            .declare("java/lang/Math", OBJECT, &[])
            .declare("java/lang/System", OBJECT, &[])
            .declare("java/util/Objects", OBJECT, &[])
            .declare("java/util/Collection", None, &["java/lang/Iterable"])
            .declare("java/util/List", None, &["java/util/Collection"])
            .declare("java/util/Set", None, &["java/util/Collection"])
            .declare("java/util/Map", None, &[])
            .declare("java/util/AbstractCollection", OBJECT, &["java/util/Collection"])
            .declare(
                "java/util/AbstractList",
                Some("java/util/AbstractCollection"),
                &["java/util/List"],
            )
            .declare(
                "java/util/ArrayList",
                Some("java/util/AbstractList"),
                &["java/util/List", "java/lang/Cloneable", "java/io/Serializable"],
            )
            .declare(
                "java/util/LinkedList",
                Some("java/util/AbstractList"),
                &["java/util/List", "java/lang/Cloneable", "java/io/Serializable"],
            )
            .declare(
                "java/util/AbstractSet",
                Some("java/util/AbstractCollection"),
                &["java/util/Set"],
            )
            .declare(
                "java/util/HashSet",
                Some("java/util/AbstractSet"),
                &["java/util/Set", "java/lang/Cloneable", "java/io/Serializable"],
            )
            .declare(
                "java/util/TreeSet",
                Some("java/util/AbstractSet"),
                &["java/lang/Cloneable", "java/io/Serializable"],
            )
            .declare("java/util/AbstractMap", OBJECT, &["java/util/Map"])
            .declare(
                "java/util/HashMap",
                Some("java/util/AbstractMap"),
                &["java/util/Map", "java/lang/Cloneable", "java/io/Serializable"],
            )
            .declare(
                "java/util/LinkedHashMap",
                Some("java/util/HashMap"),
                &["java/util/Map"],
            )
            .declare(
                "java/util/TreeMap",
                Some("java/util/AbstractMap"),
                &["java/lang/Cloneable", "java/io/Serializable"],
            )
            .declare("java/util/regex/Pattern", OBJECT, &["java/io/Serializable"])
            .declare("java/util/regex/MatchResult", None, &[])
            .declare("java/util/regex/Matcher", OBJECT, &["java/util/regex/MatchResult"])
            .declare(
                "java/time/LocalDate",
                OBJECT,
                &["java/io/Serializable", "java/lang/Comparable"],
            )
            .declare(
                "java/time/LocalDateTime",
                OBJECT,
                &["java/io/Serializable", "java/lang/Comparable"],
            )
    }
}

impl ClassResolver for ClassHierarchy {
    fn resolve(&self, internal_name: &str) -> Result<RuntimeType> {
        let Some(declaration) = self.declarations.get(internal_name) else {
            if self.assumes_object(internal_name) {
                log::trace!("{internal_name} is not declared, assuming it extends {OBJECT_TYPE}");
                return Ok(RuntimeType::new(internal_name, vec![OBJECT_TYPE.to_string()]));
            }

            return Err(ClassNotFound {
                owner: internal_name.to_string(),
            });
        };

        // Breadth-first over supertypes; unknown ancestors are kept by name but not expanded
        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([internal_name.to_string()]);
        let mut queue: std::collections::VecDeque<&str> = declaration
            .super_name
            .iter()
            .chain(&declaration.interfaces)
            .map(String::as_str)
            .collect();

        while let Some(name) = queue.pop_front() {
            if !seen.insert(name.to_string()) {
                continue;
            }
            ancestors.push(name.to_string());

            if let Some(parent) = self.declarations.get(name) {
                queue.extend(
                    parent
                        .super_name
                        .iter()
                        .chain(&parent.interfaces)
                        .map(String::as_str),
                );
            }
        }

        Ok(RuntimeType::new(internal_name, ancestors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestors_are_transitive() {
        let hierarchy = ClassHierarchy::standard();
        let map = hierarchy.resolve("java/util/LinkedHashMap").unwrap();

        assert_eq!(map.ancestors[0], "java/util/HashMap");
        assert!(map.is_assignable_to("java/util/AbstractMap"));
        assert!(map.is_assignable_to("java/util/Map"));
        assert!(map.is_assignable_to("java/lang/Object"));
        assert!(!map.is_assignable_to("java/util/Collection"));
    }

    #[test]
    fn diamonds_are_listed_once() {
        let hierarchy = ClassHierarchy::standard();
        let list = hierarchy.resolve("java/util/ArrayList").unwrap();

        let collections = list
            .ancestors
            .iter()
            .filter(|name| *name == "java/util/Collection")
            .count();
        assert_eq!(collections, 1);
        assert_eq!(list.lineage().next(), Some("java/util/ArrayList"));
    }

    #[test]
    fn cycles_terminate() {
        let hierarchy = ClassHierarchy::new()
            .declare("a/A", Some("a/B"), &[])
            .declare("a/B", Some("a/A"), &[]);

        let resolved = hierarchy.resolve("a/A").unwrap();
        assert_eq!(resolved.ancestors, ["a/B"]);
    }

    #[test]
    fn undeclared_runtime_types_extend_object() {
        let hierarchy = ClassHierarchy::standard();

        let stream = hierarchy.resolve("java/io/PrintStream").unwrap();
        assert_eq!(stream.name, "java/io/PrintStream");
        assert_eq!(stream.ancestors, ["java/lang/Object"]);
        assert!(!stream.is_assignable_to("java/util/Collection"));

        // declared types keep their full ancestry
        let list = hierarchy.resolve("java/util/ArrayList").unwrap();
        assert!(list.is_assignable_to("java/util/Collection"));

        assert!(matches!(
            hierarchy.resolve("com/example/Missing"),
            Err(ClassNotFound { owner }) if owner == "com/example/Missing"
        ));
    }

    #[test]
    fn assumed_prefix_is_opt_in() {
        let strict = ClassHierarchy::new().declare("java/lang/Object", None, &[]);
        assert!(strict.resolve("java/util/Iterator").is_err());

        let relaxed = strict.assume_object_under("javax/");
        let resolved = relaxed.resolve("javax/sql/DataSource").unwrap();
        assert_eq!(resolved.ancestors, ["java/lang/Object"]);
        assert!(relaxed.resolve("java/util/Iterator").is_err());
    }

    #[test]
    fn unknown_type_is_class_not_found() {
        let hierarchy = ClassHierarchy::new();
        assert!(hierarchy.is_empty());
        assert!(matches!(
            hierarchy.resolve("java/lang/String"),
            Err(ClassNotFound { owner }) if owner == "java/lang/String"
        ));
    }
}
