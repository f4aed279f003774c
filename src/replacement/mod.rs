//! Replacement catalog and type resolution.
//!
//! A replacement provider groups the functions that stand in for the methods of one
//! standard-library type. Providers are registered once into a [`ReplacementRegistry`], which the
//! rewriter queries with the [`RuntimeType`] a [`ClassResolver`] produced for a call's owner.
//!
//! # Key Components
//!
//! - [`ReplacementProvider`] / [`ReplacementCandidate`] - Catalog entries
//! - [`ReplacementRegistry`] - Immutable `(type, name, static) -> candidates` index
//! - [`ClassResolver`] / [`ClassHierarchy`] - Owner name to runtime type with ancestry
//! - [`catalog`] - The built-in providers
//!
//! # Examples
//!
//! ```rust
//! use classweave::replacement::{
//!     ClassHierarchy, ClassResolver, ReplacementCategory, ReplacementProvider,
//!     ReplacementRegistry,
//! };
//!
//! let registry = ReplacementRegistry::builder()
//!     .provider(
//!         ReplacementProvider::new("java/lang/String", "com/example/StringReplacement")
//!             .instance(
//!                 "equals",
//!                 "equals",
//!                 "(Ljava/lang/String;Ljava/lang/Object;Ljava/lang/String;)Z",
//!                 ReplacementCategory::Boolean,
//!             )?,
//!     )
//!     .build();
//!
//! let string = ClassHierarchy::standard().resolve("java/lang/String")?;
//! assert_eq!(registry.candidates(&string, "equals", false).len(), 1);
//! # Ok::<(), classweave::Error>(())
//! ```

pub mod catalog;
mod registry;
mod resolver;
mod types;

pub use registry::{ReplacementRegistry, ReplacementRegistryBuilder};
pub use resolver::{ClassHierarchy, ClassResolver, RuntimeType};
pub use types::{
    ReplacementCandidate, ReplacementCategory, ReplacementProvider, CORRELATION_ID_TYPE,
};
