//! JVM type and method descriptors (JVMS §4.3).
//!
//! Call sites and replacement candidates are compared on parsed descriptors, so two spellings of
//! the same shape can never disagree. [`matcher`] holds the applicability rule itself.

pub mod matcher;
mod types;

pub use matcher::DescriptorMatcher;
pub use types::{FieldType, MethodDescriptor, ReturnType};
