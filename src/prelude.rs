//! # classweave Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the classweave library.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all classweave operations
pub use crate::Error;

/// The result type used throughout classweave
pub use crate::Result;

/// Configuration for call-site instrumentation
pub use crate::InstrumentationConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Method-level instrumentation of raw `Code` attributes
pub use crate::instrument::{InstrumentedMethod, Instrumenter, MethodAccessFlags, MethodSource};

/// The call-site rewriter
pub use crate::rewriter::{MethodContext, RewrittenMethod, Rewriter};

// ================================================================================================
// Replacement Catalog
// ================================================================================================

/// Providers, candidates and their registry
pub use crate::replacement::{
    ReplacementCandidate, ReplacementCategory, ReplacementProvider, ReplacementRegistry,
    ReplacementRegistryBuilder,
};

/// Runtime type resolution
pub use crate::replacement::{ClassHierarchy, ClassResolver, RuntimeType};

/// Descriptor grammar and matching
pub use crate::descriptor::{DescriptorMatcher, FieldType, MethodDescriptor, ReturnType};

// ================================================================================================
// Coverage Objectives
// ================================================================================================

/// Objective store and naming
pub use crate::objectives::{naming, ObjectiveStore};

// ================================================================================================
// Bytecode
// ================================================================================================

/// Instruction events
pub use crate::bytecode::{decode, encode, opcodes, Instruction, InvokeKind, Label, MethodInsn};

/// Class-file structures
pub use crate::classfile::{CodeAttribute, ConstantPool};
