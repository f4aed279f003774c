//! Method-level instrumentation on raw `Code` attributes.
//!
//! [`Instrumenter`] is the entry point for a class-file pipeline: it takes the constant pool and
//! the `Code` attribute bodies of a class, runs the [`Rewriter`] over every method and hands back
//! new `Code` attribute bodies together with the extended constant pool.
//!
//! # Processing
//!
//! 1. The `Code` attribute is parsed and decoded into instruction events.
//! 2. The rewriter replaces eligible call sites.
//! 3. The events are encoded again; new strings and method references are added to the pool.
//! 4. Exception table, line numbers, local variables and stack map frames are relocated.
//!
//! A method without replaced calls keeps its original bytes. For a whole class, decoding and
//! rewriting run in parallel, while encoding works on a copy of the constant pool that replaces
//! the caller's pool only once every method succeeded.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use classweave::{
//!     classfile::ConstantPool,
//!     instrument::{Instrumenter, MethodAccessFlags, MethodSource},
//!     objectives::ObjectiveStore,
//!     replacement::{ClassHierarchy, ReplacementRegistry},
//!     InstrumentationConfig,
//! };
//!
//! let instrumenter = Instrumenter::new(
//!     Arc::new(ReplacementRegistry::standard()?),
//!     Arc::new(ClassHierarchy::standard()),
//!     Arc::new(ObjectiveStore::new()),
//!     InstrumentationConfig::default(),
//! );
//!
//! let mut pool = ConstantPool::new();
//! let method = MethodSource {
//!     class_name: "com/example/Service".to_string(),
//!     name: "run".to_string(),
//!     descriptor: "()V".to_string(),
//!     access: MethodAccessFlags::ABSTRACT,
//!     code: None,
//! };
//!
//! let result = instrumenter.instrument_method(&mut pool, &method)?;
//! assert_eq!(result.replaced, 0);
//! assert!(result.code.is_none());
//! # Ok::<(), classweave::Error>(())
//! ```

use std::sync::Arc;

use bitflags::bitflags;
use rayon::prelude::*;

use crate::{
    bytecode::{decode, encode},
    classfile::{CodeAttribute, ConstantPool},
    config::InstrumentationConfig,
    objectives::ObjectiveStore,
    replacement::{ClassResolver, ReplacementRegistry},
    rewriter::{MethodContext, RewrittenMethod, Rewriter},
    Result,
};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access flags (JVMS §4.6)
    pub struct MethodAccessFlags: u16 {
        /// Declared public
        const PUBLIC = 0x0001;
        /// Declared private
        const PRIVATE = 0x0002;
        /// Declared protected
        const PROTECTED = 0x0004;
        /// Declared static
        const STATIC = 0x0008;
        /// Declared final
        const FINAL = 0x0010;
        /// Declared synchronized
        const SYNCHRONIZED = 0x0020;
        /// Compiler-generated bridge method
        const BRIDGE = 0x0040;
        /// Declared with a variable number of arguments
        const VARARGS = 0x0080;
        /// Implemented outside the JVM
        const NATIVE = 0x0100;
        /// No implementation provided
        const ABSTRACT = 0x0400;
        /// Floating-point mode is FP-strict
        const STRICT = 0x0800;
        /// Not present in source code
        const SYNTHETIC = 0x1000;
    }
}

impl MethodAccessFlags {
    /// Returns `true` if a method with these flags cannot carry a `Code` attribute.
    #[must_use]
    pub fn is_bodyless(self) -> bool {
        self.intersects(MethodAccessFlags::ABSTRACT | MethodAccessFlags::NATIVE)
    }
}

/// One method of a class as handed over by the class-file pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSource {
    /// Internal name of the declaring class
    pub class_name: String,
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// Access flags
    pub access: MethodAccessFlags,
    /// Body of the `Code` attribute (without name index and length), if present
    pub code: Option<Vec<u8>>,
}

/// The instrumented form of a [`MethodSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentedMethod {
    /// Method name
    pub name: String,
    /// Method descriptor
    pub descriptor: String,
    /// New `Code` attribute body, identical to the input when nothing was replaced
    pub code: Option<Vec<u8>>,
    /// Number of replaced call sites
    pub replaced: usize,
}

impl InstrumentedMethod {
    fn unchanged(method: &MethodSource) -> Self {
        InstrumentedMethod {
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            code: method.code.clone(),
            replaced: 0,
        }
    }
}

/// A decoded and rewritten method waiting to be encoded
struct Prepared {
    attribute: CodeAttribute,
    rewritten: RewrittenMethod,
}

/// Instruments methods against a shared replacement catalog and objective store.
///
/// The registry and store are shared with other instrumenters through `Arc`, so several classes
/// can be processed at the same time.
pub struct Instrumenter {
    registry: Arc<ReplacementRegistry>,
    resolver: Arc<dyn ClassResolver>,
    store: Arc<ObjectiveStore>,
    config: InstrumentationConfig,
}

impl Instrumenter {
    /// Creates an instrumenter.
    #[must_use]
    pub fn new(
        registry: Arc<ReplacementRegistry>,
        resolver: Arc<dyn ClassResolver>,
        store: Arc<ObjectiveStore>,
        config: InstrumentationConfig,
    ) -> Self {
        Instrumenter {
            registry,
            resolver,
            store,
            config,
        }
    }

    /// The objective store receiving registrations.
    #[must_use]
    pub fn store(&self) -> &Arc<ObjectiveStore> {
        &self.store
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &InstrumentationConfig {
        &self.config
    }

    /// A rewriter sharing this instrumenter's catalog, resolver and store.
    #[must_use]
    pub fn rewriter(&self) -> Rewriter<'_> {
        Rewriter::new(
            &self.registry,
            self.resolver.as_ref(),
            &self.store,
            &self.config,
        )
    }

    /// Instruments a single method.
    ///
    /// Methods without code are returned as they are. `pool` is only modified if the method was
    /// rewritten and encoded successfully.
    ///
    /// # Errors
    /// Returns an error if the `Code` attribute is malformed, an owner cannot be resolved, or the
    /// rewritten method exceeds a class-file limit.
    pub fn instrument_method(
        &self,
        pool: &mut ConstantPool,
        method: &MethodSource,
    ) -> Result<InstrumentedMethod> {
        let Some(prepared) = self.prepare(pool, method)? else {
            return Ok(InstrumentedMethod::unchanged(method));
        };

        if prepared.rewritten.replaced == 0 {
            return Ok(InstrumentedMethod::unchanged(method));
        }

        let mut working = pool.clone();
        let instrumented = Self::finish(&mut working, method, prepared)?;
        *pool = working;

        Ok(instrumented)
    }

    /// Instruments all methods of one class.
    ///
    /// The results are in the order of `methods`. On error, `pool` is left untouched.
    ///
    /// # Errors
    /// Returns the first error of any method, see [`Instrumenter::instrument_method`].
    pub fn instrument_methods(
        &self,
        pool: &mut ConstantPool,
        methods: &[MethodSource],
    ) -> Result<Vec<InstrumentedMethod>> {
        let shared: &ConstantPool = pool;
        let prepared = if self.config.parallel {
            methods
                .par_iter()
                .map(|method| self.prepare(shared, method))
                .collect::<Result<Vec<_>>>()?
        } else {
            methods
                .iter()
                .map(|method| self.prepare(shared, method))
                .collect::<Result<Vec<_>>>()?
        };

        let mut working = pool.clone();
        let instrumented = methods
            .iter()
            .zip(prepared)
            .map(|(method, prepared)| match prepared {
                Some(prepared) if prepared.rewritten.replaced > 0 => {
                    Self::finish(&mut working, method, prepared)
                }
                _ => Ok(InstrumentedMethod::unchanged(method)),
            })
            .collect::<Result<Vec<_>>>()?;

        let replaced: usize = instrumented.iter().map(|method| method.replaced).sum();
        if replaced > 0 {
            log::debug!(
                "Replaced {} call sites in {} methods",
                replaced,
                instrumented.iter().filter(|method| method.replaced > 0).count()
            );
        }

        *pool = working;
        Ok(instrumented)
    }

    fn prepare(&self, pool: &ConstantPool, method: &MethodSource) -> Result<Option<Prepared>> {
        let Some(body) = method.code.as_deref() else {
            return Ok(None);
        };
        if method.access.is_bodyless() {
            return Err(malformed_error!(
                "Abstract or native method {}.{}{} has a Code attribute",
                method.class_name,
                method.name,
                method.descriptor
            ));
        }

        let attribute = CodeAttribute::parse(body, pool)?;
        let instructions = decode(&attribute, pool)?;

        let context = MethodContext {
            class_name: &method.class_name,
            method_name: &method.name,
            descriptor: &method.descriptor,
            max_stack: attribute.max_stack,
        };
        let rewritten = self.rewriter().rewrite(&context, instructions)?;

        Ok(Some(Prepared {
            attribute,
            rewritten,
        }))
    }

    fn finish(
        pool: &mut ConstantPool,
        method: &MethodSource,
        prepared: Prepared,
    ) -> Result<InstrumentedMethod> {
        let Prepared {
            mut attribute,
            rewritten,
        } = prepared;

        let encoded = encode(&rewritten.instructions, pool)?;
        attribute.relocate(encoded.code, &encoded.offsets)?;
        attribute.max_stack = rewritten.max_stack;

        Ok(InstrumentedMethod {
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            code: Some(attribute.to_bytes()?),
            replaced: rewritten.replaced,
        })
    }
}
