//! Call-site replacement over a method's instruction stream.
//!
//! [`Rewriter::rewrite`] folds over the instruction events of one method body. Line-number events
//! move the [`VisitState`]; every call instruction is either passed through or replaced by a
//! static call to a catalogued replacement function, preceded by the correlation id operand.
//!
//! # Call-site decision
//!
//! The checks run in this order, the first that applies wins:
//!
//! 1. Calls inside `<clinit>` are kept.
//! 2. Calls into owners outside the configured runtime-library prefixes are kept.
//! 3. `invokespecial` calls are kept. A replacement invoked for `super.foo()` would dispatch
//!    virtually on the receiver and recurse into the subclass override.
//! 4. The owner is resolved; failure aborts the method with [`crate::Error::ClassNotFound`].
//! 5. Without candidates for the owner's type (or its ancestors) the call is kept.
//! 6. The first candidate accepted by the [`DescriptorMatcher`] replaces the call.
//!
//! # Rewritten call
//!
//! The receiver and arguments already on the operand stack stay untouched:
//!
//! ```text
//! aload_1                          aload_1
//! aload_2                          aload_2
//! invokevirtual String.equals  ->  ldc "MethodReplacement_at_..._00010_0"
//!                                  invokestatic StringClassReplacement.equals
//! ```
//!
//! With objective registration disabled `aconst_null` takes the place of the `ldc`.

mod stack;
mod state;

pub use stack::{adjust_max_stack, EXTRA_STACK_SLOTS};
pub use state::VisitState;

use crate::{
    bytecode::{opcodes, Instruction, InvokeKind, MethodInsn},
    config::InstrumentationConfig,
    descriptor::{DescriptorMatcher, MethodDescriptor},
    objectives::{naming, ObjectiveStore},
    replacement::{ClassResolver, ReplacementCandidate, ReplacementRegistry},
    Result,
};

/// Name of the static initializer, which is never rewritten
pub const CLASS_INIT_METHOD: &str = "<clinit>";

/// The method whose body is rewritten.
#[derive(Debug, Clone, Copy)]
pub struct MethodContext<'a> {
    /// Internal name of the enclosing class
    pub class_name: &'a str,
    /// Method name
    pub method_name: &'a str,
    /// Method descriptor
    pub descriptor: &'a str,
    /// Declared `max_stack` of the original body
    pub max_stack: u16,
}

/// Result of rewriting one method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenMethod {
    /// The rewritten instruction stream
    pub instructions: Vec<Instruction>,
    /// `max_stack` for the rewritten body
    pub max_stack: u16,
    /// Number of replaced call sites
    pub replaced: usize,
}

/// Fold accumulator
struct Accumulator {
    state: VisitState,
    output: Vec<Instruction>,
    replaced: usize,
}

/// Rewrites call sites against shared replacement catalog, class resolver and objective store.
///
/// A `Rewriter` only holds shared references; all per-method state lives in the fold, so one
/// rewriter can process many methods concurrently.
pub struct Rewriter<'a> {
    registry: &'a ReplacementRegistry,
    resolver: &'a dyn ClassResolver,
    store: &'a ObjectiveStore,
    config: &'a InstrumentationConfig,
}

impl<'a> Rewriter<'a> {
    /// Creates a rewriter.
    #[must_use]
    pub fn new(
        registry: &'a ReplacementRegistry,
        resolver: &'a dyn ClassResolver,
        store: &'a ObjectiveStore,
        config: &'a InstrumentationConfig,
    ) -> Self {
        Rewriter {
            registry,
            resolver,
            store,
            config,
        }
    }

    /// Rewrites the instruction stream of `method`.
    ///
    /// The returned `max_stack` is always one slot larger than the original, see
    /// [`adjust_max_stack`].
    ///
    /// # Errors
    /// Returns [`crate::Error::ClassNotFound`] if the owner of an eligible call cannot be
    /// resolved, [`crate::Error::InvalidDescriptor`] for an unparsable call descriptor and
    /// [`crate::Error::StackOverflow`] if `max_stack` cannot grow.
    pub fn rewrite(
        &self,
        method: &MethodContext<'_>,
        instructions: Vec<Instruction>,
    ) -> Result<RewrittenMethod> {
        let initial = Accumulator {
            state: VisitState::default(),
            output: Vec::with_capacity(instructions.len()),
            replaced: 0,
        };

        let result = instructions
            .into_iter()
            .try_fold(initial, |accumulator, instruction| {
                self.visit(method, accumulator, instruction)
            })?;

        Ok(RewrittenMethod {
            instructions: result.output,
            max_stack: adjust_max_stack(method.max_stack)?,
            replaced: result.replaced,
        })
    }

    fn visit(
        &self,
        method: &MethodContext<'_>,
        mut accumulator: Accumulator,
        instruction: Instruction,
    ) -> Result<Accumulator> {
        match instruction {
            Instruction::LineNumber { line, start } => {
                accumulator.state = accumulator.state.at_line(u32::from(line));
                accumulator
                    .output
                    .push(Instruction::LineNumber { line, start });
            }
            Instruction::Method(call) => match self.replacement_for(method, &call)? {
                Some(candidate) => self.replace(method, &mut accumulator, &call, candidate),
                None => accumulator.output.push(Instruction::Method(call)),
            },
            other => accumulator.output.push(other),
        }

        Ok(accumulator)
    }

    /// Selects the replacement for `call` inside `method`, if any.
    ///
    /// # Errors
    /// Returns [`crate::Error::ClassNotFound`] if the call is eligible but its owner cannot be
    /// resolved, or [`crate::Error::InvalidDescriptor`] if its descriptor does not parse.
    pub fn replacement_for(
        &self,
        method: &MethodContext<'_>,
        call: &MethodInsn,
    ) -> Result<Option<&'a ReplacementCandidate>> {
        if method.method_name == CLASS_INIT_METHOD {
            return Ok(None);
        }

        if !self.config.is_replaceable_owner(&call.owner) {
            return Ok(None);
        }

        if call.kind == InvokeKind::Special {
            log::trace!(
                "Keeping invokespecial {}.{}{} in {}.{}",
                call.owner,
                call.name,
                call.descriptor,
                method.class_name,
                method.method_name
            );
            return Ok(None);
        }

        let runtime_type = match self.resolver.resolve(&call.owner) {
            Ok(runtime_type) => runtime_type,
            Err(error) => {
                log::error!(
                    "Cannot resolve {} called from {}.{}{}: {}",
                    call.owner,
                    method.class_name,
                    method.method_name,
                    method.descriptor,
                    error
                );
                return Err(error);
            }
        };

        let call_is_static = call.kind.is_static();
        let registry: &'a ReplacementRegistry = self.registry;
        let candidates = registry.candidates(&runtime_type, &call.name, call_is_static);
        if candidates.is_empty() {
            return Ok(None);
        }

        let descriptor = MethodDescriptor::parse(&call.descriptor)?;
        let selected = candidates
            .into_iter()
            .find(|candidate| DescriptorMatcher::matches(&descriptor, candidate, call_is_static));

        if selected.is_none() {
            log::trace!(
                "No replacement matches {}.{}{}",
                call.owner,
                call.name,
                call.descriptor
            );
        }

        Ok(selected)
    }

    fn replace(
        &self,
        method: &MethodContext<'_>,
        accumulator: &mut Accumulator,
        call: &MethodInsn,
        candidate: &ReplacementCandidate,
    ) {
        let correlation_id = if self.config.register_new_targets {
            let (index, state) = accumulator.state.claim_index();
            accumulator.state = state;

            let template = naming::template(method.class_name, state.current_line, index);
            for outcome in [true, false] {
                self.store
                    .register(&naming::with_outcome(&template, outcome, candidate.category));
            }
            log::debug!(
                "Registered {} objectives for {}",
                candidate.category,
                template
            );

            Instruction::LoadString(template)
        } else {
            Instruction::Simple(opcodes::ACONST_NULL)
        };

        log::debug!(
            "Replacing {} {}.{}{} in {}.{} (line {}) with {}.{}",
            call.kind,
            call.owner,
            call.name,
            call.descriptor,
            method.class_name,
            method.method_name,
            accumulator.state.current_line,
            candidate.declaring_class,
            candidate.name
        );

        accumulator.output.push(correlation_id);
        accumulator
            .output
            .push(Instruction::Method(MethodInsn::new(
                InvokeKind::Static,
                &candidate.declaring_class,
                &candidate.name,
                &candidate.descriptor.to_string(),
            )));
        accumulator.replaced += 1;
    }
}
