//! Applicability check between a call site and a replacement candidate.
//!
//! A replacement function spells out the complete calling convention of the call it replaces:
//! for an instance method the receiver becomes an explicit first parameter, and every replacement
//! takes a trailing correlation id. Removing those parameters from the candidate descriptor must
//! leave exactly the descriptor of the original call.
//!
//! | Original call                  | Candidate                                   |
//! |--------------------------------|---------------------------------------------|
//! | `invokestatic (A, B) R`        | static, `(A, B, Id) R`                      |
//! | `invokevirtual Recv.(A, B) R`  | instance, `(Recv, A, B, Id) R`              |

use crate::{descriptor::MethodDescriptor, replacement::ReplacementCandidate};

/// Returns `descriptor` without its first `skip_first` parameters and without its last one.
///
/// Returns `None` if the descriptor has fewer than `skip_first + 1` parameters.
///
/// # Examples
///
/// ```rust
/// use classweave::descriptor::{matcher::descriptor_skipping_last, MethodDescriptor};
///
/// let candidate = MethodDescriptor::parse("(Ljava/lang/String;ILjava/lang/String;)Z")?;
/// let stripped = descriptor_skipping_last(&candidate, 1).unwrap();
/// assert_eq!(stripped.to_string(), "(I)Z");
/// # Ok::<(), classweave::Error>(())
/// ```
#[must_use]
pub fn descriptor_skipping_last(
    descriptor: &MethodDescriptor,
    skip_first: usize,
) -> Option<MethodDescriptor> {
    let end = descriptor.parameters.len().checked_sub(1)?;
    let parameters = descriptor.parameters.get(skip_first..end)?;

    Some(MethodDescriptor::new(
        parameters.to_vec(),
        descriptor.return_type.clone(),
    ))
}

/// Decides whether a replacement candidate can stand in for a call.
pub struct DescriptorMatcher;

impl DescriptorMatcher {
    /// Returns `true` if `candidate` replaces a call with descriptor `call`.
    ///
    /// The candidate's static or instance intent must agree with `call_is_static`. The return
    /// type has to be identical, and the parameters left after stripping the receiver (instance
    /// calls only) and the correlation id must equal the call's parameters in order.
    #[must_use]
    pub fn matches(
        call: &MethodDescriptor,
        candidate: &ReplacementCandidate,
        call_is_static: bool,
    ) -> bool {
        if candidate.replacing_static != call_is_static {
            return false;
        }

        let skip_first = usize::from(!call_is_static);
        let Some(expected) = descriptor_skipping_last(&candidate.descriptor, skip_first) else {
            return false;
        };

        expected == *call
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replacement::ReplacementCategory;

    fn candidate(replacing_static: bool, descriptor: &str) -> ReplacementCandidate {
        ReplacementCandidate::new(
            "test/Replacement",
            "call",
            "call",
            replacing_static,
            descriptor,
            ReplacementCategory::Boolean,
        )
        .unwrap()
    }

    fn desc(descriptor: &str) -> MethodDescriptor {
        MethodDescriptor::parse(descriptor).unwrap()
    }

    #[test]
    fn instance_call_strips_receiver_and_id() {
        let candidate = candidate(false, "(Ljava/util/Map;Ljava/lang/Object;ILjava/lang/String;)Z");
        assert!(DescriptorMatcher::matches(
            &desc("(Ljava/lang/Object;I)Z"),
            &candidate,
            false
        ));
    }

    #[test]
    fn static_call_strips_only_id() {
        let candidate = candidate(true, "(Ljava/lang/String;Ljava/lang/String;)I");
        assert!(DescriptorMatcher::matches(
            &desc("(Ljava/lang/String;)I"),
            &candidate,
            true
        ));
        assert!(!DescriptorMatcher::matches(&desc("()I"), &candidate, true));
    }

    #[test]
    fn intent_must_agree_with_call_kind() {
        let static_candidate = candidate(
            true,
            "(Ljava/lang/String;Ljava/lang/Object;Ljava/lang/String;)Z",
        );
        let call = desc("(Ljava/lang/Object;)Z");
        assert!(!DescriptorMatcher::matches(&call, &static_candidate, false));

        let instance_candidate = candidate(
            false,
            "(Ljava/lang/String;Ljava/lang/Object;Ljava/lang/String;)Z",
        );
        assert!(DescriptorMatcher::matches(&call, &instance_candidate, false));
        assert!(!DescriptorMatcher::matches(
            &desc("(Ljava/lang/String;Ljava/lang/Object;)Z"),
            &instance_candidate,
            true
        ));
    }

    #[test]
    fn return_type_must_be_identical() {
        let candidate = candidate(true, "(Ljava/lang/String;Ljava/lang/String;)I");
        assert!(!DescriptorMatcher::matches(
            &desc("(Ljava/lang/String;)J"),
            &candidate,
            true
        ));
    }

    #[test]
    fn skipping_needs_enough_parameters() {
        assert!(descriptor_skipping_last(&desc("()V"), 0).is_none());
        assert!(descriptor_skipping_last(&desc("(I)V"), 1).is_none());
        assert_eq!(
            descriptor_skipping_last(&desc("(I)V"), 0).unwrap(),
            desc("()V")
        );
    }
}
