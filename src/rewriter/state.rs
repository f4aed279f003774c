/// Position bookkeeping while folding over one method body.
///
/// `current_index` counts the calls that received an objective template on `current_line`, so the
/// indices handed out on one line are `0, 1, 2, ...` in instruction order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VisitState {
    /// Last source line seen, `0` before the first line-number event
    pub current_line: u32,
    /// Next index to hand out on `current_line`
    pub current_index: u32,
}

impl VisitState {
    /// State after a line-number event for `line`.
    #[must_use]
    pub fn at_line(self, line: u32) -> Self {
        VisitState {
            current_line: line,
            current_index: 0,
        }
    }

    /// Takes the next index on the current line.
    #[must_use]
    pub fn claim_index(self) -> (u32, Self) {
        (
            self.current_index,
            VisitState {
                current_index: self.current_index.saturating_add(1),
                ..self
            },
        )
    }
}
