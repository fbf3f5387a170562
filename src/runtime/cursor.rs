//! Step sequencing cursor.

/// Where the cursor stands in the step sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// About to execute the step at this index.
    BeforeStep(usize),
    /// Inside a step body; `item` counts declared actions/results so far.
    InStep { step: usize, item: usize },
    /// The sequence is over.
    AfterScenario,
}

/// A jump requested from inside a step body.
///
/// Jumps never take effect immediately: the remaining declarations of the
/// current body still evaluate, and the jump lands at the next step
/// boundary. The last request made within a body wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jump {
    /// Plain goto; steps jumped over are simply not visited.
    Goto { target: usize },
    /// Section skip; steps between the request and `resume_at` are recorded
    /// as skipped.
    Skip { resume_at: usize },
}

impl Jump {
    pub fn target(self) -> usize {
        match self {
            Jump::Goto { target } => target,
            Jump::Skip { resume_at } => resume_at,
        }
    }
}

#[derive(Debug)]
pub struct ExecutionCursor {
    state: CursorState,
    pending: Option<Jump>,
}

impl Default for ExecutionCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionCursor {
    pub fn new() -> Self {
        Self {
            state: CursorState::BeforeStep(0),
            pending: None,
        }
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Index of the current step, if the sequence is still running.
    pub fn current_step(&self) -> Option<usize> {
        match self.state {
            CursorState::BeforeStep(i) | CursorState::InStep { step: i, .. } => Some(i),
            CursorState::AfterScenario => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == CursorState::AfterScenario
    }

    /// `BeforeStep(i)` -> `InStep { i, 0 }`.
    pub fn enter_step(&mut self) {
        if let CursorState::BeforeStep(i) = self.state {
            self.state = CursorState::InStep { step: i, item: 0 };
        }
    }

    pub fn advance_item(&mut self) {
        if let CursorState::InStep { step, item } = self.state {
            self.state = CursorState::InStep {
                step,
                item: item + 1,
            };
        }
    }

    pub fn request_goto(&mut self, target: usize) {
        self.pending = Some(Jump::Goto { target });
    }

    pub fn request_skip(&mut self, resume_at: usize) {
        self.pending = Some(Jump::Skip { resume_at });
    }

    pub fn pending(&self) -> Option<Jump> {
        self.pending
    }

    /// Close the current step and move to the next boundary, applying any
    /// pending jump. Returns the jump that was applied.
    pub fn leave_step(&mut self) -> Option<Jump> {
        let next = match self.state {
            CursorState::InStep { step, .. } | CursorState::BeforeStep(step) => step + 1,
            CursorState::AfterScenario => return None,
        };
        let jump = self.pending.take();
        let landing = jump.map(Jump::target).unwrap_or(next);
        self.state = CursorState::BeforeStep(landing);
        jump
    }

    pub fn finish(&mut self) {
        self.state = CursorState::AfterScenario;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_advance() {
        let mut cursor = ExecutionCursor::new();
        assert_eq!(cursor.state(), CursorState::BeforeStep(0));
        cursor.enter_step();
        cursor.advance_item();
        assert_eq!(cursor.state(), CursorState::InStep { step: 0, item: 1 });
        assert_eq!(cursor.leave_step(), None);
        assert_eq!(cursor.state(), CursorState::BeforeStep(1));
    }

    #[test]
    fn goto_applies_at_the_boundary_only() {
        let mut cursor = ExecutionCursor::new();
        cursor.enter_step();
        cursor.request_goto(5);
        // Still inside the step; items keep counting.
        cursor.advance_item();
        assert_eq!(cursor.state(), CursorState::InStep { step: 0, item: 1 });
        assert_eq!(cursor.leave_step(), Some(Jump::Goto { target: 5 }));
        assert_eq!(cursor.state(), CursorState::BeforeStep(5));
        // The jump is consumed.
        assert_eq!(cursor.leave_step(), None);
        assert_eq!(cursor.state(), CursorState::BeforeStep(6));
    }

    #[test]
    fn last_jump_request_wins() {
        let mut cursor = ExecutionCursor::new();
        cursor.enter_step();
        cursor.request_goto(3);
        cursor.request_skip(7);
        assert_eq!(cursor.leave_step(), Some(Jump::Skip { resume_at: 7 }));
        assert_eq!(cursor.state(), CursorState::BeforeStep(7));
    }

    #[test]
    fn finish_is_terminal() {
        let mut cursor = ExecutionCursor::new();
        cursor.request_goto(2);
        cursor.finish();
        assert!(cursor.is_done());
        assert_eq!(cursor.leave_step(), None);
        assert_eq!(cursor.current_step(), None);
    }
}
