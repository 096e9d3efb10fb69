//! Exception handling frames for the Neo Virtual Machine.
//!
//! Each `TRY` instruction pushes an [`ExceptionHandlingContext`] onto the
//! try stack of the current execution context. The frame remembers where the
//! `CATCH` and `FINALLY` blocks start and which block is currently running.

/// The block of a `TRY` statement that is currently executing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExceptionHandlingState {
    /// Inside the `TRY` block.
    #[default]
    Try,
    /// Inside the `CATCH` block.
    Catch,
    /// Inside the `FINALLY` block.
    Finally,
}

/// One entry of a context's try stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionHandlingContext {
    catch_pointer: Option<usize>,
    finally_pointer: Option<usize>,
    end_pointer: Option<usize>,
    state: ExceptionHandlingState,
}

impl ExceptionHandlingContext {
    /// Creates a frame in the `Try` state.
    pub fn new(catch_pointer: Option<usize>, finally_pointer: Option<usize>) -> Self {
        Self {
            catch_pointer,
            finally_pointer,
            end_pointer: None,
            state: ExceptionHandlingState::Try,
        }
    }

    /// Start of the `CATCH` block.
    pub fn catch_pointer(&self) -> Option<usize> {
        self.catch_pointer
    }

    /// Start of the `FINALLY` block.
    pub fn finally_pointer(&self) -> Option<usize> {
        self.finally_pointer
    }

    /// Where execution continues after `ENDFINALLY`. Set by `ENDTRY`.
    pub fn end_pointer(&self) -> Option<usize> {
        self.end_pointer
    }

    pub fn set_end_pointer(&mut self, end_pointer: usize) {
        self.end_pointer = Some(end_pointer);
    }

    pub fn state(&self) -> ExceptionHandlingState {
        self.state
    }

    pub fn set_state(&mut self, state: ExceptionHandlingState) {
        self.state = state;
    }

    pub fn has_catch(&self) -> bool {
        self.catch_pointer.is_some()
    }

    pub fn has_finally(&self) -> bool {
        self.finally_pointer.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_frame_starts_in_try() {
        let mut frame = ExceptionHandlingContext::new(Some(10), None);
        assert_eq!(frame.state(), ExceptionHandlingState::Try);
        assert!(frame.has_catch());
        assert!(!frame.has_finally());
        assert_eq!(frame.end_pointer(), None);

        frame.set_state(ExceptionHandlingState::Catch);
        frame.set_end_pointer(20);
        assert_eq!(frame.state(), ExceptionHandlingState::Catch);
        assert_eq!(frame.end_pointer(), Some(20));
    }
}
