//! Outcome of running a block body, including the non-local exits a body
//! can raise.

use crate::scope::{FrameId, FrameStack};
use crate::{JumpReason, RubyError, RubyResult, Value};

#[derive(Debug, Clone)]
pub enum BlockResult {
    /// The body ran to its end.
    Normal(Value),
    /// `return` to the method running in the frame.
    Return(FrameId, Value),
    /// `break` out of the call that yielded to the block.
    Break(FrameId, Value),
    /// `next`: ends this invocation only.
    Next(Value),
}

impl BlockResult {
    /// Settles the result as seen by the method running in `frame`.
    ///
    /// Signals aimed at `frame` become its value, signals aimed at another
    /// active frame keep unwinding, and signals whose frame already
    /// returned fail with a `LocalJumpError`.
    pub fn resolve_in_frame(self, frame: FrameId, stack: &FrameStack) -> RubyResult<BlockResult> {
        let (reason, target, value) = match self {
            Self::Normal(value) | Self::Next(value) => return Ok(Self::Normal(value)),
            Self::Return(target, value) => (JumpReason::Return, target, value),
            Self::Break(target, value) => (JumpReason::Break, target, value),
        };
        if target == frame {
            return Ok(Self::Normal(value));
        }
        if stack.is_active(target) {
            return Ok(match reason {
                JumpReason::Break => Self::Break(target, value),
                _ => Self::Return(target, value),
            });
        }
        log::debug!("{reason:?} aimed at finished frame {}", target.as_u64());
        Err(RubyError::local_jump(reason))
    }

    /// The value for a caller that has no frame of its own. A pending
    /// `return` or `break` has nowhere to go there.
    pub fn into_value(self) -> RubyResult<Value> {
        match self {
            Self::Normal(value) | Self::Next(value) => Ok(value),
            Self::Return(..) => Err(RubyError::local_jump(JumpReason::Return)),
            Self::Break(..) => Err(RubyError::local_jump(JumpReason::Break)),
        }
    }

    pub fn is_signal(&self) -> bool {
        matches!(self, Self::Return(..) | Self::Break(..))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_for_this_frame_becomes_its_value() {
        let mut stack = FrameStack::new();
        let frame = stack.push("each");
        let result = BlockResult::Break(frame, Value::Fixnum(3))
            .resolve_in_frame(frame, &stack)
            .unwrap();
        assert!(matches!(result, BlockResult::Normal(Value::Fixnum(3))));
        let next = BlockResult::Next(Value::Nil).resolve_in_frame(frame, &stack).unwrap();
        assert!(matches!(next, BlockResult::Normal(Value::Nil)));
    }

    #[test]
    fn signal_for_outer_frame_passes_through() {
        let mut stack = FrameStack::new();
        let outer = stack.push("outer");
        let inner = stack.push("inner");
        let result = BlockResult::Return(outer, Value::Bool(true))
            .resolve_in_frame(inner, &stack)
            .unwrap();
        assert!(matches!(result, BlockResult::Return(id, _) if id == outer));
        assert!(result.is_signal());
    }

    #[test]
    fn signal_for_finished_frame_is_local_jump() {
        let mut stack = FrameStack::new();
        let gone = stack.push("gone");
        stack.pop();
        let current = stack.push("current");
        let err = BlockResult::Return(gone, Value::Nil)
            .resolve_in_frame(current, &stack)
            .unwrap_err();
        assert_eq!(err.to_string(), "unexpected return");
        let err = BlockResult::Break(gone, Value::Nil)
            .resolve_in_frame(current, &stack)
            .unwrap_err();
        assert_eq!(err.to_string(), "break from proc-closure");
        assert_eq!(err.class_name(), "LocalJumpError");
    }

    #[test]
    fn into_value_rejects_pending_signals() {
        let mut stack = FrameStack::new();
        let frame = stack.push("m");
        assert!(matches!(BlockResult::Next(Value::Fixnum(1)).into_value(), Ok(Value::Fixnum(1))));
        assert!(BlockResult::Return(frame, Value::Nil).into_value().is_err());
    }
}
