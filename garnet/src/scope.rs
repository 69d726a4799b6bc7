//! Lexical scopes captured by closures and the stack of active method
//! frames that non-local exits are routed against.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::counters::FRAME_IDS;
use crate::{SymbolId, Value};

/// Identity of one method activation. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(u64);

impl FrameId {
    pub(crate) fn fresh() -> Self {
        Self(FRAME_IDS.next())
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub id: FrameId,
    pub name: Arc<str>,
}

/// Method frames of one execution context, innermost last.
#[derive(Debug, Default)]
pub struct FrameStack(Vec<Frame>);

impl FrameStack {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, name: impl Into<Arc<str>>) -> FrameId {
        let id = FrameId::fresh();
        self.0.push(Frame {
            id,
            name: name.into(),
        });
        id
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.0.pop()
    }

    pub fn current(&self) -> Option<&Frame> {
        self.0.last()
    }

    /// `id` is still on the stack, so a signal aimed at it can land.
    pub fn is_active(&self, id: FrameId) -> bool {
        self.0.iter().rev().any(|frame| frame.id == id)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }
}

/// Variables of one lexical level plus the `self` it was opened with.
///
/// Scopes are shared by every closure that captured them, so writes through
/// one closure are seen by the others.
#[derive(Debug)]
pub struct Scope {
    variables: RwLock<HashMap<SymbolId, Value>>,
    self_object: Value,
    parent: Option<Arc<Scope>>,
    frame: Option<FrameId>,
}

impl Scope {
    /// Scope of a method body running in `frame`.
    pub fn new(self_object: Value, frame: Option<FrameId>) -> Arc<Self> {
        Arc::new(Self {
            variables: RwLock::new(HashMap::new()),
            self_object,
            parent: None,
            frame,
        })
    }

    /// Outermost scope, outside any method.
    pub fn top_level(self_object: Value) -> Arc<Self> {
        Self::new(self_object, None)
    }

    /// Block scope nested in `parent`, sharing its `self` and frame.
    pub fn child(parent: &Arc<Scope>) -> Arc<Self> {
        Arc::new(Self {
            variables: RwLock::new(HashMap::new()),
            self_object: parent.self_object.clone(),
            parent: Some(parent.clone()),
            frame: parent.frame,
        })
    }

    pub fn self_object(&self) -> &Value {
        &self.self_object
    }

    /// The method frame a `return` in this scope goes back to.
    pub fn frame(&self) -> Option<FrameId> {
        self.frame
    }

    pub fn parent(&self) -> Option<&Arc<Scope>> {
        self.parent.as_ref()
    }

    /// Looks the variable up here, then in the enclosing scopes.
    pub fn get(&self, name: SymbolId) -> Option<Value> {
        let mut scope = self;
        loop {
            if let Some(value) = scope.variables.read().get(&name) {
                return Some(value.clone());
            }
            scope = scope.parent.as_deref()?;
        }
    }

    /// Assigns where the variable is already defined, else defines it here.
    pub fn set(&self, name: SymbolId, value: Value) {
        let mut scope = self;
        loop {
            {
                let mut variables = scope.variables.write();
                if let Some(slot) = variables.get_mut(&name) {
                    *slot = value;
                    return;
                }
            }
            match scope.parent.as_deref() {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        self.define(name, value);
    }

    /// Defines the variable in this scope, shadowing outer ones.
    pub fn define(&self, name: SymbolId, value: Value) {
        self.variables.write().insert(name, value);
    }

    pub fn is_defined(&self, name: SymbolId) -> bool {
        self.get(name).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SymbolTable;

    #[test]
    fn frames_get_fresh_ids() {
        let mut stack = FrameStack::new();
        let outer = stack.push("outer");
        let inner = stack.push("inner");
        assert_ne!(outer, inner);
        assert!(stack.is_active(outer) && stack.is_active(inner));
        assert_eq!(stack.current().map(|f| f.id), Some(inner));
        assert_eq!(stack.pop().map(|f| f.name.to_string()), Some("inner".into()));
        assert!(!stack.is_active(inner), "popped frame is gone");
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn child_scopes_see_and_update_parents() {
        let symbols = SymbolTable::new();
        let (x, y) = (symbols.intern("x"), symbols.intern("y"));
        let top = Scope::top_level(Value::Nil);
        top.define(x, Value::Fixnum(1));
        let block = Scope::child(&top);
        assert!(matches!(block.get(x), Some(Value::Fixnum(1))));
        block.set(x, Value::Fixnum(2));
        assert!(matches!(top.get(x), Some(Value::Fixnum(2))), "outer variable assigned");
        block.set(y, Value::Fixnum(3));
        assert!(top.get(y).is_none(), "new variable stays local to the block");
        assert!(block.is_defined(y));
    }

    #[test]
    fn child_inherits_self_and_frame() {
        let mut stack = FrameStack::new();
        let frame = stack.push("m");
        let method = Scope::new(Value::Fixnum(7), Some(frame));
        let block = Scope::child(&method);
        assert_eq!(block.frame(), Some(frame));
        assert!(matches!(block.self_object(), Value::Fixnum(7)));
        assert!(Scope::top_level(Value::Nil).frame().is_none());
    }
}
