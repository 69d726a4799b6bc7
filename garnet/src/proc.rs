//! Closures: implicit blocks, procs and lambdas.
//!
//! All three share one representation and differ in how arguments are
//! adapted and where `return` and `break` go. Every call overload funnels
//! into one private `invoke`.

use std::{fmt, sync::Arc};

use crate::scope::{FrameId, Scope};
use crate::{BlockResult, ProcRef, RubyError, RubyResult, Shared, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcKind {
    /// Literal block passed to a call.
    Block,
    /// Block turned into an object.
    Proc,
    Lambda,
}

/// Parameter shape of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDispatcher {
    parameter_count: usize,
    has_rest: bool,
    has_proc_parameter: bool,
}

impl BlockDispatcher {
    pub fn new(parameter_count: usize) -> Self {
        Self {
            parameter_count,
            has_rest: false,
            has_proc_parameter: false,
        }
    }

    /// Adds a `*rest` parameter after the positional ones.
    pub fn with_rest(self) -> Self {
        Self {
            has_rest: true,
            ..self
        }
    }

    /// Adds a `&blk` parameter.
    pub fn with_proc_parameter(self) -> Self {
        Self {
            has_proc_parameter: true,
            ..self
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn has_rest(&self) -> bool {
        self.has_rest
    }

    pub fn has_proc_parameter(&self) -> bool {
        self.has_proc_parameter
    }

    /// Required count, or `-required - 1` when a rest parameter takes the
    /// remainder.
    pub fn arity(&self) -> i64 {
        let required = self.parameter_count as i64;
        if self.has_rest { -required - 1 } else { required }
    }
}

/// Compiled block body. It receives the adapted arguments: one per
/// positional parameter, then the rest array if the dispatcher has one.
pub type BlockBody =
    Arc<dyn Fn(&BlockContext, Vec<Value>) -> RubyResult<BlockResult> + Send + Sync>;

/// Method the runtime can call on a receiver, used for method objects
/// turned into lambdas.
pub trait CallSite: Send + Sync {
    fn invoke(&self, receiver: &Value, args: &[Value]) -> RubyResult<Value>;

    /// Parameters the method accepts. Any number by default.
    fn dispatcher(&self) -> BlockDispatcher {
        BlockDispatcher::new(0).with_rest()
    }
}

/// What a running block body can see and where its exits go.
#[derive(Debug)]
pub struct BlockContext {
    self_object: Value,
    scope: Arc<Scope>,
    kind: ProcKind,
    return_frame: Option<FrameId>,
    break_frame: Option<FrameId>,
    block: Option<ProcRef>,
}

impl BlockContext {
    pub fn self_object(&self) -> &Value {
        &self.self_object
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    pub fn kind(&self) -> ProcKind {
        self.kind
    }

    /// Block passed to this invocation, bound to a `&blk` parameter.
    pub fn block(&self) -> Option<&ProcRef> {
        self.block.as_ref()
    }

    /// `return value` from the body. Fails when the block was created
    /// outside any method.
    pub fn return_with(&self, value: Value) -> RubyResult<BlockResult> {
        match self.return_frame {
            Some(frame) => Ok(BlockResult::Return(frame, value)),
            None => Err(RubyError::local_jump(crate::JumpReason::Return)),
        }
    }

    /// `break value` from the body.
    pub fn break_with(&self, value: Value) -> RubyResult<BlockResult> {
        match self.break_frame {
            Some(frame) => Ok(BlockResult::Break(frame, value)),
            None => Err(RubyError::local_jump(crate::JumpReason::Break)),
        }
    }

    pub fn next_with(&self, value: Value) -> BlockResult {
        BlockResult::Next(value)
    }
}

#[derive(Clone)]
pub struct Proc {
    kind: ProcKind,
    self_object: Value,
    scope: Arc<Scope>,
    dispatcher: BlockDispatcher,
    body: BlockBody,
    converter: Option<FrameId>,
}

impl fmt::Debug for Proc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proc")
            .field("kind", &self.kind)
            .field("arity", &self.arity())
            .field("converter", &self.converter)
            .finish_non_exhaustive()
    }
}

impl Proc {
    pub fn new_block(
        self_object: Value,
        scope: Arc<Scope>,
        dispatcher: BlockDispatcher,
        body: BlockBody,
    ) -> Self {
        Self {
            kind: ProcKind::Block,
            self_object,
            scope,
            dispatcher,
            body,
            converter: None,
        }
    }

    /// Lambda that calls `call_site` on `receiver` with its arguments.
    pub fn from_method(call_site: Arc<dyn CallSite>, receiver: Value) -> Self {
        let dispatcher = call_site.dispatcher();
        let target = receiver.clone();
        let body: BlockBody = Arc::new(move |_: &BlockContext, args: Vec<Value>| {
            let args = flatten_rest(args, dispatcher);
            call_site.invoke(&target, &args).map(BlockResult::Normal)
        });
        Self {
            kind: ProcKind::Lambda,
            self_object: receiver.clone(),
            scope: Scope::top_level(receiver),
            dispatcher,
            body,
            converter: None,
        }
    }

    pub fn kind(&self) -> ProcKind {
        self.kind
    }

    pub fn is_lambda(&self) -> bool {
        self.kind == ProcKind::Lambda
    }

    pub fn arity(&self) -> i64 {
        self.dispatcher.arity()
    }

    pub fn dispatcher(&self) -> BlockDispatcher {
        self.dispatcher
    }

    pub fn self_object(&self) -> &Value {
        &self.self_object
    }

    pub fn scope(&self) -> &Arc<Scope> {
        &self.scope
    }

    /// Frame that turned the block into an object, if any.
    pub fn converter(&self) -> Option<FrameId> {
        self.converter
    }

    /// Copy sharing the scope and body, with the same kind.
    pub fn duplicate(&self) -> Self {
        self.clone()
    }

    /// Copy whose body sees a different `self`. The scope is still shared.
    pub fn rebind(&self, self_object: Value) -> Self {
        Self {
            self_object,
            ..self.clone()
        }
    }

    /// Block -> Proc, made by the method running in `converter`. Procs and
    /// lambdas stay as they are.
    pub fn to_proc(&mut self, converter: FrameId) {
        if self.kind == ProcKind::Block {
            log::debug!("block promoted to proc in frame {}", converter.as_u64());
            self.kind = ProcKind::Proc;
            self.converter = Some(converter);
        }
    }

    /// Block or Proc -> Lambda. The first converter frame is kept.
    pub fn to_lambda(&mut self, converter: FrameId) {
        if self.kind == ProcKind::Lambda {
            return;
        }
        log::debug!("{:?} promoted to lambda in frame {}", self.kind, converter.as_u64());
        self.kind = ProcKind::Lambda;
        self.converter.get_or_insert(converter);
    }

    // ── calls ──────────────────────────────────────────────────────────

    pub fn call0(&self) -> RubyResult<BlockResult> {
        self.call_n(Vec::new())
    }

    pub fn call1(&self, a: Value) -> RubyResult<BlockResult> {
        self.call_n(vec![a])
    }

    pub fn call2(&self, a: Value, b: Value) -> RubyResult<BlockResult> {
        self.call_n(vec![a, b])
    }

    pub fn call3(&self, a: Value, b: Value, c: Value) -> RubyResult<BlockResult> {
        self.call_n(vec![a, b, c])
    }

    pub fn call4(&self, a: Value, b: Value, c: Value, d: Value) -> RubyResult<BlockResult> {
        self.call_n(vec![a, b, c, d])
    }

    pub fn call_n(&self, args: Vec<Value>) -> RubyResult<BlockResult> {
        self.invoke(args, None)
    }

    /// Call with `*splat` appended to `args`. A non-array splat is passed
    /// as a single argument.
    pub fn call_splat(&self, mut args: Vec<Value>, splat: &Value) -> RubyResult<BlockResult> {
        match splat {
            Value::Array(items) => args.extend(items.read().iter().cloned()),
            other => args.push(other.clone()),
        }
        self.call_n(args)
    }

    /// Call passing a block for a `&blk` parameter.
    pub fn call_with_block(&self, args: Vec<Value>, block: ProcRef) -> RubyResult<BlockResult> {
        self.invoke(args, Some(block))
    }

    pub fn yield_0(&self) -> RubyResult<BlockResult> {
        self.yield_n(Vec::new())
    }

    pub fn yield_1(&self, a: Value) -> RubyResult<BlockResult> {
        self.yield_n(vec![a])
    }

    pub fn yield_2(&self, a: Value, b: Value) -> RubyResult<BlockResult> {
        self.yield_n(vec![a, b])
    }

    /// `yield` to this closure. Arguments are adapted as for a call.
    pub fn yield_n(&self, args: Vec<Value>) -> RubyResult<BlockResult> {
        self.invoke(args, None)
    }

    pub fn yield_splat(&self, mut args: Vec<Value>, splat: &Value) -> RubyResult<BlockResult> {
        match splat {
            Value::Array(items) => args.extend(items.read().iter().cloned()),
            other => args.push(other.clone()),
        }
        self.yield_n(args)
    }

    /// Blocks and procs spread a lone array over several parameters.
    /// Lambdas never do.
    fn auto_splats(&self, args: &[Value]) -> bool {
        if self.is_lambda() {
            return false;
        }
        let count = self.dispatcher.parameter_count;
        let wants_many = count > 1 || (count >= 1 && self.dispatcher.has_rest);
        wants_many && matches!(args, [Value::Array(_)])
    }

    /// Shapes `args` to the dispatcher: one value per positional parameter
    /// plus the rest array.
    fn adapt(&self, mut args: Vec<Value>) -> RubyResult<Vec<Value>> {
        if self.auto_splats(&args) {
            if let Some(Value::Array(items)) = args.pop() {
                args = items.read().clone();
            }
        }
        let count = self.dispatcher.parameter_count;
        let has_rest = self.dispatcher.has_rest;
        if self.is_lambda() {
            if has_rest && args.len() < count {
                return Err(RubyError::too_few_arguments(args.len(), count));
            }
            if !has_rest && args.len() != count {
                return Err(RubyError::wrong_arguments(args.len(), count));
            }
        }
        let rest = if args.len() > count {
            args.split_off(count)
        } else {
            args.resize(count, Value::Nil);
            Vec::new()
        };
        if has_rest {
            args.push(Value::array(rest));
        }
        Ok(args)
    }

    fn invoke(&self, args: Vec<Value>, block: Option<ProcRef>) -> RubyResult<BlockResult> {
        let args = self.adapt(args)?;
        let own = match self.kind {
            ProcKind::Lambda => Some(FrameId::fresh()),
            _ => None,
        };
        let context = BlockContext {
            self_object: self.self_object.clone(),
            scope: self.scope.clone(),
            kind: self.kind,
            return_frame: own.or(self.scope.frame()),
            break_frame: own.or(self.converter).or(self.scope.frame()),
            block,
        };
        Ok(match (self.body)(&context, args)? {
            BlockResult::Next(value) => BlockResult::Normal(value),
            BlockResult::Return(frame, value) | BlockResult::Break(frame, value)
                if Some(frame) == own =>
            {
                BlockResult::Normal(value)
            }
            other => other,
        })
    }
}

/// Rest array back into plain arguments, for bodies that forward them.
fn flatten_rest(mut args: Vec<Value>, dispatcher: BlockDispatcher) -> Vec<Value> {
    if dispatcher.has_rest {
        if let Some(Value::Array(rest)) = args.pop() {
            args.extend(rest.read().iter().cloned());
        }
    }
    args
}

impl Shared<Proc> {
    /// Calls a snapshot of the closure, so the body may itself use this
    /// handle.
    pub fn call(&self, args: Vec<Value>) -> RubyResult<BlockResult> {
        let proc = self.read().clone();
        proc.call_n(args)
    }

    pub fn yield_values(&self, args: Vec<Value>) -> RubyResult<BlockResult> {
        let proc = self.read().clone();
        proc.yield_n(args)
    }
}
