//! Runtime data structures: environments, stack frames and the frame stack.
//!
//! Frames are addressed by index (0 = outermost). Changes in the history
//! refer to frames by that index, never by reference, so history entries
//! never alias live state.

use std::collections::BTreeMap;

use retrace_common::Value;

/// A name-to-value mapping. Binding [`Value::Undefined`] removes the name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    bindings: BTreeMap<String, Value>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// The value bound to `key`, if any.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.bindings.get(key)
    }

    /// The value bound to `key`, or `Undefined`.
    pub fn value_of(&self, key: &str) -> Value {
        self.get(key).cloned().unwrap_or_default()
    }

    /// Returns true if `key` is bound.
    pub fn contains(&self, key: &str) -> bool {
        self.bindings.contains_key(key)
    }

    /// Bind `key` to `value`, returning the previous value (or `Undefined`).
    pub fn set(&mut self, key: &str, value: Value) -> Value {
        let previous = if value.is_undefined() {
            self.bindings.remove(key)
        } else {
            self.bindings.insert(key.to_string(), value)
        };
        previous.unwrap_or_default()
    }

    /// Iterate bindings in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// One activation: operand stack, bindings, call arguments and the
/// instruction index of the call this frame made most recently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackFrame {
    /// Operand stack. Only instructions running in this frame touch it.
    pub operands: Vec<Value>,
    /// Frame-local bindings.
    pub env: Environment,
    /// Arguments received from the caller, in call order.
    pub args: Vec<Value>,
    /// Index of the `MethodCall` this frame executed last, if any.
    pub return_address: Option<usize>,
}

impl StackFrame {
    /// Create an empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a frame that received `args`.
    pub fn with_args(args: Vec<Value>) -> Self {
        Self {
            args,
            ..Self::default()
        }
    }

    /// The top `n` operands in stack order, or `None` if there are fewer.
    pub fn peek(&self, n: usize) -> Option<&[Value]> {
        let len = self.operands.len();
        len.checked_sub(n).map(|start| &self.operands[start..])
    }

    /// The top operand.
    pub fn top(&self) -> Option<&Value> {
        self.operands.last()
    }
}

/// The frame stack. The last frame is the one currently executing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stack {
    frames: Vec<StackFrame>,
}

impl Stack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// All frames, outermost first.
    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Number of frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if there are no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// The frame at `index` (0 = outermost).
    pub fn get(&self, index: usize) -> Option<&StackFrame> {
        self.frames.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut StackFrame> {
        self.frames.get_mut(index)
    }

    /// The currently executing frame.
    pub fn top(&self) -> Option<&StackFrame> {
        self.frames.last()
    }

    pub(crate) fn top_mut(&mut self) -> Option<&mut StackFrame> {
        self.frames.last_mut()
    }

    /// Index of the currently executing frame.
    pub fn top_index(&self) -> Option<usize> {
        self.frames.len().checked_sub(1)
    }

    pub(crate) fn push(&mut self, frame: StackFrame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop(&mut self) -> Option<StackFrame> {
        self.frames.pop()
    }

    /// Index of the innermost frame whose environment binds `key`.
    pub fn holder_of(&self, key: &str) -> Option<usize> {
        self.frames.iter().rposition(|frame| frame.env.contains(key))
    }
}
