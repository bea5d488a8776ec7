use std::collections::VecDeque;

use hashbrown::HashMap;

use crate::frontend::ast::Slot;

/// Block scopes of the function currently being parsed, innermost last, plus
/// the bookkeeping needed to size that function's stack frame.
#[derive(Debug, Default)]
pub struct ScopeStack {
    stack: VecDeque<HashMap<String, Slot>>,
    /// Locals declared in the scopes that are currently open
    live_slots: usize,
    /// Highest value `live_slots` has reached since the function began
    max_live_slots: usize,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the scope holding a function's parameters and restarts slot
    /// numbering
    pub fn begin_function(&mut self) {
        self.live_slots = 0;
        self.max_live_slots = 0;
        self.push_scope();
    }

    /// Closes the parameter scope and returns the function's slot
    /// high-water mark
    pub fn end_function(&mut self) -> usize {
        assert_eq!(
            self.stack.len(),
            1,
            "Function ended while block scopes were still open"
        );

        self.stack.pop_back();
        self.max_live_slots
    }

    /// Creates a new block scope
    pub fn push_scope(&mut self) {
        self.stack.push_back(HashMap::new());
    }

    /// Destroys the current block scope, releasing its slots for reuse by
    /// sibling blocks
    pub fn pop_scope(&mut self) {
        let scope = self
            .stack
            .pop_back()
            .expect("Attempted to pop a scope from the global context");

        self.live_slots -= scope.len();
    }

    #[cfg(test)]
    fn is_global(&self) -> bool {
        self.stack.is_empty()
    }

    #[cfg(test)]
    fn max_live_slots(&self) -> usize {
        self.max_live_slots
    }

    /// Binds a local in the current (most nested) scope to the next free
    /// slot. Returns `None` if the name is already bound in that scope.
    pub fn declare_local(&mut self, name: &str) -> Option<Slot> {
        let scope = self
            .stack
            .back_mut()
            .expect("Tried to declare a local in the global context");

        if scope.contains_key(name) {
            return None;
        }

        self.live_slots += 1;
        self.max_live_slots = self.max_live_slots.max(self.live_slots);

        let slot = Slot(self.live_slots as i64);
        scope.insert(name.to_owned(), slot);

        Some(slot)
    }

    /// Binds a parameter by its position on the caller's side of the frame.
    /// Returns `None` if another parameter already has this name.
    pub fn declare_parameter(&mut self, name: &str, position: usize) -> Option<Slot> {
        let scope = self
            .stack
            .back_mut()
            .expect("Tried to declare a parameter in the global context");

        if scope.contains_key(name) {
            return None;
        }

        let slot = Slot::parameter(position);
        scope.insert(name.to_owned(), slot);

        Some(slot)
    }

    /// Traverses the scope stack from back to front looking for a binding
    pub fn get_binding(&self, name: &str) -> Option<Slot> {
        self.stack
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }
}
