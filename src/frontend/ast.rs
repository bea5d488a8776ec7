//! The syntax tree is a strictly owned binary tree: every node owns at most a
//! `left` and a `right` child, plus whatever payload its [`NodeKind`] carries.
//! Lists (declarations, statements, parameters and arguments) are chains of
//! cells whose `left` is the item and whose `right` is the rest of the list.

use crate::frontend::lexer::{Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    /// The lexeme this node was built from. Identifiers keep their declared
    /// name here, the resolved location lives in [`NodeKind::Identifier`].
    pub text: String,
    pub line: usize,
    pub left: Option<Box<Node>>,
    pub right: Option<Box<Node>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Operators, assignment, `return`, `while` and typed declarations,
    /// discriminated by the token they were built from
    Generic(TokenKind),
    Function {
        /// Most locals ever live at once anywhere in the function body
        frame_slot_count: usize,
    },
    If {
        /// `left` holds the then-branch and `right` the else-branch
        condition: Box<Node>,
    },
    DeclarationList,
    StatementList,
    ParameterList,
    ArgumentList,
    Literal,
    Identifier {
        /// `None` for names that are never looked up on the stack (function
        /// names)
        slot: Option<Slot>,
    },
    Call,
}

/// Position of a variable within its function's stack frame. Locals are
/// positive, parameters negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(pub i64);

impl Slot {
    pub const SIZE_BYTES: i64 = 8;

    /// Byte offset below the frame base
    pub fn offset(self) -> i64 {
        self.0 * Self::SIZE_BYTES
    }

    /// Slot of the parameter at `position`, where the first parameter sits at
    /// position 2 (above the saved frame base and the return address)
    pub fn parameter(position: usize) -> Self {
        Self(-(position as i64))
    }
}

impl Node {
    pub fn new(kind: NodeKind, text: impl Into<String>, line: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            left: None,
            right: None,
        }
    }

    /// A generic node that takes its kind and text from `token`
    pub fn from_token(token: &Token) -> Self {
        Self::new(NodeKind::Generic(token.kind), &token.lexeme, token.line)
    }

    pub fn with_children(mut self, left: Option<Box<Node>>, right: Option<Box<Node>>) -> Self {
        self.left = left;
        self.right = right;
        self
    }

    pub fn boxed(self) -> Box<Node> {
        Box::new(self)
    }

    pub fn is_list_cell(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::DeclarationList
                | NodeKind::StatementList
                | NodeKind::ParameterList
                | NodeKind::ArgumentList
        )
    }

    /// The resolved slot of an identifier node
    pub fn slot(&self) -> Option<Slot> {
        match self.kind {
            NodeKind::Identifier { slot } => slot,
            _ => None,
        }
    }

    /// Stack space reserved by a function prologue: the slot high-water mark
    /// in bytes, rounded up to keep the stack 16-byte aligned
    pub fn frame_size_bytes(&self) -> Option<usize> {
        match self.kind {
            NodeKind::Function { frame_slot_count } => {
                Some((frame_slot_count * Slot::SIZE_BYTES as usize).next_multiple_of(16))
            }
            _ => None,
        }
    }

    /// Items of a list chain in order. Walks `right` links while they are
    /// cells of the same kind as `self`.
    pub fn list_items(&self) -> ListItems<'_> {
        ListItems {
            kind: self.kind.clone(),
            next: Some(self),
        }
    }
}

pub struct ListItems<'tree> {
    kind: NodeKind,
    next: Option<&'tree Node>,
}

impl<'tree> Iterator for ListItems<'tree> {
    type Item = Option<&'tree Node>;

    fn next(&mut self) -> Option<Self::Item> {
        let cell = self.next.filter(|cell| cell.kind == self.kind)?;
        self.next = cell.right.as_deref();

        Some(cell.left.as_deref())
    }
}

/// In-order textual form of the tree, as printed by `--dump-tree`
impl core::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(left) = &self.left {
            write!(f, "{left} ")?;
        }

        match &self.kind {
            NodeKind::Function { frame_slot_count } => write!(f, "{}_{frame_slot_count}", self.text)?,
            NodeKind::If { condition } => write!(f, "{}({condition})", self.text)?,
            NodeKind::Identifier { slot: Some(slot) } => write!(f, "{}@{}", self.text, slot.offset())?,
            _ => f.write_str(&self.text)?,
        }

        if let Some(right) = &self.right {
            write!(f, " {right}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(frame_slot_count: usize) -> Node {
        Node::new(NodeKind::Function { frame_slot_count }, "_f", 1)
    }

    #[test]
    fn frame_size_rounds_up_to_sixteen() {
        assert_eq!(function(0).frame_size_bytes(), Some(0));
        assert_eq!(function(1).frame_size_bytes(), Some(16));
        assert_eq!(function(2).frame_size_bytes(), Some(16));
        assert_eq!(function(5).frame_size_bytes(), Some(48));
        assert_eq!(Node::new(NodeKind::Literal, "1", 1).frame_size_bytes(), None);
    }

    #[test]
    fn parameter_slots_sit_above_the_frame_base() {
        assert_eq!(Slot::parameter(2).offset(), -16);
        assert_eq!(Slot::parameter(3).offset(), -24);
        assert_eq!(Slot(1).offset(), 8);
    }

    #[test]
    fn list_items_stop_at_foreign_kinds() {
        let literal = |text: &str| Some(Node::new(NodeKind::Literal, text, 1).boxed());
        let tail = Node::new(NodeKind::ArgumentList, "arg", 1).with_children(literal("2"), None);
        let head = Node::new(NodeKind::ArgumentList, "arg", 1)
            .with_children(literal("1"), Some(tail.boxed()));

        let items: Vec<_> = head
            .list_items()
            .map(|item| item.map(|node| node.text.as_str()))
            .collect();

        assert_eq!(items, vec![Some("1"), Some("2")]);
    }
}
