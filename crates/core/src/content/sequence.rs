//! Arena-backed operator sequence.
//!
//! Operators are stored by stable index; `prev`/`next` link siblings at one
//! nesting level and `parent`/`first_child`/`last_child` link composite
//! blocks to their contents. Nodes are only ever appended, so an [`OpId`]
//! stays valid for the lifetime of the sequence.

use crate::content::operator::{PdfOperator, WriteContent};
use crate::model::operand::Operand;

/// Stable index of an operator within its [`OperatorSeq`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(u32);

impl OpId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq)]
struct OperatorNode {
    op: PdfOperator,
    prev: Option<OpId>,
    next: Option<OpId>,
    parent: Option<OpId>,
    first_child: Option<OpId>,
    last_child: Option<OpId>,
}

/// Doubly linked operator sequence with nested composite children.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorSeq {
    nodes: Vec<OperatorNode>,
    head: Option<OpId>,
    tail: Option<OpId>,
    top_len: usize,
}

impl OperatorSeq {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `op` as the last child of `parent`, or as the new top-level
    /// tail when `parent` is `None`.
    pub fn push(&mut self, op: PdfOperator, parent: Option<OpId>) -> OpId {
        let id = OpId(self.nodes.len() as u32);
        let prev = match parent {
            Some(p) => self.nodes[p.index()].last_child,
            None => self.tail,
        };
        self.nodes.push(OperatorNode {
            op,
            prev,
            next: None,
            parent,
            first_child: None,
            last_child: None,
        });
        if let Some(prev) = prev {
            self.nodes[prev.index()].next = Some(id);
        }
        match parent {
            Some(p) => {
                let node = &mut self.nodes[p.index()];
                node.first_child.get_or_insert(id);
                node.last_child = Some(id);
            }
            None => {
                self.head.get_or_insert(id);
                self.tail = Some(id);
                self.top_len += 1;
            }
        }
        id
    }

    /// Number of top-level operators.
    pub const fn len(&self) -> usize {
        self.top_len
    }

    pub const fn is_empty(&self) -> bool {
        self.top_len == 0
    }

    /// Number of operators at every nesting level.
    pub fn total_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn get(&self, id: OpId) -> Option<&PdfOperator> {
        self.nodes.get(id.index()).map(|n| &n.op)
    }

    pub(crate) fn get_mut(&mut self, id: OpId) -> Option<&mut PdfOperator> {
        self.nodes.get_mut(id.index()).map(|n| &mut n.op)
    }

    /// Borrowed view of one operator.
    pub fn op(&self, id: OpId) -> Option<OpRef<'_>> {
        (id.index() < self.nodes.len()).then_some(OpRef { seq: self, id })
    }

    pub fn front(&self) -> Option<OpRef<'_>> {
        self.head.and_then(|id| self.op(id))
    }

    pub fn back(&self) -> Option<OpRef<'_>> {
        self.tail.and_then(|id| self.op(id))
    }

    /// Top-level operator at `index`.
    pub fn nth(&self, index: usize) -> Option<OpRef<'_>> {
        self.iter().nth(index)
    }

    pub fn next(&self, id: OpId) -> Option<OpId> {
        self.nodes.get(id.index()).and_then(|n| n.next)
    }

    pub fn prev(&self, id: OpId) -> Option<OpId> {
        self.nodes.get(id.index()).and_then(|n| n.prev)
    }

    pub fn parent(&self, id: OpId) -> Option<OpId> {
        self.nodes.get(id.index()).and_then(|n| n.parent)
    }

    pub fn first_child(&self, id: OpId) -> Option<OpId> {
        self.nodes.get(id.index()).and_then(|n| n.first_child)
    }

    pub fn last_child(&self, id: OpId) -> Option<OpId> {
        self.nodes.get(id.index()).and_then(|n| n.last_child)
    }

    /// Top-level operators in order.
    pub fn iter(&self) -> Siblings<'_> {
        Siblings {
            seq: self,
            cursor: self.head,
        }
    }

    /// Every operator, depth first: a composite comes before its children.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            seq: self,
            cursor: self.head,
        }
    }

    /// Check that sibling links are mutual inverses and acyclic.
    pub fn links_consistent(&self) -> bool {
        let mut seen = vec![false; self.nodes.len()];
        self.chain_consistent(self.head, self.tail, None, &mut seen) && seen.iter().all(|&s| s)
    }

    fn chain_consistent(
        &self,
        head: Option<OpId>,
        tail: Option<OpId>,
        parent: Option<OpId>,
        seen: &mut [bool],
    ) -> bool {
        let mut prev = None;
        let mut cursor = head;
        while let Some(id) = cursor {
            let Some(node) = self.nodes.get(id.index()) else {
                return false;
            };
            if seen[id.index()] || node.prev != prev || node.parent != parent {
                return false;
            }
            seen[id.index()] = true;
            if !self.chain_consistent(node.first_child, node.last_child, Some(id), seen) {
                return false;
            }
            prev = Some(id);
            cursor = node.next;
        }
        prev == tail
    }
}

/// Borrowed view of an operator and its position in the sequence.
#[derive(Debug, Clone, Copy)]
pub struct OpRef<'a> {
    seq: &'a OperatorSeq,
    id: OpId,
}

impl<'a> OpRef<'a> {
    pub const fn id(&self) -> OpId {
        self.id
    }

    pub fn op(&self) -> &'a PdfOperator {
        &self.seq.nodes[self.id.index()].op
    }

    pub fn name(&self) -> &'a str {
        self.op().name()
    }

    pub fn operands(&self) -> &'a [Operand] {
        self.op().operands()
    }

    pub fn next(&self) -> Option<Self> {
        self.seq.next(self.id).and_then(|id| self.seq.op(id))
    }

    pub fn prev(&self) -> Option<Self> {
        self.seq.prev(self.id).and_then(|id| self.seq.op(id))
    }

    pub fn parent(&self) -> Option<Self> {
        self.seq.parent(self.id).and_then(|id| self.seq.op(id))
    }

    /// Direct children of a composite, empty otherwise.
    pub fn children(&self) -> Siblings<'a> {
        Siblings {
            seq: self.seq,
            cursor: self.seq.first_child(self.id),
        }
    }

    /// Nesting depth; 0 for top-level operators.
    pub fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.seq.parent(self.id);
        while let Some(id) = cursor {
            depth += 1;
            cursor = self.seq.parent(id);
        }
        depth
    }
}

/// Operator with its nested children and end instruction, one per line.
impl WriteContent for OpRef<'_> {
    fn write_content(&self, out: &mut Vec<u8>) {
        let op = self.op();
        op.write_head(out);
        if let PdfOperator::Composite(composite) = op {
            for child in self.children() {
                out.push(b'\n');
                child.write_content(out);
            }
            // Implicitly closed blocks still get their end written.
            out.push(b'\n');
            out.extend_from_slice(composite.end_name().as_bytes());
        }
    }
}

/// Whole sequence, one instruction per line with a trailing newline.
impl WriteContent for OperatorSeq {
    fn write_content(&self, out: &mut Vec<u8>) {
        for op in self.iter() {
            op.write_content(out);
            out.push(b'\n');
        }
    }
}

/// Iterator over one sibling chain.
pub struct Siblings<'a> {
    seq: &'a OperatorSeq,
    cursor: Option<OpId>,
}

impl<'a> Iterator for Siblings<'a> {
    type Item = OpRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        self.cursor = self.seq.next(id);
        self.seq.op(id)
    }
}

/// Depth-first pre-order iterator over all operators.
pub struct Walk<'a> {
    seq: &'a OperatorSeq,
    cursor: Option<OpId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = OpRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let seq = self.seq;
        self.cursor = seq.first_child(id).or_else(|| {
            let mut up = Some(id);
            while let Some(node) = up {
                if let Some(next) = seq.next(node) {
                    return Some(next);
                }
                up = seq.parent(node);
            }
            None
        });
        seq.op(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(name: &str) -> PdfOperator {
        PdfOperator::unknown(name, Vec::new())
    }

    #[test]
    fn test_push_links_siblings() {
        let mut seq = OperatorSeq::new();
        let a = seq.push(plain("a"), None);
        let b = seq.push(plain("b"), None);
        let c = seq.push(plain("c"), Some(b));
        let d = seq.push(plain("d"), Some(b));

        assert_eq!(seq.len(), 2);
        assert_eq!(seq.total_len(), 4);
        assert_eq!(seq.next(a), Some(b));
        assert_eq!(seq.prev(b), Some(a));
        assert_eq!(seq.first_child(b), Some(c));
        assert_eq!(seq.next(c), Some(d));
        assert_eq!(seq.prev(c), None);
        assert_eq!(seq.parent(d), Some(b));
        assert!(seq.links_consistent());
    }

    #[test]
    fn test_walk_is_preorder() {
        let mut seq = OperatorSeq::new();
        seq.push(plain("a"), None);
        let b = seq.push(plain("b"), None);
        let c = seq.push(plain("c"), Some(b));
        seq.push(plain("d"), Some(c));
        seq.push(plain("e"), None);

        let names: Vec<_> = seq.walk().map(|op| op.name()).collect();
        assert_eq!(names, ["a", "b", "c", "d", "e"]);
        let top: Vec<_> = seq.iter().map(|op| op.name()).collect();
        assert_eq!(top, ["a", "b", "e"]);
    }
}
