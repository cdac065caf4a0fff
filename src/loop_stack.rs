//! The loop stack (C5): an ordered stack of active `for` iteration
//! frames. The most recent frame shadows earlier ones when resolving a
//! variable path whose head matches an iterator name.

use crate::value::Value;

/// One active iteration. `position` starts at -1 and is incremented
/// before each element is visited, per SPEC_FULL.md §3.
pub struct LoopFrame {
    /// Name bound in the environment that the iterable came from, e.g.
    /// `items` in `for i in items`.
    pub source_name: String,
    /// Full dotted path the iterable was resolved from, for nested
    /// `for x in outer.inner` sources.
    pub full_path: String,
    /// The name the loop body refers to the current element by (`i` in
    /// `for i in items`).
    pub iterator_name: String,
    pub position: i64,
    /// Cached snapshot of the sequence being iterated, resolved once
    /// when the frame is pushed.
    pub items: Vec<Value>,
    /// Index of the `Block` token this frame's `EndBlock` should return
    /// to, if this frame represents a layout-block override invocation
    /// rather than a `for` loop. `None` for ordinary loop frames.
    pub block_return: Option<usize>,
}

impl LoopFrame {
    pub fn new(source_name: String, full_path: String, iterator_name: String, items: Vec<Value>) -> LoopFrame {
        LoopFrame { source_name, full_path, iterator_name, position: -1, items, block_return: None }
    }

    pub fn block_override(return_to: usize) -> LoopFrame {
        LoopFrame {
            source_name: String::new(),
            full_path: String::new(),
            iterator_name: String::new(),
            position: -1,
            items: Vec::new(),
            block_return: Some(return_to),
        }
    }

    pub fn at_end(&self) -> bool {
        self.position < 0 || self.position as usize >= self.items.len()
    }

    /// Advance to the next element. Returns `true` if a next element
    /// exists after advancing.
    pub fn advance(&mut self) -> bool {
        self.position += 1;
        (self.position as usize) < self.items.len()
    }

    pub fn current(&self) -> Option<&Value> {
        if self.position < 0 {
            return None;
        }
        self.items.get(self.position as usize)
    }

    /// 1-based position, for `@@index`.
    pub fn index(&self) -> i64 {
        self.position + 1
    }

    pub fn is_odd(&self) -> bool {
        self.index() % 2 == 1
    }

    pub fn is_even(&self) -> bool {
        self.index() % 2 == 0
    }
}

/// The ordered stack of active frames. Loop frames and block-override
/// frames share this stack so that a block invoked from inside a `for`
/// body still has its return address available via the same scoping
/// mechanism.
#[derive(Default)]
pub struct LoopStack {
    frames: Vec<LoopFrame>,
}

impl LoopStack {
    pub fn new() -> LoopStack {
        LoopStack { frames: Vec::new() }
    }

    pub fn push(&mut self, frame: LoopFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<LoopFrame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&LoopFrame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut LoopFrame> {
        self.frames.last_mut()
    }

    /// Walk frames from most-recently-pushed to oldest, looking for one
    /// whose iterator name matches `head` (case-insensitive).
    pub fn find_by_iterator(&self, head: &str) -> Option<&LoopFrame> {
        self.frames.iter().rev().find(|f| f.iterator_name.eq_ignore_ascii_case(head))
    }

    /// Nearest enclosing loop frame, for pseudo-variables like
    /// `@@index`, which always refer to the innermost `for`.
    pub fn nearest_loop(&self) -> Option<&LoopFrame> {
        self.frames.iter().rev().find(|f| f.block_return.is_none())
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<Value> {
        (0..n).map(|i| Value::Integer(i as i64)).collect()
    }

    #[test]
    fn frame_advances_from_minus_one() {
        let mut frame = LoopFrame::new("xs".into(), "xs".into(), "x".into(), items(2));
        assert_eq!(frame.position, -1);
        assert!(frame.advance());
        assert_eq!(frame.index(), 1);
        assert!(frame.advance());
        assert_eq!(frame.index(), 2);
        assert!(!frame.advance());
    }

    #[test]
    fn find_by_iterator_shadows_outer_with_inner() {
        let mut stack = LoopStack::new();
        stack.push(LoopFrame::new("xs".into(), "xs".into(), "i".into(), items(1)));
        stack.push(LoopFrame::new("ys".into(), "ys".into(), "i".into(), items(1)));
        let found = stack.find_by_iterator("i").unwrap();
        assert_eq!(found.source_name, "ys");
    }

    #[test]
    fn nearest_loop_skips_block_override_frames() {
        let mut stack = LoopStack::new();
        stack.push(LoopFrame::new("xs".into(), "xs".into(), "i".into(), items(1)));
        stack.push(LoopFrame::block_override(4));
        let nearest = stack.nearest_loop().unwrap();
        assert_eq!(nearest.iterator_name, "i");
    }
}
