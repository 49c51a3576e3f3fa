//! Loop state for FOR blocks

use twoway_core::Value;

use crate::like_search::LikeSearchOption;

static NULL: Value = Value::Null;

/// State of one active FOR level.
///
/// Created when a FOR block is entered and dropped when it is left. Nested
/// loops keep a reference to their parent so LIKE-search options can be
/// inherited from an outer loop.
#[derive(Debug)]
pub struct LoopInfo<'a> {
    expression: &'a str,
    elements: Vec<Value>,
    index: usize,
    like_option: Option<LikeSearchOption>,
    parent: Option<&'a LoopInfo<'a>>,
}

impl<'a> LoopInfo<'a> {
    pub fn new(
        expression: &'a str,
        elements: Vec<Value>,
        like_option: Option<LikeSearchOption>,
        parent: Option<&'a LoopInfo<'a>>,
    ) -> Self {
        Self {
            expression,
            elements,
            index: 0,
            like_option,
            parent,
        }
    }

    /// The FOR expression this loop iterates over
    pub fn expression(&self) -> &str {
        self.expression
    }

    pub fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn size(&self) -> usize {
        self.elements.len()
    }

    /// The element `#current` denotes
    pub fn current(&self) -> &Value {
        self.elements.get(self.index).unwrap_or(&NULL)
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.elements.len()
    }

    /// This loop's LIKE-search option, or the nearest enclosing loop's
    pub fn like_option(&self) -> Option<LikeSearchOption> {
        self.like_option
            .or_else(|| self.parent.and_then(|parent| parent.like_option()))
    }

    pub fn parent(&self) -> Option<&'a LoopInfo<'a>> {
        self.parent
    }

    /// Number of enclosing loops including this one
    pub fn depth(&self) -> usize {
        1 + self.parent.map_or(0, |parent| parent.depth())
    }
}
