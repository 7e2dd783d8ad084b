/// How a block finished. Every construct consumes the variants it owns and
/// hands the rest to its caller: loops take `Break` and `Continue`, function
/// calls and entry blocks take `End`, action dispatch takes `Finish`, and
/// `Quit` reaches the top of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Ran to the end; carry on with the next operation.
    Next,
    Break,
    Continue,
    End,
    Finish,
    Quit,
}

impl Flow {
    pub fn name(self) -> &'static str {
        match self {
            Flow::Next => "next",
            Flow::Break => "break",
            Flow::Continue => "continue",
            Flow::End => "end",
            Flow::Finish => "finish",
            Flow::Quit => "quit",
        }
    }

    pub fn is_next(self) -> bool {
        self == Flow::Next
    }
}
