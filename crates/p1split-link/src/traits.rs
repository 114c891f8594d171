use crate::error::Result;

/// A discrete output line, e.g. the P1 request line (RTS).
///
/// Asserting the line asks the meter to emit telegrams.
pub trait ControlLine: Send {
    /// Drive the line to the given level (`true` = asserted).
    fn set_asserted(&mut self, asserted: bool) -> Result<()>;
}

/// A discrete input line sampled by the splitter, e.g. a consumer's
/// flow-control request line.
pub trait FlowInput: Send {
    /// Sample the current level (`true` = asserted).
    fn is_asserted(&mut self) -> Result<bool>;
}

/// A line that is not wired to anything.
///
/// As an output it swallows level changes. As an input it always reports
/// the fixed level it was created with.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLine {
    level: bool,
}

impl NullLine {
    /// Unwired line that always reads as asserted.
    pub fn asserted() -> Self {
        Self { level: true }
    }

    /// Unwired line that always reads as not asserted.
    pub fn deasserted() -> Self {
        Self { level: false }
    }
}

impl ControlLine for NullLine {
    fn set_asserted(&mut self, asserted: bool) -> Result<()> {
        self.level = asserted;
        Ok(())
    }
}

impl FlowInput for NullLine {
    fn is_asserted(&mut self) -> Result<bool> {
        Ok(self.level)
    }
}

impl<T: ControlLine + ?Sized> ControlLine for Box<T> {
    fn set_asserted(&mut self, asserted: bool) -> Result<()> {
        (**self).set_asserted(asserted)
    }
}

impl<T: FlowInput + ?Sized> FlowInput for Box<T> {
    fn is_asserted(&mut self) -> Result<bool> {
        (**self).is_asserted()
    }
}
