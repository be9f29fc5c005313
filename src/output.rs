use std::cell::RefCell;
use std::fmt;
use std::io;
use std::rc::Rc;

/// An in-memory `print` sink. Clones share one buffer, so a host can hand one
/// clone to [`Interpreter::with_output`](crate::Interpreter::with_output) and
/// read what the script printed through another.
#[derive(Debug, Clone, Default)]
pub struct CaptureOutput {
    into: Rc<RefCell<String>>,
}

impl CaptureOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        self.into.borrow().clone()
    }

    /// Written output split into lines, without terminators.
    pub fn lines(&self) -> Vec<String> {
        self.into.borrow().lines().map(str::to_string).collect()
    }
}

impl io::Write for CaptureOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.into
            .borrow_mut()
            .push_str(&String::from_utf8_lossy(buf));
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl fmt::Display for CaptureOutput {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.into.borrow())
    }
}
