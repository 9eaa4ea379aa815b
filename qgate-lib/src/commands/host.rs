use std::io::Write;

/// The process environment a command runs in.
pub trait Host: Send + Sync {
    /// Stream for reports and regular messages.
    fn output(&mut self) -> impl Write;

    /// Stream for diagnostics.
    fn error(&mut self) -> impl Write;

    /// Ends the process with `code`. Test hosts record the code and return.
    fn exit(&mut self, code: i32);
}

/// Host that captures both streams and the requested exit code.
#[cfg(any(debug_assertions, test))]
#[derive(Debug, Default)]
pub struct TestHost {
    pub output_buf: Vec<u8>,
    pub error_buf: Vec<u8>,
    pub exit_code: Option<i32>,
}

#[cfg(any(debug_assertions, test))]
impl TestHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn output_text(&self) -> String {
        String::from_utf8_lossy(&self.output_buf).into_owned()
    }

    #[must_use]
    pub fn error_text(&self) -> String {
        String::from_utf8_lossy(&self.error_buf).into_owned()
    }
}

#[cfg(any(debug_assertions, test))]
impl Host for TestHost {
    fn output(&mut self) -> impl Write {
        &mut self.output_buf
    }

    fn error(&mut self) -> impl Write {
        &mut self.error_buf
    }

    fn exit(&mut self, code: i32) {
        let _ = self.exit_code.get_or_insert(code);
    }
}
