use std::io::Write;

use chat_stream::RenderSink;

/// Notice printed when the user stops a response.
pub const CANCELLED_NOTICE: &str = "Response generation was stopped.";

/// Streams assistant text to stdout and failures to stderr.
pub struct TerminalSink {
    out: Box<dyn Write + Send>,
    err: Box<dyn Write + Send>,
    wrote_text: bool,
}

impl TerminalSink {
    pub fn stdio() -> Self {
        Self::new(Box::new(std::io::stdout()), Box::new(std::io::stderr()))
    }

    pub fn new(out: Box<dyn Write + Send>, err: Box<dyn Write + Send>) -> Self {
        Self {
            out,
            err,
            wrote_text: false,
        }
    }

    // Failure and notice lines must not run on from partial reply text.
    fn break_line(&mut self) {
        if self.wrote_text {
            let _ = writeln!(self.out);
            let _ = self.out.flush();
            self.wrote_text = false;
        }
    }
}

impl RenderSink for TerminalSink {
    fn append_text(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
        let _ = self.out.flush();
        self.wrote_text = true;
    }

    fn show_error(&mut self, message: &str) {
        self.break_line();
        let _ = writeln!(self.err, "{message}");
    }

    fn show_cancelled(&mut self) {
        self.break_line();
        let _ = writeln!(self.out, "{CANCELLED_NOTICE}");
        let _ = self.out.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().expect("buf lock").clone()).expect("utf8")
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("buf lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn sink() -> (TerminalSink, SharedBuf, SharedBuf) {
        let out = SharedBuf::default();
        let err = SharedBuf::default();
        let sink = TerminalSink::new(Box::new(out.clone()), Box::new(err.clone()));
        (sink, out, err)
    }

    #[test]
    fn deltas_are_written_without_separators() {
        let (mut sink, out, err) = sink();
        sink.append_text("Hi");
        sink.append_text(" there");
        assert_eq!(out.contents(), "Hi there");
        assert_eq!(err.contents(), "");
    }

    #[test]
    fn cancelled_notice_starts_on_its_own_line() {
        let (mut sink, out, _) = sink();
        sink.append_text("Hi");
        sink.show_cancelled();
        assert_eq!(out.contents(), format!("Hi\n{CANCELLED_NOTICE}\n"));
    }

    #[test]
    fn errors_go_to_stderr() {
        let (mut sink, out, err) = sink();
        sink.show_error("rate limited");
        assert_eq!(out.contents(), "");
        assert_eq!(err.contents(), "rate limited\n");
    }
}
