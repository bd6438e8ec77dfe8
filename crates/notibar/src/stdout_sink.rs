use std::io::Write;

use rofication::Sink;
use tokio::sync::watch;

/// Prints one line per update, the way status bars like i3bar or eww's `deflisten` consume it.
/// Showing nothing prints an empty line.
pub struct StdoutSink<W> {
    out: W,
    closed: bool,
    shown: watch::Sender<String>,
}

impl<W: Write> StdoutSink<W> {
    /// Returns the sink and a receiver that always holds the line currently shown.
    pub fn new(out: W) -> (Self, watch::Receiver<String>) {
        let (shown, shown_recv) = watch::channel(String::new());
        (StdoutSink { out, closed: false, shown }, shown_recv)
    }

    fn show(&mut self, line: &str) {
        let result = writeln!(self.out, "{}", line).and_then(|_| self.out.flush());
        match result {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
                if !self.closed {
                    log::info!("Output was closed, shutting down");
                    self.closed = true;
                    crate::application_lifecycle::send_exit();
                }
            }
            Err(err) => log::error!("Failed to write output: {}", err),
        }
        self.shown.send_replace(line.to_string());
    }
}

impl<W: Write> Sink<String> for StdoutSink<W> {
    fn push_output(&mut self, output: Option<String>) {
        self.show(output.as_deref().unwrap_or_default());
    }

    fn push_error(&mut self, error: rofication::Error) -> bool {
        let message = crate::error_handling_ctx::format_error(&error.into());
        self.show(&format!("error: {}", message));
        self.closed
    }
}
