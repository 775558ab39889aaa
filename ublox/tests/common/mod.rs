use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use orb_ublox::transport::Transport;

/// Plays back canned module output and records everything written.
#[derive(Default)]
pub struct ScriptedTransport {
    lines: VecDeque<Vec<u8>>,
    written: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the lines the module sends, in order.
    pub fn lines(mut self, lines: &[&str]) -> Self {
        self.lines
            .extend(lines.iter().map(|line| line.as_bytes().to_vec()));
        self
    }

    /// Queues a plain `OK` answer to one command: ack, results, `OK`.
    pub fn reply(self, results: &[&str]) -> Self {
        self.lines(&[""]).lines(results).lines(&["OK"])
    }

    /// Handle to the commands written so far, terminators included.
    pub fn written(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.written)
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.written
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(data).into_owned());
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<Vec<u8>> {
        self.lines.pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::TimedOut, "no more scripted lines")
        })
    }

    fn clear(&mut self) -> io::Result<()> {
        Ok(())
    }
}
