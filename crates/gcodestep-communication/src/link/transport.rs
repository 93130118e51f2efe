//! Serial transport task
//!
//! Owns the only reader/writer of the physical link. Splits the incoming
//! byte stream into newline-delimited frames and forwards them as
//! [`LinkEvent::RxData`] events; accepts outbound writes through its command
//! channel. Never parses protocol semantics.
//!
//! Failure semantics: any I/O error during read or write emits
//! `Abort(reason)` followed by `Exit` and terminates the task. The abort is
//! monotonic; reconnecting requires opening a new link and spawning a new
//! transport.

use super::SerialLink;
use gcodestep_core::{LinkCommand, LinkEvent};
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Cooperative tick interval for the transport loop.
const TICK: Duration = Duration::from_millis(10);

/// Handle to a running transport task.
pub struct TransportHandle {
    command_tx: mpsc::UnboundedSender<LinkCommand>,
    task: JoinHandle<()>,
}

impl TransportHandle {
    /// Get a sender for the transport's command channel.
    pub fn commands(&self) -> mpsc::UnboundedSender<LinkCommand> {
        self.command_tx.clone()
    }

    /// Request an orderly shutdown.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(LinkCommand::Exit);
    }

    /// Abort the task without waiting for it to drain.
    pub fn abort(self) {
        self.task.abort();
    }
}

/// Spawn the transport task over an opened link.
///
/// Emits `PortOpen` immediately, then runs the read/write loop until an
/// `Exit` command or an I/O failure.
pub fn spawn_transport(
    link: Box<dyn SerialLink>,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
) -> TransportHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(transport_loop(link, command_rx, event_tx));

    TransportHandle { command_tx, task }
}

async fn transport_loop(
    mut link: Box<dyn SerialLink>,
    mut command_rx: mpsc::UnboundedReceiver<LinkCommand>,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
) {
    let port_name = link.name();
    let _ = event_tx.send(LinkEvent::PortOpen);
    tracing::debug!("Transport started on {}", port_name);

    let mut pending = String::new();
    let mut read_buf = [0u8; 256];

    loop {
        // WRITE PHASE: drain queued commands.
        let mut exiting = false;
        while let Ok(command) = command_rx.try_recv() {
            match command {
                LinkCommand::TxData(bytes) => {
                    if let Err(e) = link.write_all(&bytes) {
                        abort(&mut link, &event_tx, &e);
                        return;
                    }
                }
                LinkCommand::Exit => {
                    exiting = true;
                    break;
                }
            }
        }

        if exiting {
            let _ = link.close();
            let _ = event_tx.send(LinkEvent::PortClose);
            let _ = event_tx.send(LinkEvent::Exit);
            tracing::debug!("Transport on {} exited", port_name);
            return;
        }

        // READ PHASE: drain all available bytes, then frame complete lines.
        loop {
            match link.read(&mut read_buf) {
                Ok(0) => break,
                Ok(n) => {
                    pending.push_str(&String::from_utf8_lossy(&read_buf[..n]));
                }
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    break;
                }
                Err(e) => {
                    abort(&mut link, &event_tx, &e);
                    return;
                }
            }
        }

        while let Some(pos) = pending.find('\n') {
            let line: String = pending.drain(..=pos).collect();
            let line = line.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                let _ = event_tx.send(LinkEvent::RxData(line.to_string()));
            }
        }

        tokio::time::sleep(TICK).await;
    }
}

fn abort(
    link: &mut Box<dyn SerialLink>,
    event_tx: &mpsc::UnboundedSender<LinkEvent>,
    error: &io::Error,
) {
    tracing::error!("Transport I/O failure on {}: {}", link.name(), error);
    let _ = link.close();
    let _ = event_tx.send(LinkEvent::Abort(error.to_string()));
    let _ = event_tx.send(LinkEvent::Exit);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;

    /// Scripted in-memory link for transport tests.
    struct ScriptedLink {
        rx: VecDeque<Vec<u8>>,
        written: Arc<parking_lot::Mutex<Vec<Vec<u8>>>>,
        fail_next_read: bool,
    }

    impl ScriptedLink {
        fn new(chunks: Vec<&[u8]>) -> Self {
            Self {
                rx: chunks.into_iter().map(|c| c.to_vec()).collect(),
                written: Arc::new(parking_lot::Mutex::new(Vec::new())),
                fail_next_read: false,
            }
        }
    }

    impl SerialLink for ScriptedLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.fail_next_read {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device gone"));
            }
            match self.rx.pop_front() {
                Some(chunk) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            }
        }

        fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            self.written.lock().push(data.to_vec());
            Ok(())
        }

        fn name(&self) -> String {
            "mock".to_string()
        }

        fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    async fn collect_events(
        rx: &mut mpsc::UnboundedReceiver<LinkEvent>,
        count: usize,
    ) -> Vec<LinkEvent> {
        let mut events = Vec::new();
        while events.len() < count {
            match tokio::time::timeout(Duration::from_secs(1), rx.recv()).await {
                Ok(Some(ev)) => events.push(ev),
                _ => break,
            }
        }
        events
    }

    #[tokio::test]
    async fn test_frames_split_on_newline() {
        let link = ScriptedLink::new(vec![b"ok\r\n<Idle|MP", b"os:0.000,0.000,0.000>\r\nok\r\n"]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let handle = spawn_transport(Box::new(link), event_tx);

        let events = collect_events(&mut event_rx, 4).await;
        assert_eq!(events[0], LinkEvent::PortOpen);
        assert_eq!(events[1], LinkEvent::RxData("ok".to_string()));
        assert_eq!(
            events[2],
            LinkEvent::RxData("<Idle|MPos:0.000,0.000,0.000>".to_string())
        );
        assert_eq!(events[3], LinkEvent::RxData("ok".to_string()));

        handle.shutdown();
        let tail = collect_events(&mut event_rx, 2).await;
        assert_eq!(tail, vec![LinkEvent::PortClose, LinkEvent::Exit]);
    }

    #[tokio::test]
    async fn test_write_passes_exact_bytes() {
        let link = ScriptedLink::new(vec![]);
        let written = link.written.clone();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let handle = spawn_transport(Box::new(link), event_tx);

        handle
            .commands()
            .send(LinkCommand::TxData(b"G0 X1\n".to_vec()))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(written.lock().as_slice(), &[b"G0 X1\n".to_vec()]);
        handle.shutdown();
        let _ = collect_events(&mut event_rx, 3).await;
    }

    #[tokio::test]
    async fn test_read_failure_aborts() {
        let mut link = ScriptedLink::new(vec![]);
        link.fail_next_read = true;
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let _handle = spawn_transport(Box::new(link), event_tx);

        let events = collect_events(&mut event_rx, 3).await;
        assert_eq!(events[0], LinkEvent::PortOpen);
        assert!(matches!(&events[1], LinkEvent::Abort(reason) if reason.contains("device gone")));
        assert_eq!(events[2], LinkEvent::Exit);
    }
}
