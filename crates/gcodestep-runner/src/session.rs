//! Session facade wiring transport and engine for a consumer
//!
//! Opening a session spawns the two tasks and hands the consumer its own
//! command sender and event receiver. Channels are created per session and
//! torn down when the session exits; there is no shared listener registry.

use crate::engine::{spawn_engine, EngineOptions};
use gcodestep_communication::{
    make_interface, spawn_transport, ConnectionParams, ControllerType, RealSerialPort, SerialLink,
};
use gcodestep_core::{RunnerCommand, SenderEvent};
use tokio::sync::mpsc;

/// A live debugging session against one controller on one serial port.
pub struct SenderSession {
    command_tx: mpsc::UnboundedSender<RunnerCommand>,
    event_rx: mpsc::UnboundedReceiver<SenderEvent>,
}

impl SenderSession {
    /// Open the serial port and start a session for the given dialect.
    pub fn open(params: &ConnectionParams, controller: ControllerType) -> anyhow::Result<Self> {
        Self::open_with_options(params, controller, EngineOptions::default())
    }

    /// Open the serial port with tuned engine parameters.
    pub fn open_with_options(
        params: &ConnectionParams,
        controller: ControllerType,
        options: EngineOptions,
    ) -> anyhow::Result<Self> {
        let link = RealSerialPort::open(params)?;
        Ok(Self::open_with_link_options(
            Box::new(link),
            controller,
            options,
        ))
    }

    /// Start a session over an already-opened link.
    ///
    /// The link may be any [`SerialLink`] implementation, which is how tests
    /// drive the engine without hardware.
    pub fn open_with_link(link: Box<dyn SerialLink>, controller: ControllerType) -> Self {
        Self::open_with_link_options(link, controller, EngineOptions::default())
    }

    /// Start a session over an already-opened link with tuned engine
    /// parameters.
    pub fn open_with_link_options(
        link: Box<dyn SerialLink>,
        controller: ControllerType,
        options: EngineOptions,
    ) -> Self {
        let (link_event_tx, link_event_rx) = mpsc::unbounded_channel();
        let transport = spawn_transport(link, link_event_tx);

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        spawn_engine(
            make_interface(controller),
            transport.commands(),
            link_event_rx,
            command_rx,
            event_tx,
            options,
        );

        Self {
            command_tx,
            event_rx,
        }
    }

    /// A sender for engine commands; cheap to clone per producer.
    pub fn commands(&self) -> mpsc::UnboundedSender<RunnerCommand> {
        self.command_tx.clone()
    }

    /// The consumer's event stream.
    pub fn events(&mut self) -> &mut mpsc::UnboundedReceiver<SenderEvent> {
        &mut self.event_rx
    }

    /// Receive the next event, awaiting until one arrives or the session
    /// has fully shut down.
    pub async fn next_event(&mut self) -> Option<SenderEvent> {
        self.event_rx.recv().await
    }

    /// Request an orderly shutdown of engine and transport.
    ///
    /// The engine forwards the exit to the transport and emits
    /// [`SenderEvent::Exit`] once both have wound down.
    pub fn close(&self) {
        let _ = self.command_tx.send(RunnerCommand::Exit);
    }
}
