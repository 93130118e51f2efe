//! Execution engine: run/step/break state machine over a machine interface
//!
//! The engine task owns the firmware dialect instance and is the only writer
//! toward the transport. Each ~10 ms tick it:
//!
//! 1. drains consumer commands;
//! 2. drains transport events, decoding inbound lines through the dialect;
//! 3. advances the active program, gated on buffer admission and on the
//!    acknowledgment of the previously sent line;
//! 4. flushes the manual send queue through the same admission control;
//! 5. runs the auto-status poll schedule.
//!
//! The program counter only advances after the controller acknowledges the
//! line it points at, so on Stop or at a breakpoint the pc names a line that
//! has not been executed.

use crate::program::{parse_msg_directive, strip_comments, ExecutionSession};
use gcodestep_communication::MachineInterface;
use gcodestep_core::{
    AxisCoords, LinkCommand, LinkEvent, PositioningMode, RunnerCommand, SenderEvent,
};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Cooperative tick interval for the engine loop.
const TICK: Duration = Duration::from_millis(10);

/// Default auto-status poll interval while the machine is in an active state.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Tunable engine parameters.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Auto-status poll period while the machine is actively moving.
    pub poll_interval: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Engine execution states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// No program session active
    #[default]
    Idle,
    /// Streaming the program until end or a break condition
    Run,
    /// Executing exactly one non-comment line
    Step,
    /// Session suspended at the program counter
    Break,
    /// Transport failure; drains to Idle with the session destroyed
    Abort,
}

/// Spawn the engine task.
pub fn spawn_engine(
    interface: Box<dyn MachineInterface>,
    link_tx: mpsc::UnboundedSender<LinkCommand>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    command_rx: mpsc::UnboundedReceiver<RunnerCommand>,
    event_tx: mpsc::UnboundedSender<SenderEvent>,
    options: EngineOptions,
) -> JoinHandle<()> {
    let engine = Engine {
        interface,
        link_tx,
        link_rx,
        command_rx,
        event_tx,
        state: EngineState::Idle,
        session: None,
        inflight: false,
        send_queue: VecDeque::new(),
        manual_wait_ack: false,
        auto_status: true,
        poll_interval: options.poll_interval,
        last_poll: Instant::now(),
    };
    tokio::spawn(engine.run())
}

struct Engine {
    interface: Box<dyn MachineInterface>,
    link_tx: mpsc::UnboundedSender<LinkCommand>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    command_rx: mpsc::UnboundedReceiver<RunnerCommand>,
    event_tx: mpsc::UnboundedSender<SenderEvent>,
    state: EngineState,
    session: Option<ExecutionSession>,
    /// A program line was sent and its acknowledgment is outstanding.
    inflight: bool,
    /// Manual (non-program) lines awaiting transmission; the bool marks a
    /// send-with-ack entry that defers the rest of the queue until acked.
    send_queue: VecDeque<(String, bool)>,
    manual_wait_ack: bool,
    auto_status: bool,
    poll_interval: Duration,
    last_poll: Instant,
}

impl Engine {
    async fn run(mut self) {
        tracing::debug!("Engine started ({})", self.interface.descriptor().name);
        loop {
            if self.state == EngineState::Abort {
                self.state = EngineState::Idle;
            }

            self.drain_commands();
            if self.drain_link_events() {
                break;
            }

            if matches!(self.state, EngineState::Run | EngineState::Step) {
                self.advance_program();
            }

            self.flush_send_queue();
            self.poll_status();

            tokio::time::sleep(TICK).await;
        }
        let _ = self.event_tx.send(SenderEvent::Exit);
        tracing::debug!("Engine exited");
    }

    /// Drain transport events. Returns true when the engine must terminate.
    fn drain_link_events(&mut self) -> bool {
        while let Ok(event) = self.link_rx.try_recv() {
            match event {
                LinkEvent::PortOpen => {
                    self.interface.flush();
                    let _ = self.event_tx.send(SenderEvent::PortOpen);
                }
                LinkEvent::PortClose => {
                    let _ = self.event_tx.send(SenderEvent::PortClose);
                }
                LinkEvent::Abort(reason) => {
                    tracing::error!("Transport aborted: {}", reason);
                    self.state = EngineState::Abort;
                    self.session = None;
                    self.inflight = false;
                    self.send_queue.clear();
                    let _ = self.event_tx.send(SenderEvent::Abort(reason));
                }
                LinkEvent::Exit => return true,
                LinkEvent::RxData(line) => self.handle_rx(line),
            }
        }
        false
    }

    fn handle_rx(&mut self, line: String) {
        let _ = self.event_tx.send(SenderEvent::DataIn(line.clone()));
        let frame = self.interface.decode(&line);

        if frame.status.is_some() {
            let _ = self
                .event_tx
                .send(SenderEvent::StatusUpdate(self.interface.status()));
        }

        // The manual-send gate is released in flush_send_queue once the
        // pending FIFO drains, not here: an ack may belong to a program
        // line queued ahead of the send-with-ack entry.
        if let Some(ack) = &frame.ack {
            if !ack.success {
                tracing::warn!("Controller rejected a line (code {})", ack.code);
            }
        }

        if let Some(info) = frame.info {
            let _ = self.event_tx.send(SenderEvent::Info(info));
        }
    }

    /// Drain consumer commands.
    ///
    /// An Exit command is forwarded to the transport; the engine itself
    /// terminates when the transport's own Exit event comes back, so
    /// PortClose still reaches the consumer first.
    fn drain_commands(&mut self) {
        while let Ok(command) = self.command_rx.try_recv() {
            match command {
                RunnerCommand::Run {
                    lines,
                    pc,
                    breakpoints,
                } => self.start_session(lines, pc, breakpoints, EngineState::Run),
                RunnerCommand::Step {
                    lines,
                    pc,
                    breakpoints,
                } => self.start_session(lines, pc, breakpoints, EngineState::Step),
                RunnerCommand::Stop => {
                    self.state = EngineState::Idle;
                    self.session = None;
                    self.inflight = false;
                    self.send_queue.clear();
                }
                RunnerCommand::Send(line) => self.send_queue.push_back((line, false)),
                RunnerCommand::SendWithAck(line) => self.send_queue.push_back((line, true)),
                RunnerCommand::Move(coords) => self.queue_move(&coords, false, false),
                RunnerCommand::MoveRelative(coords) => self.queue_move(&coords, false, true),
                RunnerCommand::RapidMove(coords) => self.queue_move(&coords, true, false),
                RunnerCommand::RapidMoveRelative(coords) => self.queue_move(&coords, true, true),
                RunnerCommand::SetAxis(coords) => {
                    let line = self.interface.set_axis_command(&coords);
                    self.send_queue.push_back((line, false));
                }
                RunnerCommand::Home(axes) => {
                    let line = self.interface.home_command(&axes);
                    self.send_queue.push_back((line, false));
                }
                RunnerCommand::Probe {
                    axis,
                    feed_rate,
                    max_travel,
                } => {
                    let line = self.interface.probe_command(axis, feed_rate, max_travel);
                    self.send_queue.push_back((line, true));
                }
                RunnerCommand::GetStatus => self.query_status(),
                RunnerCommand::CycleStart => {
                    self.send_realtime(self.interface.descriptor().cycle_resume)
                }
                RunnerCommand::FeedHold => {
                    self.send_realtime(self.interface.descriptor().feed_hold)
                }
                RunnerCommand::QueueFlush => {
                    self.send_realtime(self.interface.descriptor().queue_flush);
                    self.interface.flush();
                    self.inflight = false;
                }
                RunnerCommand::Reset => {
                    self.send_realtime(self.interface.descriptor().reset);
                    self.interface.flush();
                    self.state = EngineState::Idle;
                    self.session = None;
                    self.inflight = false;
                    self.send_queue.clear();
                }
                RunnerCommand::ClearAlarm => {
                    let line = self.interface.descriptor().clear_alarm.to_string();
                    self.send_queue.push_back((line, false));
                }
                RunnerCommand::SetAutoStatus(enabled) => self.auto_status = enabled,
                RunnerCommand::GetSystemInfo => {
                    let line = self.interface.descriptor().system_info.to_string();
                    self.send_queue.push_back((line, false));
                }
                RunnerCommand::Exit => {
                    let _ = self.link_tx.send(LinkCommand::Exit);
                }
            }
        }
    }

    fn start_session(
        &mut self,
        lines: Vec<String>,
        pc: usize,
        breakpoints: Vec<usize>,
        mode: EngineState,
    ) {
        if !matches!(self.state, EngineState::Idle | EngineState::Break) {
            tracing::warn!("Run/Step rejected in state {:?}", self.state);
            return;
        }
        self.session = Some(ExecutionSession::new(lines, pc, breakpoints));
        self.inflight = false;
        self.state = mode;
    }

    /// Advance the active program by at most one transmitted line.
    ///
    /// Gated on the previous line's acknowledgment (the pending FIFO must be
    /// empty) and on buffer admission; a refused admission leaves the pc
    /// unchanged for the next tick. Comment and empty lines advance the pc
    /// without a transmission.
    fn advance_program(&mut self) {
        if self.interface.pending_count() > 0 {
            return;
        }

        let Some(mut session) = self.session.take() else {
            self.state = EngineState::Idle;
            return;
        };

        if self.inflight {
            // The last sent line has been acknowledged.
            self.inflight = false;
            session.pc += 1;
            let _ = self.event_tx.send(SenderEvent::PcUpdate(session.pc));
            if self.state == EngineState::Step {
                self.state = EngineState::Idle;
                let _ = self.event_tx.send(SenderEvent::StepEnd);
                return;
            }
        }

        loop {
            if session.at_end() {
                // A step that finds no line left still completes as a step.
                let event = if self.state == EngineState::Step {
                    SenderEvent::StepEnd
                } else {
                    SenderEvent::RunEnd
                };
                let _ = self.event_tx.send(event);
                self.state = EngineState::Idle;
                return;
            }

            let raw = session.current_line().to_string();

            if session.break_checks_apply() {
                if self.state == EngineState::Run && session.breakpoints.contains(&session.pc) {
                    self.state = EngineState::Break;
                    let _ = self.event_tx.send(SenderEvent::HitBreakpoint);
                    self.session = Some(session);
                    return;
                }
                if let Some(text) = parse_msg_directive(&raw) {
                    self.state = EngineState::Break;
                    let _ = self.event_tx.send(SenderEvent::HitMessage(text));
                    self.session = Some(session);
                    return;
                }
            }

            let clean = strip_comments(&raw);
            if clean.is_empty() {
                session.pc += 1;
                let _ = self.event_tx.send(SenderEvent::PcUpdate(session.pc));
                continue;
            }

            if !self.interface.ok_to_send(&clean) {
                // Buffer watermark reached; retry on a later tick.
                self.session = Some(session);
                return;
            }

            self.send_line(&clean);
            self.inflight = true;
            self.session = Some(session);
            return;
        }
    }

    /// Flush queued manual sends through admission control.
    fn flush_send_queue(&mut self) {
        while let Some((front, _)) = self.send_queue.front() {
            if self.manual_wait_ack && self.interface.pending_count() > 0 {
                return;
            }
            self.manual_wait_ack = false;

            if !self.interface.ok_to_send(front) {
                return;
            }
            let (line, wait_ack) = self.send_queue.pop_front().unwrap_or_default();
            self.send_line(&line);
            if wait_ack {
                self.manual_wait_ack = true;
            }
        }
    }

    /// Queue a move, bracketed by a positioning-mode preamble and restore
    /// whenever the mode the move needs differs from the last one sent.
    fn queue_move(&mut self, coords: &AxisCoords, rapid: bool, relative: bool) {
        if coords.is_empty() {
            return;
        }
        let needed = if relative {
            PositioningMode::Relative
        } else {
            PositioningMode::Absolute
        };
        let current = self.interface.status().positioning;
        if current != needed {
            self.send_queue
                .push_back((needed.gcode().to_string(), false));
        }
        self.send_queue
            .push_back((self.interface.move_command(coords, rapid), false));
        if current != needed {
            self.send_queue.push_back((current.gcode().to_string(), false));
        }
    }

    /// Transmit one bookkept line.
    fn send_line(&mut self, line: &str) {
        match line.to_ascii_uppercase().as_str() {
            "G90" => self.interface.note_positioning(PositioningMode::Absolute),
            "G91" => self.interface.note_positioning(PositioningMode::Relative),
            _ => {}
        }

        let bytes = self.interface.encode(line, true);
        let _ = self.link_tx.send(LinkCommand::TxData(bytes));
        let _ = self.event_tx.send(SenderEvent::DataOut(line.to_string()));

        // One opportunistic query after a write in a quiescent state, so the
        // status display tracks single commands without continuous polling.
        if self.auto_status && self.interface.status().state.is_settled() {
            self.query_status();
        }
    }

    /// Transmit a single-byte realtime command, bypassing framing and
    /// buffer accounting.
    fn send_realtime(&mut self, command: &str) {
        let bytes = self.interface.encode(command, true);
        let _ = self.link_tx.send(LinkCommand::TxData(bytes));
        let _ = self.event_tx.send(SenderEvent::DataOut(command.to_string()));
    }

    /// Send a status query immediately. Accounted out-of-band; freed when
    /// the status report arrives.
    fn query_status(&mut self) {
        let query = self.interface.descriptor().status_query.to_string();
        let bytes = self.interface.encode(&query, true);
        let _ = self.link_tx.send(LinkCommand::TxData(bytes));
        self.last_poll = Instant::now();
    }

    /// Repeat the status query while the machine is actively moving.
    fn poll_status(&mut self) {
        if !self.auto_status || !self.interface.status().state.is_active() {
            return;
        }
        if self.last_poll.elapsed() >= self.poll_interval {
            self.query_status();
        }
    }
}
