//! Event and command vocabulary exchanged between components
//!
//! All cross-component communication travels over one-directional FIFO
//! channels carrying these tagged payloads. Each adjacent pair of components
//! (transport thread <-> execution engine <-> consumer) has its own pair of
//! channels created at session setup and torn down at session end.

use crate::data::{AxisCoords, ControllerStatus};

/// Events emitted by the serial transport task toward the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// The port was opened successfully
    PortOpen,
    /// The port was closed in an orderly fashion
    PortClose,
    /// An I/O failure occurred; the payload is the diagnostic text
    Abort(String),
    /// The transport task is terminating
    Exit,
    /// One complete newline-delimited frame, stripped of its terminator
    RxData(String),
}

/// Commands accepted by the serial transport task.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkCommand {
    /// Write exactly these bytes to the port
    TxData(Vec<u8>),
    /// Close the port and terminate the task
    Exit,
}

/// Events emitted by the execution engine toward the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum SenderEvent {
    /// Serial port opened
    PortOpen,
    /// Serial port closed
    PortClose,
    /// Transport failure; the session is dead until reconnected
    Abort(String),
    /// Raw line received from the controller
    DataIn(String),
    /// Line transmitted to the controller
    DataOut(String),
    /// Decoded status report
    StatusUpdate(ControllerStatus),
    /// Human-readable diagnostic (firmware error text, banner, config echo)
    Info(String),
    /// Program counter advanced to this line index
    PcUpdate(usize),
    /// A breakpoint line index was reached
    HitBreakpoint,
    /// A MSG directive was reached; the payload is its text
    HitMessage(String),
    /// The program ran to completion
    RunEnd,
    /// A single step completed
    StepEnd,
    /// The engine terminated
    Exit,
}

/// Commands accepted by the execution engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerCommand {
    /// Run a program from `pc`, honoring `breakpoints`
    Run {
        /// Source lines of the program.
        lines: Vec<String>,
        /// Initial program counter.
        pc: usize,
        /// Line indices that suspend the run.
        breakpoints: Vec<usize>,
    },
    /// Execute exactly one non-comment line starting at `pc`
    Step {
        /// Source lines of the program.
        lines: Vec<String>,
        /// Initial program counter.
        pc: usize,
        /// Line indices that suspend the run.
        breakpoints: Vec<usize>,
    },
    /// Stop the current session and return to Idle
    Stop,
    /// Send a single line without waiting for its acknowledgment
    Send(String),
    /// Send a single line and defer further manual sends until acknowledged
    SendWithAck(String),
    /// Absolute coordinated move (G1)
    Move(AxisCoords),
    /// Relative coordinated move (G91 preamble, restored afterward)
    MoveRelative(AxisCoords),
    /// Absolute rapid move (G0)
    RapidMove(AxisCoords),
    /// Relative rapid move
    RapidMoveRelative(AxisCoords),
    /// Set the work coordinate origin for the given axes (G92)
    SetAxis(AxisCoords),
    /// Home the given axes (empty string homes all)
    Home(String),
    /// Run a probe cycle on one axis
    Probe {
        /// Axis letter to probe along.
        axis: char,
        /// Probing feed rate.
        feed_rate: f64,
        /// Maximum probe travel.
        max_travel: f64,
    },
    /// Request a status report immediately
    GetStatus,
    /// Cycle start / resume (realtime)
    CycleStart,
    /// Feed hold (realtime)
    FeedHold,
    /// Flush the controller's planner and receive queues
    QueueFlush,
    /// Soft-reset the controller
    Reset,
    /// Clear an alarm lockout
    ClearAlarm,
    /// Enable or disable periodic status polling
    SetAutoStatus(bool),
    /// Request system/build information
    GetSystemInfo,
    /// Shut down the engine and transport
    Exit,
}
