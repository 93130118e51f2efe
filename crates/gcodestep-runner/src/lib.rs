//! gcodestep-runner: the run/step/break execution engine
//!
//! Couples a program session (lines, program counter, breakpoints) to a
//! firmware dialect over the serial transport. The engine owns the only
//! writer of G-code toward the machine interface and paces transmission by
//! the dialect's receive-buffer accounting, so a program can be run,
//! single-stepped, or suspended at breakpoints without overrunning the
//! controller.

pub mod engine;
pub mod program;
pub mod session;

pub use engine::{spawn_engine, EngineOptions, EngineState};
pub use program::ExecutionSession;
pub use session::SenderSession;
