pub mod orchestrator;
pub mod request;

pub use orchestrator::ClockInOrchestrator;
pub use request::{ClockAction, ClockInOutcome, ClockInReceipt, ClockInRequest, ClockOutReceipt};
