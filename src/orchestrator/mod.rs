pub mod gates;
pub mod machine;
pub mod worker;

pub use gates::{ApprovalDecision, ApprovalGate, ConsoleGate};
pub use machine::{StateMachine, WorkflowInstance, instance_from_claim, parse_fix_list};
pub use worker::{ExternalWorker, PhaseInput, ProcessWorker, WorkerOutcome, WorkerStatus};
