//! TokenGuard core domain types
//!
//! Shared vocabulary for every other crate in the workspace:
//!
//! - [`request::ActionRequest`] - what the caller wants to do (transfer or corporate action)
//! - [`check::CheckResult`] - one rule check's verdict and risk contribution
//! - [`decision::Decision`] - the tri-state outcome of an evaluation
//! - [`alert::Alert`] - what subscribers receive when a decision is severe enough
//! - [`record::RecordSink`] - append-only store-write interface for decisions and alerts

pub mod alert;
pub mod check;
pub mod decision;
pub mod error;
pub mod record;
pub mod request;

pub use alert::{Alert, AlertType, Severity};
pub use check::CheckResult;
pub use decision::{Decision, DecisionStatus};
pub use error::{SinkError, SinkResult, ValidationError, ValidationResult};
pub use record::{ComplianceRecord, JsonlSink, MemorySink, RecordSink};
pub use request::{
    Action, ActionRequest, CorporateActionRequest, CorporateActionType, RequestKind,
    TransferRequest,
};
