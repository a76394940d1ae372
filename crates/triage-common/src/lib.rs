//! Shared domain types for the triage service.
//!
//! Everything in this crate is plain data: the conversation transcript, the
//! two shapes a model reply can take, the persisted assessment record and the
//! verification report. Behaviour (phase selection, contract validation,
//! backend invocation) lives in the `triage` crate.

pub mod assessment;
pub mod response;
pub mod transcript;
pub mod verification;

pub use assessment::{Assessment, AssessmentPage, AssessmentQuery, parse_timestamp};
pub use response::{Analysis, AnalysisItem, ModelResponse, Question};
pub use transcript::{Exchange, Transcript};
pub use verification::{
    PatientContext, VerificationOutcome, VerificationReport, VerificationRequest,
};
