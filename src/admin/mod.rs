pub mod bulk;
pub mod submission;

pub use submission::{BulkReport, RateDesk, RateSubmission, SubmissionOutcome};
