//! Example surveys used by the tests and docs.
//!
//! Some are written as JSON documents, others are built through the
//! programmatic API, so both paths get exercised.

pub mod health_check;
pub mod page_sequence;
pub mod shuffle;
pub mod survey_end;

pub use health_check::{HEALTH_CHECK_JSON, health_check};
pub use page_sequence::page_sequence;
pub use shuffle::{flat_block, nested_blocks};
pub use survey_end::{nested_survey_ends, without_survey_end};
