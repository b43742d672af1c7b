//! Shared primitive types used across the seeding pipeline.

/// Stable group identifier, `G001`, `G002`, ...
pub type GroupId = String;

/// Customer identifier as it appears in the source data (trimmed).
pub type CustomerId = String;

/// Loan identifier; also the participant id in the task join.
pub type LoanId = String;

/// Format the stable identifier for the group at 0-based `index`.
pub fn group_id(index: usize) -> GroupId {
    format!("G{:03}", index + 1)
}
