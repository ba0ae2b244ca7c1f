/// Failures surfaced by the persistence layer.
///
/// `Conflict` signals a conditional write that lost the version race; callers
/// decide whether to retry. `Unavailable` covers unreachable or timed-out
/// backends and is never silently retried for mutations.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("conditional write conflict: {0}")]
    Conflict(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("stored data could not be decoded: {0}")]
    Data(String),
}

impl RepoError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, RepoError::Conflict(_))
    }
}
