/// Change-state tag of a tracked entity
///
/// State transitions:
/// ```text
/// New ────insert────> Clean
/// Clean ──mutation──> Dirty ──update──> Clean
/// any ────removal───> Removed ──delete──> (evicted)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeState {
    /// Registered in this session, not yet written
    New,

    /// Written before, mutated since the last flush
    Dirty,

    /// Scheduled for deletion
    Removed,

    /// In sync with the storage backend
    Clean,
}

impl ChangeState {
    /// Check if the entity still has work pending for the next flush
    pub fn is_pending(&self) -> bool {
        !matches!(self, ChangeState::Clean)
    }

    /// Check if the entity leaves the registry once flushed
    pub fn is_removal(&self) -> bool {
        matches!(self, ChangeState::Removed)
    }
}

impl std::fmt::Display for ChangeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeState::New => write!(f, "NEW"),
            ChangeState::Dirty => write!(f, "DIRTY"),
            ChangeState::Removed => write!(f, "REMOVED"),
            ChangeState::Clean => write!(f, "CLEAN"),
        }
    }
}
