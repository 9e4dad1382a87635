/// Result of a pipeline stage that recovers from its own failures.
///
/// Stages never propagate errors to the caller. A missing face is `Absent`,
/// anything unexpected (I/O, decode, encode) is `Failed` with the reason that
/// was already reported to the invocation's [`crate::Reporter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The stage produced a value.
    Ok(T),
    /// The stage ran cleanly but found nothing to produce.
    Absent,
    /// The stage hit an unexpected error.
    Failed(String),
}

impl<T> Outcome<T> {
    /// Returns the produced value, discarding the absent/failed distinction.
    pub fn ok(self) -> Option<T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Absent | Outcome::Failed(_) => None,
        }
    }

    /// Borrowing variant of [`Outcome::ok`].
    pub fn as_ok(&self) -> Option<&T> {
        match self {
            Outcome::Ok(value) => Some(value),
            Outcome::Absent | Outcome::Failed(_) => None,
        }
    }

    /// `true` if the stage produced a value.
    pub fn is_ok(&self) -> bool {
        matches!(self, Outcome::Ok(_))
    }

    /// `true` if the stage ran but produced nothing.
    pub fn is_absent(&self) -> bool {
        matches!(self, Outcome::Absent)
    }

    /// `true` if the stage hit an unexpected error.
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Outcome::Ok(value),
            None => Outcome::Absent,
        }
    }
}
