use crate::error::{AppError, Result};

/// Result of a tree mutation.
///
/// Every mutation returns one of these instead of failing, so callers can try
/// an operation speculatively and inspect what happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    /// The tree already had the requested shape.
    SuccessNothingDone,
    /// Structurally forbidden, e.g. touching the root or mixing container kinds.
    InvalidOperation,
    ItemExists,
    CircularReference,
    /// A bulk operation completed some but not all of its steps.
    PartialSuccess,
    /// A bulk operation completed none of its steps.
    NoSuccess,
}

impl Outcome {
    /// Whether the tree now reflects (at least part of) the request.
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Outcome::Success | Outcome::SuccessNothingDone | Outcome::PartialSuccess
        )
    }

    /// Whether the tree was changed.
    pub fn changed(self) -> bool {
        matches!(self, Outcome::Success | Outcome::PartialSuccess)
    }

    /// Combine the outcomes of independent sub-operations into one.
    pub fn aggregate<I: IntoIterator<Item = Outcome>>(outcomes: I) -> Outcome {
        let mut total = 0usize;
        let mut ok = 0usize;
        let mut changed = false;
        for outcome in outcomes {
            total += 1;
            if outcome.is_success() {
                ok += 1;
            }
            changed |= outcome.changed();
        }
        if total == 0 || (ok == total && !changed) {
            Outcome::SuccessNothingDone
        } else if ok == total {
            Outcome::Success
        } else if ok > 0 {
            Outcome::PartialSuccess
        } else {
            Outcome::NoSuccess
        }
    }

    /// Translate a failed outcome into a user-facing error.
    pub fn check(self, context: impl Into<String>) -> Result<Outcome> {
        match self {
            Outcome::Success | Outcome::SuccessNothingDone | Outcome::PartialSuccess => Ok(self),
            Outcome::InvalidOperation => Err(AppError::InvalidOperation(context.into())),
            Outcome::ItemExists => Err(AppError::ItemExists(context.into())),
            Outcome::CircularReference => Err(AppError::CircularReference(context.into())),
            Outcome::NoSuccess => Err(AppError::NoSuccess(context.into())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Success => "done",
            Outcome::SuccessNothingDone => "nothing to do",
            Outcome::InvalidOperation => "not allowed",
            Outcome::ItemExists => "name already taken",
            Outcome::CircularReference => "would create a cycle",
            Outcome::PartialSuccess => "partially done",
            Outcome::NoSuccess => "nothing could be done",
        }
    }
}
