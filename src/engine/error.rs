use crate::model::{format_minute, Minute, Span};

use super::index::BookedInterval;

/// Why a placement was refused. Both kinds are recoverable by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// The candidate leaves the working day.
    OutOfWindow { candidate: Span, window: Span },
    /// The candidate collides with an existing booking on the resource.
    Overlap {
        conflict: BookedInterval,
        /// Earliest grid-aligned start that would fit, if any.
        suggestion: Option<Minute>,
    },
}

impl Rejection {
    pub fn kind(&self) -> &'static str {
        match self {
            Rejection::OutOfWindow { .. } => "out_of_window",
            Rejection::Overlap { .. } => "overlap",
        }
    }

    pub fn suggestion(&self) -> Option<Minute> {
        match self {
            Rejection::Overlap { suggestion, .. } => *suggestion,
            Rejection::OutOfWindow { .. } => None,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::OutOfWindow { candidate, window } => write!(
                f,
                "{}–{} falls outside working hours {}–{}",
                format_minute(candidate.start),
                format_minute(candidate.end),
                format_minute(window.start),
                format_minute(window.end)
            ),
            Rejection::Overlap {
                conflict,
                suggestion,
            } => {
                write!(
                    f,
                    "overlaps \"{}\" ({}–{})",
                    conflict.label,
                    format_minute(conflict.span.start),
                    format_minute(conflict.span.end)
                )?;
                if let Some(s) = suggestion {
                    write!(f, "; next free start {}", format_minute(*s))?;
                }
                Ok(())
            }
        }
    }
}

/// Outcome of validating one candidate interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// The normalized `[start, end)` that may be written.
    Accepted(Span),
    Rejected(Rejection),
}

impl Placement {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Placement::Accepted(_))
    }

    pub fn into_result(self) -> Result<Span, Rejection> {
        match self {
            Placement::Accepted(span) => Ok(span),
            Placement::Rejected(r) => Err(r),
        }
    }
}
