use rento_core::booking::{Booking, BookingStatus};
use rento_core::{CoreError, CoreResult};
use uuid::Uuid;

/// Who is asking for a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(Uuid),
    /// Scheduled jobs and other platform-initiated changes
    System,
}

impl Actor {
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Actor::User(id) => Some(*id),
            Actor::System => None,
        }
    }

    fn is(&self, user_id: Uuid) -> bool {
        *self == Actor::User(user_id)
    }
}

/// Legal targets from each status. Terminal statuses have none.
pub fn allowed_transitions(from: BookingStatus) -> &'static [BookingStatus] {
    use BookingStatus::*;
    match from {
        Requested => &[Approved, Declined, AutoDeclined, Cancelled],
        Approved => &[Active, Cancelled],
        Active => &[Completed, Disputed, Cancelled],
        Disputed => &[Resolved],
        Declined | AutoDeclined | Completed | Cancelled | Resolved => &[],
    }
}

pub fn can_transition(from: BookingStatus, to: BookingStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

pub fn is_terminal(status: BookingStatus) -> bool {
    allowed_transitions(status).is_empty()
}

/// Check the transition table, then the role guard for the target status.
/// Pure: nothing is persisted.
pub fn validate_transition(
    from: BookingStatus,
    to: BookingStatus,
    actor: Actor,
    booking: &Booking,
) -> CoreResult<()> {
    if !can_transition(from, to) {
        return Err(CoreError::InvalidTransition { from, to });
    }

    match to {
        BookingStatus::Approved | BookingStatus::Declined => {
            if !actor.is(booking.owner_id) {
                return Err(CoreError::Forbidden(format!(
                    "Only the listing owner can move a booking to {}",
                    to
                )));
            }
        }
        BookingStatus::Cancelled => {
            if !actor.is(booking.renter_id) && !actor.is(booking.owner_id) {
                return Err(CoreError::Forbidden(
                    "Only the renter or the owner can cancel this booking".into(),
                ));
            }
        }
        _ => {}
    }

    Ok(())
}
