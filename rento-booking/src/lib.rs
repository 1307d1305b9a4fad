pub mod machine;
pub mod orchestrator;

pub use machine::{can_transition, validate_transition, Actor};
pub use orchestrator::{BookingOrchestrator, CreateBookingRequest, CreatedBooking, Repositories};
