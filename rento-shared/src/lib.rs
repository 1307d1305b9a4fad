pub mod events;
pub mod pii;

pub use events::{BookingTransitionedEvent, PaymentOperation, PaymentReconciliationEvent};
pub use pii::Masked;
