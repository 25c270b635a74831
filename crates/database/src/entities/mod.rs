//! Domain entities for the database layer

pub mod attendee;

pub use attendee::{Attendee, AttendeePatch, NewAttendee};
