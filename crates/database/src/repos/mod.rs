//! Database repository implementations

pub mod attendee_repository;

pub use attendee_repository::AttendeeRepository;
