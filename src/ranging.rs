//! Ultrasonic Ranging
//!
//! HC-SR04 time-of-flight ranging on one timer channel: the main loop fires
//! a trigger pulse, the capture interrupt latches both echo edges, and the
//! main loop turns the echo width into a distance.

pub mod alert;
pub mod distance;
pub mod rangefinder;
pub mod session;

pub use alert::{AlertState, ProximityAlert};
pub use distance::{Measurement, US_PER_CM};
pub use rangefinder::{init_echo_timer, Rangefinder, RangingConfig, RangingEvent};
pub use session::{EdgeOutcome, RangingSession, RangingState};
