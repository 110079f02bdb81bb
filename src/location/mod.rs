pub mod controller;
pub mod loop_worker;
pub mod provider;

pub use controller::{LocationTrackingController, TrackingHandle};
pub use provider::{CoordinateProvider, LocationSink};
