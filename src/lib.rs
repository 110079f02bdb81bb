//! Clock-in core for field crews: decides when to reuse or open a work
//! session, keeps exactly one open timesheet per worker, and keeps background
//! location tracking in step with timesheet creation.

mod utils;

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod location;
pub mod models;
pub mod session;

pub use clock::{
    ClockAction, ClockInOrchestrator, ClockInOutcome, ClockInReceipt, ClockInRequest,
    ClockOutReceipt,
};
pub use config::{ClockConfig, ConfigStore, TrackingConfig};
pub use db::Database;
pub use error::{ClockInError, GatewayError, NotificationFailed, RegistryError, TrackingError};
pub use gateway::{Notification, TimesheetGateway};
pub use location::{CoordinateProvider, LocationSink, LocationTrackingController};
pub use session::SessionRegistry;
pub use utils::init_logging;
