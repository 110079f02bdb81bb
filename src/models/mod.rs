pub mod coordinate;
pub mod ids;
pub mod session;
pub mod timesheet;

pub use coordinate::{Coordinate, LocationSample};
pub use ids::{SessionId, TimesheetId, WorkerId};
pub use session::Session;
pub use timesheet::{
    PriorTimesheetClosure, Timesheet, TimesheetPayload, VariantFields, WorkDetails, WorkType,
    WorkVariant,
};
