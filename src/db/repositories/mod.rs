mod location_samples;
mod notifications;
mod sessions;
mod timesheets;
