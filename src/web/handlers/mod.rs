pub mod alerts;
pub mod events;
pub mod filters;
pub mod status;
