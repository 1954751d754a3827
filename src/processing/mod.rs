mod human_id;
mod processor;

pub use human_id::{date_prefix, HumanIdGenerator};
pub use processor::{IncidentPage, IncidentProcessor};
