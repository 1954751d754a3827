mod service;

pub use service::{LoginResponse, UserPage, UserService};
