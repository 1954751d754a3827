//! Incident search: filter construction from query parameters and pagination
//!
//! ```
//! use incident_tracker::search::{IncidentFilter, Pagination, PaginationParams};
//! use std::collections::HashMap;
//!
//! let mut params = HashMap::new();
//! params.insert("title".to_string(), "database".to_string());
//! params.insert("tags".to_string(), "db,storage".to_string());
//!
//! let filter = IncidentFilter::from_params(&params);
//! assert_eq!(filter.conditions().len(), 2);
//!
//! let page = Pagination::from_params(&PaginationParams::default());
//! assert_eq!((page.page, page.limit, page.skip), (1, 10, 0));
//! ```

mod filter;
mod pagination;

pub use filter::{Condition, Field, IncidentFilter};
pub use pagination::{Pagination, PaginationParams, DEFAULT_LIMIT, DEFAULT_PAGE, MAX_LIMIT};
