use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Raw `page` / `limit` query parameters, kept as strings so bad input can
/// fall back to defaults instead of rejecting the request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Resolved pagination window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub skip: u64,
}

impl Pagination {
    pub fn new(page: u32, limit: u32) -> Self {
        let page = page.max(1);
        let limit = limit.clamp(1, MAX_LIMIT);
        Self {
            page,
            limit,
            skip: (page as u64 - 1) * limit as u64,
        }
    }

    pub fn from_params(params: &PaginationParams) -> Self {
        Self::new(
            parse_positive(params.page.as_deref()).unwrap_or(DEFAULT_PAGE),
            parse_positive(params.limit.as_deref()).unwrap_or(DEFAULT_LIMIT),
        )
    }

    /// Same derivation over a free-form parameter map
    pub fn from_map(params: &std::collections::HashMap<String, String>) -> Self {
        Self::from_params(&PaginationParams {
            page: params.get("page").cloned(),
            limit: params.get("limit").cloned(),
        })
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE, DEFAULT_LIMIT)
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u32> {
    raw.and_then(|v| v.trim().parse::<u32>().ok()).filter(|v| *v > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<&str>, limit: Option<&str>) -> PaginationParams {
        PaginationParams {
            page: page.map(str::to_string),
            limit: limit.map(str::to_string),
        }
    }

    #[test]
    fn test_defaults() {
        assert_eq!(
            Pagination::from_params(&PaginationParams::default()),
            Pagination { page: 1, limit: 10, skip: 0 }
        );
    }

    #[test]
    fn test_explicit_values() {
        assert_eq!(
            Pagination::from_params(&params(Some("3"), Some("5"))),
            Pagination { page: 3, limit: 5, skip: 10 }
        );
    }

    #[test]
    fn test_bad_input_falls_back() {
        let p = Pagination::from_params(&params(Some("abc"), Some("-4")));
        assert_eq!(p, Pagination::default());

        let p = Pagination::from_params(&params(Some("0"), Some("0")));
        assert_eq!(p, Pagination::default());
    }

    #[test]
    fn test_limit_is_capped() {
        let p = Pagination::from_params(&params(Some("2"), Some("5000")));
        assert_eq!(p.limit, MAX_LIMIT);
        assert_eq!(p.skip, MAX_LIMIT as u64);
    }
}
