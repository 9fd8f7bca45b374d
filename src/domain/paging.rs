//! Pagination window math shared by the list endpoints.

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Clamp raw query values to a usable (page, per_page) pair.
pub fn window(page: Option<u32>, per_page: Option<u32>) -> (i64, i64) {
    let page = i64::from(page.unwrap_or(1).max(1));
    let per_page = per_page
        .map(i64::from)
        .unwrap_or(DEFAULT_PER_PAGE)
        .clamp(1, MAX_PER_PAGE);
    (page, per_page)
}

pub fn offset(page: i64, per_page: i64) -> i64 {
    (page - 1) * per_page
}

/// Total page count for a result set (at least 1 so clients always get a
/// valid `pages` value).
pub fn pages(total: i64, per_page: i64) -> i64 {
    ((total + per_page - 1) / per_page).max(1)
}
