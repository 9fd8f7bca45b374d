//! Stock and rating arithmetic.

use crate::error::ApiError;

/// Products at or below this count show up in the low-stock dashboard bucket.
pub const LOW_STOCK_THRESHOLD: i32 = 5;

/// Order-creation check for one line: quantity must be positive and covered
/// by the current stock count. Creation only validates; stock moves at
/// payment time.
pub fn validate_line(name: &str, qty: i32, count_in_stock: i32) -> Result<(), ApiError> {
    if qty < 1 {
        return Err(ApiError::InvalidQuantity);
    }
    if qty > count_in_stock {
        return Err(ApiError::InsufficientStock(name.to_string()));
    }
    Ok(())
}

/// Unweighted mean of review ratings, scaled by 100 and rounded half-up.
pub fn mean_rating(rating_sum: i64, review_count: i64) -> i32 {
    if review_count == 0 {
        return 0;
    }
    ((rating_sum * 100 + review_count / 2) / review_count) as i32
}
