use crate::domain::product::Product;
use crate::errors::DomainError;

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

pub fn validate_rating(rating: i64) -> Result<u8, DomainError> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        // In range 1..=5, so the narrowing cannot truncate.
        Ok(rating as u8)
    } else {
        Err(DomainError::RatingOutOfRange(rating))
    }
}

/// Folds one rating into a running mean. A product with no prior rating (or a
/// zero count) takes the new rating as its average.
pub fn fold_rating(current: Option<f64>, count: u32, rating: u8) -> (f64, u32) {
    let rating = f64::from(rating);
    match current {
        Some(average) if count > 0 => {
            let next_count = count.saturating_add(1);
            let total = average * f64::from(count) + rating;
            (total / f64::from(next_count), next_count)
        }
        _ => (rating, 1),
    }
}

pub fn apply_rating(product: &mut Product, rating: u8) {
    let (average, count) = fold_rating(product.rating, product.rating_count, rating);
    product.rating = Some(average);
    product.rating_count = count;
}
