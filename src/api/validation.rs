use validator::Validate;

use crate::api::errors::ApiError;

/// Runs the derived validators on a request body.
pub(crate) fn validate_payload<T: Validate>(payload: &T) -> Result<(), ApiError> {
    payload.validate().map_err(ApiError::from)
}

pub(crate) fn validate_page(skip: i64, limit: i64) -> Result<(), ApiError> {
    if skip < 0 {
        return Err(ApiError::validation("skip", "skip must be non-negative"));
    }
    if !(1..=1000).contains(&limit) {
        return Err(ApiError::validation("limit", "limit must be within 1..=1000"));
    }
    Ok(())
}
