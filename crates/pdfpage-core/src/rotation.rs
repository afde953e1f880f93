//! Page rotation arithmetic.

use crate::error::PageError;

/// Normalize an angle in degrees into `[0, 360)`.
pub fn normalize_rotation(angle: i64) -> i64 {
    angle.rem_euclid(360)
}

/// Check that `angle` is a multiple of 90 degrees.
///
/// # Errors
///
/// Returns [`PageError::InvalidArgument`] otherwise.
pub fn check_angle(angle: i64) -> Result<(), PageError> {
    if angle % 90 != 0 {
        return Err(PageError::InvalidArgument(format!(
            "rotation angle {angle} is not a multiple of 90"
        )));
    }
    Ok(())
}

/// Compute a page's new `/Rotate` value.
///
/// With `relative`, `angle` is added to `current`; otherwise it replaces it.
/// The result is normalized into `[0, 360)`. Adding 90 rotates the page
/// clockwise by 90 degrees.
///
/// # Errors
///
/// Returns [`PageError::InvalidArgument`] if `angle` is not a multiple of 90.
pub fn rotated(current: i64, angle: i64, relative: bool) -> Result<i64, PageError> {
    check_angle(angle)?;
    let base = if relative {
        normalize_rotation(current) + normalize_rotation(angle)
    } else {
        angle
    };
    Ok(normalize_rotation(base))
}
