use url::Url;

use crate::error::ApiError;

/// Input-shape validation, applied strictly after authorization and strictly
/// before the handler body runs.
pub trait Validate {
    fn validate(&self) -> Result<(), ApiError>;
}

/// Trimmed minimum length.
pub fn min_len(field: &'static str, value: &str, min: usize) -> Result<(), ApiError> {
    if value.trim().chars().count() < min {
        return Err(ApiError::validation(
            field,
            format!("must be at least {} characters", min),
        ));
    }
    Ok(())
}

pub fn non_blank(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, "must not be blank"));
    }
    Ok(())
}

/// Minimal well-formedness check: one '@' with a dot somewhere after it.
/// Real deliverability is the mail system's problem, not this API's.
pub fn email(field: &'static str, value: &str) -> Result<(), ApiError> {
    let value = value.trim();
    let well_formed = match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };

    if !well_formed {
        return Err(ApiError::validation(field, "must be a valid email address"));
    }
    Ok(())
}

/// Photo URLs must parse and use http(s).
pub fn http_url(field: &'static str, value: &str) -> Result<(), ApiError> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ApiError::validation(field, "must be a valid http(s) URL")),
    }
}

pub fn http_urls(field: &'static str, values: &[String]) -> Result<(), ApiError> {
    for value in values {
        http_url(field, value)?;
    }
    Ok(())
}

pub fn password(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.chars().count() < 8 {
        return Err(ApiError::validation(field, "must be at least 8 characters"));
    }
    Ok(())
}
