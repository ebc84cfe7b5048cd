use crate::error::ApiError;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

/// Builds the default headers that authorize every Data API request.
///
/// The GA4 Data API accepts an OAuth2 access token with the
/// `analytics.readonly` scope as a bearer credential.
pub fn bearer_headers(access_token: &str) -> Result<HeaderMap, ApiError> {
    let token = access_token.trim();
    if token.is_empty() {
        return Err(ApiError::NotConfigured("missing access token".to_string()));
    }

    let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
        .map_err(|e| ApiError::NotConfigured(format!("access token is not a valid header: {}", e)))?;
    value.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, value);
    Ok(headers)
}
