use axum::http::HeaderMap;

use crate::error::ApiError;

/// Extracts the bearer token from the Authorization header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("authorization")
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Not authenticated".to_string()))?
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))
}

/// Pulls the document id out of a stored link such as
/// `https://docs.google.com/spreadsheets/d/<id>/edit`.
pub fn file_id_from_link(link: &str) -> Option<&str> {
    let (_, rest) = link.split_once("/d/")?;
    let id = rest.split('/').next()?;
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_is_extracted() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn missing_and_malformed_headers_are_unauthorized() {
        let headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());
    }

    #[test]
    fn file_id_is_parsed_from_links() {
        assert_eq!(
            file_id_from_link("https://docs.google.com/spreadsheets/d/sheet123/edit"),
            Some("sheet123")
        );
        assert_eq!(
            file_id_from_link("https://docs.google.com/forms/d/form456/edit"),
            Some("form456")
        );
        assert_eq!(file_id_from_link("https://docs.google.com/forms/form456"), None);
        assert_eq!(file_id_from_link("https://docs.google.com/forms/d//edit"), None);
    }
}
