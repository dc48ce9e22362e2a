use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Input was empty after trimming.
    #[error("join target is empty")]
    InvalidFormat,
}

/// Resolve a user-supplied join token to a lookup candidate.
///
/// Accepts three forms, tried in order:
/// 1. A pasted invite link containing a `/join/{id}` path segment, where `{id}`
///    is a canonical 36-character UUID — the id is extracted.
/// 2. A bare UUID-shaped string — used directly.
/// 3. Anything else non-empty — passed through as an opaque invite code.
///
/// UUID candidates are normalized to lowercase since ids are stored lowercase.
pub fn resolve_join_target(input: &str) -> Result<String, ResolveError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::InvalidFormat);
    }

    if let Some(token) = extract_link_token(trimmed) {
        return Ok(token.to_ascii_lowercase());
    }

    if is_uuid_shaped(trimmed) {
        return Ok(trimmed.to_ascii_lowercase());
    }

    Ok(trimmed.to_string())
}

/// Find a `/join/{uuid}` segment anywhere in the input, case-insensitively.
fn extract_link_token(input: &str) -> Option<&str> {
    let lower = input.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(rel) = lower[search_from..].find("/join/") {
        let start = search_from + rel + "/join/".len();
        if let Some(token) = input.get(start..start + 36) {
            if is_uuid_shaped(token) {
                return Some(token);
            }
        }
        search_from = start;
    }
    None
}

/// Canonical UUID form: 8-4-4-4-12 hex groups, case-insensitive.
fn is_uuid_shaped(s: &str) -> bool {
    if s.len() != 36 || !s.is_ascii() {
        return false;
    }
    s.bytes().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => b == b'-',
        _ => b.is_ascii_hexdigit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn extracts_id_from_full_invite_link() {
        let input = format!("https://app.example/join/{}", ID);
        assert_eq!(resolve_join_target(&input).unwrap(), ID);
    }

    #[test]
    fn extracts_id_from_bare_path() {
        let input = format!("/join/{}", ID);
        assert_eq!(resolve_join_target(&input).unwrap(), ID);
    }

    #[test]
    fn extraction_is_case_insensitive() {
        let input = format!("https://app.example/JOIN/{}", ID.to_uppercase());
        assert_eq!(resolve_join_target(&input).unwrap(), ID);
    }

    #[test]
    fn link_with_trailing_path_still_extracts() {
        let input = format!("https://app.example/join/{}?ref=share", ID);
        assert_eq!(resolve_join_target(&input).unwrap(), ID);
    }

    #[test]
    fn bare_uuid_used_directly() {
        assert_eq!(resolve_join_target(ID).unwrap(), ID);
        assert_eq!(
            resolve_join_target(&ID.to_uppercase()).unwrap(),
            ID,
            "uppercase ids normalize to lowercase"
        );
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let input = format!("  {}\n", ID);
        assert_eq!(resolve_join_target(&input).unwrap(), ID);
    }

    #[test]
    fn non_uuid_input_is_an_invite_code() {
        assert_eq!(
            resolve_join_target("church-cell-7").unwrap(),
            "church-cell-7"
        );
    }

    #[test]
    fn join_path_with_short_token_falls_through_to_invite_code() {
        assert_eq!(
            resolve_join_target("/join/not-a-uuid").unwrap(),
            "/join/not-a-uuid"
        );
    }

    #[test]
    fn empty_input_is_invalid() {
        assert_eq!(resolve_join_target(""), Err(ResolveError::InvalidFormat));
        assert_eq!(resolve_join_target("   "), Err(ResolveError::InvalidFormat));
    }

    #[test]
    fn uuid_shape_rejects_wrong_hyphens_and_non_hex() {
        assert!(!is_uuid_shaped("550e8400e29b41d4a716446655440000"));
        assert!(!is_uuid_shaped("550e8400-e29b-41d4-a716-44665544000g"));
        assert!(!is_uuid_shaped("550e8400-e29b-41d4-a716-4466554400"));
    }
}
