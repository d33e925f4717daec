//! Case conversion between attribute names and API field names
//!
//! Attributes use snake_case (e.g., `authorizer_result_ttl_in_seconds`).
//! API Gateway patch operations address fields by JSON path in camelCase
//! (e.g., `/authorizerResultTtlInSeconds`).

/// Convert snake_case to CamelCase (PascalCase)
/// e.g., "identity_source" -> "IdentitySource"
pub fn to_camel_case(s: &str) -> String {
    s.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect()
}

/// Convert snake_case to lowerCamelCase
/// e.g., "identity_source" -> "identitySource"
pub fn to_lower_camel_case(s: &str) -> String {
    let camel = to_camel_case(s);
    let mut chars = camel.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_lowercase().chain(chars).collect(),
    }
}

/// JSON patch path for an attribute, e.g. "ttl_in_seconds" -> "/ttlInSeconds"
pub fn patch_path(attribute: &str) -> String {
    format!("/{}", to_lower_camel_case(attribute))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_camel_case() {
        assert_eq!(to_camel_case("name"), "Name");
        assert_eq!(to_camel_case("authorizer_uri"), "AuthorizerUri");
    }

    #[test]
    fn test_to_lower_camel_case() {
        assert_eq!(to_lower_camel_case("name"), "name");
        assert_eq!(
            to_lower_camel_case("authorizer_result_ttl_in_seconds"),
            "authorizerResultTtlInSeconds"
        );
        assert_eq!(to_lower_camel_case(""), "");
    }

    #[test]
    fn test_patch_path() {
        assert_eq!(patch_path("identity_source"), "/identitySource");
    }
}
