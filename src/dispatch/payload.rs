//! Repository extraction from webhook payloads.

use serde::Deserialize;

use crate::dispatch::DispatchError;

#[derive(Debug, Deserialize)]
struct Payload {
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
struct Repository {
    namespace: Option<String>,
    path: Option<String>,
    full_name: Option<String>,
}

/// Pull `(org, repo)` out of a JSON webhook payload.
///
/// Prefers `repository.namespace` + `repository.path`, then falls back to
/// splitting `repository.full_name` at its first `/`.
pub fn extract_repository(payload: &[u8]) -> Result<(String, String), DispatchError> {
    let payload: Payload = serde_json::from_slice(payload)?;
    let repository = payload.repository.ok_or(DispatchError::MissingRepository)?;

    if let (Some(org), Some(repo)) = (&repository.namespace, &repository.path) {
        if !org.is_empty() && !repo.is_empty() {
            return Ok((org.clone(), repo.clone()));
        }
    }

    repository
        .full_name
        .as_deref()
        .and_then(|name| name.split_once('/'))
        .filter(|(org, repo)| !org.is_empty() && !repo.is_empty())
        .map(|(org, repo)| (org.to_string(), repo.to_string()))
        .ok_or(DispatchError::MissingRepository)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_and_path() {
        let payload = br#"{"repository":{"namespace":"openeuler","path":"kernel","full_name":"x/y"}}"#;
        assert_eq!(
            extract_repository(payload).unwrap(),
            ("openeuler".to_string(), "kernel".to_string())
        );
    }

    #[test]
    fn test_full_name_fallback() {
        let payload = br#"{"repository":{"full_name":"src-openeuler/gcc"}}"#;
        assert_eq!(
            extract_repository(payload).unwrap(),
            ("src-openeuler".to_string(), "gcc".to_string())
        );
    }

    #[test]
    fn test_missing_repository() {
        assert!(matches!(
            extract_repository(br#"{"action":"open"}"#),
            Err(DispatchError::MissingRepository)
        ));
        assert!(matches!(
            extract_repository(br#"{"repository":{"full_name":"noslash"}}"#),
            Err(DispatchError::MissingRepository)
        ));
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            extract_repository(b"not json"),
            Err(DispatchError::Payload(_))
        ));
    }
}
