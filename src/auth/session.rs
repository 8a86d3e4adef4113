use crate::account::CredentialRecord;
use crate::auth::AuthError;
use std::collections::HashMap;

/// Raw authentication material harvested from the browser after login
///
/// Artifacts are what the establisher returns; they become part of a
/// [`CredentialRecord`] and only then can a [`Session`] be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionArtifacts {
    /// Portal session token (localStorage `s_tk`, sent as the `pcuss` header)
    pub token: String,
    /// Companion user identifier (localStorage `u_info.user`)
    pub user_id: String,
    /// Cookies from the authenticated browser profile
    pub cookies: HashMap<String, String>,
}

/// An immutable snapshot of one credential's authentication state
///
/// Built from a logged-in record and passed by value to the fetch layer.
/// There is no ambient "current session"; whoever holds a `Session` can
/// make requests with it, and rotation simply hands out a different one.
#[derive(Debug, Clone)]
pub struct Session {
    pub handle: String,
    pub token: String,
    pub user_id: String,
    pub cookies: HashMap<String, String>,
}

impl Session {
    /// Builds a session from a record that has completed login
    ///
    /// # Returns
    /// `AuthError::IncompleteArtifacts` if the record is not logged in or
    /// is missing the token or user id.
    pub fn from_record(record: &CredentialRecord) -> Result<Self, AuthError> {
        if !record.is_logged_in {
            return Err(AuthError::IncompleteArtifacts(format!(
                "{} has not completed login",
                record.handle
            )));
        }
        if record.token.is_empty() {
            return Err(AuthError::IncompleteArtifacts(format!(
                "{} has no session token",
                record.handle
            )));
        }
        if record.user_id.is_empty() {
            return Err(AuthError::IncompleteArtifacts(format!(
                "{} has a token but no user id",
                record.handle
            )));
        }
        Ok(Self {
            handle: record.handle.clone(),
            token: record.token.clone(),
            user_id: record.user_id.clone(),
            cookies: record.cookies.clone(),
        })
    }

    /// Renders the cookie map as a `Cookie` header value
    pub fn cookie_header(&self) -> String {
        let mut pairs: Vec<String> = self
            .cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        pairs.sort();
        pairs.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logged_in_record() -> CredentialRecord {
        let mut record = CredentialRecord::new("13800000001", None);
        record.apply_artifacts(SessionArtifacts {
            token: "tok-123".to_string(),
            user_id: "user-1".to_string(),
            cookies: HashMap::from([("SESSION".to_string(), "abc".to_string())]),
        });
        record
    }

    #[test]
    fn test_session_from_logged_in_record() {
        let session = Session::from_record(&logged_in_record()).unwrap();
        assert_eq!(session.handle, "13800000001");
        assert_eq!(session.token, "tok-123");
        assert_eq!(session.user_id, "user-1");
    }

    #[test]
    fn test_session_requires_login() {
        let record = CredentialRecord::new("13800000001", None);
        assert!(matches!(
            Session::from_record(&record).unwrap_err(),
            AuthError::IncompleteArtifacts(_)
        ));
    }

    #[test]
    fn test_token_without_user_id_is_incomplete() {
        let mut record = logged_in_record();
        record.user_id = String::new();
        assert!(matches!(
            Session::from_record(&record).unwrap_err(),
            AuthError::IncompleteArtifacts(_)
        ));
    }

    #[test]
    fn test_cookie_header_is_sorted() {
        let mut record = logged_in_record();
        record
            .cookies
            .insert("aaa".to_string(), "1".to_string());
        let session = Session::from_record(&record).unwrap();
        assert_eq!(session.cookie_header(), "SESSION=abc; aaa=1");
    }
}
