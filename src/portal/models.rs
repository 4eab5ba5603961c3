//! Wire models for the portal and OpenID discovery endpoints

use serde::{Deserialize, Serialize};

/// Body of `GET {host}/index_json`
#[derive(Debug, Clone, Deserialize)]
pub struct IndexJson {
    #[serde(rename = "LoginResult", default)]
    pub login_result: String,

    #[serde(rename = "SessionID")]
    pub session_id: String,

    #[serde(rename = "ApiVersion", default)]
    pub api_version: Option<i32>,

    #[serde(default)]
    pub oidc_test_mode: Option<bool>,

    /// Absent on portals without OpenID login
    #[serde(default)]
    pub oidc_providers: Option<Vec<OpenIdProvider>>,
}

/// An identity provider the portal accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenIdProvider {
    pub name: String,
    pub client_id: String,
    /// URL of the provider's discovery document
    pub configuration: String,
    pub scope: String,
}

/// The parts of an OpenID discovery document the flow needs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OpenIdConfiguration {
    #[serde(default)]
    pub issuer: Option<String>,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
}

/// JSON carried in the `payload` form field of the portal login request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginPayload<'a> {
    pub configuration: &'a str,
    pub client_id: &'a str,
    pub access_token: &'a str,
    pub session_id: &'a str,
    pub id_token: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_json_with_providers() {
        let json = r#"{
            "LoginResult": "Failed",
            "SessionID": "sess-1",
            "ApiVersion": 19,
            "oidc_providers": [
                {"name": "MPASSid", "client_id": "abc", "configuration": "https://idp.example/.well-known/openid-configuration", "scope": "openid"}
            ]
        }"#;
        let index: IndexJson = serde_json::from_str(json).unwrap();
        assert_eq!(index.session_id, "sess-1");
        assert_eq!(index.api_version, Some(19));
        let providers = index.oidc_providers.unwrap();
        assert_eq!(providers[0].client_id, "abc");
    }

    #[test]
    fn test_index_json_requires_session_id() {
        let json = r#"{"LoginResult": "Failed", "ApiVersion": 19}"#;
        assert!(serde_json::from_str::<IndexJson>(json).is_err());
    }

    #[test]
    fn test_login_payload_keys() {
        let payload = LoginPayload {
            configuration: "conf",
            client_id: "cid",
            access_token: "at",
            session_id: "sid",
            id_token: "it",
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "configuration": "conf",
                "clientId": "cid",
                "accessToken": "at",
                "sessionId": "sid",
                "idToken": "it",
            })
        );
    }
}
