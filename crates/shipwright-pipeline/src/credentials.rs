//! Azure service-principal credentials.
//!
//! The secret is the JSON blob produced by
//! `az ad sp create-for-rbac --sdk-auth`; only the four identity fields are
//! read, everything else in the blob is ignored.

use serde::Deserialize;

use crate::error::{PipelineError, Result};

/// Service-principal credentials for the Azure CLI.
#[derive(Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AzureCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub subscription_id: String,
}

impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

impl AzureCredentials {
    /// Parse the credentials secret.
    pub fn from_json(secret: &str) -> Result<Self> {
        let creds: AzureCredentials = serde_json::from_str(secret)
            .map_err(|e| PipelineError::Credentials(format!("malformed JSON: {e}")))?;

        let missing: Vec<&str> = [
            ("clientId", &creds.client_id),
            ("clientSecret", &creds.client_secret),
            ("tenantId", &creds.tenant_id),
            ("subscriptionId", &creds.subscription_id),
        ]
        .iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| *k)
        .collect();

        if !missing.is_empty() {
            return Err(PipelineError::Credentials(format!(
                "empty field(s): {}",
                missing.join(", ")
            )));
        }
        Ok(creds)
    }

    /// Read and parse the credentials from an environment variable.
    pub fn from_env(var: &str) -> Result<Option<Self>> {
        match std::env::var(var) {
            Ok(v) if !v.trim().is_empty() => Self::from_json(&v).map(Some),
            _ => Ok(None),
        }
    }

    /// argv for `az login` as the service principal.
    pub fn login_argv(&self) -> Vec<String> {
        vec![
            "az".to_string(),
            "login".to_string(),
            "--service-principal".to_string(),
            "--username".to_string(),
            self.client_id.clone(),
            "--password".to_string(),
            self.client_secret.clone(),
            "--tenant".to_string(),
            self.tenant_id.clone(),
            "--output".to_string(),
            "none".to_string(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDK_AUTH: &str = r#"{
        "clientId": "11111111-aaaa",
        "clientSecret": "s3cr3t",
        "subscriptionId": "22222222-bbbb",
        "tenantId": "33333333-cccc",
        "activeDirectoryEndpointUrl": "https://login.microsoftonline.com"
    }"#;

    #[test]
    fn test_parse_sdk_auth_blob() {
        let creds = AzureCredentials::from_json(SDK_AUTH).unwrap();
        assert_eq!(creds.client_id, "11111111-aaaa");
        assert_eq!(creds.tenant_id, "33333333-cccc");
        assert_eq!(creds.subscription_id, "22222222-bbbb");
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = AzureCredentials::from_json(SDK_AUTH).unwrap();
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("s3cr3t"));
        assert!(debug.contains("11111111-aaaa"));
    }

    #[test]
    fn test_missing_field_rejected() {
        let err = AzureCredentials::from_json(r#"{"clientId": "a"}"#).unwrap_err();
        assert!(matches!(err, PipelineError::Credentials(_)));
    }

    #[test]
    fn test_empty_field_rejected() {
        let blob = r#"{"clientId":"a","clientSecret":"","tenantId":"t","subscriptionId":"s"}"#;
        let err = AzureCredentials::from_json(blob).unwrap_err();
        assert!(err.to_string().contains("clientSecret"));
    }

    #[test]
    fn test_login_argv() {
        let creds = AzureCredentials::from_json(SDK_AUTH).unwrap();
        let argv = creds.login_argv();
        assert_eq!(&argv[..3], &["az", "login", "--service-principal"]);
        assert!(argv.contains(&"s3cr3t".to_string()));
        assert!(argv.contains(&"33333333-cccc".to_string()));
    }
}
