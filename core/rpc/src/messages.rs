//! Request and response bodies of unary calls.
//!
//! `Credentials` and `TokenData` from `lockbox-common` are used as-is for
//! Register and Login. Byte fields are standard base64 in JSON.

use serde::{Deserialize, Serialize};

use lockbox_common::{ResourceId, ResourceKind, ShortResourceInfo};

/// Serde adapter encoding byte fields as standard base64 strings.
pub mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: AsRef<[u8]>,
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResourceRequest {
    pub kind: ResourceKind,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub meta: Vec<u8>,
}

/// Carries a single resource id. Used by SaveResource, SaveFile,
/// DeleteResource, GetResource and GetFile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdMessage {
    pub id: ResourceId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResourcesRequest {
    pub kind: ResourceKind,
}

/// One item of a ListResources stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: ResourceId,
    #[serde(with = "base64_bytes")]
    pub meta: Vec<u8>,
}

impl From<ShortResourceInfo> for ResourceInfo {
    fn from(info: ShortResourceInfo) -> Self {
        Self {
            id: info.id,
            meta: info.meta,
        }
    }
}

impl From<ResourceInfo> for ShortResourceInfo {
    fn from(info: ResourceInfo) -> Self {
        Self {
            id: info.id,
            meta: info.meta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetResourceResponse {
    pub kind: ResourceKind,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    #[serde(with = "base64_bytes")]
    pub meta: Vec<u8>,
}

/// Body of a successful call with nothing to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

#[cfg(test)]
mod tests {
    use super::*;
    use lockbox_common::{Credentials, TokenData};

    #[test]
    fn test_bytes_are_base64() {
        let req = SaveResourceRequest {
            kind: ResourceKind::CredentialPair,
            data: b"{}".to_vec(),
            meta: b"work".to_vec(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["kind"], "credential_pair");
        assert_eq!(json["data"], "e30=");
        assert_eq!(json["meta"], "d29yaw==");
    }

    #[test]
    fn test_invalid_base64_rejected() {
        let json = r#"{"kind":"file","data":"!!","meta":""}"#;
        assert!(serde_json::from_str::<SaveResourceRequest>(json).is_err());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"{"kind":"undefined"}"#;
        assert!(serde_json::from_str::<ListResourcesRequest>(json).is_err());
    }

    #[test]
    fn test_auth_bodies() {
        let creds: Credentials =
            serde_json::from_str(r#"{"login":"a","password":"b"}"#).unwrap();
        assert_eq!(creds.login, "a");

        let json = r#"{"token":"t","expires_at":"2030-01-01T00:00:00Z"}"#;
        let token: TokenData = serde_json::from_str(json).unwrap();
        assert_eq!(token.expires_at.timestamp(), 1_893_456_000);
    }
}
