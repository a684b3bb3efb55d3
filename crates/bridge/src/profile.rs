//! Connection profiles and property extraction
//!
//! A profile is a named record describing how to reach a remote store. Binders
//! never look at the concrete record type; they consume the flat
//! [`PropertyMap`] produced by [`extract`], which walks the serialized form of
//! the record. Fields marked `#[serde(skip)]` are runtime-only and are never
//! emitted.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// Attribute name -> stringified value
pub type PropertyMap = HashMap<String, String>;

/// A connection profile as seen by the resolver
pub trait ConnectionDetails: Send + Sync + fmt::Debug {
    /// Logical name, used as the pvfs authority
    fn name(&self) -> &str;

    /// Type tag selecting the binder ("s3", "hcp", "hdfs", ...)
    fn connection_type(&self) -> &str;

    /// Persistable attributes flattened to strings
    fn properties(&self) -> Result<PropertyMap>;

    /// File the profile was loaded from, if any
    fn source(&self) -> Option<&Path> {
        None
    }
}

/// Flatten the persistable attributes of a serializable record
///
/// Nulls become the empty string, scalars their display form, and nested
/// values their JSON text.
pub fn extract<T: Serialize + ?Sized>(record: &T) -> Result<PropertyMap> {
    let value = serde_json::to_value(record).map_err(|e| BridgeError::ProfileAccess {
        attribute: "<record>".to_string(),
        reason: e.to_string(),
    })?;

    let Value::Object(fields) = value else {
        return Err(BridgeError::ProfileAccess {
            attribute: "<record>".to_string(),
            reason: "profile does not serialize to a set of attributes".to_string(),
        });
    };

    fields
        .into_iter()
        .map(|(name, value)| {
            let text = stringify(&name, value)?;
            Ok((name, text))
        })
        .collect()
}

fn stringify(attribute: &str, value: Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        nested @ (Value::Array(_) | Value::Object(_)) => {
            serde_json::to_string(&nested).map_err(|e| BridgeError::ProfileAccess {
                attribute: attribute.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

fn expose_secret<S: Serializer>(value: &Option<SecretString>, s: S) -> std::result::Result<S::Ok, S::Error> {
    match value {
        Some(secret) => s.serialize_some(secret.expose_secret()),
        None => s.serialize_none(),
    }
}

/// Scalar as written in a profile file (`port = 443` or `port = "443"`)
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Accept `true` as well as `"true"`
fn flag<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<bool, D::Error> {
    match Scalar::deserialize(d)? {
        Scalar::Bool(b) => Ok(b),
        Scalar::Text(s) => Ok(s.trim().eq_ignore_ascii_case("true")),
        Scalar::Int(n) => Err(D::Error::custom(format!("expected a boolean, found {n}"))),
    }
}

/// Accept numbers and strings for text attributes such as ports
fn text<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(Option::<Scalar>::deserialize(d)?.map(|value| match value {
        Scalar::Bool(b) => b.to_string(),
        Scalar::Int(n) => n.to_string(),
        Scalar::Text(s) => s,
    }))
}

fn secret(value: impl Into<String>) -> Option<SecretString> {
    Some(SecretString::new(value.into()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Object store
// ─────────────────────────────────────────────────────────────────────────────

/// Amazon S3 (or compatible) connection
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Details {
    pub name: String,
    pub access_key: Option<String>,
    #[serde(serialize_with = "expose_secret")]
    pub secret_key: Option<SecretString>,
    #[serde(serialize_with = "expose_secret")]
    pub session_token: Option<SecretString>,
    pub credentials_file_path: Option<String>,
    pub region: Option<String>,
    #[serde(skip)]
    kind: String,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl S3Details {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: "s3".to_string(),
            ..Self::default()
        }
    }

    /// Declare the type tag ("s3", "s3a" or "s3n")
    #[must_use]
    pub fn with_type(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    #[must_use]
    pub fn with_keys(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = secret(secret_key);
        self
    }

    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = secret(token);
        self
    }

    #[must_use]
    pub fn with_credentials_file(mut self, path: impl Into<String>) -> Self {
        self.credentials_file_path = Some(path.into());
        self
    }
}

impl ConnectionDetails for S3Details {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection_type(&self) -> &str {
        &self.kind
    }

    fn properties(&self) -> Result<PropertyMap> {
        extract(self)
    }

    fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content platform (HCP)
// ─────────────────────────────────────────────────────────────────────────────

/// Hitachi Content Platform connection (S3-compatible wire protocol)
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HcpDetails {
    pub name: String,
    pub namespace: String,
    pub tenant: String,
    pub host: String,
    #[serde(default, deserialize_with = "text")]
    pub port: Option<String>,
    pub username: Option<String>,
    #[serde(serialize_with = "expose_secret")]
    pub password: Option<SecretString>,
    #[serde(default, deserialize_with = "flag")]
    pub accept_self_signed_certificate: bool,
    pub proxy_host: Option<String>,
    #[serde(default, deserialize_with = "text")]
    pub proxy_port: Option<String>,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl HcpDetails {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        tenant: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            tenant: tenant.into(),
            host: host.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    #[must_use]
    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = secret(password);
        self
    }

    #[must_use]
    pub fn accept_self_signed(mut self, accept: bool) -> Self {
        self.accept_self_signed_certificate = accept;
        self
    }

    #[must_use]
    pub fn with_proxy(mut self, host: impl Into<String>, port: impl Into<String>) -> Self {
        self.proxy_host = Some(host.into());
        self.proxy_port = Some(port.into());
        self
    }
}

impl ConnectionDetails for HcpDetails {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection_type(&self) -> &str {
        "hcp"
    }

    fn properties(&self) -> Result<PropertyMap> {
        extract(self)
    }

    fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Anything else
// ─────────────────────────────────────────────────────────────────────────────

/// Profile of a type with no dedicated binder (hdfs, maprfs, ...)
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenericDetails {
    pub name: String,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, Value>,
    #[serde(skip)]
    kind: String,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl GenericDetails {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

impl ConnectionDetails for GenericDetails {
    fn name(&self) -> &str {
        &self.name
    }

    fn connection_type(&self) -> &str {
        &self.kind
    }

    fn properties(&self) -> Result<PropertyMap> {
        extract(self)
    }

    fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading
// ─────────────────────────────────────────────────────────────────────────────

/// A profile decoded from a profile file
#[derive(Debug)]
pub enum Profile {
    S3(S3Details),
    Hcp(HcpDetails),
    Generic(GenericDetails),
}

impl Profile {
    /// Decode one `[[connection]]` table, dispatching on its `type` key
    pub fn from_table(mut table: toml::Table) -> Result<Self> {
        let kind = match table.remove("type") {
            Some(toml::Value::String(kind)) if !kind.is_empty() => kind.to_lowercase(),
            _ => return Err(BridgeError::Config("connection is missing a 'type'".to_string())),
        };
        let value = toml::Value::Table(table);
        let invalid = |e: toml::de::Error| BridgeError::Config(format!("invalid '{kind}' connection: {e}"));

        let profile = match kind.as_str() {
            "s3" | "s3a" | "s3n" => {
                let details: S3Details = value.try_into().map_err(invalid)?;
                Self::S3(details.with_type(kind.clone()))
            }
            "hcp" => Self::Hcp(value.try_into().map_err(invalid)?),
            _ => {
                let mut details: GenericDetails = value.try_into().map_err(invalid)?;
                details.kind.clone_from(&kind);
                Self::Generic(details)
            }
        };

        if profile.as_details().name().is_empty() {
            return Err(BridgeError::Config("connection is missing a 'name'".to_string()));
        }
        Ok(profile)
    }

    pub fn set_source(&mut self, path: &Path) {
        let source = Some(path.to_path_buf());
        match self {
            Self::S3(d) => d.source = source,
            Self::Hcp(d) => d.source = source,
            Self::Generic(d) => d.source = source,
        }
    }

    pub fn as_details(&self) -> &dyn ConnectionDetails {
        match self {
            Self::S3(d) => d,
            Self::Hcp(d) => d,
            Self::Generic(d) => d,
        }
    }

    pub fn into_shared(self) -> Arc<dyn ConnectionDetails> {
        match self {
            Self::S3(d) => Arc::new(d),
            Self::Hcp(d) => Arc::new(d),
            Self::Generic(d) => Arc::new(d),
        }
    }
}
