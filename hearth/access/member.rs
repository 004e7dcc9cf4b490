use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    error::AccessError,
    policy::{Policy, RawPolicy, Role},
};

/// Household member.
///
/// Deserialization goes through [`MemberRecord`], so `policies` is always fully
/// populated from the role defaults whatever the source omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "MemberRecord", rename_all = "camelCase")]
pub struct Member {
    /// Stable id assigned by the server or the local store.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email, required for admin sign-in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Household role.
    pub role: Role,
    /// Free-form relation ("mother", "son", ...).
    pub relation: String,
    /// Shared 4-6 digit secret.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pin: String,
    /// Opaque biometric template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Authorization document.
    pub policies: Policy,
}

impl Member {
    /// Whether the member administers the household.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Wire shape of a member as returned by either backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRecord {
    #[serde(default, alias = "_id", deserialize_with = "string_or_number")]
    id: String,
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    role: Role,
    #[serde(default)]
    relation: String,
    #[serde(default)]
    pin: String,
    #[serde(default)]
    template: Option<String>,
    #[serde(default)]
    policies: RawPolicy,
}

impl From<MemberRecord> for Member {
    fn from(record: MemberRecord) -> Self {
        Self {
            policies: Policy::materialize(record.role, &record.policies),
            id: record.id,
            name: record.name,
            email: record.email.filter(|email| !email.is_empty()),
            role: record.role,
            relation: record.relation,
            pin: record.pin,
            template: record.template.filter(|template| !template.is_empty()),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(id) => Ok(id),
        serde_json::Value::Number(id) => Ok(id.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!("invalid member id {other}"))),
    }
}

/// Validates a PIN: 4 to 6 ASCII digits.
pub fn validate_pin(pin: &str) -> Result<(), AccessError> {
    if (4..=6).contains(&pin.len()) && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(AccessError::InvalidMember("pin must be 4 to 6 digits".into()))
    }
}

/// Registration payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMember {
    /// Display name.
    pub name: String,
    /// Optional email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Role.
    pub role: Role,
    /// Relation.
    #[serde(default)]
    pub relation: String,
    /// PIN.
    pub pin: String,
    /// Optional biometric template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Explicit policy; the role default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<Policy>,
}

impl NewMember {
    /// Minimal registration with the role defaults.
    #[must_use]
    pub fn new(name: impl Into<String>, role: Role, pin: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: None,
            role,
            relation: String::new(),
            pin: pin.into(),
            template: None,
            policies: None,
        }
    }

    /// Sets the email.
    #[must_use]
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the relation.
    #[must_use]
    pub fn relation(mut self, relation: impl Into<String>) -> Self {
        self.relation = relation.into();
        self
    }

    /// Registers with `policies` instead of the role default.
    #[must_use]
    pub const fn policies(mut self, policies: Policy) -> Self {
        self.policies = Some(policies);
        self
    }

    /// Requires a non-blank name and a valid PIN.
    pub fn validate(&self) -> Result<(), AccessError> {
        if self.name.trim().is_empty() {
            return Err(AccessError::InvalidMember("name is required".into()));
        }
        validate_pin(&self.pin)
    }

    /// Materializes the member under an assigned id.
    #[must_use]
    pub fn into_member(self, id: impl Into<String>) -> Member {
        Member {
            id: id.into(),
            name: self.name.trim().to_string(),
            email: self.email,
            role: self.role,
            relation: self.relation,
            pin: self.pin,
            template: self.template,
            policies: self
                .policies
                .unwrap_or_else(|| Policy::default_for_role(self.role)),
        }
    }
}

/// Partial update of a member.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemberPatch {
    /// New name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// New role.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// New relation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    /// New PIN.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    /// New biometric template.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Whole replacement policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<Policy>,
}

impl MemberPatch {
    /// Patch replacing only the policy.
    #[must_use]
    pub fn policies(policies: Policy) -> Self {
        Self {
            policies: Some(policies),
            ..Self::default()
        }
    }

    /// Patch changing only the role.
    #[must_use]
    pub fn role(role: Role) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    /// Rejects a blank name or malformed PIN.
    pub fn validate(&self) -> Result<(), AccessError> {
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(AccessError::InvalidMember("name cannot be blank".into()));
        }
        self.pin.as_deref().map_or(Ok(()), validate_pin)
    }

    /// Returns the member with the patch applied.
    #[must_use]
    pub fn apply(&self, member: &Member) -> Member {
        Member {
            id: member.id.clone(),
            name: self.name.clone().unwrap_or_else(|| member.name.clone()),
            email: self.email.clone().or_else(|| member.email.clone()),
            role: self.role.unwrap_or(member.role),
            relation: self
                .relation
                .clone()
                .unwrap_or_else(|| member.relation.clone()),
            pin: self.pin.clone().unwrap_or_else(|| member.pin.clone()),
            template: self.template.clone().or_else(|| member.template.clone()),
            policies: self.policies.unwrap_or(member.policies),
        }
    }
}
