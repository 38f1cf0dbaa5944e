use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    #[serde(alias = "store")]
    Seller,
    Delivery,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Seller => "seller",
            Role::Delivery => "delivery",
            Role::Admin => "admin",
        }
    }

    /// Keys accepted in the role-specific `details` object.
    pub fn detail_keys(&self) -> &'static [&'static str] {
        match self {
            Role::Customer => &["phone", "address"],
            Role::Seller => &["storeName", "storeAddress", "phone"],
            Role::Delivery => &["phone", "vehicleType", "vehicleNumber"],
            Role::Admin => &[],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Role::Customer),
            "seller" | "store" => Ok(Role::Seller),
            "delivery" => Ok(Role::Delivery),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub email_verified: bool,
    pub provider: String,
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_unique_number: Option<String>,
    pub details: Map<String, Value>,
    pub created_at: String,
}

pub(crate) const USER_COLUMNS: &str = "uid, email, name, role, email_verified, provider, profile_picture, seller_unique_number, details, created_at";

impl User {
    pub fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let role: String = row.try_get("role")?;
        let details: String = row.try_get("details")?;
        Ok(User {
            uid: row.try_get("uid")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            role: role.parse().map_err(|e: String| sqlx::Error::Decode(e.into()))?,
            email_verified: row.try_get("email_verified")?,
            provider: row.try_get("provider")?,
            profile_picture: row.try_get("profile_picture")?,
            seller_unique_number: row.try_get("seller_unique_number")?,
            details: serde_json::from_str(&details).map_err(|e| sqlx::Error::Decode(e.into()))?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// What other users get to see of a profile.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub uid: String,
    pub name: String,
    pub role: Role,
    pub profile_picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller_unique_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_name: Option<String>,
}

impl From<User> for PublicProfile {
    fn from(user: User) -> Self {
        let store_name = user
            .details
            .get("storeName")
            .and_then(Value::as_str)
            .map(str::to_string);
        PublicProfile {
            uid: user.uid,
            name: user.name,
            role: user.role,
            profile_picture: user.profile_picture,
            seller_unique_number: user.seller_unique_number,
            store_name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub email_verified: bool,
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

fn default_provider() -> String {
    "password".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub uid: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub profile_picture: Option<String>,
    pub details: Option<Map<String, Value>>,
}

/// Checks a role-specific `details` object: only known keys, string values.
pub fn validate_details(role: Role, details: &Map<String, Value>) -> Result<(), String> {
    let allowed = role.detail_keys();
    for (key, value) in details {
        if !allowed.contains(&key.as_str()) {
            return Err(format!("field '{key}' is not valid for role {role}"));
        }
        if !value.is_string() {
            return Err(format!("field '{key}' must be a string"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn store_is_an_alias_for_seller() {
        let role: Role = serde_json::from_str("\"store\"").unwrap();
        assert_eq!(role, Role::Seller);
        assert_eq!("store".parse::<Role>().unwrap(), Role::Seller);
        assert_eq!(serde_json::to_string(&Role::Seller).unwrap(), "\"seller\"");
    }

    #[test]
    fn details_are_checked_per_role() {
        assert!(validate_details(Role::Seller, &map(json!({"storeName": "Green Grocer"}))).is_ok());
        assert!(validate_details(Role::Customer, &map(json!({"storeName": "x"}))).is_err());
        assert!(validate_details(Role::Delivery, &map(json!({"vehicleNumber": 42}))).is_err());
        assert!(validate_details(Role::Admin, &Map::new()).is_ok());
    }

    #[test]
    fn public_profile_exposes_store_name() {
        let user = User {
            uid: "u1".into(),
            email: "s@example.com".into(),
            name: "Sam".into(),
            role: Role::Seller,
            email_verified: true,
            provider: "password".into(),
            profile_picture: None,
            seller_unique_number: Some("FC123456".into()),
            details: map(json!({"storeName": "Sam's"})),
            created_at: "2024-01-01T00:00:00Z".into(),
        };
        let profile = PublicProfile::from(user);
        assert_eq!(profile.store_name.as_deref(), Some("Sam's"));
    }
}
