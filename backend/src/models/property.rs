use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only property reference supplied by the listings collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Property {
    pub id: Uuid,
    pub title: String,
    pub owner_id: Uuid,
    pub price: i64,
    pub currency: String,
    pub location: String,
    pub property_type: Option<String>,
    pub bedrooms: Option<i16>,
    pub bathrooms: Option<i16>,
    pub is_active: bool,
}

/// Read-only user reference supplied by the accounts collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}
