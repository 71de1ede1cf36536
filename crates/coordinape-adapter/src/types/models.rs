/*
[INPUT]:  Backend JSON schema for circles, epochs, users, gifts, nominees, profiles
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub protocol_id: Option<i64>,
    #[serde(default)]
    pub token_name: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub vouching: Option<i64>,
    #[serde(default)]
    pub min_vouches: Option<i64>,
    #[serde(default)]
    pub nomination_days_limit: Option<i64>,
    #[serde(default)]
    pub default_opt_in: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    pub id: i64,
    pub circle_id: i64,
    #[serde(default)]
    pub number: Option<i64>,
    pub start_date: String,
    pub end_date: String,
    #[serde(default)]
    pub ended: Option<i64>,
    #[serde(default)]
    pub grant: Option<String>,
    #[serde(default)]
    pub days: Option<i64>,
    #[serde(default)]
    pub repeat: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub circle_id: i64,
    pub address: String,
    pub name: String,
    #[serde(default)]
    pub give_token_received: i64,
    #[serde(default)]
    pub give_token_remaining: i64,
    #[serde(default)]
    pub starting_tokens: Option<i64>,
    #[serde(default)]
    pub non_giver: Option<i64>,
    #[serde(default)]
    pub non_receiver: Option<i64>,
    #[serde(default)]
    pub role: Option<i64>,
    #[serde(default)]
    pub pending_sent_gifts: Vec<TokenGift>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGift {
    pub id: i64,
    pub circle_id: i64,
    pub sender_id: i64,
    pub recipient_id: i64,
    #[serde(default)]
    pub sender_address: String,
    #[serde(default)]
    pub recipient_address: String,
    pub tokens: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub epoch_id: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nominee {
    pub id: i64,
    pub circle_id: i64,
    pub address: String,
    pub name: String,
    #[serde(default)]
    pub nominated_by_user_id: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub vouches_required: Option<i64>,
    #[serde(default)]
    pub ended: Option<i64>,
    #[serde(default)]
    pub expiry_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: Option<i64>,
    pub address: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: Option<String>,
    #[serde(default)]
    pub twitter_username: Option<String>,
    #[serde(default)]
    pub github_username: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Post-login summary of the caller's circles and profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub profile: Option<Profile>,
    #[serde(default)]
    pub circles: Vec<Circle>,
    #[serde(default, rename = "myUsers")]
    pub my_users: Vec<User>,
    #[serde(default)]
    pub active_epochs: Vec<Epoch>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}
