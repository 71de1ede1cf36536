/*
[INPUT]:  API schema definitions and serde requirements
[OUTPUT]: Typed Rust request structs with serialization support
[POS]:    Data layer - payloads that get signed, and query filters
[UPDATE]: When API schema changes or new types added
*/

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PostProfileParam {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telegram_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateCircleParam {
    pub user_name: String,
    pub circle_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PutCirclesParam {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vouching: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_vouches: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nomination_days_limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_opt_in: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discord_webhook: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateCreateEpochParam {
    pub start_date: String,
    pub days: i64,
    pub repeat: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grant: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostUsersParam {
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_giver: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UpdateUsersParam {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_giver: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_receiver: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_tokens: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PutUsersParam {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub non_receiver: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch_first_visit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostTokenGiftsParam {
    pub tokens: i64,
    pub recipient_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NominateUserParam {
    pub name: String,
    pub address: String,
    pub description: String,
}

/// Filters for `GET /users`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct UsersQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_users: Option<bool>,
}

/// Filters for `GET /token-gifts` and `GET /pending-token-gifts`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GiftsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circle_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

/// Filters for `GET /{circle}/nominees`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NomineesQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nominated_by_user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended: Option<u8>,
}
