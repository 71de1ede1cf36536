/*
[INPUT]:  Addresses, circle ids and query filters
[OUTPUT]: Profiles, circles, epochs, users, gifts and nominees
[POS]:    HTTP layer - read-only endpoints (no signature required)
[UPDATE]: When adding new read endpoints or changing response format
*/

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::auth::normalize_address;
use crate::http::{CoordinapeClient, Result};
use crate::types::{Circle, Epoch, GiftsQuery, Nominee, NomineesQuery, Profile, TokenGift, User, UsersQuery};

#[derive(Debug, Serialize)]
struct EpochsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<u8>,
}

#[derive(Debug, Serialize)]
struct FutureEpochsQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    circle_id: Option<i64>,
}

impl CoordinapeClient {
    /// Get a profile by address
    ///
    /// GET /profile/{address}; the backend may wrap the result as `{profile: ...}`
    pub async fn get_profile(&self, address: &str) -> Result<Profile> {
        let endpoint = format!("/profile/{}", normalize_address(address));
        let mut body: Value = self.send_unsigned(Method::GET, &endpoint).await?;
        let profile = match body.get_mut("profile") {
            Some(inner) if inner.is_object() => inner.take(),
            _ => body,
        };
        Ok(serde_json::from_value(profile)?)
    }

    /// GET /circles
    pub async fn get_circles(&self) -> Result<Vec<Circle>> {
        self.send_unsigned(Method::GET, "/circles").await
    }

    /// Epochs of a circle; `current` limits the result to the running epoch
    ///
    /// GET /{circle_id}/epoches?current=1
    pub async fn get_epochs(&self, circle_id: i64, current: bool) -> Result<Vec<Epoch>> {
        let endpoint = format!("/{circle_id}/epoches");
        let query = EpochsQuery {
            current: current.then_some(1),
        };
        self.send_query(&endpoint, &query).await
    }

    /// Active and upcoming epochs, optionally for one circle
    ///
    /// GET /active-epochs?circle_id={circle_id}
    pub async fn get_future_epochs(&self, circle_id: Option<i64>) -> Result<Vec<Epoch>> {
        self.send_query("/active-epochs", &FutureEpochsQuery { circle_id })
            .await
    }

    /// GET /users
    pub async fn get_users(&self, query: &UsersQuery) -> Result<Vec<User>> {
        self.send_query("/users", query).await
    }

    /// GET /token-gifts
    pub async fn get_token_gifts(&self, query: &GiftsQuery) -> Result<Vec<TokenGift>> {
        self.send_query("/token-gifts", query).await
    }

    /// Gifts of the running epoch, not yet final
    ///
    /// GET /pending-token-gifts
    pub async fn get_pending_token_gifts(&self, query: &GiftsQuery) -> Result<Vec<TokenGift>> {
        self.send_query("/pending-token-gifts", query).await
    }

    /// GET /{circle_id}/nominees
    pub async fn get_nominees(&self, circle_id: i64, query: &NomineesQuery) -> Result<Vec<Nominee>> {
        let endpoint = format!("/{circle_id}/nominees");
        self.send_query(&endpoint, query).await
    }
}

#[cfg(test)]
mod tests {
    use crate::http::{ClientConfig, CoordinapeClient};
    use crate::types::{GiftsQuery, NomineesQuery, UsersQuery};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> CoordinapeClient {
        CoordinapeClient::with_config_and_base_url(ClientConfig::default(), &server.uri())
            .expect("client init")
    }

    #[tokio::test]
    async fn test_get_profile_unwraps_envelope() {
        let server = MockServer::start().await;
        let mock_response = r#"{
            "profile": {
                "id": 4,
                "address": "0xabc",
                "bio": "ape",
                "users": []
            }
        }"#;

        Mock::given(method("GET"))
            .and(path("/profile/0xabc"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(mock_response, "application/json"))
            .expect(1)
            .mount(&server)
            .await;

        let profile = client_for(&server)
            .get_profile("0xABC")
            .await
            .expect("get_profile failed");
        assert_eq!(profile.id, Some(4));
        assert_eq!(profile.bio.as_deref(), Some("ape"));
    }

    #[tokio::test]
    async fn test_get_profile_bare_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/profile/0xabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "address": "0xabc",
            })))
            .mount(&server)
            .await;

        let profile = client_for(&server).get_profile("0xabc").await.unwrap();
        assert_eq!(profile.address, "0xabc");
        assert!(profile.users.is_empty());
    }

    #[tokio::test]
    async fn test_get_circles() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/circles"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"id": 1, "name": "core"},
                {"id": 2, "name": "grants", "vouching": 1},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let circles = client_for(&server).get_circles().await.unwrap();
        assert_eq!(circles.len(), 2);
        assert_eq!(circles[1].vouching, Some(1));
    }

    #[tokio::test]
    async fn test_get_current_epochs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/7/epoches"))
            .and(query_param("current", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([{
                "id": 3,
                "circle_id": 7,
                "start_date": "2021-10-01T00:00:00Z",
                "end_date": "2021-10-15T00:00:00Z",
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let epochs = client_for(&server).get_epochs(7, true).await.unwrap();
        assert_eq!(epochs[0].circle_id, 7);
    }

    #[tokio::test]
    async fn test_get_users_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .and(query_param("circle_id", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let query = UsersQuery {
            circle_id: Some(7),
            ..Default::default()
        };
        let users = client_for(&server).get_users(&query).await.unwrap();
        assert!(users.is_empty());
    }

    #[tokio::test]
    async fn test_gift_and_nominee_reads() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pending-token-gifts"))
            .and(query_param("sender_address", "0xabc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/7/nominees"))
            .and(query_param("ended", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let gifts = client
            .get_pending_token_gifts(&GiftsQuery {
                sender_address: Some("0xabc".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(gifts.is_empty());

        let nominees = client
            .get_nominees(
                7,
                &NomineesQuery {
                    ended: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(nominees.is_empty());
    }
}
