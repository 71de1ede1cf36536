/*
[INPUT]:  Typed request params and the active session credential
[OUTPUT]: Backend results of profile/circle/epoch/user/gift/nominee mutations
[POS]:    HTTP layer - mutating endpoints (require a wallet signature)
[UPDATE]: When adding new mutating endpoints or changing envelope layout
*/

use reqwest::Method;
use serde_json::{Map, Value, json};

use crate::http::{CoordinapeClient, Result};
use crate::types::{
    Circle, CreateCircleParam, Epoch, NominateUserParam, Nominee, PostProfileParam,
    PostTokenGiftsParam, PostUsersParam, Profile, PutCirclesParam, PutUsersParam,
    UpdateCreateEpochParam, UpdateUsersParam, User,
};

impl CoordinapeClient {
    /// POST /profile
    pub async fn update_profile(&self, params: &PostProfileParam) -> Result<Profile> {
        self.send_signed(Method::POST, "/profile", params).await
    }

    /// POST /upload-avatar/{address}
    pub async fn upload_avatar(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value> {
        let endpoint = format!("/upload-avatar/{}", self.require_address()?);
        self.upload(&endpoint, file_name, bytes).await
    }

    /// POST /upload-background/{address}
    pub async fn upload_background(&self, file_name: &str, bytes: Vec<u8>) -> Result<Value> {
        let endpoint = format!("/upload-background/{}", self.require_address()?);
        self.upload(&endpoint, file_name, bytes).await
    }

    /// Create a circle
    ///
    /// POST /circles
    /// The captcha token and research answers travel next to the envelope, unsigned.
    pub async fn create_circle(
        &self,
        params: &CreateCircleParam,
        captcha_token: &str,
        uxresearch_json: &str,
    ) -> Result<Circle> {
        let mut extra = Map::new();
        extra.insert("captcha_token".to_string(), Value::from(captcha_token));
        extra.insert("uxresearch_json".to_string(), Value::from(uxresearch_json));
        self.send_signed_with(Method::POST, "/circles", params, extra)
            .await
    }

    /// PUT /{circle_id}/admin/circles/{circle_id}
    pub async fn put_circle(&self, circle_id: i64, params: &PutCirclesParam) -> Result<Circle> {
        let endpoint = format!("/{circle_id}/admin/circles/{circle_id}");
        self.send_signed(Method::PUT, &endpoint, params).await
    }

    /// POST /{circle_id}/admin/upload-logo
    pub async fn upload_circle_logo(
        &self,
        circle_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<Circle> {
        let endpoint = format!("/{circle_id}/admin/upload-logo");
        self.upload(&endpoint, file_name, bytes).await
    }

    /// POST /{circle_id}/admin/v2/epoches
    pub async fn create_epoch(&self, circle_id: i64, params: &UpdateCreateEpochParam) -> Result<Epoch> {
        let endpoint = format!("/{circle_id}/admin/v2/epoches");
        self.send_signed(Method::POST, &endpoint, params).await
    }

    /// PUT /{circle_id}/admin/epoches/{epoch_id}
    pub async fn update_epoch(
        &self,
        circle_id: i64,
        epoch_id: i64,
        params: &UpdateCreateEpochParam,
    ) -> Result<Epoch> {
        let endpoint = format!("/{circle_id}/admin/epoches/{epoch_id}");
        self.send_signed(Method::PUT, &endpoint, params).await
    }

    /// DELETE /{circle_id}/admin/epoches/{epoch_id}
    pub async fn delete_epoch(&self, circle_id: i64, epoch_id: i64) -> Result<Value> {
        let endpoint = format!("/{circle_id}/admin/epoches/{epoch_id}");
        self.send_signed(Method::DELETE, &endpoint, &json!({ "epoch_id": epoch_id }))
            .await
    }

    /// Add a member to a circle (admin)
    ///
    /// POST /{circle_id}/admin/users
    pub async fn create_user(&self, circle_id: i64, params: &PostUsersParam) -> Result<User> {
        let endpoint = format!("/{circle_id}/admin/users");
        self.send_signed(Method::POST, &endpoint, params).await
    }

    /// PUT /{circle_id}/admin/users/{original_address}
    pub async fn update_user(
        &self,
        circle_id: i64,
        original_address: &str,
        params: &UpdateUsersParam,
    ) -> Result<User> {
        let endpoint = format!("/{circle_id}/admin/users/{original_address}");
        self.send_signed(Method::PUT, &endpoint, params).await
    }

    /// Update the caller's own membership
    ///
    /// PUT /{circle_id}/users
    pub async fn update_my_user(&self, circle_id: i64, params: &PutUsersParam) -> Result<User> {
        let endpoint = format!("/{circle_id}/users");
        self.send_signed(Method::PUT, &endpoint, params).await
    }

    /// DELETE /{circle_id}/admin/users/{address}
    pub async fn delete_user(&self, circle_id: i64, address: &str) -> Result<Value> {
        let endpoint = format!("/{circle_id}/admin/users/{address}");
        self.send_signed(Method::DELETE, &endpoint, &json!({ "address": address }))
            .await
    }

    /// POST /{circle_id}/teammates
    pub async fn post_teammates(&self, circle_id: i64, teammates: &[i64]) -> Result<User> {
        let endpoint = format!("/{circle_id}/teammates");
        self.send_signed(Method::POST, &endpoint, &json!({ "teammates": teammates }))
            .await
    }

    /// Replace the caller's gifts for the running epoch
    ///
    /// POST /{circle_id}/v2/token-gifts/{address}
    pub async fn post_token_gifts(&self, circle_id: i64, gifts: &[PostTokenGiftsParam]) -> Result<User> {
        let endpoint = format!("/{circle_id}/v2/token-gifts/{}", self.require_address()?);
        self.send_signed(Method::POST, &endpoint, gifts).await
    }

    /// Admin-only read; the envelope travels as query parameters
    ///
    /// GET /{circle_id}/admin/webhook
    pub async fn get_discord_webhook(&self, circle_id: i64) -> Result<Value> {
        let endpoint = format!("/{circle_id}/admin/webhook");
        let address = self.require_address()?;
        self.send_signed_query(&endpoint, &json!({ "address": address }))
            .await
    }

    /// POST /{circle_id}/nominees
    pub async fn nominate_user(&self, circle_id: i64, params: &NominateUserParam) -> Result<Nominee> {
        let endpoint = format!("/{circle_id}/nominees");
        self.send_signed(Method::POST, &endpoint, params).await
    }

    /// POST /{circle_id}/vouch
    pub async fn vouch_user(&self, circle_id: i64, nominee_id: i64) -> Result<Nominee> {
        let endpoint = format!("/{circle_id}/vouch");
        self.send_signed(Method::POST, &endpoint, &json!({ "nominee_id": nominee_id }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::auth::{MockWalletProvider, ProviderHandle, payload_hash};
    use crate::http::{ClientConfig, CoordinapeClient, CoordinapeError};
    use crate::types::{ConnectorKind, CreateCircleParam, PostTokenGiftsParam, PutCirclesParam};

    const ADDRESS: &str = "0xabc";

    fn signed_client(server: &MockServer) -> CoordinapeClient {
        let client = CoordinapeClient::with_config_and_base_url(ClientConfig::default(), &server.uri())
            .expect("client init");
        let provider = ProviderHandle::new(
            ConnectorKind::Injected,
            Arc::new(MockWalletProvider::new(ADDRESS, "0xsig")),
        );
        client.set_credential(ADDRESS, "tok123", Some(provider));
        client
    }

    fn envelope(data: &str) -> serde_json::Value {
        json!({
            "signature": "0xsig",
            "data": data,
            "address": ADDRESS,
            "hash": payload_hash(data),
        })
    }

    #[tokio::test]
    async fn test_put_circle_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/7/admin/circles/7"))
            .and(body_json(envelope(r#"{"name":"core","vouching":1}"#)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "core"})))
            .expect(1)
            .mount(&server)
            .await;

        let params = PutCirclesParam {
            name: Some("core".to_string()),
            vouching: Some(1),
            ..Default::default()
        };
        let circle = signed_client(&server).put_circle(7, &params).await.unwrap();
        assert_eq!(circle.id, 7);
    }

    #[tokio::test]
    async fn test_create_circle_extra_fields() {
        let server = MockServer::start().await;
        let data = r#"{"user_name":"ape","circle_name":"core"}"#;
        let mut expected = envelope(data);
        expected["captcha_token"] = json!("captcha");
        expected["uxresearch_json"] = json!("{}");

        Mock::given(method("POST"))
            .and(path("/circles"))
            .and(body_json(expected))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 9, "name": "core"})))
            .expect(1)
            .mount(&server)
            .await;

        let params = CreateCircleParam {
            user_name: "ape".to_string(),
            circle_name: "core".to_string(),
            protocol_name: None,
            protocol_id: None,
        };
        let circle = signed_client(&server)
            .create_circle(&params, "captcha", "{}")
            .await
            .unwrap();
        assert_eq!(circle.id, 9);
    }

    #[tokio::test]
    async fn test_token_gifts_path_uses_active_address() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/7/v2/token-gifts/0xabc"))
            .and(header("authorization", "Bearer tok123"))
            .and(body_json(envelope(r#"[{"tokens":10,"recipient_id":2}]"#)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "circle_id": 7,
                "address": ADDRESS,
                "name": "ape",
                "pending_sent_gifts": [],
            })))
            .expect(1)
            .mount(&server)
            .await;

        let gifts = [PostTokenGiftsParam {
            tokens: 10,
            recipient_id: 2,
            note: None,
        }];
        let user = signed_client(&server).post_token_gifts(7, &gifts).await.unwrap();
        assert_eq!(user.address, ADDRESS);
    }

    #[tokio::test]
    async fn test_delete_epoch_signs_epoch_id() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/7/admin/epoches/3"))
            .and(body_json(envelope(r#"{"epoch_id":3}"#)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let response = signed_client(&server).delete_epoch(7, 3).await.unwrap();
        assert_eq!(response, json!({"success": true}));
    }

    #[tokio::test]
    async fn test_vouch_user() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/7/vouch"))
            .and(body_json(envelope(r#"{"nominee_id":5}"#)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 5,
                "circle_id": 7,
                "address": "0xdef",
                "name": "newbie",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let nominee = signed_client(&server).vouch_user(7, 5).await.unwrap();
        assert_eq!(nominee.id, 5);
    }

    #[tokio::test]
    async fn test_upload_avatar_multipart_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload-avatar/0xabc"))
            .and(body_string_contains("name=\"signature\""))
            .and(body_string_contains("name=\"hash\""))
            .and(body_string_contains(payload_hash("avatar.png")))
            .and(body_string_contains("filename=\"avatar.png\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"avatar": "a.png"})))
            .expect(1)
            .mount(&server)
            .await;

        let response = signed_client(&server)
            .upload_avatar("avatar.png", b"png-bytes".to_vec())
            .await
            .unwrap();
        assert_eq!(response["avatar"], "a.png");
    }

    #[tokio::test]
    async fn test_mutation_without_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = CoordinapeClient::with_config_and_base_url(ClientConfig::default(), &server.uri())
            .unwrap();
        let err = client.vouch_user(7, 5).await.unwrap_err();
        assert!(matches!(err, CoordinapeError::Unauthenticated));

        let err = client.upload_avatar("a.png", vec![]).await.unwrap_err();
        assert!(matches!(err, CoordinapeError::Unauthenticated));
    }
}
