//! Typed HTTP client for the `/api/v1` surface

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::dto::{
    CommentDto, ErrorBody, FeedPageDto, FeedPostDto, FollowCountsDto, FollowDto,
    FollowStatusBody, ImageFile, LikeDto, PostDto, ProfileCardDto, ProfileDto, ProfileUpdate,
};
use crate::error::{ClientError, Result};
use crate::pager::PageSource;

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Same client, authenticated with a bearer token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let response = check(builder.send().await?).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn send_empty(&self, builder: RequestBuilder) -> Result<()> {
        check(builder.send().await?).await?;
        Ok(())
    }

    // ---- feed ----

    pub async fn feed(&self, page: u32) -> Result<FeedPageDto> {
        self.send(self.request(reqwest::Method::GET, "/feed").query(&[("page", page)]))
            .await
    }

    pub async fn explore(&self, page: u32) -> Result<FeedPageDto> {
        self.send(self.request(reqwest::Method::GET, "/explore").query(&[("page", page)]))
            .await
    }

    // ---- posts ----

    pub async fn create_post(&self, caption: &str, image: Option<&ImageFile>) -> Result<PostDto> {
        let body = json!({
            "caption": caption,
            "image": image.map(ImageFile::payload),
        });
        self.send(self.request(reqwest::Method::POST, "/posts").json(&body))
            .await
    }

    pub async fn get_post(&self, post_id: Uuid) -> Result<FeedPostDto> {
        self.send(self.request(reqwest::Method::GET, &format!("/posts/{}", post_id)))
            .await
    }

    pub async fn delete_post(&self, post_id: Uuid) -> Result<()> {
        self.send_empty(self.request(reqwest::Method::DELETE, &format!("/posts/{}", post_id)))
            .await
    }

    pub async fn like(&self, post_id: Uuid) -> Result<LikeDto> {
        self.send(self.request(reqwest::Method::POST, &format!("/posts/{}/like", post_id)))
            .await
    }

    pub async fn unlike(&self, post_id: Uuid) -> Result<()> {
        self.send_empty(self.request(reqwest::Method::DELETE, &format!("/posts/{}/like", post_id)))
            .await
    }

    // ---- comments ----

    pub async fn comments(&self, post_id: Uuid) -> Result<Vec<CommentDto>> {
        self.send(self.request(reqwest::Method::GET, &format!("/posts/{}/comments", post_id)))
            .await
    }

    pub async fn add_comment(&self, post_id: Uuid, text: &str) -> Result<CommentDto> {
        self.send(
            self.request(reqwest::Method::POST, &format!("/posts/{}/comments", post_id))
                .json(&json!({ "text": text })),
        )
        .await
    }

    pub async fn delete_comment(&self, comment_id: Uuid) -> Result<()> {
        self.send_empty(self.request(reqwest::Method::DELETE, &format!("/comments/{}", comment_id)))
            .await
    }

    // ---- profiles ----

    pub async fn search_profiles(&self, query: &str) -> Result<Vec<ProfileDto>> {
        self.send(self.request(reqwest::Method::GET, "/profiles").query(&[("q", query)]))
            .await
    }

    pub async fn create_profile(&self, username: &str, name: &str) -> Result<ProfileDto> {
        self.send(
            self.request(reqwest::Method::POST, "/profiles")
                .json(&json!({ "username": username, "name": name })),
        )
        .await
    }

    pub async fn my_profile(&self) -> Result<ProfileDto> {
        self.send(self.request(reqwest::Method::GET, "/profiles/me"))
            .await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<ProfileDto> {
        let mut body = serde_json::Map::new();
        if let Some(username) = &update.username {
            body.insert("username".into(), json!(username));
        }
        if let Some(name) = &update.name {
            body.insert("name".into(), json!(name));
        }
        if let Some(bio) = &update.bio {
            body.insert("bio".into(), json!(bio));
        }
        if let Some(avatar) = &update.avatar {
            body.insert("avatar".into(), json!(avatar.payload()));
        }

        self.send(self.request(reqwest::Method::PATCH, "/profiles/me").json(&body))
            .await
    }

    pub async fn profile_by_username(&self, username: &str) -> Result<ProfileDto> {
        self.send(self.request(reqwest::Method::GET, &format!("/profiles/{}", username)))
            .await
    }

    // ---- users ----

    pub async fn user_posts(&self, user_id: Uuid) -> Result<Vec<FeedPostDto>> {
        self.send(self.request(reqwest::Method::GET, &format!("/users/{}/posts", user_id)))
            .await
    }

    pub async fn follow_counts(&self, user_id: Uuid) -> Result<FollowCountsDto> {
        self.send(self.request(
            reqwest::Method::GET,
            &format!("/users/{}/follow-counts", user_id),
        ))
        .await
    }

    pub async fn followers(&self, user_id: Uuid) -> Result<Vec<ProfileCardDto>> {
        self.send(self.request(reqwest::Method::GET, &format!("/users/{}/followers", user_id)))
            .await
    }

    pub async fn following(&self, user_id: Uuid) -> Result<Vec<ProfileCardDto>> {
        self.send(self.request(reqwest::Method::GET, &format!("/users/{}/following", user_id)))
            .await
    }

    pub async fn follow_status(&self, user_id: Uuid) -> Result<bool> {
        let body: FollowStatusBody = self
            .send(self.request(reqwest::Method::GET, &format!("/users/{}/follow", user_id)))
            .await?;
        Ok(body.following)
    }

    pub async fn follow(&self, user_id: Uuid) -> Result<FollowDto> {
        self.send(self.request(reqwest::Method::POST, &format!("/users/{}/follow", user_id)))
            .await
    }

    pub async fn unfollow(&self, user_id: Uuid) -> Result<()> {
        self.send_empty(self.request(reqwest::Method::DELETE, &format!("/users/{}/follow", user_id)))
            .await
    }

    /// Whether the service reports itself healthy
    pub async fn health_check(&self) -> Result<bool> {
        match self.request(reqwest::Method::GET, "/health").send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

/// Turn non-success responses into `ClientError::Api`
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let (message, code) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error, body.code),
        Err(_) if text.is_empty() => (canonical(status), None),
        Err(_) => (text, None),
    };

    debug!(status = status.as_u16(), ?code, %message, "API request failed");
    Err(ClientError::Api {
        status: status.as_u16(),
        code,
        message,
    })
}

fn canonical(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown error")
        .to_string()
}

/// The viewer's personalized feed as a page source
#[derive(Clone)]
pub struct HomeFeed(pub ApiClient);

/// The explore stream as a page source
#[derive(Clone)]
pub struct ExploreFeed(pub ApiClient);

#[async_trait]
impl PageSource for HomeFeed {
    async fn fetch_page(&self, page: u32) -> Result<FeedPageDto> {
        self.0.feed(page).await
    }
}

#[async_trait]
impl PageSource for ExploreFeed {
    async fn fetch_page(&self, page: u32) -> Result<FeedPageDto> {
        self.0.explore(page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_creation_trims_base_url() {
        let client = ApiClient::new("http://localhost:8080/");
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("/feed"), "http://localhost:8080/api/v1/feed");
    }

    #[tokio::test]
    async fn test_feed_sends_page_and_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/feed"))
            .and(query_param("page", "2"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"posts": [], "next_page": null})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let page = ApiClient::new(&server.uri())
            .with_token("tok")
            .feed(2)
            .await
            .unwrap();
        assert!(page.posts.is_empty());
        assert_eq!(page.next_page, None);
    }

    #[tokio::test]
    async fn test_error_body_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/api/v1/profiles/me"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": "Username is already taken",
                "code": "username_taken",
                "status": 409,
            })))
            .mount(&server)
            .await;

        let err = ApiClient::new(&server.uri())
            .update_profile(&ProfileUpdate {
                username: Some("taken".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(409));
        assert_eq!(err.code(), Some("username_taken"));
    }

    #[tokio::test]
    async fn test_empty_error_body_uses_status_reason() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = ApiClient::new(&server.uri())
            .delete_post(Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Api { status: 404, ref message, .. } if message == "Not Found"));
    }
}
