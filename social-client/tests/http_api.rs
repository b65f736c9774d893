use std::sync::Arc;

use serde_json::json;
use social_client::{
    AccountApi, AiApi, CallbackOutcome, ClientConfig, ContentStudio, Credential,
    DashboardApi, EditorMode, GenerationRequest, HttpApiClient, Location, MemoryLocation,
    OAuthApi, OAuthRedirects, Platform, PostApi, PostFilter, PostPayload, PostStatus,
    SessionCredentials, SocialClientError, SocialPlatform, TRANSPORT_MESSAGE, Tone,
};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn signed_in() -> SessionCredentials {
    SessionCredentials::with_credential(Credential::new("secret-token").expect("non-blank"))
}

fn client(server: &MockServer) -> HttpApiClient {
    HttpApiClient::new(ClientConfig::new(server.uri()), Arc::new(signed_in())).expect("client")
}

fn post_json(id: i64, content: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": null,
        "content": content,
        "references": null,
        "status": "DRAFT",
        "createdAt": "2026-10-01T09:30:00",
        "likesCount": null
    })
}

#[tokio::test]
async fn generate_sends_bearer_and_camel_case_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/generate"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_json(json!({
            "prompt": "Launch announcement",
            "tone": "professional",
            "platform": "linkedin",
            "contentType": "post",
            "existingContent": ""
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "generatedContent": "We are live!",
            "tone": "professional",
            "platform": "linkedin",
            "generatedAt": "2026-10-01T09:30:00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let req = GenerationRequest {
        tone: Tone::Professional,
        platform: Platform::Linkedin,
        ..GenerationRequest::with_prompt("Launch announcement")
    };
    let content = client(&server)
        .generate_content(&req)
        .await
        .expect("generation succeeds");

    assert_eq!(content, "We are live!");
}

#[tokio::test]
async fn unsuccessful_generation_surfaces_server_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/improve"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "errorMessage": "AI quota exceeded"
        })))
        .mount(&server)
        .await;

    let req = GenerationRequest::with_prompt("shorter").existing("long text");
    let err = client(&server)
        .improve_content(&req)
        .await
        .expect_err("generation rejected");

    assert!(matches!(err, SocialClientError::Application { .. }));
    assert_eq!(err.user_message("Failed to improve content"), "AI quota exceeded");
}

#[tokio::test]
async fn hashtags_request_carries_only_three_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/hashtags"))
        .and(body_json(json!({
            "prompt": "launch",
            "platform": "twitter",
            "existingContent": "We launched!"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "hashtags": ["#launch", "#rust"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let req = GenerationRequest {
        tone: Tone::Humorous,
        platform: Platform::Twitter,
        ..GenerationRequest::with_prompt("launch").existing("We launched!")
    };
    let hashtags = client(&server)
        .generate_hashtags(&req)
        .await
        .expect("hashtags returned");

    assert_eq!(hashtags, vec!["#launch", "#rust"]);
}

#[tokio::test]
async fn plain_text_error_body_is_kept_as_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .respond_with(ResponseTemplate::new(400).set_body_string("Content is too long"))
        .mount(&server)
        .await;

    let payload = PostPayload {
        title: None,
        content: "x".repeat(10),
        references: None,
    };
    let err = client(&server)
        .create_post(&payload)
        .await
        .expect_err("server rejects");

    match &err {
        SocialClientError::Application { status, payload, .. } => {
            assert_eq!(*status, Some(400));
            assert_eq!(payload.as_plain_str(), Some("Content is too long"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.user_message("Failed to save post"), "Content is too long");
}

#[tokio::test]
async fn unauthorized_and_missing_are_typed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/5"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client(&server);

    assert!(matches!(
        client.get_post(5).await,
        Err(SocialClientError::NotFound)
    ));
    assert!(matches!(
        client.dashboard_stats().await,
        Err(SocialClientError::Unauthorized)
    ));
}

#[tokio::test]
async fn post_filters_hit_their_paths() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/drafts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([post_json(3, "draft")])))
        .expect(1)
        .mount(&server)
        .await;

    let posts = client(&server)
        .list_posts(PostFilter::Drafts)
        .await
        .expect("drafts listed");

    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].status, PostStatus::Draft);
    assert_eq!(posts[0].likes_count, 0);
}

#[tokio::test]
async fn code_exchange_posts_code_and_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/oauth/linkedin/callback/frontend"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_json(json!({"code": "abc123", "state": "s1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .exchange_linkedin_code("abc123", Some("s1"))
        .await
        .expect("exchange succeeds");
}

#[tokio::test]
async fn account_list_reads_uppercase_platforms() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/social-media/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 1,
            "platform": "LINKEDIN",
            "accountName": "Ann",
            "followersCount": null,
            "followingCount": 12,
            "postsCount": 3,
            "isActive": true
        }])))
        .mount(&server)
        .await;

    let accounts = client(&server).list_accounts().await.expect("accounts");

    assert_eq!(accounts[0].platform, SocialPlatform::Linkedin);
    assert_eq!(accounts[0].followers_count, 0);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let client = HttpApiClient::new(
        ClientConfig::new("http://127.0.0.1:9"),
        Arc::new(signed_in()),
    )
    .expect("client");

    let err = client.ai_status().await.expect_err("nothing listens on port 9");

    assert!(err.is_retryable());
    assert_eq!(err.user_message("ignored"), TRANSPORT_MESSAGE);
}

#[tokio::test]
async fn generated_content_flows_into_new_draft_and_saves() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/ai/generate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "generatedContent": "Fresh copy"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/posts"))
        .and(body_json(json!({
            "title": null,
            "content": "Fresh copy",
            "references": null
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(post_json(11, "Fresh copy")))
        .expect(1)
        .mount(&server)
        .await;

    let studio = ContentStudio::new(ClientConfig::new(server.uri()), signed_in()).expect("studio");
    studio.editor().open_new();

    studio
        .ai()
        .generate(&GenerationRequest::with_prompt("write something"))
        .await
        .expect("generated");
    assert_eq!(studio.editor().snapshot().draft.content, "Fresh copy");

    let saved = studio.editor().save().await.expect("saved");

    assert_eq!(saved.id, 11);
    assert_eq!(studio.editor().mode(), EditorMode::EditingExisting(11));
    assert_eq!(studio.dashboard().snapshot().posts[0].id, 11);
}

#[tokio::test]
async fn successful_connection_reloads_dashboard() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalFollowers": 1500,
            "totalFollowing": 10,
            "postStatistics": null,
            "connectedAccounts": []
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/social-media/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let studio = ContentStudio::new(ClientConfig::new(server.uri()), signed_in()).expect("studio");
    let location = Arc::new(
        MemoryLocation::parse("http://localhost:3000/dashboard?linkedin_success=true")
            .expect("url"),
    );
    let handler = studio.oauth_handler(
        location.clone(),
        OAuthRedirects::local().expect("redirects"),
    );

    let outcome = handler.handle().await;

    assert_eq!(outcome, CallbackOutcome::Connected);
    assert_eq!(location.current().as_str(), "http://localhost:3000/dashboard");
    let stats = studio.dashboard().snapshot().stats.data.expect("stats loaded");
    assert_eq!(stats.total_followers, 1500);
}

#[tokio::test]
async fn authorization_url_is_read_from_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/oauth/linkedin/authorize"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "authorizationUrl": "https://www.linkedin.com/oauth/v2/authorization?state=s1"
        })))
        .mount(&server)
        .await;

    let url = client(&server)
        .linkedin_authorization_url()
        .await
        .expect("url returned");

    assert!(url.starts_with("https://www.linkedin.com/"));
}
