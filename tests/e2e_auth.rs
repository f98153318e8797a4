//! E2E tests for registration, login, logout, and token refresh

mod common;

use common::TestServer;

#[tokio::test]
async fn health_check_works() {
    let server = TestServer::new().await;
    let response = server
        .client
        .get(server.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn register_login_logout_flow() {
    let server = TestServer::new().await;

    let response = server.register("alice", "sunshine42").await;
    assert_eq!(response.status(), 201);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["username"], "alice");
    assert!(body["id"].as_str().is_some());

    let (access, _refresh) = server.login("alice", "sunshine42").await;

    // The access token works
    let response = server
        .client
        .delete(server.url("/logout"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Successfully logged out.");

    // After logout the same token is revoked
    let response = server
        .client
        .delete(server.url("/logout"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn duplicate_username_is_conflict() {
    let server = TestServer::new().await;

    assert_eq!(server.register("alice", "sunshine42").await.status(), 201);
    let response = server.register("alice", "moonlight7").await;
    assert_eq!(response.status(), 409);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "A user with that name already exists.");
}

#[tokio::test]
async fn register_validation_errors() {
    let server = TestServer::new().await;

    // Username too short
    assert_eq!(server.register("ab", "sunshine42").await.status(), 422);
    // Password too short
    assert_eq!(server.register("alice", "sun4").await.status(), 422);
    // Password without digits
    assert_eq!(server.register("alice", "sunshineee").await.status(), 422);
    // Password with punctuation
    assert_eq!(server.register("alice", "sunshine42!").await.status(), 422);

    // Mismatched confirmation
    let response = server
        .client
        .post(server.url("/register"))
        .json(&serde_json::json!({
            "username": "alice",
            "password": "sunshine42",
            "confirm_password": "different42",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn login_with_bad_credentials_is_unauthorized() {
    let server = TestServer::new().await;
    server.register("alice", "sunshine42").await;

    let response = server
        .client
        .post(server.url("/login"))
        .json(&serde_json::json!({
            "username": "alice",
            "password": "wrongpass1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = server
        .client
        .post(server.url("/login"))
        .json(&serde_json::json!({
            "username": "nobody",
            "password": "sunshine42",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn refresh_token_issues_new_access_token() {
    let server = TestServer::new().await;
    server.register("alice", "sunshine42").await;
    let (access, refresh) = server.login("alice", "sunshine42").await;

    // The refresh endpoint rejects access tokens
    let response = server
        .client
        .post(server.url("/refresh"))
        .bearer_auth(&access)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // ...and accepts refresh tokens
    let response = server
        .client
        .post(server.url("/refresh"))
        .bearer_auth(&refresh)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    let new_access = body["access_token"].as_str().unwrap();

    // The refreshed access token authenticates
    let response = server
        .client
        .delete(server.url("/logout"))
        .bearer_auth(new_access)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn refresh_endpoint_rejects_garbage_tokens() {
    let server = TestServer::new().await;

    let response = server
        .client
        .post(server.url("/refresh"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = server.client.post(server.url("/refresh")).send().await.unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn delete_account_removes_user_and_posts() {
    let server = TestServer::new().await;
    let token = server.create_user("alice").await;
    let post = server
        .create_post_json(&token, "Mary Oliver", "Wild Geese", "quote")
        .await;

    let response = server
        .client
        .delete(server.url("/register"))
        .json(&serde_json::json!({
            "username": "alice",
            "password": "sunshine42",
            "confirm_password": "sunshine42",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Successfully deleted user alice.");

    // The user's posts cascaded away
    let response = server
        .client
        .get(server.url(&format!("/posts/{}", post["id"].as_str().unwrap())))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}
