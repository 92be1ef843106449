use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, Problem, Token, TokenList};
use tower::{Service, ServiceExt};

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

const VISA: &str = r#"{"card_number":"4111111111111111","expiry_month":12,"expiry_year":2030,"holder":{"name":"Ada"}}"#;

// --- list ---

#[tokio::test]
async fn list_tokens_empty() {
    let resp = app().oneshot(empty_request("GET", "/tokens")).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let list: TokenList = body_json(resp).await;
    assert!(list.tokens.is_empty());
}

// --- tokenize ---

#[tokio::test]
async fn tokenize_returns_201_with_last4() {
    let resp = app().oneshot(json_request("POST", "/tokens", VISA)).await.unwrap();

    assert_eq!(resp.status(), StatusCode::CREATED);
    let token: Token = body_json(resp).await;
    assert_eq!(token.last4, "1111");
    assert_eq!(token.holder.map(|h| h.name).as_deref(), Some("Ada"));
}

#[tokio::test]
async fn tokenize_rejects_bad_checksum_with_problem() {
    let resp = app()
        .oneshot(json_request(
            "POST",
            "/tokens",
            r#"{"card_number":"4111111111111112","expiry_month":13,"expiry_year":2030}"#,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let problem: Problem = body_json(resp).await;
    assert_eq!(problem.message, "card rejected");
    assert_eq!(problem.errors, vec!["card_number", "expiry_month"]);
}

#[tokio::test]
async fn tokenize_malformed_json_returns_422() {
    let resp = app()
        .oneshot(json_request("POST", "/tokens", r#"{"number":1}"#))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// --- get ---

#[tokio::test]
async fn get_token_not_found() {
    let resp = app()
        .oneshot(empty_request("GET", "/tokens/00000000-0000-0000-0000-000000000000"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let problem: Problem = body_json(resp).await;
    assert_eq!(problem.message, "token not found");
}

#[tokio::test]
async fn get_token_bad_uuid_returns_400() {
    let resp = app()
        .oneshot(empty_request("GET", "/tokens/not-a-uuid"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- delete ---

#[tokio::test]
async fn delete_token_not_found() {
    let resp = app()
        .oneshot(empty_request("DELETE", "/tokens/00000000-0000-0000-0000-000000000000"))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- full lifecycle ---

#[tokio::test]
async fn token_lifecycle() {
    let mut app = app().into_service();

    // tokenize
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(json_request("POST", "/tokens", VISA))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Token = body_json(resp).await;
    let id = created.token;

    // list filtered by last4
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/tokens?last4=1111"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let list: TokenList = body_json(resp).await;
    assert_eq!(list.tokens.len(), 1);
    assert_eq!(list.tokens[0].token, id);

    // a filter that matches nothing
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", "/tokens?last4=0000"))
        .await
        .unwrap();
    let list: TokenList = body_json(resp).await;
    assert!(list.tokens.is_empty());

    // get
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", &format!("/tokens/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let fetched: Token = body_json(resp).await;
    assert_eq!(fetched.last4, "1111");
    assert_eq!(fetched.expiry_year, 2030);

    // delete
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("DELETE", &format!("/tokens/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(resp).await.is_empty());

    // get after delete: 404
    let resp = ServiceExt::ready(&mut app)
        .await
        .unwrap()
        .call(empty_request("GET", &format!("/tokens/{id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
