use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt; // for `collect`
use serde_json::Value;
use tower::ServiceExt; // for `oneshot`

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    json_body: Option<Value>,
) -> Result<TestResponse> {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match json_body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&value)?)
        }
        None => Body::empty(),
    };

    let response = router.clone().oneshot(builder.body(body)?).await?;
    let status = response.status();
    let body = response.into_body().collect().await?.to_bytes().to_vec();

    Ok(TestResponse { status, body })
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(router, Method::GET, uri, None)
        .await
        .expect("failed to send request")
}

pub async fn delete(router: &Router, uri: &str) -> TestResponse {
    send(router, Method::DELETE, uri, None)
        .await
        .expect("failed to send request")
}

pub async fn put_json(router: &Router, uri: &str, body: Value) -> TestResponse {
    send(router, Method::PUT, uri, Some(body))
        .await
        .expect("failed to send request")
}
