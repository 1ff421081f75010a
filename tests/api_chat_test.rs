//! Integration tests for the chat API endpoints

mod test_utils;

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{Request, StatusCode, header},
    };
    use serde_json::{Value, json};
    use tower::util::ServiceExt;

    use aria::gemini::UpstreamError;

    use crate::test_utils::{FakeProvider, Upstream, body_to_string, test_app};

    fn chat_request(uri: &str, body: String) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn frames(body: &str) -> Vec<Value> {
        body.split("\n\n")
            .filter_map(|frame| frame.strip_prefix("data: "))
            .map(|data| serde_json::from_str(data).unwrap())
            .collect()
    }

    /// Tests a missing message is rejected before anything else
    #[tokio::test]
    async fn it_returns_400_for_missing_message() {
        let provider = FakeProvider::unconfigured();
        let app = test_app(provider.clone());

        let response = app
            .oneshot(chat_request("/api/chat", json!({ "history": [] }).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_to_string(response.into_body()).await;
        assert_eq!(body, r#"{"error":"Message is required"}"#);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn it_returns_400_for_blank_message() {
        let provider = FakeProvider::streaming(&["never"]);
        let app = test_app(provider.clone());

        let response = app
            .oneshot(chat_request("/api/chat", json!({ "message": "  " }).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn it_returns_400_for_malformed_json() {
        let app = test_app(FakeProvider::streaming(&[]));

        let response = app
            .oneshot(chat_request("/api/chat", String::from("{\"message\": ")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: Value = serde_json::from_str(&body_to_string(response.into_body()).await).unwrap();
        assert!(body["error"].is_string());
    }

    /// Tests requests fail without calling upstream when no key is set
    #[tokio::test]
    async fn it_returns_500_when_unconfigured() {
        let provider = FakeProvider::unconfigured();
        let app = test_app(provider.clone());

        let response = app
            .oneshot(chat_request("/api/chat", json!({ "message": "Hi" }).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_to_string(response.into_body()).await;
        assert_eq!(body, r#"{"error":"API key is not configured"}"#);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn it_returns_400_for_unsupported_models() {
        let provider = FakeProvider::streaming(&["never"]);
        let app = test_app(provider.clone());

        let response = app
            .oneshot(chat_request(
                "/api/chat",
                json!({ "message": "Hi", "model": "gpt-4o" }).to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("ChatGPT models are not supported yet"));
        assert_eq!(provider.calls(), 0);
    }

    /// Tests a successful turn streams deltas then a done frame
    #[tokio::test]
    async fn it_streams_server_sent_events() {
        let provider = FakeProvider::streaming(&["Hel", "lo"]);
        let app = test_app(provider.clone());

        let response = app
            .oneshot(chat_request(
                "/api/chat",
                json!({
                    "message": "How are you?",
                    "history": [
                        { "role": "user", "parts": [{ "text": "Hi" }] },
                        { "role": "model", "parts": [{ "text": "Hello!" }] }
                    ]
                })
                .to_string(),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");

        let body = body_to_string(response.into_body()).await;
        assert_eq!(
            frames(&body),
            vec![
                json!({ "text": "Hel", "done": false }),
                json!({ "text": "lo", "done": false }),
                json!({ "text": "", "done": true }),
            ]
        );
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn it_serves_the_generate_alias() {
        let app = test_app(FakeProvider::streaming(&["ok"]));

        let response = app
            .oneshot(chat_request("/api/generate", json!({ "message": "Hi" }).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response.into_body()).await;
        assert_eq!(frames(&body).len(), 2);
    }

    /// Tests a rate limit before streaming becomes a 429 with the delay
    #[tokio::test]
    async fn it_returns_429_for_pre_stream_rate_limits() {
        let upstream = r#"{"error":{"code":429,"message":"You exceeded your current quota.","status":"RESOURCE_EXHAUSTED","details":[{"@type":"type.googleapis.com/google.rpc.RetryInfo","retryDelay":"30s"}]}}"#;
        let provider = FakeProvider::new(Upstream::Reject(UpstreamError::new(Some(429), upstream)));
        let app = test_app(provider);

        let response = app
            .oneshot(chat_request("/api/chat", json!({ "message": "Hi" }).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body: Value = serde_json::from_str(&body_to_string(response.into_body()).await).unwrap();
        assert_eq!(body["code"], 429);
        assert_eq!(body["retryAfter"], 30);
        assert!(body["error"].as_str().unwrap().contains("30 seconds"));
    }

    #[tokio::test]
    async fn it_returns_500_for_other_pre_stream_failures() {
        let provider = FakeProvider::new(Upstream::Reject(UpstreamError::new(
            Some(404),
            "models/gemini-nope is not found",
        )));
        let app = test_app(provider);

        let response = app
            .oneshot(chat_request("/api/chat", json!({ "message": "Hi" }).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_to_string(response.into_body()).await;
        assert!(body.contains("is not found"));
    }

    /// Tests a failure after streaming started ends the stream with an
    /// error frame
    #[tokio::test]
    async fn it_ends_the_stream_with_an_error_frame() {
        let provider = FakeProvider::new(Upstream::Chunks(vec![
            Ok(String::from("partial")),
            Err(UpstreamError::new(
                None,
                r#"{"error":{"code":429,"message":"Please retry in 12.5s.","status":"RESOURCE_EXHAUSTED"}}"#,
            )),
        ]));
        let app = test_app(provider);

        let response = app
            .oneshot(chat_request("/api/chat", json!({ "message": "Hi" }).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_to_string(response.into_body()).await;
        let frames = frames(&body);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0]["text"], "partial");
        assert_eq!(frames[1]["done"], true);
        assert_eq!(frames[1]["code"], 429);
        assert_eq!(frames[1]["retryAfter"], 13);
    }
}
