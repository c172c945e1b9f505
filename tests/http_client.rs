//! HTTP client behaviour against a local mock server.

use bravscrape::config::HttpConfig;
use bravscrape::error::TransportError;
use bravscrape::scrapers::http_client::{fetch_webshare_proxies, resolve_proxies};
use bravscrape::scrapers::{DebugCapture, HttpClient, HttpTransport};
use mockito::{Matcher, Server};

fn fast_config() -> HttpConfig {
    HttpConfig {
        timeout_secs: 5,
        max_attempts: 3,
        backoff_base_ms: 1,
        backoff_max_ms: 5,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_server_errors_are_retried_until_exhausted() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/flaky")
        .with_status(503)
        .expect(3)
        .create_async()
        .await;

    let client = HttpClient::new(&fast_config(), Vec::new()).unwrap();
    let err = client
        .get(&format!("{}/flaky", server.url()), &[])
        .await
        .unwrap_err();

    match err {
        TransportError::Exhausted {
            method,
            attempts,
            last,
            ..
        } => {
            assert_eq!(method, "GET");
            assert_eq!(attempts, 3);
            assert!(last.contains("503"));
        }
        other => panic!("unexpected error: {other}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_forbidden_is_retried_until_exhausted() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/blocked")
        .with_status(403)
        .expect(3)
        .create_async()
        .await;

    let client = HttpClient::new(&fast_config(), Vec::new()).unwrap();
    let err = client
        .get(&format!("{}/blocked", server.url()), &[])
        .await
        .unwrap_err();

    match err {
        TransportError::Exhausted { attempts, last, .. } => {
            assert_eq!(attempts, 3);
            assert!(last.contains("403"));
        }
        other => panic!("unexpected error: {other}"),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let mut server = Server::new_async().await;
    let unavailable = server
        .mock("GET", "/search")
        .with_status(503)
        .expect(1)
        .create_async()
        .await;
    let ok = server
        .mock("GET", "/search")
        .with_status(200)
        .with_body("<html>ok</html>")
        .expect(1)
        .create_async()
        .await;

    let client = HttpClient::new(&fast_config(), Vec::new()).unwrap();
    let body = client
        .get(&format!("{}/search", server.url()), &[])
        .await
        .unwrap();

    assert_eq!(body, "<html>ok</html>");
    assert_eq!(client.request_count().await, 1);
    unavailable.assert_async().await;
    ok.assert_async().await;
}

#[tokio::test]
async fn test_failing_response_bodies_are_captured() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/ajax")
        .with_status(403)
        .with_body("<html>Access denied</html>")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let config = HttpConfig {
        max_attempts: 1,
        ..fast_config()
    };
    let client = HttpClient::new(&config, Vec::new())
        .unwrap()
        .with_capture(DebugCapture::new(dir.path(), "Berlin").unwrap());

    let result = client
        .post_form(&format!("{}/ajax", server.url()), &[], "a=1".to_string())
        .await;
    assert!(result.is_err());

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        vec!["Berlin_0001_POST_request.txt", "Berlin_0002_POST_response_403.html"]
    );
    let body = std::fs::read_to_string(dir.path().join(&names[1])).unwrap();
    assert!(body.contains("Access denied"));
}

#[tokio::test]
async fn test_cookies_and_headers_carry_into_form_posts() {
    let mut server = Server::new_async().await;
    let page = server
        .mock("GET", "/bravsearch/index.xhtml")
        .with_status(200)
        .with_header("set-cookie", "JSESSIONID=abc123; Path=/")
        .with_body("<html></html>")
        .create_async()
        .await;
    let ajax = server
        .mock("POST", "/bravsearch/index.xhtml")
        .match_header("cookie", "JSESSIONID=abc123")
        .match_header("faces-request", "partial/ajax")
        .match_header("user-agent", Matcher::Regex("Mozilla/5.0".to_string()))
        .match_body("a=1&b=x+y")
        .with_status(200)
        .with_body("<partial-response/>")
        .create_async()
        .await;

    let client = HttpClient::new(&fast_config(), Vec::new()).unwrap();
    let url = format!("{}/bravsearch/index.xhtml", server.url());

    client.get(&url, &[]).await.unwrap();
    let body = client
        .post_form(
            &url,
            &[("Faces-Request", "partial/ajax".to_string())],
            "a=1&b=x+y".to_string(),
        )
        .await
        .unwrap();

    assert_eq!(body, "<partial-response/>");
    assert_eq!(client.request_count().await, 2);
    page.assert_async().await;
    ajax.assert_async().await;
}

#[tokio::test]
async fn test_webshare_proxy_list() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v2/proxy/list/")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("mode".into(), "direct".into()),
            Matcher::UrlEncoded("page".into(), "1".into()),
            Matcher::UrlEncoded("page_size".into(), "100".into()),
        ]))
        .match_header("authorization", "Token secret-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"count":2,"next":null,"results":[
                {"username":"u1","password":"p1","proxy_address":"10.0.0.1","port":8001},
                {"username":"u2","password":"p2","proxy_address":"10.0.0.2","port":8002}
            ]}"#,
        )
        .create_async()
        .await;

    let proxies = fetch_webshare_proxies(&server.url(), "secret-key").await.unwrap();
    assert_eq!(
        proxies,
        vec!["http://u1:p1@10.0.0.1:8001", "http://u2:p2@10.0.0.2:8002"]
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn test_failing_proxy_source_falls_back_to_direct() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/v2/proxy/list/")
        .match_query(Matcher::Any)
        .with_status(401)
        .create_async()
        .await;

    let config = HttpConfig {
        webshare_api_key: Some("bad".to_string()),
        webshare_url: server.url(),
        ..Default::default()
    };
    assert!(resolve_proxies(&config).await.is_empty());
}

#[tokio::test]
async fn test_static_proxies_take_precedence() {
    let config = HttpConfig {
        proxies: vec!["socks5://127.0.0.1:9050".to_string()],
        webshare_api_key: Some("unused".to_string()),
        webshare_url: "http://127.0.0.1:1".to_string(),
        ..Default::default()
    };
    assert_eq!(resolve_proxies(&config).await, vec!["socks5://127.0.0.1:9050"]);
}
