//! End-to-end tests driving a real bound hub over HTTP: subscribe via a raw
//! GET and read the streamed SSE body, publish via the form-encoded POST
//! endpoint, and exercise anonymous vs. JWT-gated access.

use std::time::Duration;

use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use mercure_server::HubBuilder;
use serde::Serialize;

const SECRET: &[u8] = b"integration-test-secret";

#[derive(Serialize)]
struct Claims {
    mercure: MercureClaim,
    exp: usize,
}

#[derive(Serialize)]
struct MercureClaim {
    publish: Vec<String>,
}

fn publisher_token() -> String {
    let claims = Claims {
        mercure: MercureClaim { publish: vec!["*".into()] },
        exp: 4_000_000_000,
    };
    encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
}

async fn spawn_hub(heartbeat: Duration) -> (String, mercure_server::MercureHub) {
    let hub = HubBuilder::new()
        .bind("127.0.0.1:0".parse::<std::net::SocketAddr>().unwrap())
        .allow_anonymous(true)
        .publisher_jwt_key(DecodingKey::from_secret(SECRET))
        .heartbeat_interval(heartbeat)
        .build()
        .await
        .unwrap();
    let addr = hub.local_addr().unwrap();
    (format!("http://{addr}/"), hub)
}

#[tokio::test]
async fn subscriber_receives_a_published_update() {
    let (url, hub) = spawn_hub(Duration::from_secs(30)).await;
    tokio::spawn(hub.run());

    let client = reqwest::Client::new();
    let mut stream = client
        .get(format!("{url}?topic=/books/1"))
        .send()
        .await
        .unwrap()
        .bytes_stream();

    // Let the subscriber register before publishing.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let publish = client
        .post(&url)
        .bearer_auth(publisher_token())
        .form(&[("topic", "/books/1"), ("data", "Hello World"), ("id", "b")])
        .send()
        .await
        .unwrap();
    assert_eq!(publish.status(), 200);

    use futures::StreamExt;
    let mut body = String::new();
    while body.is_empty() || !body.contains("data: Hello World") {
        match tokio::time::timeout(Duration::from_secs(5), stream.next()).await {
            Ok(Some(Ok(chunk))) => body.push_str(&String::from_utf8_lossy(&chunk)),
            _ => panic!("timed out waiting for the published update"),
        }
    }
    assert!(body.contains("id: b"));
    assert!(body.contains("data: Hello World"));
}

#[tokio::test]
async fn subscribe_without_a_topic_is_rejected() {
    let (url, hub) = spawn_hub(Duration::from_secs(30)).await;
    tokio::spawn(hub.run());

    let response = reqwest::get(&url).await.unwrap();
    assert_eq!(response.status(), 400);
    let body = response.text().await.unwrap();
    assert_eq!(body, "Missing \"topic\" parameter.\n");
}

#[tokio::test]
async fn publish_without_a_token_is_unauthorized() {
    let (url, hub) = spawn_hub(Duration::from_secs(30)).await;
    tokio::spawn(hub.run());

    let client = reqwest::Client::new();
    let response = client
        .post(&url)
        .form(&[("topic", "/books/1"), ("data", "nope")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn idle_subscriber_receives_a_heartbeat() {
    let (url, hub) = spawn_hub(Duration::from_millis(50)).await;
    tokio::spawn(hub.run());

    let client = reqwest::Client::new();
    let mut stream = client
        .get(format!("{url}?topic=/idle"))
        .send()
        .await
        .unwrap()
        .bytes_stream();

    use futures::StreamExt;
    // First chunk is the connection preamble comment; the second, after the
    // heartbeat interval elapses, must be another comment line.
    let first = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(&first[..], b":\n");
    let second = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(&second[..], b":\n");
}
