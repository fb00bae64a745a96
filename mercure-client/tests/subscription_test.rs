//! End-to-end tests: a real [`mercure_server::MercureHub`] bound to a local
//! port, subscribed to with [`mercure_client::MercureClient`].

use std::time::Duration;

use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use mercure_client::MercureClient;
use mercure_server::HubBuilder;
use serde::Serialize;

const SECRET: &[u8] = b"client-integration-secret";

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

async fn spawn_hub() -> String {
    let hub = HubBuilder::new()
        .bind("127.0.0.1:0".parse::<std::net::SocketAddr>().unwrap())
        .allow_anonymous(true)
        .publisher_jwt_key(DecodingKey::from_secret(SECRET))
        .heartbeat_interval(Duration::from_secs(30))
        .build()
        .await
        .unwrap();
    let addr = hub.local_addr().unwrap();
    tokio::spawn(hub.run());
    format!("http://{addr}/")
}

#[tokio::test]
async fn client_receives_events_for_its_subscribed_topic() {
    let url = spawn_hub().await;
    let client = MercureClient::new(&url);
    let mut subscription = client.subscribe(vec!["/books/{id}".into()]).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    reqwest::Client::new()
        .post(&url)
        .bearer_auth(publisher_token())
        .form(&[("topic", "/books/1"), ("data", "Hello World"), ("id", "b")])
        .send()
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("timed out waiting for event")
        .expect("subscription ended unexpectedly");
    assert_eq!(event.id, "b");
    assert_eq!(event.data, "Hello World");
}

#[tokio::test]
async fn client_does_not_see_updates_on_other_topics() {
    let url = spawn_hub().await;
    let client = MercureClient::new(&url);
    let mut subscription = client.subscribe(vec!["/books/1".into()]).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    let http = reqwest::Client::new();
    http.post(&url)
        .bearer_auth(publisher_token())
        .form(&[("topic", "/reviews/9"), ("data", "irrelevant")])
        .send()
        .await
        .unwrap();
    http.post(&url)
        .bearer_auth(publisher_token())
        .form(&[("topic", "/books/1"), ("data", "relevant"), ("id", "only-this-one")])
        .send()
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
        .await
        .expect("timed out waiting for event")
        .expect("subscription ended unexpectedly");
    assert_eq!(event.id, "only-this-one");
}

#[tokio::test]
async fn subscribe_rejects_an_empty_topic_list_end_to_end() {
    let url = spawn_hub().await;
    let client = MercureClient::new(&url);
    assert!(client.subscribe(vec![]).await.is_err());
}
