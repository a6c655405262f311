//! End-to-end tests: the client over a real WebSocket connection to an
//! in-memory stand-in for the database's RPC endpoint.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};
use surreal_client::{Client, ClientError, ConnectOptions, Credentials, LiveNotification, One};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;

/// Just enough of the database to exercise every client verb.
#[derive(Default)]
struct FakeDb {
    tables: BTreeMap<String, Vec<Value>>,
    live: Vec<(String, String)>,
    next_live: usize,
}

impl FakeDb {
    /// Reply to one request, plus any notifications it triggers.
    fn handle(&mut self, request: &Value) -> (Value, Vec<Value>) {
        let id = request["id"].clone();
        let params = request["params"].as_array().cloned().unwrap_or_default();
        let param = |i: usize| params.get(i).cloned().unwrap_or(Value::Null);

        let outcome = match request["method"].as_str().unwrap_or_default() {
            "use" | "let" | "unset" | "invalidate" | "ping" => Ok(Value::Null),
            "version" => Ok(json!("surrealdb-1.0.0")),
            "signin" => {
                let creds = param(0);
                if creds["user"] == "root" && creds["pass"] == "root" {
                    Ok(json!("token-root"))
                } else {
                    Err((-32000, "There was a problem with authentication"))
                }
            }
            "create" => {
                let thing = param(0).as_str().unwrap_or_default().to_string();
                let (table, key) = thing.split_once(':').unwrap_or((thing.as_str(), "generated"));
                let mut record = param(1);
                record["id"] = json!(format!("{table}:{key}"));
                self.tables.entry(table.to_string()).or_default().push(record.clone());

                let pushes = self
                    .live
                    .iter()
                    .filter(|(_, watched)| watched == table)
                    .map(|(sub, _)| json!({ "id": sub, "action": "CREATE", "result": record }))
                    .collect();
                return (json!({ "id": id, "result": [record] }), pushes);
            }
            "select" => Ok(self.select(param(0).as_str().unwrap_or_default())),
            "query" => Ok(self.query(param(0).as_str().unwrap_or_default())),
            "live" => {
                self.next_live += 1;
                let sub = format!("live-{}", self.next_live);
                self.live.push((sub.clone(), param(0).as_str().unwrap_or_default().to_string()));
                Ok(json!(sub))
            }
            "kill" => {
                let before = self.live.len();
                self.live.retain(|(sub, _)| Some(sub.as_str()) != param(0).as_str());
                if self.live.len() < before {
                    Ok(Value::Null)
                } else {
                    Err((-32000, "Can not execute KILL statement"))
                }
            }
            _ => Err((-32601, "Method not found")),
        };

        let reply = match outcome {
            Ok(result) => json!({ "id": id, "result": result }),
            Err((code, message)) => json!({ "id": id, "error": { "code": code, "message": message } }),
        };
        (reply, Vec::new())
    }

    fn select(&self, thing: &str) -> Value {
        match thing.split_once(':') {
            Some((table, _)) => self
                .tables
                .get(table)
                .and_then(|rows| rows.iter().find(|row| row["id"] == thing))
                .cloned()
                .unwrap_or(Value::Null),
            None => json!(self.tables.get(thing).cloned().unwrap_or_default()),
        }
    }

    fn query(&self, sql: &str) -> Value {
        let statements: Vec<Value> = sql
            .split(';')
            .map(str::trim)
            .filter(|statement| !statement.is_empty())
            .map(|statement| match statement.strip_prefix("SELECT * FROM ") {
                Some(table) => json!({ "status": "OK", "time": "15µs", "result": self.select(table) }),
                None => json!({ "status": "ERR", "time": "2µs", "result": format!("Parse error near `{statement}`") }),
            })
            .collect();
        json!(statements)
    }
}

async fn start_fake_db() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let db = Arc::new(Mutex::new(FakeDb::default()));

    tokio::spawn(async move {
        while let Ok((tcp, _)) = listener.accept().await {
            tokio::spawn(serve(tcp, db.clone()));
        }
    });

    format!("ws://127.0.0.1:{port}/rpc")
}

async fn serve(tcp: TcpStream, db: Arc<Mutex<FakeDb>>) {
    let Ok(ws) = tokio_tungstenite::accept_async(tcp).await else {
        return;
    };
    let (mut tx, mut rx) = ws.split();

    while let Some(Ok(message)) = rx.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let request: Value = serde_json::from_str(text.as_str()).unwrap();
        let (reply, pushes) = db.lock().handle(&request);

        if tx.send(Message::text(reply.to_string())).await.is_err() {
            return;
        }
        for push in pushes {
            if tx.send(Message::text(push.to_string())).await.is_err() {
                return;
            }
        }
    }
}

async fn connect() -> Client {
    let url = start_fake_db().await;
    let options = ConnectOptions::default().with_heartbeat_interval(Duration::from_millis(100));
    Client::connect(&url, options).await.unwrap()
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: String,
    name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn session_and_record_verbs() {
    let client = connect().await;

    let token = client.signin(&Credentials::user("root", "root")).await.unwrap();
    assert_eq!(token.as_deref(), Some("token-root"));
    client.use_ns("test", "test").await.unwrap();

    let One(tobie): One<User> = client.create("user:tobie", json!({ "name": "Tobie" })).await.unwrap();
    assert_eq!(tobie.id, "user:tobie");
    let _: One<User> = client.create("user:jaime", json!({ "name": "Jaime" })).await.unwrap();

    let users: Vec<User> = client.select("user").await.unwrap();
    assert_eq!(users.len(), 2);

    let One(jaime): One<User> = client.select("user:jaime").await.unwrap();
    assert_eq!(jaime.name, "Jaime");

    let missing = client.select::<One<User>>("user:nobody").await.unwrap_err();
    assert!(missing.is_not_found());

    assert_eq!(client.version().await.unwrap(), "surrealdb-1.0.0");
    client.close().await.unwrap();
}

#[tokio::test]
async fn query_results_and_failures() {
    let client = connect().await;
    let _: Value = client.create("post:first", json!({ "name": "First" })).await.unwrap();

    let response = client
        .query("SELECT * FROM post; SELECT * FROM post:first", Value::Null)
        .await
        .unwrap();
    assert_eq!(response.len(), 2);
    let posts: Vec<User> = response.take(0).unwrap();
    let One(first): One<User> = response.take(1).unwrap();
    assert_eq!(posts[0], first);
    assert_eq!(response.total_time(), Duration::from_micros(30));

    match client.query("SELECT * FROM post; SELEC nothing", Value::Null).await.unwrap_err() {
        ClientError::QueryFailed(errors) => {
            assert_eq!(errors.0.len(), 1);
            assert_eq!(errors.0[0].index, 1);
            assert!(errors.0[0].message.starts_with("Parse error"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn bad_credentials_leave_connection_usable() {
    let client = connect().await;

    let err = client.signin(&Credentials::user("root", "wrong")).await.unwrap_err();
    assert_eq!(err.protocol(), Some((-32000, "There was a problem with authentication")));

    client.ping().await.unwrap();
    assert!(!client.connection().is_closed());
}

#[tokio::test]
async fn live_query_streams_until_killed() {
    let client = connect().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let id = client
        .live("user", move |n: LiveNotification| {
            sink.lock().push((n.action.clone(), n.decode::<User>().unwrap()));
        })
        .await
        .unwrap();
    assert_eq!(id, "live-1");
    assert_eq!(client.connection().live_subscriptions(), 1);

    let _: Value = client.create("user:tobie", json!({ "name": "Tobie" })).await.unwrap();
    let _: Value = client.create("post:ignored", json!({ "name": "Post" })).await.unwrap();
    let _: Value = client.create("user:jaime", json!({ "name": "Jaime" })).await.unwrap();

    tokio::time::timeout(Duration::from_secs(2), async {
        while seen.lock().len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let names: Vec<String> = seen.lock().iter().map(|(_, user)| user.name.clone()).collect();
    assert_eq!(names, ["Tobie", "Jaime"]);
    assert!(seen.lock().iter().all(|(action, _)| action == "CREATE"));

    client.kill(&id).await.unwrap();
    assert_eq!(client.connection().live_subscriptions(), 0);

    let _: Value = client.create("user:later", json!({ "name": "Later" })).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(seen.lock().len(), 2);

    // A second kill is rejected by the server.
    assert!(client.kill(&id).await.is_err());
}
