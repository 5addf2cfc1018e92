use serde_json::{json, Value};
use std::sync::Arc;
use todo_api::{config::BackendSettings, create_app, serve, AppState, SqliteStore};
use tokio::net::TcpListener;

struct TestApp {
    address: String,
    client: reqwest::Client,
}

impl TestApp {
    async fn spawn() -> Self {
        let settings = BackendSettings {
            region: "test-region".into(),
            user_table_name: "Users".into(),
            todo_table_name: "Todos".into(),
            database_url: "sqlite::memory:".into(),
        };
        let store = SqliteStore::in_memory(&settings.region).await.unwrap();
        let app = create_app(AppState::new(Arc::new(store), &settings));

        // bound before spawning, so requests never race the server start
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            if let Err(e) = serve(listener, app).await {
                eprintln!("run server error: {:?}", e);
            }
        });

        Self {
            address,
            client: reqwest::Client::new(),
        }
    }

    async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .json(body)
            .send()
            .await
            .unwrap()
    }

    async fn get_todo(&self, id: &str, userid: &str, sessionid: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/todo/{}", self.address, id))
            .query(&[("userid", userid), ("sessionid", sessionid)])
            .send()
            .await
            .unwrap()
    }

    async fn login(&self, userid: &str, password: &str) -> String {
        let response = self
            .post("/login", &json!({"userid": userid, "password": password}))
            .await;
        assert_eq!(response.status(), 200);
        let body: Value = response.json().await.unwrap();
        body["sessionid"].as_str().unwrap().to_string()
    }
}

#[tokio::test]
async fn register_twice_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .post("/register", &json!({"userid": "alice", "password": "pw1"}))
        .await;
    assert_eq!(response.status(), 200);
    assert!(response.bytes().await.unwrap().is_empty());

    let response = app
        .post("/register", &json!({"userid": "alice", "password": "pw2"}))
        .await;
    assert_eq!(response.status(), 400);
    assert!(response.bytes().await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_bodies() {
    let app = TestApp::spawn().await;

    let response = app.post("/register", &json!({"userid": "alice"})).await;
    assert_eq!(response.status(), 400);

    let response = app.post("/login", &json!({"password": "pw"})).await;
    assert_eq!(response.status(), 500);

    let response = app.post("/logout", &json!({"userid": "alice"})).await;
    assert_eq!(response.status(), 500);

    let response = app
        .post("/todo", &json!({"userid": "alice", "sessionid": "t"}))
        .await;
    assert_eq!(response.status(), 500);

    let response = app
        .client
        .get(format!("{}/todo/some-id?userid=alice", app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn bad_credentials_are_forbidden() {
    let app = TestApp::spawn().await;
    app.post("/register", &json!({"userid": "bob", "password": "pw"}))
        .await;

    let response = app
        .post("/login", &json!({"userid": "bob", "password": "nope"}))
        .await;
    assert_eq!(response.status(), 403);
    assert!(response.bytes().await.unwrap().is_empty());

    let response = app
        .post("/login", &json!({"userid": "nobody", "password": "pw"}))
        .await;
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn todo_round_trip_and_ownership() {
    let app = TestApp::spawn().await;
    app.post("/register", &json!({"userid": "bob", "password": "pw"}))
        .await;
    let token = app.login("bob", "pw").await;

    let response = app
        .post(
            "/todo",
            &json!({"userid": "bob", "sessionid": token, "content": "buy milk"}),
        )
        .await;
    assert_eq!(response.status(), 200);
    let created: Value = response.json().await.unwrap();
    let id = created["todoid"].as_str().unwrap().to_string();

    let response = app.get_todo(&id, "bob", &token).await;
    assert_eq!(response.status(), 200);
    let todo: Value = response.json().await.unwrap();
    assert_eq!(todo, json!({"todoid": id, "content": "buy milk"}));

    let response = app.get_todo(&id, "carol", &token).await;
    assert_eq!(response.status(), 403);

    let response = app.get_todo("missing", "bob", &token).await;
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn second_login_evicts_first_session() {
    let app = TestApp::spawn().await;
    app.post("/register", &json!({"userid": "bob", "password": "pw"}))
        .await;
    let first = app.login("bob", "pw").await;
    let second = app.login("bob", "pw").await;

    let response = app
        .post(
            "/todo",
            &json!({"userid": "bob", "sessionid": first, "content": "x"}),
        )
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .post(
            "/todo",
            &json!({"userid": "bob", "sessionid": second, "content": "x"}),
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn logout_revokes_session() {
    let app = TestApp::spawn().await;
    app.post("/register", &json!({"userid": "bob", "password": "pw"}))
        .await;
    let token = app.login("bob", "pw").await;

    let response = app
        .post("/logout", &json!({"userid": "bob", "sessionid": "garbage"}))
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .post("/logout", &json!({"userid": "bob", "sessionid": token}))
        .await;
    assert_eq!(response.status(), 200);
    assert!(response.bytes().await.unwrap().is_empty());

    let response = app
        .post(
            "/todo",
            &json!({"userid": "bob", "sessionid": token, "content": "anything"}),
        )
        .await;
    assert_eq!(response.status(), 403);

    let response = app
        .post("/logout", &json!({"userid": "bob", "sessionid": token}))
        .await;
    assert_eq!(response.status(), 403);
}
