//! In-process stand-in for the Bot API, shared by the crate's tests.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use {
    async_trait::async_trait,
    axum::{Json, Router, body::Bytes, extract::State, http::Uri, routing::post},
    maxrelay_auth::SessionAuthority,
    maxrelay_config::StoreConfig,
    maxrelay_forwarder::{
        Controller, EngineSettings, ForwardingEngine, SourceDriver, SourceError, SourceHandle,
    },
    maxrelay_store::Store,
    secrecy::Secret,
    serde::Deserialize,
    serde_json::{Value, json},
    tokio::sync::oneshot,
};

use crate::{delivery::TelegramDelivery, handlers::ControlPlane};

#[derive(Debug, Clone, Copy)]
pub(crate) enum MockBehavior {
    Ok,
    /// Reply with an API error to every call.
    Reject,
    /// Sleep before replying.
    Slow(Duration),
}

#[derive(Debug, Clone)]
pub(crate) struct CapturedRequest {
    pub method: String,
    pub body: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SentText {
    pub chat_id: i64,
    pub text: String,
    #[serde(default)]
    pub parse_mode: Option<String>,
    #[serde(default)]
    pub reply_markup: Option<Value>,
}

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    behavior: MockBehavior,
}

pub(crate) struct MockTelegramApi {
    pub bot: teloxide::Bot,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl MockTelegramApi {
    pub(crate) async fn start(behavior: MockBehavior) -> Self {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/{*path}", post(handler))
            .with_state(MockState {
                requests: Arc::clone(&requests),
                behavior,
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("serve mock telegram api");
        });

        let api_url = reqwest::Url::parse(&format!("http://{addr}/")).expect("parse api url");
        let bot = teloxide::Bot::new("test-token").set_api_url(api_url);
        Self {
            bot,
            requests,
            shutdown: Some(shutdown_tx),
        }
    }

    pub(crate) fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Texts sent or edited into chats, in call order.
    pub(crate) fn texts(&self) -> Vec<SentText> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "SendMessage" || r.method == "EditMessageText")
            .filter_map(|r| serde_json::from_value(r.body).ok())
            .collect()
    }

    pub(crate) fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.texts()
            .into_iter()
            .filter(|t| t.chat_id == chat_id)
            .map(|t| t.text)
            .collect()
    }
}

impl Drop for MockTelegramApi {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn handler(State(state): State<MockState>, uri: Uri, body: Bytes) -> Json<Value> {
    let method = uri.path().rsplit('/').next().unwrap_or_default().to_string();
    let body: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let chat_id = body.get("chat_id").and_then(Value::as_i64).unwrap_or(42);
    let text = body
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or("ok")
        .to_string();
    state
        .requests
        .lock()
        .expect("lock requests")
        .push(CapturedRequest {
            method: method.clone(),
            body,
        });

    match state.behavior {
        MockBehavior::Ok => {},
        MockBehavior::Reject => {
            return Json(json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            }));
        },
        MockBehavior::Slow(delay) => tokio::time::sleep(delay).await,
    }

    match method.as_str() {
        "SendMessage" | "EditMessageText" => Json(json!({
            "ok": true,
            "result": {
                "message_id": 1,
                "date": 0,
                "chat": { "id": chat_id, "type": "private", "first_name": "Test" },
                "text": text
            }
        })),
        "GetMe" => Json(json!({
            "ok": true,
            "result": {
                "id": 7,
                "is_bot": true,
                "first_name": "Relay",
                "username": "relay_bot",
                "can_join_groups": true,
                "can_read_all_group_messages": false,
                "supports_inline_queries": false
            }
        })),
        "GetUpdates" => {
            // Long polling would hold the request open; idle briefly instead.
            tokio::time::sleep(Duration::from_millis(20)).await;
            Json(json!({ "ok": true, "result": [] }))
        },
        _ => Json(json!({ "ok": true, "result": true })),
    }
}

/// A private-chat text message from `user_id`.
pub(crate) fn text_message(chat_id: i64, user_id: u64, text: &str) -> teloxide::types::Message {
    serde_json::from_value(json!({
        "message_id": 10,
        "date": 1,
        "chat": { "id": chat_id, "type": "private", "first_name": "Alice" },
        "from": {
            "id": user_id,
            "is_bot": false,
            "first_name": "Alice",
            "username": "alice"
        },
        "text": text
    }))
    .expect("deserialize text message")
}

/// A group-chat text message from `user_id`.
pub(crate) fn group_message(
    chat_id: i64,
    title: &str,
    user_id: u64,
    text: &str,
) -> teloxide::types::Message {
    serde_json::from_value(json!({
        "message_id": 11,
        "date": 1,
        "chat": { "id": chat_id, "type": "group", "title": title },
        "from": {
            "id": user_id,
            "is_bot": false,
            "first_name": "Alice"
        },
        "text": text
    }))
    .expect("deserialize group message")
}

/// A button press by `user_id` on a bot message in `chat_id`.
pub(crate) fn callback_query(
    chat_id: i64,
    user_id: u64,
    data: &str,
) -> teloxide::types::CallbackQuery {
    serde_json::from_value(json!({
        "id": "cbq-1",
        "from": {
            "id": user_id,
            "is_bot": false,
            "first_name": "Alice"
        },
        "chat_instance": "instance-1",
        "data": data,
        "message": {
            "message_id": 20,
            "date": 1,
            "chat": { "id": chat_id, "type": "private", "first_name": "Alice" },
            "from": { "id": 7, "is_bot": true, "first_name": "Relay" },
            "text": "menu"
        }
    }))
    .expect("deserialize callback query")
}

/// Fails every acquisition, so a started run ends right away.
pub(crate) struct NoSource;

#[async_trait]
impl SourceDriver for NoSource {
    async fn acquire(&self) -> Result<Box<dyn SourceHandle>, SourceError> {
        Err(SourceError::AcquisitionFailed("no browser in tests".into()))
    }
}

/// A control plane wired to a mock API and a throwaway store.
pub(crate) struct Wiring {
    pub api: MockTelegramApi,
    pub plane: Arc<ControlPlane>,
    pub store: Arc<Store>,
    pub sessions: Arc<SessionAuthority>,
    pub engine: Arc<ForwardingEngine>,
    _dir: tempfile::TempDir,
}

pub(crate) async fn wired(behavior: MockBehavior, password: &str) -> Wiring {
    let api = MockTelegramApi::start(behavior).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(Store::open(dir.path(), &StoreConfig::default()));
    let sessions = Arc::new(SessionAuthority::new(
        Secret::new(password.into()),
        Duration::from_secs(3600),
    ));
    let engine = Arc::new(ForwardingEngine::new(
        Arc::new(NoSource),
        Arc::new(TelegramDelivery::new(api.bot.clone(), Duration::from_secs(5))),
        Arc::clone(&store),
        EngineSettings::default(),
    ));
    let controller = Arc::new(Controller::new(
        Arc::clone(&engine),
        Arc::clone(&sessions),
        Arc::clone(&store),
    ));
    let plane = Arc::new(ControlPlane::new(
        api.bot.clone(),
        controller,
        Arc::clone(&sessions),
        Arc::clone(&store),
    ));
    Wiring {
        api,
        plane,
        store,
        sessions,
        engine,
        _dir: dir,
    }
}
