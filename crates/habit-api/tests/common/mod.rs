#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use habit_api::auth::{AppStateInner, issue_token};
use habit_db::Database;
use habit_db::models::UserFields;

pub const SECRET: &str = "test-secret";

pub struct TestApp {
    pub router: Router,
    pub db: Arc<Database>,
}

impl TestApp {
    pub fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let state = Arc::new(AppStateInner {
            db: db.clone(),
            jwt_secret: SECRET.to_string(),
        });
        Self {
            router: habit_api::router(state),
            db,
        }
    }

    /// Insert a user directly and return its id with a valid token.
    pub fn user(&self, email: &str, chat_id: Option<&str>) -> (Uuid, String) {
        let id = Uuid::new_v4();
        self.db
            .create_user(
                id,
                &UserFields {
                    email: email.to_string(),
                    password_hash: "not-used".to_string(),
                    phone: None,
                    city: Some("Moscow".to_string()),
                    avatar: None,
                    tg_chat_id: chat_id.map(str::to_string),
                },
            )
            .unwrap();
        let token = issue_token(SECRET, id, email).unwrap();
        (id, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let req = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

/// Error codes of a validation response, in order.
pub fn error_codes(body: &Value) -> Vec<String> {
    body["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter_map(|e| e["code"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
