//! ErrorSanitizer behaviour against a leaky adapter

use std::collections::BTreeSet;

use async_trait::async_trait;
use dbplugin::{
    Database, DeleteUserRequest, DeleteUserResponse, Error, ErrorSanitizer, InitializeRequest,
    InitializeResponse, NewUserRequest, NewUserResponse, ObjectKind, Result, SecretValues,
    UpdateUserRequest, UpdateUserResponse,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

/// Adapter whose errors echo its admin password back
#[derive(Default)]
struct LeakyDatabase {
    password: Mutex<String>,
}

#[async_trait]
impl Database for LeakyDatabase {
    async fn initialize(&self, req: InitializeRequest) -> Result<InitializeResponse> {
        let password = req.config["password"].as_str().unwrap_or_default().to_string();
        *self.password.lock() = password.clone();
        Err(Error::connection(
            "failed to verify connection",
            format!("login root:{password} rejected"),
        ))
    }

    async fn new_user(&self, _req: NewUserRequest) -> Result<NewUserResponse> {
        Ok(NewUserResponse {
            username: "v-ok".into(),
        })
    }

    async fn update_user(&self, req: UpdateUserRequest) -> Result<UpdateUserResponse> {
        Err(Error::not_found(
            ObjectKind::User,
            format!("{}:{}", req.username, self.password.lock()),
        ))
    }

    async fn delete_user(&self, _req: DeleteUserRequest) -> Result<DeleteUserResponse> {
        Ok(DeleteUserResponse {})
    }

    fn type_name(&self) -> &'static str {
        "leaky"
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl SecretValues for LeakyDatabase {
    async fn secret_values(&self) -> BTreeSet<String> {
        BTreeSet::from([self.password.lock().clone()])
    }
}

fn init_request(password: &str) -> InitializeRequest {
    InitializeRequest {
        config: serde_json::json!({"password": password})
            .as_object()
            .cloned()
            .unwrap(),
        verify_connection: true,
    }
}

#[tokio::test]
async fn initialize_error_is_scrubbed_with_fresh_secret() {
    let db = ErrorSanitizer::new(LeakyDatabase::default());

    let err = db.initialize(init_request("hunter2")).await.unwrap_err();

    assert_eq!(
        err.to_string(),
        "failed to verify connection: login root:[REDACTED] rejected"
    );
}

#[tokio::test]
async fn scrubbed_error_keeps_its_kind() {
    let db = ErrorSanitizer::new(LeakyDatabase::default());
    let _ = db.initialize(init_request("hunter2")).await;

    let err = db
        .update_user(UpdateUserRequest {
            username: "v-app".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(err.is_not_found());
    assert!(!err.to_string().contains("hunter2"));
}

#[tokio::test]
async fn successful_calls_pass_through() {
    let db = ErrorSanitizer::new(LeakyDatabase::default());

    let resp = db
        .delete_user(DeleteUserRequest {
            username: "v-app".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(resp, DeleteUserResponse {});
    assert_eq!(db.type_name(), "leaky");
}

#[tokio::test]
async fn inner_adapter_keeps_unredacted_state() {
    let db = ErrorSanitizer::new(LeakyDatabase::default());
    let _ = db.initialize(init_request("hunter2")).await;

    assert_eq!(*db.inner().password.lock(), "hunter2");
    assert_eq!(
        db.secret_values().await,
        BTreeSet::from(["hunter2".to_string()])
    );
}
