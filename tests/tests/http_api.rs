//! End-to-end tests of the HTTP surface against a scripted engine.

use axum::http::{Method, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tests::{ScriptedEngine, TestApp};

// ─────────────────────────────────────────────────────────────────────────────
// Chat
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn full_conversation_round_trip() {
    let app = TestApp::new(ScriptedEngine::with_replies(["hello", "goodbye"]));

    let (status, created) = app.request(Method::POST, "/new_chat", "web", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created, json!({"chat_id": 1, "filename": "chat_history_1.md"}));

    let (_, first) = app
        .request(Method::POST, "/chat", "web", Some(json!({"message": "hi"})))
        .await;
    assert_eq!(first, json!({"reply": "hello"}));
    let (_, second) = app
        .request(Method::POST, "/chat", "web", Some(json!({"message": "bye"})))
        .await;
    assert_eq!(second, json!({"reply": "goodbye"}));

    let (status, content) = app
        .request(Method::GET, "/history/chat_history_1.md", "web", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        content["content"],
        "**User:** hi\n\n**Assistant:**\nhello\n\n---\n\n**User:** bye\n\n**Assistant:**\ngoodbye\n\n---\n\n"
    );
}

#[tokio::test]
async fn empty_message_returns_sentinel_without_inference() {
    let app = TestApp::new(ScriptedEngine::echo());

    let (status, body) = app
        .request(Method::POST, "/chat", "web", Some(json!({"message": "   "})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": "⚠️ Empty message."}));
    assert_eq!(app.service.engine().calls(), 0);
}

#[tokio::test]
async fn chat_before_new_chat_is_a_conflict() {
    let app = TestApp::new(ScriptedEngine::echo());

    let (status, body) = app
        .request(Method::POST, "/chat", "web", Some(json!({"message": "hi"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "no_active_session");
    assert_eq!(app.service.engine().calls(), 0);
}

#[tokio::test]
async fn explicit_chat_id_targets_that_session() {
    let app = TestApp::new(ScriptedEngine::echo());
    app.request(Method::POST, "/new_chat", "tab-a", None).await;
    app.request(Method::POST, "/new_chat", "tab-b", None).await;

    let (status, _) = app
        .request(
            Method::POST,
            "/chat",
            "someone-else",
            Some(json!({"message": "direct", "chat_id": 1})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, first) = app
        .request(Method::GET, "/history/chat_history_1.md", "web", None)
        .await;
    assert!(first["content"].as_str().unwrap().contains("direct"));
    let (_, second) = app
        .request(Method::GET, "/history/chat_history_2.md", "web", None)
        .await;
    assert_eq!(second["content"], "# New Chat\n\n");
}

#[tokio::test]
async fn clients_do_not_share_sessions() {
    let app = TestApp::new(ScriptedEngine::echo());
    app.request(Method::POST, "/new_chat", "tab-a", None).await;
    app.request(Method::POST, "/new_chat", "tab-b", None).await;

    app.request(Method::POST, "/chat", "tab-a", Some(json!({"message": "from a"})))
        .await;
    app.request(Method::POST, "/chat", "tab-b", Some(json!({"message": "from b"})))
        .await;

    let (_, a) = app
        .request(Method::GET, "/history/chat_history_1.md", "x", None)
        .await;
    let a = a["content"].as_str().unwrap().to_string();
    assert!(a.contains("from a") && !a.contains("from b"));
}

#[tokio::test]
async fn invocation_failure_surfaces_as_bad_gateway() {
    let app = TestApp::new(ScriptedEngine::failing("ollama: command not found"));
    app.request(Method::POST, "/new_chat", "web", None).await;

    let (status, body) = app
        .request(Method::POST, "/chat", "web", Some(json!({"message": "hi"})))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "invocation_error");

    let (_, content) = app
        .request(Method::GET, "/history/chat_history_1.md", "web", None)
        .await;
    assert_eq!(content["content"], "# New Chat\n\n");
}

#[tokio::test]
async fn empty_reply_is_recorded_not_rejected() {
    let app = TestApp::new(ScriptedEngine::with_replies([""]));
    app.request(Method::POST, "/new_chat", "web", None).await;

    let (status, body) = app
        .request(Method::POST, "/chat", "web", Some(json!({"message": "ping"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"reply": ""}));
}

// ─────────────────────────────────────────────────────────────────────────────
// History
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn history_lists_sessions_in_id_order() {
    let app = TestApp::new(ScriptedEngine::echo());
    for _ in 0..10 {
        app.request(Method::POST, "/new_chat", "web", None).await;
    }
    std::fs::write(app.history_dir().join("README.txt"), "not a chat").unwrap();

    let (status, body) = app.request(Method::GET, "/history", "web", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["histories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(names.len(), 10);
    assert_eq!(names[1], "chat_history_2.md");
    assert_eq!(names[9], "chat_history_10.md");
}

#[tokio::test]
async fn unknown_or_foreign_files_are_not_found() {
    let app = TestApp::new(ScriptedEngine::echo());
    std::fs::write(app.history_dir().join("secrets.md"), "nope").unwrap();

    for uri in ["/history/chat_history_5.md", "/history/secrets.md"] {
        let (status, body) = app.request(Method::GET, uri, "web", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(body["error"], "File not found");
    }
}

#[tokio::test]
async fn delete_then_get_is_not_found_and_id_is_retired() {
    let app = TestApp::new(ScriptedEngine::echo());
    app.request(Method::POST, "/new_chat", "web", None).await;
    app.request(Method::POST, "/new_chat", "web", None).await;

    let (status, body) = app
        .request(Method::DELETE, "/history/chat_history_2.md", "web", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"message": "chat_history_2.md deleted"}));

    let (status, _) = app
        .request(Method::GET, "/history/chat_history_2.md", "web", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = app
        .request(Method::DELETE, "/history/chat_history_2.md", "web", None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "File not found");

    let (_, created) = app.request(Method::POST, "/new_chat", "web", None).await;
    assert_eq!(created["chat_id"], 3);
}

#[tokio::test]
async fn deleting_the_active_session_unbinds_the_client() {
    let app = TestApp::new(ScriptedEngine::echo());
    app.request(Method::POST, "/new_chat", "web", None).await;
    app.request(Method::DELETE, "/history/chat_history_1.md", "web", None)
        .await;

    let (status, body) = app
        .request(Method::POST, "/chat", "web", Some(json!({"message": "hello?"})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "no_active_session");
}

#[tokio::test]
async fn resume_rebinds_an_existing_session() {
    let app = TestApp::new(ScriptedEngine::echo());
    app.request(Method::POST, "/new_chat", "old-tab", None).await;

    let (status, body) = app
        .request(Method::POST, "/history/chat_history_1.md/resume", "new-tab", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"chat_id": 1, "filename": "chat_history_1.md"}));

    let (status, _) = app
        .request(Method::POST, "/chat", "new-tab", Some(json!({"message": "back again"})))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn health_reports_ok() {
    let app = TestApp::new(ScriptedEngine::echo());
    let (status, body) = app.request(Method::GET, "/health", "web", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

// ─────────────────────────────────────────────────────────────────────────────
// Concurrency
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_chats_to_one_session_keep_every_pair() {
    let app = Arc::new(TestApp::new(
        ScriptedEngine::echo().with_delay(std::time::Duration::from_millis(20)),
    ));
    app.request(Method::POST, "/new_chat", "web", None).await;

    let handles: Vec<_> = (0..12)
        .map(|n| {
            let app = Arc::clone(&app);
            tokio::spawn(async move {
                app.request(
                    Method::POST,
                    "/chat",
                    "web",
                    Some(json!({"message": format!("m{n}")})),
                )
                .await
            })
        })
        .collect();
    for handle in handles {
        let (status, _) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
    }

    let (_, body) = app
        .request(Method::GET, "/history/chat_history_1.md", "web", None)
        .await;
    let content = body["content"].as_str().unwrap();
    assert_eq!(content.matches("**User:** ").count(), 12);
    assert_eq!(content.matches("**Assistant:**\n").count(), 12);
    for n in 0..12 {
        let pair = format!("**User:** m{n}\n\n**Assistant:**\necho: m{n}\n\n---\n\n");
        assert!(content.contains(&pair), "missing or split pair {n}");
    }
}
