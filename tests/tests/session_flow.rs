//! Service-level flows across restarts and with a real subprocess engine.

use application::{ChatService, EMPTY_MESSAGE_REPLY};
use domain::{ChatError, SessionId};
use infrastructure::json_log::JsonLog;
use infrastructure::session_store::SessionStore;
use tempfile::TempDir;
use tests::ScriptedEngine;

#[tokio::test]
async fn restart_requires_explicit_resume() {
    let dir = TempDir::new().unwrap();

    let filename = {
        let service = ChatService::new(
            ScriptedEngine::with_replies(["hello"]),
            SessionStore::open(dir.path()).unwrap(),
        );
        let created = service.create_session("web").await.unwrap();
        service.send_message("web", "hi", None).await.unwrap();
        created.filename
    };

    let service = ChatService::new(
        ScriptedEngine::with_replies(["goodbye"]),
        SessionStore::open(dir.path()).unwrap(),
    );
    let err = service.send_message("web", "bye", None).await.unwrap_err();
    assert!(matches!(err, ChatError::NoActiveSession));

    service.resume_session("web", &filename).unwrap();
    service.send_message("web", "bye", None).await.unwrap();
    assert_eq!(
        service.get_session(&filename).unwrap(),
        "**User:** hi\n\n**Assistant:**\nhello\n\n---\n\n**User:** bye\n\n**Assistant:**\ngoodbye\n\n---\n\n"
    );

    let next = service.create_session("web").await.unwrap();
    assert_eq!(next.id, SessionId::new(2).unwrap());
}

#[tokio::test]
async fn sequential_creates_are_strictly_increasing() {
    let dir = TempDir::new().unwrap();
    let service = ChatService::new(ScriptedEngine::echo(), SessionStore::open(dir.path()).unwrap());

    let mut previous = 0;
    for round in 0..8 {
        let created = service.create_session("web").await.unwrap();
        assert!(created.id.get() > previous);
        previous = created.id.get();
        if round % 3 == 0 {
            service.delete_session(&created.filename).await.unwrap();
        }
    }
}

#[tokio::test]
async fn json_log_mirrors_the_conversation() {
    let dir = TempDir::new().unwrap();
    let service = ChatService::new(
        ScriptedEngine::with_replies(["four"]),
        SessionStore::open(dir.path().join("history")).unwrap(),
    );
    let created = service.create_session("console").await.unwrap();
    service.send_message("console", "2+2?", None).await.unwrap();

    let log = JsonLog::new(dir.path().join("chat_history.json"));
    log.write(&service.turns(created.id).await.unwrap()).unwrap();

    let logged: serde_json::Value =
        serde_json::from_slice(&std::fs::read(log.path()).unwrap()).unwrap();
    assert_eq!(
        logged,
        serde_json::json!([
            {"role": "user", "text": "2+2?"},
            {"role": "assistant", "text": "four"}
        ])
    );
}

#[tokio::test]
async fn sentinel_does_not_touch_the_transcript() {
    let dir = TempDir::new().unwrap();
    let service = ChatService::new(ScriptedEngine::echo(), SessionStore::open(dir.path()).unwrap());
    let created = service.create_session("web").await.unwrap();

    let reply = service.send_message("web", "\n", None).await.unwrap();
    assert_eq!(reply, EMPTY_MESSAGE_REPLY);
    assert_eq!(service.get_session(&created.filename).unwrap(), "# New Chat\n\n");
}

#[cfg(unix)]
mod subprocess {
    use super::*;
    use infrastructure::ollama_runner::OllamaRunner;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    fn fake_ollama(dir: &std::path::Path, body: &str) -> String {
        let path = dir.join("fake-ollama");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn relays_through_an_external_process() {
        let dir = TempDir::new().unwrap();
        let bin = fake_ollama(dir.path(), "printf 'model %s says: ' \"$2\"; cat");
        let service = ChatService::new(
            OllamaRunner::new(bin, "gemma3:4b"),
            SessionStore::open(dir.path().join("history")).unwrap(),
        );
        let created = service.create_session("web").await.unwrap();

        let reply = service.send_message("web", "hi", None).await.unwrap();
        assert_eq!(reply, "model gemma3:4b says: hi");
        assert_eq!(
            service.get_session(&created.filename).unwrap(),
            "**User:** hi\n\n**Assistant:**\nmodel gemma3:4b says: hi\n\n---\n\n"
        );
    }

    #[tokio::test]
    async fn hung_process_times_out_and_records_nothing() {
        let dir = TempDir::new().unwrap();
        let bin = fake_ollama(dir.path(), "exec sleep 30");
        let runner = OllamaRunner::new(bin, "m").with_timeout(Some(Duration::from_millis(300)));
        let service = ChatService::new(runner, SessionStore::open(dir.path().join("history")).unwrap());
        let created = service.create_session("web").await.unwrap();

        let err = service.send_message("web", "hi", None).await.unwrap_err();
        assert!(matches!(err, ChatError::InvocationTimeout(_)), "{err:?}");
        assert_eq!(service.get_session(&created.filename).unwrap(), "# New Chat\n\n");
    }
}
