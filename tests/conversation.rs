//! Conversation lifecycle integration tests
//!
//! Exercises session lifecycle, history bookkeeping, and cross-session
//! isolation without requiring a live completion endpoint.

use tutor_gateway::{Error, Message, Role};

mod common;

#[tokio::test]
async fn new_session_history_holds_only_the_system_prompt() {
    let engine = common::test_engine();
    let session = engine.ensure_session("s1").await;

    assert_eq!(session.message_count().await, 1);
    // Display snapshot excludes the system message
    assert!(engine.history("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn n_turns_store_2n_plus_one_messages_in_order() {
    let engine = common::test_engine();
    let session = engine.ensure_session("s1").await;

    let turns = 3;
    for i in 0..turns {
        session
            .record_turn(
                Message::user(format!("question {i}")),
                Message::assistant(format!("answer {i}")),
            )
            .await;
    }

    assert_eq!(session.message_count().await, 2 * turns + 1);

    let snapshot = engine.history("s1").await.unwrap();
    assert_eq!(snapshot.len(), 2 * turns);
    for (i, pair) in snapshot.chunks(2).enumerate() {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[0].content, format!("question {i}"));
        assert_eq!(pair[1].role, Role::Assistant);
        assert_eq!(pair[1].content, format!("answer {i}"));
    }
}

#[tokio::test]
async fn reset_destroys_session_and_reports_not_found() {
    let engine = common::test_engine();
    let session = engine.ensure_session("s1").await;
    session
        .record_turn(Message::user("q"), Message::assistant("a"))
        .await;

    assert!(engine.reset("s1").await);
    assert!(engine.registry().get("s1").await.is_none());
    assert!(matches!(
        engine.history("s1").await,
        Err(Error::SessionNotFound(_))
    ));

    // Resetting again is a clean no-op
    assert!(!engine.reset("s1").await);
}

#[tokio::test]
async fn recreated_session_starts_with_empty_history() {
    let engine = common::test_engine();
    let session = engine.ensure_session("s1").await;
    session
        .record_turn(Message::user("old"), Message::assistant("turn"))
        .await;

    engine.reset("s1").await;
    engine.ensure_session("s1").await;

    assert!(engine.history("s1").await.unwrap().is_empty());
}

#[tokio::test]
async fn uploaded_material_is_fixed_at_session_creation() {
    let engine = common::test_engine();
    engine
        .registry()
        .store_material("s1", "photosynthesis chapter".to_string())
        .await;

    let session = engine.ensure_session("s1").await;
    let system = &session.request_messages().await[0];
    assert_eq!(system.role, Role::System);
    assert!(system.content.contains("photosynthesis chapter"));

    // After reset the material is gone; the new session has a bare prompt
    engine.reset("s1").await;
    let recreated = engine.ensure_session("s1").await;
    let system = &recreated.request_messages().await[0];
    assert!(!system.content.contains("photosynthesis chapter"));
}

#[tokio::test]
async fn concurrent_sessions_do_not_cross_contaminate() {
    let engine = common::test_engine();

    let mut handles = Vec::new();
    for name in ["alpha", "beta"] {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let session = engine.ensure_session(name).await;
            for i in 0..10 {
                session
                    .record_turn(
                        Message::user(format!("{name} question {i}")),
                        Message::assistant(format!("{name} answer {i}")),
                    )
                    .await;
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for name in ["alpha", "beta"] {
        let snapshot = engine.history(name).await.unwrap();
        assert_eq!(snapshot.len(), 20);
        assert!(snapshot.iter().all(|m| m.content.starts_with(name)));
    }
}
