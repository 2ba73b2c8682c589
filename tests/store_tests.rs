// tests/store_tests.rs

use std::sync::Arc;

use quizcore::error::AppError;
use quizcore::models::{
    quiz::{Question, Quiz, QuizCore},
    response::{QuizResponse, StatsRequest},
    user::User,
};
use quizcore::store::{
    Operation, Outcome, RecordStore,
    connector::{RetryConnector, RetryPolicy},
    memory::MemoryDialer,
};
use quizcore::utils::hash::account_id;

async fn open_store() -> Arc<RecordStore> {
    let connector = RetryConnector::new(Arc::new(MemoryDialer::new()), RetryPolicy::default());
    let store = Arc::new(RecordStore::new(connector));
    store.open().await.expect("memory store should open");
    store
}

fn user(username: &str, first_name: &str) -> User {
    User {
        username: username.to_string(),
        account_id: "ignored".to_string(),
        password: "$argon2id$stub".to_string(),
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        email: format!("{username}@example.com"),
        is_deleted: true,
    }
}

fn core(title: &str) -> QuizCore {
    QuizCore {
        title: title.to_string(),
        marking_type: "negative".to_string(),
        questions: vec![Question {
            description: "Which are integer types?".to_string(),
            asset: None,
            options: vec![
                "i32".to_string(),
                "f64".to_string(),
                "u8".to_string(),
                "bool".to_string(),
            ],
            answers: vec![0, 2],
        }],
    }
}

fn response(username: &str, quiz: &Quiz, score: f64) -> QuizResponse {
    QuizResponse {
        username: username.to_string(),
        quiz_id: quiz.quiz_id.clone(),
        author: quiz.author.clone(),
        score,
        responses: vec![vec![0]],
    }
}

#[tokio::test]
async fn create_user_derives_account_id_and_rejects_duplicates() {
    let store = open_store().await;

    store.create_user(user("alice", "Alice")).await.unwrap();
    let stored = store.read_user("alice").await.unwrap();
    assert_eq!(stored.account_id, account_id("alice"));
    assert!(!stored.is_deleted);

    let err = store.create_user(user("alice", "Mallory")).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(store.read_user("alice").await.unwrap(), stored);
}

#[tokio::test]
async fn user_lookup_and_soft_delete() {
    let store = open_store().await;

    assert!(matches!(
        store.read_user("ghost").await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        store.delete_user("ghost").await,
        Err(AppError::NotFound(_))
    ));

    store.create_user(user("bob", "Bob")).await.unwrap();
    store.delete_user("bob").await.unwrap();
    assert!(store.read_user("bob").await.unwrap().is_deleted);
}

#[tokio::test]
async fn create_quiz_conflicts_on_same_id() {
    let store = open_store().await;
    let quiz = Quiz::new("alice", core("First"));

    store.create_quiz(quiz.clone()).await.unwrap();

    let mut clash = Quiz::new("mallory", core("Second"));
    clash.quiz_id = quiz.quiz_id.clone();
    assert!(matches!(
        store.create_quiz(clash).await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(store.read_quiz(&quiz.quiz_id).await.unwrap(), quiz);
}

#[tokio::test]
async fn create_quiz_forces_draft_state() {
    let store = open_store().await;
    let mut quiz = Quiz::new("alice", core("Sneaky"));
    quiz.is_published = true;

    store.create_quiz(quiz.clone()).await.unwrap();
    assert!(!store.read_quiz(&quiz.quiz_id).await.unwrap().is_published);
}

#[tokio::test]
async fn only_the_author_can_change_a_draft() {
    let store = open_store().await;
    let quiz = Quiz::new("alice", core("Draft"));
    store.create_quiz(quiz.clone()).await.unwrap();

    for result in [
        store.update_quiz(&quiz.quiz_id, "mallory", core("Hijacked")).await,
        store.delete_quiz(&quiz.quiz_id, "mallory").await,
        store.publish_quiz(&quiz.quiz_id, "mallory").await,
        store.update_quiz("no-such-quiz", "alice", core("Nothing")).await,
        store.delete_quiz("no-such-quiz", "alice").await,
        store.publish_quiz("no-such-quiz", "alice").await,
    ] {
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
    assert_eq!(store.read_quiz(&quiz.quiz_id).await.unwrap(), quiz);

    store
        .update_quiz(&quiz.quiz_id, "alice", core("Revised"))
        .await
        .unwrap();
    assert_eq!(
        store.read_quiz(&quiz.quiz_id).await.unwrap().core.title,
        "Revised"
    );
}

#[tokio::test]
async fn published_quiz_is_frozen() {
    let store = open_store().await;
    let quiz = Quiz::new("alice", core("Final"));
    store.create_quiz(quiz.clone()).await.unwrap();
    store.publish_quiz(&quiz.quiz_id, "alice").await.unwrap();

    let before = store.read_quiz(&quiz.quiz_id).await.unwrap();
    assert!(before.is_published);

    assert!(matches!(
        store.update_quiz(&quiz.quiz_id, "alice", core("Changed")).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        store.delete_quiz(&quiz.quiz_id, "alice").await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        store.publish_quiz(&quiz.quiz_id, "alice").await,
        Err(AppError::Forbidden(_))
    ));
    assert_eq!(store.read_quiz(&quiz.quiz_id).await.unwrap(), before);
}

#[tokio::test]
async fn deleted_quiz_cannot_be_published() {
    let store = open_store().await;
    let quiz = Quiz::new("alice", core("Gone"));
    store.create_quiz(quiz.clone()).await.unwrap();
    store.delete_quiz(&quiz.quiz_id, "alice").await.unwrap();

    assert!(matches!(
        store.publish_quiz(&quiz.quiz_id, "alice").await,
        Err(AppError::Forbidden(_))
    ));
    assert!(store.read_quiz(&quiz.quiz_id).await.unwrap().is_deleted);
}

#[tokio::test]
async fn one_response_per_user_and_quiz() {
    let store = open_store().await;
    let quiz = Quiz::new("alice", core("Once"));

    store
        .create_response(response("bob", &quiz, 0.5))
        .await
        .unwrap();
    assert!(matches!(
        store.create_response(response("bob", &quiz, 1.0)).await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(
        store.read_response("bob", &quiz.quiz_id).await.unwrap().score,
        0.5
    );
    assert!(matches!(
        store.read_response("carol", &quiz.quiz_id).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn concurrent_creates_have_exactly_one_winner() {
    let store = open_store().await;
    let quiz = Quiz::new("alice", core("Race"));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        let quiz = quiz.clone();
        tasks.push(tokio::spawn(async move {
            store.create_response(response("bob", &quiz, i as f64)).await
        }));
    }

    let mut applied = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => applied += 1,
            Err(AppError::Conflict(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(applied, 1);
}

#[tokio::test]
async fn statistics_scan_and_pages() {
    let store = open_store().await;
    let quiz = Quiz::new("alice", core("Stats"));
    let other = Quiz::new("alice", core("Other"));

    assert!(
        store
            .read_response_statistics(&quiz.quiz_id)
            .await
            .unwrap()
            .is_empty()
    );

    for name in ["erin", "bob", "dave", "carol", "ann"] {
        store
            .create_response(response(name, &quiz, 1.0))
            .await
            .unwrap();
    }
    store
        .create_response(response("zed", &other, 1.0))
        .await
        .unwrap();

    let all = store.read_response_statistics(&quiz.quiz_id).await.unwrap();
    let names: Vec<_> = all.iter().map(|r| r.username.as_str()).collect();
    assert_eq!(names, ["ann", "bob", "carol", "dave", "erin"]);

    let mut cursor = None;
    let mut seen = Vec::new();
    let mut pages = 0;
    loop {
        let page = store
            .read_response_statistics_page(StatsRequest {
                quiz_id: quiz.quiz_id.clone(),
                cursor: cursor.take(),
                page_size: 2,
            })
            .await
            .unwrap();
        pages += 1;
        assert!(page.records.len() <= 2);
        seen.extend(page.records.into_iter().map(|r| r.username));
        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(pages, 3);
    assert_eq!(seen, ["ann", "bob", "carol", "dave", "erin"]);
}

#[tokio::test]
async fn exact_multiple_page_ends_without_cursor() {
    let store = open_store().await;
    let quiz = Quiz::new("alice", core("Even"));
    for name in ["ann", "bob"] {
        store
            .create_response(response(name, &quiz, 1.0))
            .await
            .unwrap();
    }

    let page = store
        .read_response_statistics_page(StatsRequest {
            quiz_id: quiz.quiz_id.clone(),
            cursor: None,
            page_size: 2,
        })
        .await
        .unwrap();
    assert_eq!(page.records.len(), 2);
    assert_eq!(page.cursor, None);
}

#[tokio::test]
async fn execute_dispatches_typed_operations() {
    let store = open_store().await;

    let outcome = store
        .execute(Operation::CreateUser(user("dora", "Dora")))
        .await
        .unwrap();
    assert_eq!(outcome, Outcome::Done);

    match store
        .execute(Operation::ReadUser {
            username: "dora".to_string(),
        })
        .await
        .unwrap()
    {
        Outcome::User(found) => assert_eq!(found.first_name, "Dora"),
        other => panic!("expected a user, got {other}"),
    }
}

#[tokio::test]
async fn operations_fail_without_a_session() {
    let store = open_store().await;
    store.close().await.unwrap();

    assert!(matches!(
        store.read_quiz("anything").await,
        Err(AppError::Internal(_))
    ));
}

#[tokio::test]
async fn zero_page_size_reads_a_default_page() {
    let store = open_store().await;
    let quiz = Quiz::new("alice", core("Defaults"));
    for name in ["ann", "bob", "carol"] {
        store
            .create_response(response(name, &quiz, 1.0))
            .await
            .unwrap();
    }

    let page = store
        .read_response_statistics_page(StatsRequest {
            quiz_id: quiz.quiz_id.clone(),
            cursor: None,
            page_size: 0,
        })
        .await
        .unwrap();
    assert_eq!(page.records.len(), 3);
    assert_eq!(page.cursor, None);
    assert_eq!(page.page_size, 10);
}

#[tokio::test]
async fn oversized_page_is_capped() {
    let store = open_store().await;
    let quiz = Quiz::new("alice", core("Capped"));
    store
        .create_response(response("ann", &quiz, 1.0))
        .await
        .unwrap();

    let page = store
        .read_response_statistics_page(StatsRequest {
            quiz_id: quiz.quiz_id.clone(),
            cursor: None,
            page_size: 5_000,
        })
        .await
        .unwrap();
    assert_eq!(page.records.len(), 1);
    assert_eq!(page.page_size, 100);
}
