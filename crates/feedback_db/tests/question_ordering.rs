use std::time::Duration;

use feedback_db::{
    placement, DbError, FeedbackDb, FeedbackQuestion, NewQuestion, ParticipantType, Placement,
    QuestionId, QuestionType, QuestionUpdate, SessionKey,
};
use tempfile::TempDir;

fn question(text: &str) -> NewQuestion {
    NewQuestion::new(
        text,
        QuestionType::Text,
        ParticipantType::Students,
        ParticipantType::Creator,
    )
    .with_visibility(vec![ParticipantType::Instructors], vec![], vec![])
}

async fn open() -> (TempDir, FeedbackDb) {
    let tmp = TempDir::new().unwrap();
    let db = FeedbackDb::open(tmp.path().join("feedback.sqlite3"))
        .await
        .unwrap();
    (tmp, db)
}

/// A session holding `n` questions "Q1".."Qn", returned in creation order.
async fn seeded(db: &FeedbackDb, n: usize) -> (SessionKey, Vec<FeedbackQuestion>) {
    let session = SessionKey::new("CS101", "Midterm feedback");
    db.session_create(&session).await.unwrap();

    let mut created = Vec::new();
    for i in 1..=n {
        created.push(
            db.create_question(&session, question(&format!("Q{}", i)))
                .await
                .unwrap(),
        );
    }
    (session, created)
}

/// Question texts in number order.
async fn order(db: &FeedbackDb, session: &SessionKey) -> Vec<String> {
    db.list_questions_for_session(session)
        .await
        .unwrap()
        .into_iter()
        .map(|q| q.question_text)
        .collect()
}

async fn move_to(db: &FeedbackDb, question: &FeedbackQuestion, number: i32) -> FeedbackQuestion {
    let update =
        QuestionUpdate::new(question.session_key(), question.id.clone()).question_number(number);
    db.place_question(&question.session_key(), Placement::Update(update), 0)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_append_default() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 3).await;

    let numbers: Vec<i32> = created.iter().map(|q| q.question_number).collect();
    assert_eq!(numbers, vec![1, 2, 3]);

    let fourth = db.create_question(&session, question("Q4")).await.unwrap();
    assert_eq!(fourth.question_number, 4);
    db.verify_numbering(&session).await.unwrap();
}

#[tokio::test]
async fn test_move_left() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 4).await;

    let moved = move_to(&db, &created[3], 2).await;
    assert_eq!(moved.question_number, 2);
    assert_eq!(order(&db, &session).await, vec!["Q1", "Q4", "Q2", "Q3"]);
    db.verify_numbering(&session).await.unwrap();
}

#[tokio::test]
async fn test_move_right() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 4).await;

    let moved = move_to(&db, &created[0], 3).await;
    assert_eq!(moved.question_number, 3);
    assert_eq!(order(&db, &session).await, vec!["Q2", "Q3", "Q1", "Q4"]);
    db.verify_numbering(&session).await.unwrap();
}

#[tokio::test]
async fn test_move_with_matching_old_number() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 3).await;

    let update = QuestionUpdate::new(session.clone(), created[2].id.clone()).question_number(1);
    db.place_question(&session, Placement::Update(update), 3)
        .await
        .unwrap();
    assert_eq!(order(&db, &session).await, vec!["Q3", "Q1", "Q2"]);
}

#[tokio::test]
async fn test_stale_old_number_is_rejected() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 3).await;

    let update = QuestionUpdate::new(session.clone(), created[2].id.clone()).question_number(1);
    let err = db
        .place_question(&session, Placement::Update(update), 2)
        .await
        .unwrap_err();

    assert!(err.is_invalid_input());
    assert_eq!(order(&db, &session).await, vec!["Q1", "Q2", "Q3"]);
}

#[tokio::test]
async fn test_insert_in_middle_shifts_later_questions() {
    let (_tmp, db) = open().await;
    let (session, _) = seeded(&db, 3).await;

    let inserted = db
        .create_question(&session, question("New").at_number(2))
        .await
        .unwrap();

    assert_eq!(inserted.question_number, 2);
    assert_eq!(order(&db, &session).await, vec!["Q1", "New", "Q2", "Q3"]);
    db.verify_numbering(&session).await.unwrap();
}

#[tokio::test]
async fn test_keep_existing_update() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 2).await;
    let original = &created[1];

    tokio::time::sleep(Duration::from_millis(10)).await;
    let update = QuestionUpdate::new(session.clone(), original.id.clone())
        .question_text("How useful were the tutorials?");
    let updated = db.update_question(&update).await.unwrap();

    assert_eq!(updated.question_text, "How useful were the tutorials?");
    assert_eq!(updated.giver_type, original.giver_type);
    assert_eq!(updated.recipient_type, original.recipient_type);
    assert_eq!(updated.question_number, original.question_number);
    assert!(updated.updated_at > original.updated_at);

    let stored = db.get_question(&session, &original.id).await.unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[tokio::test]
async fn test_update_keep_timestamp() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 1).await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    let update =
        QuestionUpdate::new(session.clone(), created[0].id.clone()).question_text("Renamed");
    let updated = db.update_question_keep_timestamp(&update).await.unwrap();

    assert_eq!(updated.question_text, "Renamed");
    assert_eq!(updated.updated_at, created[0].updated_at);
}

#[tokio::test]
async fn test_shifted_questions_keep_their_timestamp() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 4).await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    let moved = move_to(&db, &created[3], 1).await;
    assert!(moved.updated_at > created[3].updated_at);

    for original in &created[..3] {
        let stored = db.get_question(&session, &original.id).await.unwrap().unwrap();
        assert_eq!(stored.question_number, original.question_number + 1);
        assert_eq!(stored.updated_at, original.updated_at);
    }
}

#[tokio::test]
async fn test_place_in_deleted_session_fails_without_writes() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 2).await;
    assert!(db.session_delete(&session).await.unwrap());

    let err = db
        .place_question(&session, Placement::Create(question("Late")), 0)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = db
        .place_question(
            &session,
            Placement::Update(
                QuestionUpdate::new(session.clone(), created[0].id.clone()).question_number(2),
            ),
            0,
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    assert!(db.list_questions_for_course("CS101").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_session_deleted_mid_placement_writes_nothing() {
    let (_tmp, db) = open().await;
    let (session, _) = seeded(&db, 2).await;

    // Reads pin the transaction's snapshot before the session goes away.
    let mut tx = db.begin().await.unwrap();
    assert!(feedback_db::sessions::find_session(&mut tx, &session)
        .await
        .unwrap()
        .is_some());
    assert_eq!(
        feedback_db::lookup::list_for_session(&mut tx, &session)
            .await
            .unwrap()
            .len(),
        2
    );

    assert!(db.session_delete(&session).await.unwrap());

    // The stale snapshot still sees the session, so the write itself must fail.
    let result =
        placement::place_in(&mut tx, &session, Placement::Create(question("Late")), 0, true).await;
    assert!(db.finish(tx, result).await.is_err());

    assert!(db.session_get(&session).await.unwrap().is_none());
    assert!(db.list_questions_for_course("CS101").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corrupt_timestamp_is_invalid_state() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 1).await;

    sqlx::query("UPDATE feedback_questions SET updated_at = ? WHERE id = ?")
        .bind(i64::MAX)
        .bind(created[0].id.as_str())
        .execute(db.pool())
        .await
        .unwrap();

    let err = db.get_question(&session, &created[0].id).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidState(_)), "{:?}", err);
}

#[tokio::test]
async fn test_create_in_missing_session_is_not_found() {
    let (_tmp, db) = open().await;
    let session = SessionKey::new("CS101", "Never created");

    let err = db.create_question(&session, question("Q1")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_invalid_create_writes_nothing() {
    let (_tmp, db) = open().await;
    let (session, _) = seeded(&db, 2).await;

    let bad = NewQuestion::new(
        "Who should see this?",
        QuestionType::Text,
        ParticipantType::Receiver,
        ParticipantType::Creator,
    )
    .at_number(1);
    let err = db.create_question(&session, bad).await.unwrap_err();

    assert!(err.is_invalid_input());
    assert_eq!(order(&db, &session).await, vec!["Q1", "Q2"]);
}

#[tokio::test]
async fn test_invalid_move_leaves_numbering_untouched() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 3).await;

    let update = QuestionUpdate::new(session.clone(), created[2].id.clone())
        .question_number(1)
        .question_text("   ");
    let err = db
        .place_question(&session, Placement::Update(update), 0)
        .await
        .unwrap_err();

    assert!(err.is_invalid_input());
    assert_eq!(order(&db, &session).await, vec!["Q1", "Q2", "Q3"]);
}

#[tokio::test]
async fn test_failure_after_shift_rolls_back() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 3).await;

    let mut tx = db.begin().await.unwrap();
    let update = QuestionUpdate::new(session.clone(), created[2].id.clone()).question_number(1);
    placement::place_in(&mut tx, &session, Placement::Update(update), 0, true)
        .await
        .unwrap();
    let result: feedback_db::Result<()> = Err(DbError::invalid_input("caller gave up"));
    assert!(db.finish(tx, result).await.is_err());

    assert_eq!(order(&db, &session).await, vec!["Q1", "Q2", "Q3"]);
    db.verify_numbering(&session).await.unwrap();
}

#[tokio::test]
async fn test_bulk_create_is_all_or_nothing() {
    let (_tmp, db) = open().await;
    let (session, _) = seeded(&db, 1).await;

    let created = db
        .create_questions(&session, vec![question("Q2"), question("Q3").at_number(1)])
        .await
        .unwrap();
    assert_eq!(created.len(), 2);
    assert_eq!(order(&db, &session).await, vec!["Q3", "Q1", "Q2"]);

    let err = db
        .create_questions(&session, vec![question("Q4"), question("")])
        .await
        .unwrap_err();
    assert!(err.is_invalid_input());
    assert_eq!(db.count_questions_for_session(&session).await.unwrap(), 3);
}

#[tokio::test]
async fn test_delete_closes_the_gap() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 4).await;

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(db.delete_question(&session, &created[1].id).await.unwrap());

    assert_eq!(order(&db, &session).await, vec!["Q1", "Q3", "Q4"]);
    db.verify_numbering(&session).await.unwrap();

    let q3 = db.get_question(&session, &created[2].id).await.unwrap().unwrap();
    assert_eq!(q3.question_number, 2);
    assert_eq!(q3.updated_at, created[2].updated_at);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 2).await;

    assert!(db.delete_question(&session, &created[0].id).await.unwrap());
    assert!(!db.delete_question(&session, &created[0].id).await.unwrap());
    assert!(!db.delete_question(&session, &QuestionId::new()).await.unwrap());

    assert_eq!(order(&db, &session).await, vec!["Q2"]);
}

#[tokio::test]
async fn test_delete_in_missing_session_is_not_found() {
    let (_tmp, db) = open().await;
    let err = db
        .delete_question(&SessionKey::new("CS101", "Gone"), &QuestionId::new())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_update_missing_question_is_not_found() {
    let (_tmp, db) = open().await;
    let (session, _) = seeded(&db, 1).await;

    let update = QuestionUpdate::new(session.clone(), QuestionId::new()).question_text("?");
    assert!(db.update_question(&update).await.unwrap_err().is_not_found());

    let update = QuestionUpdate::new(session.clone(), QuestionId::new()).question_number(1);
    let err = db
        .place_question(&session, Placement::Update(update), 0)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_contiguity_survives_mixed_operations() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 5).await;

    move_to(&db, &created[4], 1).await;
    db.create_question(&session, question("Q6").at_number(3))
        .await
        .unwrap();
    db.delete_question(&session, &created[0].id).await.unwrap();
    let q3 = db.get_question(&session, &created[2].id).await.unwrap().unwrap();
    move_to(&db, &q3, 5).await;
    db.delete_question(&session, &created[4].id).await.unwrap();

    let questions = db.list_questions_for_session(&session).await.unwrap();
    let numbers: Vec<i32> = questions.iter().map(|q| q.question_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4]);
    db.verify_numbering(&session).await.unwrap();
}

#[tokio::test]
async fn test_duplicate_numbers_are_reported() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 3).await;

    // A plain update writes the number it is given without shifting.
    let update = QuestionUpdate::new(session.clone(), created[2].id.clone()).question_number(1);
    db.update_question(&update).await.unwrap();

    let found = db.get_question_by_number(&session, 1).await.unwrap().unwrap();
    let first_id = created[0].id.clone().min(created[2].id.clone());
    assert_eq!(found.id, first_id);

    let err = db.verify_numbering(&session).await.unwrap_err();
    assert!(matches!(err, DbError::InvariantViolation(_)));

    let err = db
        .create_question(&session, question("Q4"))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::InvariantViolation(_)));
}

#[tokio::test]
async fn test_lookups() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 2).await;

    let by_instructors = NewQuestion::new(
        "Comment on the team",
        QuestionType::Text,
        ParticipantType::Instructors,
        ParticipantType::Teams,
    );
    db.create_question(&session, by_instructors).await.unwrap();

    let students = db
        .list_questions_for_giver_type(&session, ParticipantType::Students)
        .await
        .unwrap();
    assert_eq!(students.len(), 2);
    let instructors = db
        .list_questions_for_giver_type(&session, ParticipantType::Instructors)
        .await
        .unwrap();
    assert_eq!(instructors.len(), 1);

    let second = db.get_question_by_number(&session, 2).await.unwrap().unwrap();
    assert_eq!(second.id, created[1].id);
    assert!(db.get_question_by_number(&session, 9).await.unwrap().is_none());
    assert!(db
        .get_question(&session, &QuestionId::new())
        .await
        .unwrap()
        .is_none());

    let padded = SessionKey::new("  CS101 ", " Midterm feedback ");
    assert_eq!(db.count_questions_for_session(&padded).await.unwrap(), 3);
}

#[tokio::test]
async fn test_bulk_course_delete_only_touches_matching_courses() {
    let (_tmp, db) = open().await;
    let (session, _) = seeded(&db, 2).await;

    let other = SessionKey::new("CS102", "Final feedback");
    db.session_create(&other).await.unwrap();
    db.create_question(&other, question("Kept")).await.unwrap();

    let second = SessionKey::new("CS101", "Final feedback");
    db.session_create(&second).await.unwrap();
    db.create_question(&second, question("Gone")).await.unwrap();

    let deleted = db.delete_questions_for_course("CS101").await.unwrap();
    assert_eq!(deleted, 3);

    assert_eq!(db.count_questions_for_session(&session).await.unwrap(), 0);
    assert!(db.list_questions_for_course("CS101").await.unwrap().is_empty());
    assert_eq!(order(&db, &other).await, vec!["Kept"]);
    assert_eq!(db.delete_questions_for_courses(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_session_delete_removes_questions() {
    let (_tmp, db) = open().await;
    let (session, created) = seeded(&db, 3).await;

    assert!(db.session_delete(&session).await.unwrap());
    assert!(db.session_get(&session).await.unwrap().is_none());
    assert!(db
        .get_question(&session, &created[0].id)
        .await
        .unwrap()
        .is_none());
    assert_eq!(db.count_questions_for_session(&session).await.unwrap(), 0);
}
