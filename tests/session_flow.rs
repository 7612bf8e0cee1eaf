mod common;

use std::time::Duration;

use testarena_lib::{
    analytics::DashboardFilter,
    db::Database,
    events::EventBus,
    history::{self, commands as history_commands, KeySource},
    session::{commands as session_commands, SessionController, SessionStatus, TestSetup},
    storage::Storage,
};

fn quick_setup(questions: u32, per_question_secs: u64) -> TestSetup {
    TestSetup {
        exam: "NEET".into(),
        subject: "Physics".into(),
        chapter: "Motion".into(),
        chapter_number: 3,
        first_q: 1,
        last_q: questions,
        per_question_secs,
        total_secs: questions as u64 * per_question_secs,
    }
}

#[tokio::test]
async fn timed_test_from_plan_to_score() {
    let app = common::app().await;

    let setup = session_commands::plan_test(&app, Some("neet".into()), "Physics".into(), "Motion".into(), 3, 1, 4)
        .await
        .unwrap();
    assert_eq!(setup.per_question_secs, 144);
    assert_eq!(setup.total_secs, 4 * 144);

    session_commands::start_test(&app, setup.clone()).await.unwrap();
    assert!(session_commands::start_test(&app, setup).await.is_err());

    session_commands::select_option(&app, "A".into()).await.unwrap();
    session_commands::navigate(&app, 1).await.unwrap();
    session_commands::select_option(&app, "B".into()).await.unwrap();
    let toggled = session_commands::select_option(&app, "B".into()).await.unwrap();
    assert_eq!(toggled.current_answer, "");
    session_commands::select_option(&app, "C".into()).await.unwrap();
    session_commands::navigate(&app, 1).await.unwrap();
    session_commands::select_option(&app, "D".into()).await.unwrap();

    let grown = session_commands::add_question(&app).await.unwrap();
    assert_eq!(grown.question_count, 5);
    assert_eq!(grown.grid.len(), 5);
    assert_eq!(grown.remaining_secs, 5 * 144);
    assert_eq!(grown.attempted, 3);

    session_commands::open_submit_panel(&app).await.unwrap();
    assert!(session_commands::select_option(&app, "A".into()).await.is_err());
    let paper = session_commands::confirm_submit(&app).await.unwrap();
    assert_eq!(paper.answers, vec!["A", "C", "D", "", ""]);
    assert_eq!(paper.timestamps.len(), 5);
    assert_eq!(paper.question_ids.len(), 5);
    assert_eq!(paper.last_q, 5);

    let listed = history_commands::list_history(&app).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, paper.id);

    let blank = history_commands::get_answer_key(&app, paper.id.clone()).await.unwrap();
    assert_eq!(blank.source, KeySource::None);
    assert_eq!(blank.corrects, vec![""; 5]);

    let key: Vec<String> = ["A", "C", "B", "A", "B"].iter().map(|s| s.to_string()).collect();
    let review = history_commands::submit_answer_key(&app, paper.id.clone(), key.clone())
        .await
        .unwrap();
    assert_eq!(review.report.correct, 2);
    assert_eq!(review.report.wrong, 1);
    assert_eq!(review.report.unattempted, 2);
    assert_eq!(review.report.score, 7.0);
    assert_eq!(review.report.accuracy, 67);

    let last = history_commands::get_last_score(&app).await.unwrap();
    assert_eq!(last, Some(review.report.clone()));

    let again = history_commands::review_paper(&app, paper.id.clone()).await.unwrap();
    assert_eq!(again.key_source, KeySource::Session);
    assert_eq!(again.corrects, key);

    let stats = history_commands::get_dashboard(&app, DashboardFilter::default())
        .await
        .unwrap();
    assert_eq!(stats.papers, 1);
    assert_eq!(stats.attempted, 3);
    assert_eq!(stats.correct, 2);
    assert_eq!(stats.subjects, vec!["Physics"]);

    app.shutdown().await;
}

#[tokio::test]
async fn forced_submit_cannot_go_back() {
    let storage = Storage::new(Database::in_memory().unwrap());
    let controller = SessionController::new(storage.clone(), EventBus::new(), 30)
        .with_tick_interval(Duration::from_millis(2));

    controller.start_test(quick_setup(2, 1)).await.unwrap();
    controller.select_option("B").await.unwrap();

    let mut forced = false;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let snapshot = controller.snapshot().await.unwrap();
        if snapshot.status == (SessionStatus::SubmitPending { forced: true }) {
            assert_eq!(snapshot.remaining_secs, 0);
            assert!(!snapshot.can_go_back);
            forced = true;
            break;
        }
    }
    assert!(forced, "time never ran out");

    assert!(controller.back().await.is_err());
    let paper = controller.confirm_submit().await.unwrap();
    assert_eq!(paper.answers, vec!["B", ""]);
    assert_eq!(paper.timestamps, vec![2, 0]);
    assert_eq!(paper.total_time, 0);

    let stored = history::load_history(&storage).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn manual_submit_panel_can_go_back() {
    let storage = Storage::new(Database::in_memory().unwrap());
    let controller = SessionController::new(storage.clone(), EventBus::new(), 30);

    controller.start_test(quick_setup(3, 60)).await.unwrap();
    let pending = controller.open_submit_panel().await.unwrap();
    assert_eq!(pending.status, SessionStatus::SubmitPending { forced: false });
    assert!(pending.can_go_back);

    let resumed = controller.back().await.unwrap();
    assert_eq!(resumed.status, SessionStatus::Running);
    controller.select_option("C").await.unwrap();

    controller.cancel().await.unwrap();
    assert!(controller.snapshot().await.is_none());
    assert!(history::load_history(&storage).await.unwrap().is_empty());
}

#[tokio::test]
async fn corrected_answer_key_replaces_the_first_entry() {
    let app = common::app().await;

    session_commands::start_test(&app, quick_setup(2, 60)).await.unwrap();
    session_commands::select_option(&app, "A".into()).await.unwrap();
    session_commands::open_submit_panel(&app).await.unwrap();
    let paper = session_commands::confirm_submit(&app).await.unwrap();

    let typo = vec!["B".to_string(), "B".to_string()];
    history_commands::submit_answer_key(&app, paper.id.clone(), typo).await.unwrap();
    let fixed = vec!["A".to_string(), "B".to_string()];
    history_commands::submit_answer_key(&app, paper.id.clone(), fixed.clone()).await.unwrap();

    let key = history_commands::get_answer_key(&app, paper.id.clone()).await.unwrap();
    assert_eq!(key.source, KeySource::Session);
    assert_eq!(key.corrects, fixed);

    let review = history_commands::review_paper(&app, paper.id).await.unwrap();
    assert_eq!(review.report.correct, 1);
    assert_eq!(review.report.wrong, 0);
    assert_eq!(review.report.score, 4.0);

    app.shutdown().await;
}
