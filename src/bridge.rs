//! Line-delimited JSON bridge between a UI shell and the core.
//!
//! Every stdin line is one request, `{"id":..,"command":"..","args":{..}}`.
//! Every reply is one stdout line, either `{"id":..,"ok":..}` or
//! `{"id":..,"error":".."}`. Events go out as `{"event":..,"payload":..}`
//! lines whenever they happen.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    sync::{broadcast, mpsc},
};

use crate::{
    analytics::DashboardFilter,
    bookmarks::{self, BookmarkFilter},
    history, productivity,
    productivity::{NewTask, TaskFilter},
    scoring::ReviewFilter,
    session::{self, TestSetup},
    settings::AppSettings,
    settings_commands, storage, AppState,
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

#[derive(Debug, Deserialize)]
struct BridgeRequest {
    #[serde(default)]
    id: Value,
    command: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum BridgeReply {
    Ok { id: Value, ok: Value },
    Error { id: Value, error: String },
}

/// Every command the shell can invoke, with its arguments.
#[derive(Debug, Deserialize)]
#[serde(tag = "command", content = "args", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Command {
    PlanTest {
        #[serde(default)]
        exam: Option<String>,
        subject: String,
        chapter: String,
        chapter_number: u32,
        first_q: u32,
        last_q: u32,
    },
    StartTest {
        setup: TestSetup,
    },
    GetSessionState {},
    SelectOption {
        option: String,
    },
    Navigate {
        delta: i64,
    },
    JumpToQuestion {
        index: usize,
    },
    AddQuestion {},
    OpenSubmitPanel {},
    BackToTest {},
    ConfirmSubmit {},
    CancelTest {},

    ListHistory {},
    GetPaper {
        id: String,
    },
    GetAnswerKey {
        paper_id: String,
    },
    SubmitAnswerKey {
        paper_id: String,
        corrects: Vec<String>,
    },
    ReviewPaper {
        paper_id: String,
    },
    ReviewIndices {
        paper_id: String,
        #[serde(default)]
        filter: ReviewFilter,
    },
    GetLastScore {},
    GetDashboard {
        #[serde(default)]
        filter: DashboardFilter,
    },

    ListBookmarks {
        #[serde(default)]
        filter: Option<BookmarkFilter>,
        #[serde(default)]
        subject: Option<String>,
    },
    GetBookmarkSubjects {},
    AddBookmark {
        paper_id: String,
        question_index: u32,
        question_image: String,
    },
    AttachSolution {
        session_id: String,
        question_index: u32,
        solution_image: String,
    },
    RemoveBookmark {
        id: String,
    },
    StartBookmarkPractice {
        ids: Vec<String>,
    },
    FinishBookmarkPractice {},

    ListTasks {
        #[serde(default)]
        filter: Option<TaskFilter>,
    },
    AddTask {
        task: NewTask,
    },
    ToggleTask {
        id: String,
    },
    RemoveTask {
        id: String,
    },
    SetDailyGoal {
        goal: u32,
    },
    GetProgress {},
    ListPomodoroSessions {},
    GetPomodoroState {},
    StartPomodoro {
        task_id: String,
    },
    StopPomodoro {},

    ExportBackup {},
    PreviewBackup {
        path: String,
    },
    RestoreBackup {
        path: String,
        #[serde(default)]
        confirmed: bool,
    },
    ResetAllData {},
    GetSelectedExam {},
    SelectExam {
        exam: String,
    },

    GetSettings {},
    UpdateSettings {
        settings: AppSettings,
    },
}

impl Command {
    /// Builds a command from its name and arguments. Missing or null
    /// arguments count as an empty object.
    pub fn parse(name: &str, args: Value) -> Result<Self, String> {
        let args = match args {
            Value::Null => json!({}),
            other => other,
        };
        serde_json::from_value(json!({ "command": name, "args": args }))
            .map_err(|err| format!("Invalid command {name}: {err}"))
    }
}

fn to_value<T: Serialize>(result: Result<T, String>) -> Result<Value, String> {
    result.and_then(|value| serde_json::to_value(value).map_err(|e| e.to_string()))
}

pub async fn dispatch(state: &AppState, command: Command) -> Result<Value, String> {
    use Command::*;

    match command {
        PlanTest {
            exam,
            subject,
            chapter,
            chapter_number,
            first_q,
            last_q,
        } => to_value(
            session::commands::plan_test(state, exam, subject, chapter, chapter_number, first_q, last_q).await,
        ),
        StartTest { setup } => to_value(session::commands::start_test(state, setup).await),
        GetSessionState {} => to_value(session::commands::get_session_state(state).await),
        SelectOption { option } => to_value(session::commands::select_option(state, option).await),
        Navigate { delta } => to_value(session::commands::navigate(state, delta).await),
        JumpToQuestion { index } => to_value(session::commands::jump_to_question(state, index).await),
        AddQuestion {} => to_value(session::commands::add_question(state).await),
        OpenSubmitPanel {} => to_value(session::commands::open_submit_panel(state).await),
        BackToTest {} => to_value(session::commands::back_to_test(state).await),
        ConfirmSubmit {} => to_value(session::commands::confirm_submit(state).await),
        CancelTest {} => to_value(session::commands::cancel_test(state).await),

        ListHistory {} => to_value(history::commands::list_history(state).await),
        GetPaper { id } => to_value(history::commands::get_paper(state, id).await),
        GetAnswerKey { paper_id } => to_value(history::commands::get_answer_key(state, paper_id).await),
        SubmitAnswerKey { paper_id, corrects } => {
            to_value(history::commands::submit_answer_key(state, paper_id, corrects).await)
        }
        ReviewPaper { paper_id } => to_value(history::commands::review_paper(state, paper_id).await),
        ReviewIndices { paper_id, filter } => {
            to_value(history::commands::review_indices(state, paper_id, filter).await)
        }
        GetLastScore {} => to_value(history::commands::get_last_score(state).await),
        GetDashboard { filter } => to_value(history::commands::get_dashboard(state, filter).await),

        ListBookmarks { filter, subject } => {
            to_value(bookmarks::commands::list_bookmarks(state, filter, subject).await)
        }
        GetBookmarkSubjects {} => to_value(bookmarks::commands::get_bookmark_subjects(state).await),
        AddBookmark {
            paper_id,
            question_index,
            question_image,
        } => to_value(bookmarks::commands::add_bookmark(state, paper_id, question_index, question_image).await),
        AttachSolution {
            session_id,
            question_index,
            solution_image,
        } => to_value(
            bookmarks::commands::attach_solution(state, session_id, question_index, solution_image).await,
        ),
        RemoveBookmark { id } => to_value(bookmarks::commands::remove_bookmark(state, id).await),
        StartBookmarkPractice { ids } => to_value(bookmarks::commands::start_bookmark_practice(state, ids).await),
        FinishBookmarkPractice {} => to_value(bookmarks::commands::finish_bookmark_practice(state).await),

        ListTasks { filter } => to_value(productivity::commands::list_tasks(state, filter).await),
        AddTask { task } => to_value(productivity::commands::add_task(state, task).await),
        ToggleTask { id } => to_value(productivity::commands::toggle_task(state, id).await),
        RemoveTask { id } => to_value(productivity::commands::remove_task(state, id).await),
        SetDailyGoal { goal } => to_value(productivity::commands::set_daily_goal(state, goal).await),
        GetProgress {} => to_value(productivity::commands::get_progress(state).await),
        ListPomodoroSessions {} => to_value(productivity::commands::list_pomodoro_sessions(state).await),
        GetPomodoroState {} => to_value(productivity::commands::get_pomodoro_state(state).await),
        StartPomodoro { task_id } => to_value(productivity::commands::start_pomodoro(state, task_id).await),
        StopPomodoro {} => to_value(productivity::commands::stop_pomodoro(state).await),

        ExportBackup {} => to_value(storage::commands::export_backup(state).await),
        PreviewBackup { path } => to_value(storage::commands::preview_backup(path).await),
        RestoreBackup { path, confirmed } => {
            to_value(storage::commands::restore_backup(state, path, confirmed).await)
        }
        ResetAllData {} => to_value(storage::commands::reset_all_data(state).await),
        GetSelectedExam {} => to_value(storage::commands::get_selected_exam(state).await),
        SelectExam { exam } => to_value(storage::commands::select_exam(state, exam).await),

        GetSettings {} => to_value(settings_commands::get_settings(state).await),
        UpdateSettings { settings } => to_value(settings_commands::update_settings(state, settings).await),
    }
}

/// Handles one request line and renders the reply line.
pub async fn handle_line(state: &AppState, line: &str) -> String {
    let reply = match serde_json::from_str::<BridgeRequest>(line) {
        Ok(request) => {
            let outcome = match Command::parse(&request.command, request.args) {
                Ok(command) => dispatch(state, command).await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(ok) => BridgeReply::Ok { id: request.id, ok },
                Err(error) => BridgeReply::Error { id: request.id, error },
            }
        }
        Err(err) => BridgeReply::Error {
            id: Value::Null,
            error: format!("Malformed request: {err}"),
        },
    };

    serde_json::to_string(&reply)
        .unwrap_or_else(|err| format!(r#"{{"id":null,"error":"failed to encode reply: {err}"}}"#))
}

/// Serves requests from stdin until it closes. Requests run one at a time,
/// in order; events are interleaved between reply lines as they arrive.
pub async fn serve(state: &AppState) -> Result<()> {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(line) = out_rx.recv().await {
            let written = async {
                stdout.write_all(line.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await
            };
            if let Err(err) = written.await {
                log_error!("failed to write to stdout: {err}");
                break;
            }
        }
    });

    let mut events = state.events.subscribe();
    let event_tx = out_tx.clone();
    let forwarder = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => {
                        if event_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(err) => log_error!("failed to encode event: {err}"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    log_warn!("bridge fell behind; dropped {skipped} events");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    log_info!("bridge ready");
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(state, &line).await;
        if out_tx.send(reply).is_err() {
            break;
        }
    }

    log_info!("stdin closed; stopping bridge");
    forwarder.abort();
    drop(out_tx);
    if let Err(err) = writer.await {
        log_error!("stdout writer failed to join: {err}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_names_and_args() {
        assert!(matches!(
            Command::parse("get_session_state", Value::Null),
            Ok(Command::GetSessionState {})
        ));
        assert!(matches!(
            Command::parse("navigate", json!({ "delta": -1 })),
            Ok(Command::Navigate { delta: -1 })
        ));
        match Command::parse("add_bookmark", json!({ "paperId": "p1", "questionIndex": 2, "questionImage": "img" })) {
            Ok(Command::AddBookmark { paper_id, question_index, .. }) => {
                assert_eq!(paper_id, "p1");
                assert_eq!(question_index, 2);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
        assert!(Command::parse("launch_rockets", Value::Null).is_err());
        assert!(Command::parse("select_option", json!({})).is_err());
    }

    #[test]
    fn optional_args_default() {
        match Command::parse("get_dashboard", json!({})) {
            Ok(Command::GetDashboard { filter }) => assert_eq!(filter, DashboardFilter::default()),
            other => panic!("unexpected parse: {other:?}"),
        }
        assert!(matches!(
            Command::parse("restore_backup", json!({ "path": "x.json" })),
            Ok(Command::RestoreBackup { confirmed: false, .. })
        ));
    }
}
