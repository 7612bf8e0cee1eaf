use crate::{
    history::PaperHistoryEntry,
    session::{SessionController, SessionSnapshot, TestSetup},
    AppState,
};

fn controller_from_state(state: &AppState) -> SessionController {
    state.session.clone()
}

pub async fn plan_test(
    state: &AppState,
    exam: Option<String>,
    subject: String,
    chapter: String,
    chapter_number: u32,
    first_q: u32,
    last_q: u32,
) -> Result<TestSetup, String> {
    let exam = match exam {
        Some(exam) => exam,
        None => state.storage.selected_exam().await.map_err(|e| e.to_string())?,
    };
    let default_per_question_secs = state.settings.get().default_per_question_secs;
    TestSetup::planned(
        &exam,
        &subject,
        &chapter,
        chapter_number,
        first_q,
        last_q,
        default_per_question_secs,
    )
    .map_err(|e| e.to_string())
}

pub async fn start_test(state: &AppState, setup: TestSetup) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(state);
    controller.start_test(setup).await.map_err(|e| e.to_string())
}

pub async fn get_session_state(state: &AppState) -> Result<Option<SessionSnapshot>, String> {
    let controller = controller_from_state(state);
    Ok(controller.snapshot().await)
}

pub async fn select_option(state: &AppState, option: String) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(state);
    controller
        .select_option(&option)
        .await
        .map_err(|e| e.to_string())
}

pub async fn navigate(state: &AppState, delta: i64) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(state);
    controller.navigate(delta).await.map_err(|e| e.to_string())
}

pub async fn jump_to_question(state: &AppState, index: usize) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(state);
    controller.jump_to(index).await.map_err(|e| e.to_string())
}

pub async fn add_question(state: &AppState) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(state);
    controller.add_question().await.map_err(|e| e.to_string())
}

pub async fn open_submit_panel(state: &AppState) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(state);
    controller
        .open_submit_panel()
        .await
        .map_err(|e| e.to_string())
}

pub async fn back_to_test(state: &AppState) -> Result<SessionSnapshot, String> {
    let controller = controller_from_state(state);
    controller.back().await.map_err(|e| e.to_string())
}

pub async fn confirm_submit(state: &AppState) -> Result<PaperHistoryEntry, String> {
    let controller = controller_from_state(state);
    controller.confirm_submit().await.map_err(|e| e.to_string())
}

pub async fn cancel_test(state: &AppState) -> Result<(), String> {
    let controller = controller_from_state(state);
    controller.cancel().await.map_err(|e| e.to_string())
}
