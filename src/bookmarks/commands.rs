use crate::{
    bookmarks::{self, Bookmark, BookmarkFilter, PracticeResult},
    history,
    session::{SessionSnapshot, TimerMode},
    AppState,
};

pub async fn list_bookmarks(
    state: &AppState,
    filter: Option<BookmarkFilter>,
    subject: Option<String>,
) -> Result<Vec<Bookmark>, String> {
    bookmarks::list_bookmarks(&state.storage, filter.unwrap_or_default(), subject.as_deref())
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_bookmark_subjects(state: &AppState) -> Result<Vec<String>, String> {
    let all = bookmarks::load_bookmarks(&state.storage)
        .await
        .map_err(|e| e.to_string())?;
    Ok(bookmarks::bookmark_subjects(&all))
}

pub async fn add_bookmark(
    state: &AppState,
    paper_id: String,
    question_index: u32,
    question_image: String,
) -> Result<Bookmark, String> {
    let paper = history::get_paper(&state.storage, &paper_id)
        .await
        .map_err(|e| e.to_string())?;
    bookmarks::add_bookmark(&state.storage, &paper, question_index, &question_image)
        .await
        .map_err(|e| e.to_string())
}

pub async fn attach_solution(
    state: &AppState,
    session_id: String,
    question_index: u32,
    solution_image: String,
) -> Result<Bookmark, String> {
    bookmarks::attach_solution(&state.storage, &session_id, question_index, &solution_image)
        .await
        .map_err(|e| e.to_string())
}

pub async fn remove_bookmark(state: &AppState, id: String) -> Result<(), String> {
    bookmarks::remove_bookmark(&state.storage, &id)
        .await
        .map_err(|e| e.to_string())
}

pub async fn start_bookmark_practice(state: &AppState, ids: Vec<String>) -> Result<SessionSnapshot, String> {
    let selected = bookmarks::bookmarks_by_ids(&state.storage, &ids)
        .await
        .map_err(|e| e.to_string())?;
    let setup = bookmarks::practice_setup(&selected, state.settings.get().default_per_question_secs)
        .map_err(|e| e.to_string())?;
    state
        .session
        .start_practice(setup, bookmarks::practice_questions(&selected))
        .await
        .map_err(|e| e.to_string())
}

/// Submits the running practice session and grades it.
pub async fn finish_bookmark_practice(state: &AppState) -> Result<PracticeResult, String> {
    match state.session.snapshot().await {
        Some(snapshot) if snapshot.mode == TimerMode::Stopwatch => {}
        _ => return Err("No bookmark practice is running".to_string()),
    }
    let run = state.session.confirm_submit().await.map_err(|e| e.to_string())?;
    let selected = bookmarks::bookmarks_by_ids(&state.storage, &run.question_ids)
        .await
        .map_err(|e| e.to_string())?;
    Ok(bookmarks::grade_practice(&run, &selected, state.settings.get().score_policy))
}
