use crate::{
    analytics::{self, DashboardFilter, DashboardStats},
    history::{self, answers, PaperHistoryEntry, PaperReview, RecoveredKey},
    scoring::{filter_indices, ReviewFilter, ScoreReport},
    storage::StorageKey,
    AppState,
};

pub async fn list_history(state: &AppState) -> Result<Vec<PaperHistoryEntry>, String> {
    history::list_history(&state.storage)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_paper(state: &AppState, id: String) -> Result<PaperHistoryEntry, String> {
    history::get_paper(&state.storage, &id)
        .await
        .map_err(|e| e.to_string())
}

/// The key to prefill the answer-entry screen with.
pub async fn get_answer_key(state: &AppState, paper_id: String) -> Result<RecoveredKey, String> {
    let paper = history::get_paper(&state.storage, &paper_id)
        .await
        .map_err(|e| e.to_string())?;
    answers::recover_key_for(&state.storage, &paper)
        .await
        .map_err(|e| e.to_string())
}

/// Stores the entered key, grades the paper with it and remembers the
/// report as the latest score.
pub async fn submit_answer_key(
    state: &AppState,
    paper_id: String,
    corrects: Vec<String>,
) -> Result<PaperReview, String> {
    let storage = &state.storage;
    let paper = history::get_paper(storage, &paper_id)
        .await
        .map_err(|e| e.to_string())?;
    answers::record_correct_answers(storage, &paper, &corrects)
        .await
        .map_err(|e| e.to_string())?;

    let report = history::grade(&paper, &corrects, state.settings.get().score_policy);
    storage
        .write_json(StorageKey::LastScore, &report)
        .await
        .map_err(|e| e.to_string())?;

    Ok(PaperReview {
        paper,
        corrects,
        key_source: answers::KeySource::Session,
        report,
    })
}

pub async fn review_paper(state: &AppState, paper_id: String) -> Result<PaperReview, String> {
    history::review_paper(&state.storage, &paper_id, state.settings.get().score_policy)
        .await
        .map_err(|e| e.to_string())
}

pub async fn review_indices(
    state: &AppState,
    paper_id: String,
    filter: ReviewFilter,
) -> Result<Vec<usize>, String> {
    let review = review_paper(state, paper_id).await?;
    Ok(filter_indices(&review.paper.answers, &review.corrects, filter))
}

pub async fn get_last_score(state: &AppState) -> Result<Option<ScoreReport>, String> {
    state
        .storage
        .read_json(StorageKey::LastScore)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_dashboard(state: &AppState, filter: DashboardFilter) -> Result<DashboardStats, String> {
    analytics::load_dashboard(&state.storage, &filter)
        .await
        .map_err(|e| e.to_string())
}
