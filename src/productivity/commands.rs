use serde::Serialize;

use crate::{
    productivity::{
        GamificationState, NewTask, PomodoroSession, PomodoroSnapshot, ProductivityController, ProductivityTask,
        Statistics, TaskFilter, ToggleOutcome,
    },
    AppState,
};

fn controller_from_state(state: &AppState) -> ProductivityController {
    state.productivity.clone()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressOverview {
    pub gamification: GamificationState,
    pub daily_goal: u32,
    pub statistics: Statistics,
}

pub async fn list_tasks(state: &AppState, filter: Option<TaskFilter>) -> Result<Vec<ProductivityTask>, String> {
    let controller = controller_from_state(state);
    Ok(controller.tasks(filter.unwrap_or_default()).await)
}

pub async fn add_task(state: &AppState, task: NewTask) -> Result<ProductivityTask, String> {
    let controller = controller_from_state(state);
    controller.add_task(task).await.map_err(|e| e.to_string())
}

pub async fn toggle_task(state: &AppState, id: String) -> Result<ToggleOutcome, String> {
    let controller = controller_from_state(state);
    controller.toggle_task(&id).await.map_err(|e| e.to_string())
}

pub async fn remove_task(state: &AppState, id: String) -> Result<ProductivityTask, String> {
    let controller = controller_from_state(state);
    controller.remove_task(&id).await.map_err(|e| e.to_string())
}

pub async fn set_daily_goal(state: &AppState, goal: u32) -> Result<(), String> {
    let controller = controller_from_state(state);
    controller
        .set_daily_goal(goal)
        .await
        .map_err(|e| e.to_string())
}

pub async fn get_progress(state: &AppState) -> Result<ProgressOverview, String> {
    let controller = controller_from_state(state);
    Ok(ProgressOverview {
        gamification: controller.gamification().await,
        daily_goal: controller.daily_goal().await,
        statistics: controller.statistics().await,
    })
}

pub async fn list_pomodoro_sessions(state: &AppState) -> Result<Vec<PomodoroSession>, String> {
    let controller = controller_from_state(state);
    Ok(controller.sessions().await)
}

pub async fn get_pomodoro_state(state: &AppState) -> Result<PomodoroSnapshot, String> {
    let controller = controller_from_state(state);
    Ok(controller.pomodoro_snapshot().await)
}

pub async fn start_pomodoro(state: &AppState, task_id: String) -> Result<PomodoroSnapshot, String> {
    let controller = controller_from_state(state);
    controller
        .start_pomodoro(&task_id)
        .await
        .map_err(|e| e.to_string())
}

pub async fn stop_pomodoro(state: &AppState) -> Result<(), String> {
    let controller = controller_from_state(state);
    controller.stop_pomodoro().await.map_err(|e| e.to_string())
}
