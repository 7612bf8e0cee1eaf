pub mod dashboard;

use anyhow::Result;
use chrono::Utc;

use crate::{
    history::{answers, load_history},
    storage::Storage,
};

pub use dashboard::{summarize, ChapterAccuracy, DashboardFilter, DashboardStats, GradedPaper, TimeWindow};

/// Joins every stored paper with its recovered key and summarizes.
pub async fn load_dashboard(storage: &Storage, filter: &DashboardFilter) -> Result<DashboardStats> {
    let papers = load_history(storage).await?;
    let records = answers::load_records(storage).await?;

    let graded: Vec<GradedPaper> = papers
        .into_iter()
        .map(|paper| {
            let corrects = answers::recover_key(&paper, &records).corrects;
            GradedPaper { paper, corrects }
        })
        .collect();

    Ok(summarize(&graded, filter, Utc::now()))
}
