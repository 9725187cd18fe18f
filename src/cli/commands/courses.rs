//! Courses command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::CourseAnalytics;
use anyhow::Result;

/// Run the courses command.
pub async fn run_courses(settings: Settings) -> Result<()> {
    preflight::check(Operation::Retrieve, &settings)?;
    let catalog = super::open_catalog(&settings).await?;

    match CourseAnalytics::collect(catalog.as_ref()).await {
        Ok(analytics) => {
            if analytics.total_courses == 0 {
                Output::info("The catalog has no courses yet.");
            } else {
                Output::header(&format!("Courses ({})", analytics.total_courses));
                println!();
                for title in &analytics.course_titles {
                    Output::list_item(title);
                }
                println!();
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list courses: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
