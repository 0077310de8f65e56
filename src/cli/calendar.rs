// src/cli/calendar.rs — Write a user's calendar feed to a file or stdout

use chrono::Utc;

use super::open_store;
use crate::calendar::render_calendar;
use crate::infra::config::Config;
use crate::infra::errors::TrackError;

pub async fn run_calendar(
    token: Option<&str>,
    user_id: Option<&str>,
    output: Option<&str>,
    config: &Config,
) -> anyhow::Result<()> {
    let store = open_store()?;
    let user = match (token, user_id) {
        (Some(token), _) => store.find_user_by_calendar_token(token)?.ok_or_else(|| {
            TrackError::UnknownCalendarToken {
                token: token.to_string(),
            }
        })?,
        (None, Some(id)) => store
            .get_user(id)?
            .ok_or_else(|| anyhow::anyhow!("User '{}' not found", id))?,
        (None, None) => anyhow::bail!("Pass --token or --user"),
    };

    let tasks = store.tasks_for_user(&user.id)?;
    let ics = render_calendar(&user, &tasks, &config.calendar, Utc::now());

    if let Some(path) = output {
        std::fs::write(path, &ics)?;
        println!("Wrote calendar for {} to {}", user.full_name(), path);
    } else {
        print!("{ics}");
    }
    Ok(())
}
