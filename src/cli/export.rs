// src/cli/export.rs — Data export command
//
// Dumps users, projects, tasks and their recorded intervals to JSON or YAML.

use super::open_store;
use crate::store::Store;

/// Export everything in the tasktrack database.
pub async fn run_export(format: &str, output: Option<&str>) -> anyhow::Result<()> {
    let db_path = crate::infra::paths::db_path();
    if !db_path.exists() {
        anyhow::bail!("No database found. Run `tasktrack user add` first to create data.");
    }

    let store = open_store()?;
    let data = collect(&store)?;
    let output_str = render(&data, format)?;

    if let Some(path) = output {
        std::fs::write(path, &output_str)?;
        println!("Exported to {}", path);
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

pub fn collect(store: &Store) -> anyhow::Result<serde_json::Value> {
    let mut tasks = Vec::new();
    for task in store.list_tasks(None)? {
        let intervals = store.fetch_intervals(&task.id)?;
        let total: u64 = intervals.iter().map(|i| i.seconds).sum();
        let mut value = serde_json::to_value(&task)?;
        value["intervals"] = serde_json::to_value(&intervals)?;
        value["total_seconds"] = serde_json::json!(total);
        tasks.push(value);
    }

    Ok(serde_json::json!({
        "users": store.list_users()?,
        "projects": store.list_projects(None)?,
        "tasks": tasks,
        "exported_at": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn render(data: &serde_json::Value, format: &str) -> anyhow::Result<String> {
    Ok(match format {
        "json" => serde_json::to_string_pretty(data)?,
        "yaml" | "yml" => serde_yml::to_string(data)?,
        other => {
            anyhow::bail!("Unsupported format '{}'. Options: json, yaml", other);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_includes_intervals() {
        let store = Store::open_in_memory().unwrap();
        let user = store.insert_user("Ada", "Lovelace", "ada@example.com").unwrap();
        let project = store.insert_project(&user.id, "Engine").unwrap();
        let task = store
            .insert_task(&project.id, "Notes", None, None, None)
            .unwrap();
        store.append_interval(&task.id, 30).unwrap();
        store.append_interval(&task.id, 45).unwrap();

        let data = collect(&store).unwrap();
        assert_eq!(data["users"].as_array().unwrap().len(), 1);
        assert_eq!(data["tasks"][0]["total_seconds"], 75);
        assert_eq!(data["tasks"][0]["intervals"].as_array().unwrap().len(), 2);
        assert_eq!(data["projects"][0]["slug"], "engine");
    }

    #[test]
    fn test_render_formats() {
        let data = serde_json::json!({ "a": 1 });
        assert!(render(&data, "json").unwrap().contains("\"a\": 1"));
        assert!(render(&data, "yaml").unwrap().contains("a: 1"));
        assert!(render(&data, "csv").is_err());
    }
}
