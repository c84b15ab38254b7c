use crate::error::{IslandError, Result};
use crate::events::{Rect, WindowSnapshot};
use crate::utils::{process_name, run_tool};
use serde_json::Value;
use tokio::time::Duration;

pub struct SwayReader {
    timeout: Duration,
}

impl SwayReader {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn test(&self) -> Result<()> {
        run_tool("swaymsg", &["-t", "get_version"], self.timeout).await?;
        Ok(())
    }

    pub async fn get_active_window(&self) -> Result<Option<WindowSnapshot>> {
        let output = run_tool("swaymsg", &["-t", "get_tree"], self.timeout).await?;
        let tree: Value = serde_json::from_str(&output)?;
        Ok(find_focused(&tree).and_then(snapshot_from_node))
    }

    pub async fn output_geometry(&self) -> Result<Rect> {
        let output = run_tool("swaymsg", &["-t", "get_outputs"], self.timeout).await?;
        let outputs: Value = serde_json::from_str(&output)?;
        focused_output_rect(&outputs)
            .ok_or_else(|| IslandError::Internal("Активный выход в Sway не найден".to_string()))
    }
}

/// Рекурсивный поиск сфокусированного узла в дереве sway
pub fn find_focused(node: &Value) -> Option<&Value> {
    if node["focused"].as_bool() == Some(true) {
        return Some(node);
    }

    ["nodes", "floating_nodes"]
        .iter()
        .filter_map(|key| node[*key].as_array())
        .flatten()
        .find_map(find_focused)
}

fn snapshot_from_node(node: &Value) -> Option<WindowSnapshot> {
    // Сфокусированным может быть рабочий стол без окон
    if node["type"].as_str() == Some("workspace") {
        return None;
    }

    let title = node["name"].as_str().unwrap_or_default().to_string();
    let mut snapshot = WindowSnapshot::new(title);

    if let Some(rect) = parse_rect(&node["rect"]) {
        snapshot = snapshot.with_bounds(rect);
    }

    let app = node["app_id"]
        .as_str()
        .or_else(|| node["window_properties"]["class"].as_str())
        .unwrap_or_default()
        .to_string();

    match node["pid"].as_u64().and_then(|pid| u32::try_from(pid).ok()) {
        Some(pid) => {
            snapshot = snapshot.with_pid(pid).with_process(process_name(pid).unwrap_or(app));
        }
        None => snapshot = snapshot.with_process(app),
    }

    Some(snapshot)
}

fn parse_rect(value: &Value) -> Option<Rect> {
    Some(Rect::new(
        value["x"].as_i64()? as i32,
        value["y"].as_i64()? as i32,
        value["width"].as_u64()? as u32,
        value["height"].as_u64()? as u32,
    ))
}

fn focused_output_rect(outputs: &Value) -> Option<Rect> {
    let outputs = outputs.as_array()?;
    outputs
        .iter()
        .find(|o| o["focused"].as_bool() == Some(true))
        .or_else(|| outputs.iter().find(|o| o["active"].as_bool() == Some(true)))
        .and_then(|o| parse_rect(&o["rect"]))
}
