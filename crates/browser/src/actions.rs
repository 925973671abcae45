//! Primitive page actions on a [`BrowserSession`]: snapshot, navigate,
//! click, fill, key press and script evaluation.

use autosignup_core::{Error, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::session::BrowserSession;
use super::snapshot::{assign_refs, parse_ax_tree, render_tree};

impl BrowserSession {
    /// Capture the accessibility tree as text and replace the ref table.
    pub async fn snapshot(&mut self, verbose: bool) -> Result<String> {
        let ax_tree = self.cdp.get_accessibility_tree().await?;
        let mut nodes = parse_ax_tree(&ax_tree);
        self.refs = assign_refs(&mut nodes);
        let text = render_tree(&nodes, !verbose, None);
        debug!(bytes = text.len(), refs = self.refs.len(), "Snapshot captured");
        Ok(text)
    }

    pub async fn navigate(&mut self, url: &str) -> Result<()> {
        let result = self.cdp.navigate(url).await?;
        if let Some(error_text) = result.get("errorText").and_then(|v| v.as_str()) {
            return Err(Error::Browser(format!("navigation to {} failed: {}", url, error_text)));
        }
        self.current_url = Some(url.to_string());
        // Page.navigate returns before the load completes.
        tokio::time::sleep(Duration::from_millis(1500)).await;
        Ok(())
    }

    pub async fn click_ref(&mut self, ref_id: &str) -> Result<()> {
        let backend_node_id = self.backend_node_for(ref_id)?;
        self.click_by_backend_node(backend_node_id).await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    /// Replace the content of an input with `text`.
    pub async fn fill_ref(&mut self, ref_id: &str, text: &str) -> Result<()> {
        let backend_node_id = self.backend_node_for(ref_id)?;
        self.cdp
            .send_command("DOM.focus", json!({"backendNodeId": backend_node_id}))
            .await?;

        self.cdp
            .evaluate_js(
                "document.activeElement && (document.activeElement.isContentEditable \
                 ? (document.activeElement.textContent = '') \
                 : (document.activeElement.value = ''))",
            )
            .await?;

        self.cdp.insert_text(text).await?;

        // React-style forms only notice value changes through input events.
        self.cdp
            .evaluate_js("document.activeElement && document.activeElement.dispatchEvent(new Event('input', {bubbles: true}))")
            .await?;
        Ok(())
    }

    pub async fn press_key(&mut self, key: &str) -> Result<()> {
        let (key_name, code, modifiers) = parse_key_spec(key);
        self.cdp.dispatch_key_event("keyDown", &key_name, &code, modifiers).await?;
        self.cdp.dispatch_key_event("keyUp", &key_name, &code, modifiers).await?;
        Ok(())
    }

    /// Evaluate a script and return its value. Script exceptions are errors.
    pub async fn evaluate(&mut self, script: &str) -> Result<Value> {
        let result = self.cdp.evaluate_js(script).await?;
        if let Some(exception) = result.get("exceptionDetails") {
            let text = exception
                .get("exception")
                .and_then(|e| e.get("description"))
                .or_else(|| exception.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or("script threw");
            return Err(Error::Browser(format!("script error: {}", text)));
        }
        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn backend_node_for(&self, ref_id: &str) -> Result<i64> {
        let ref_id = ref_id.trim_start_matches('@');
        let target = self
            .refs
            .get(ref_id)
            .ok_or_else(|| Error::Browser(format!("ref '{}' not in the current snapshot", ref_id)))?;
        target
            .backend_node_id
            .ok_or_else(|| Error::Browser(format!("ref '{}' ({} \"{}\") has no DOM node", ref_id, target.role, target.name)))
    }

    async fn click_by_backend_node(&self, backend_node_id: i64) -> Result<()> {
        let resolved = self
            .cdp
            .send_command("DOM.resolveNode", json!({"backendNodeId": backend_node_id}))
            .await?;
        let object_id = resolved
            .get("object")
            .and_then(|o| o.get("objectId"))
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Browser("failed to resolve node for click".into()))?;

        // Bring the element on screen before reading its box.
        self.cdp
            .call_on_object(object_id, "function() { this.scrollIntoView({block: 'center'}); }")
            .await?;

        let box_model = self
            .cdp
            .send_command("DOM.getBoxModel", json!({"backendNodeId": backend_node_id}))
            .await
            .ok()
            .and_then(|bm| extract_center_from_box_model(&bm));

        let Some((x, y)) = box_model else {
            self.cdp.call_on_object(object_id, "function() { this.click(); }").await?;
            return Ok(());
        };

        self.cdp.click_at(x, y).await
    }
}

/// Centre of the content quad of a `DOM.getBoxModel` response.
fn extract_center_from_box_model(bm: &Value) -> Option<(f64, f64)> {
    let content = bm.get("model")?.get("content")?.as_array()?;
    if content.len() < 8 {
        return None;
    }
    let x1 = content[0].as_f64()?;
    let y1 = content[1].as_f64()?;
    let x2 = content[4].as_f64()?;
    let y2 = content[5].as_f64()?;
    Some(((x1 + x2) / 2.0, (y1 + y2) / 2.0))
}

/// Parse a key specification like "Enter", "Escape" or "Ctrl+A" into
/// (key, code, modifier bitmask).
pub fn parse_key_spec(key: &str) -> (String, String, i32) {
    let parts: Vec<&str> = key.split('+').collect();
    let mut modifiers = 0i32;
    let mut main_key = key.to_string();

    if parts.len() > 1 {
        for &part in &parts[..parts.len() - 1] {
            match part.to_lowercase().as_str() {
                "ctrl" | "control" => modifiers |= 2,
                "alt" | "option" => modifiers |= 1,
                "shift" => modifiers |= 8,
                "meta" | "cmd" | "command" => modifiers |= 4,
                _ => {}
            }
        }
        main_key = parts.last().copied().unwrap_or(key).to_string();
    }

    let code = match main_key.as_str() {
        "Enter" | "Return" => "Enter",
        "Tab" => "Tab",
        "Escape" | "Esc" => "Escape",
        "Backspace" => "Backspace",
        "Delete" => "Delete",
        "ArrowUp" | "Up" => "ArrowUp",
        "ArrowDown" | "Down" => "ArrowDown",
        "ArrowLeft" | "Left" => "ArrowLeft",
        "ArrowRight" | "Right" => "ArrowRight",
        "F5" => "F5",
        "Space" | " " => "Space",
        _ => {
            if main_key.chars().count() == 1 {
                let code = format!("Key{}", main_key.to_uppercase());
                return (main_key, code, modifiers);
            }
            main_key.as_str()
        }
    }
    .to_string();

    // CDP wants the DOM key value, not our aliases.
    let key_name = match code.as_str() {
        "Enter" | "Escape" | "ArrowUp" | "ArrowDown" | "ArrowLeft" | "ArrowRight" => code.clone(),
        "Space" => " ".to_string(),
        _ => main_key,
    };

    (key_name, code, modifiers)
}
