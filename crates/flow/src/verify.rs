//! Post-signup check that the chat actually answers.

use crate::classifier::is_composer_label;
use crate::snapshot::{ElementRef, SnapshotView};

/// Locate the chat input.
///
/// Prefers an input labelled as a prompt or message box, then the paragraph
/// nearest before the "Ask anything" placeholder, then any editable element.
pub fn find_composer<'s>(view: &SnapshotView<'s>) -> Option<ElementRef<'s>> {
    let labelled = view.find_ref(|e| e.is_any_role(&["textbox", "textarea", "paragraph"]) && is_composer_label(e.name));
    if labelled.is_some() {
        return labelled;
    }

    let elements = view.elements();
    if let Some(placeholder) = elements.iter().position(|e| e.name.contains("Ask anything")) {
        let preceding = elements[..placeholder]
            .iter()
            .rev()
            .filter(|e| e.is_role("paragraph"))
            .find_map(|e| e.element_ref());
        if preceding.is_some() {
            return preceding;
        }
    }

    view.find_ref(|e| e.has_flag("editable"))
}

/// Whether the page shows `marker` anywhere other than in the echoed probe.
pub fn reply_contains_marker(view: &SnapshotView<'_>, marker: &str, probe: &str) -> bool {
    view.elements().iter().any(|e| {
        [e.name, e.value]
            .iter()
            .any(|text| text.contains(marker) && !text.contains(probe))
    })
}
