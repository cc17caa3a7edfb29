use crate::tool_registry::ToolKind;

/// Derives the window id for a `(book, version, tool)` triple.
///
/// The id is the only key the cache and the native host share, so opening the
/// same tool twice for one context always resolves to the same row. Book and
/// version ids are escaped so the `-` separators stay unambiguous; components
/// without `-` or `%` pass through unchanged.
#[must_use]
pub fn window_identity(book_id: &str, version_id: &str, kind: ToolKind) -> String {
    format!(
        "{}-{}-{}",
        escape_component(book_id),
        escape_component(version_id),
        kind.as_str()
    )
}

fn escape_component(component: &str) -> String {
    if !component.contains(['-', '%']) {
        return component.to_string();
    }
    component.replace('%', "%25").replace('-', "%2D")
}
