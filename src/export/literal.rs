// Literal array - Renders fret events as a C array declaration
// Meant to be pasted straight into firmware sources

use crate::fretboard::FretEvent;

const HEADER: &str = "const int events[][3] = {\n";
const FOOTER: &str = "\n};";

/// Render `{time_ms, string, fret}` triples, off-events with fret -1
pub fn to_literal_array(events: &[FretEvent]) -> String {
    let rows: Vec<String> = events
        .iter()
        .map(|event| format!("    {{{}, {}, {}}}", event.time_ms, event.string, event.fret))
        .collect();

    let mut text = String::from(HEADER);
    text.push_str(&rows.join(",\n"));
    if rows.is_empty() {
        text.pop();
    }
    text.push_str(FOOTER);
    text
}
