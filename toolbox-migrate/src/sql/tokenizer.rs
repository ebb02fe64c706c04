//! Quote- and parenthesis-aware splitting of SQL list clauses

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InQuote,
}

/// Split a comma-separated column or value list into trimmed items.
///
/// Commas only separate items outside string literals and at parenthesis
/// depth 0, so `'a,b'` and `(c,d)` stay whole. A single quote toggles the
/// literal state unless the character right before it is a backslash.
///
/// Known edge case: the escape check looks back exactly one character, so a
/// literal ending in a real backslash (`'C:\'`) never closes and swallows the
/// rest of the list.
pub fn split_sql_list(list: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut state = ScanState::Normal;
    let mut depth: i32 = 0;
    let mut previous: Option<char> = None;

    for c in list.chars() {
        match (c, state) {
            ('\'', _) if previous != Some('\\') => {
                state = match state {
                    ScanState::Normal => ScanState::InQuote,
                    ScanState::InQuote => ScanState::Normal,
                };
                current.push(c);
            }
            ('(', ScanState::Normal) => {
                depth += 1;
                current.push(c);
            }
            (')', ScanState::Normal) => {
                depth -= 1;
                current.push(c);
            }
            (',', ScanState::Normal) if depth == 0 => {
                items.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
        previous = Some(c);
    }

    let last = current.trim();
    if !last.is_empty() {
        items.push(last.to_string());
    }

    items
}
