use std::collections::HashMap;

use crate::models::{ContentRecord, JoinedRow, LogRecord, UserRecord};

/// Left-joins every log row to the user table on `uuid` and then to the
/// content table on `ucid`.
///
/// Unmatched keys keep `None`. A key repeated in a lookup table yields one
/// output row per match, so the output only equals the log count when both
/// lookups are unique.
pub fn join(logs: &[LogRecord], users: &[UserRecord], content: &[ContentRecord]) -> Vec<JoinedRow> {
    let users_by_id = index_by(users, |u| u.uuid.as_str());
    let content_by_id = index_by(content, |c| c.ucid.as_str());
    let mut rows = Vec::with_capacity(logs.len());

    for log in logs {
        let user_matches = matches(&users_by_id, &log.uuid);
        for user in &user_matches {
            for item in matches(&content_by_id, &log.ucid) {
                rows.push(JoinedRow {
                    log: log.clone(),
                    user: user.cloned(),
                    content: item.cloned(),
                });
            }
        }
    }

    rows
}

fn index_by<'a, T, F>(records: &'a [T], key: F) -> HashMap<&'a str, Vec<&'a T>>
where
    F: Fn(&'a T) -> &'a str,
{
    let mut map: HashMap<&str, Vec<&T>> = HashMap::new();
    for record in records {
        map.entry(key(record)).or_default().push(record);
    }
    map
}

fn matches<'a, T>(index: &HashMap<&str, Vec<&'a T>>, key: &str) -> Vec<Option<&'a T>> {
    match index.get(key) {
        Some(found) => found.iter().map(|record| Some(*record)).collect(),
        None => vec![None],
    }
}
