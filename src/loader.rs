use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing::info;

use crate::models::{ContentRecord, LogRecord, UserRecord};

/// Paths of the three exported tables.
#[derive(Debug, Clone)]
pub struct Sources<'a> {
    pub users: &'a Path,
    pub content: &'a Path,
    pub logs: &'a Path,
}

#[derive(Debug, Clone)]
pub struct Tables {
    pub users: Vec<UserRecord>,
    pub content: Vec<ContentRecord>,
    pub logs: Vec<LogRecord>,
}

pub fn load_all(sources: &Sources<'_>) -> anyhow::Result<Tables> {
    let users = load_users(sources.users)?;
    info!(rows = users.len(), path = %sources.users.display(), "loaded user table");
    let content = load_content(sources.content)?;
    info!(rows = content.len(), path = %sources.content.display(), "loaded content table");
    let logs = load_logs(sources.logs)?;
    info!(rows = logs.len(), path = %sources.logs.display(), "loaded problem log");

    Ok(Tables {
        users,
        content,
        logs,
    })
}

pub fn load_users(path: &Path) -> anyhow::Result<Vec<UserRecord>> {
    read_table(path)
}

pub fn load_content(path: &Path) -> anyhow::Result<Vec<ContentRecord>> {
    read_table(path)
}

pub fn load_logs(path: &Path) -> anyhow::Result<Vec<LogRecord>> {
    read_table(path)
}

fn read_table<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut rows = Vec::new();

    for (index, result) in reader.deserialize::<T>().enumerate() {
        // header is line 1
        let row = result.with_context(|| {
            format!("malformed row {} in {}", index + 2, path.display())
        })?;
        rows.push(row);
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_users_ignoring_unknown_columns() {
        let file = write_csv(
            "uuid,gender,points,badges_cnt,first_login_date_TW,user_grade,user_city,has_teacher_cnt,is_self_coach\n\
             u1,male,120,3,2018-09-01,4,Taipei,0,False\n\
             u2,,80,NULL,2018-09-02,7,,1,True\n",
        );

        let users = load_users(file.path()).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].uuid, "u1");
        assert_eq!(users[0].points, Some(120.0));
        assert_eq!(users[0].user_city.as_deref(), Some("Taipei"));
        assert_eq!(users[0].is_self_coach.map(|f| f.0), Some(false));
        assert_eq!(users[1].gender, None);
        assert_eq!(users[1].badges_cnt, None);
        assert_eq!(users[1].user_city, None);
        assert_eq!(users[1].is_self_coach.map(|f| f.0), Some(true));
    }

    #[test]
    fn na_spellings_in_text_columns_are_missing() {
        let users = write_csv(
            "uuid,gender,user_city,learning_stage\n\
             u1,NULL,NULL,NA\n\
             u2,female,Taipei,elementary\n",
        );
        let users = load_users(users.path()).unwrap();
        assert_eq!(users[0].user_city, None);
        assert_eq!(users[0].learning_stage, None);
        assert_eq!(users[0].gender.as_deref(), Some("NULL"));
        assert_eq!(users[1].user_city.as_deref(), Some("Taipei"));

        let content = write_csv("ucid,learning_stage\nc1,N/A\nc2,junior\n");
        let content = load_content(content.path()).unwrap();
        assert_eq!(content[0].learning_stage, None);
        assert_eq!(content[1].learning_stage.as_deref(), Some("junior"));
    }

    #[test]
    fn reads_logs_with_numeric_and_text_timestamps() {
        let file = write_csv(
            "timestamp_TW,uuid,ucid,upid,is_correct,total_sec_taken\n\
             1700000000,u1,c1,p1,True,30\n\
             2019-01-01 08:00:00 UTC,u1,c2,p2,0,\n",
        );

        let logs = load_logs(file.path()).unwrap();
        assert_eq!(logs.len(), 2);
        assert!(logs[0].is_correct.0);
        assert_eq!(logs[0].timestamp.as_deref(), Some("1700000000"));
        assert!(!logs[1].is_correct.0);
        assert_eq!(logs[1].total_sec_taken, None);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load_content(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.to_string().contains("failed to open"));
    }

    #[test]
    fn malformed_row_names_the_line() {
        let file = write_csv("uuid,ucid,is_correct\nu1,c1,maybe\n");
        let err = load_logs(file.path()).unwrap_err();
        assert!(err.to_string().contains("malformed row 2"));
    }
}
