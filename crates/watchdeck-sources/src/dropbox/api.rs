use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use watchdeck_models::RemoteFileRecord;

pub const API_BASE: &str = "https://api.dropboxapi.com/2";
pub const CONTENT_BASE: &str = "https://content.dropboxapi.com/2";
pub const TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";

#[derive(Debug, Serialize)]
pub struct ListFolderArg<'a> {
    pub path: &'a str,
    pub recursive: bool,
    pub include_deleted: bool,
}

#[derive(Debug, Serialize)]
pub struct ListFolderContinueArg<'a> {
    pub cursor: &'a str,
}

#[derive(Debug, Serialize)]
pub struct PathArg<'a> {
    pub path: &'a str,
}

#[derive(Debug, Serialize)]
pub struct UploadArg<'a> {
    pub path: &'a str,
    pub mode: &'static str,
    pub autorename: bool,
    pub mute: bool,
    pub client_modified: String,
}

#[derive(Debug, Deserialize)]
pub struct ListFolderResult {
    pub entries: Vec<Metadata>,
    pub cursor: String,
    pub has_more: bool,
}

#[derive(Debug, Deserialize)]
#[serde(tag = ".tag", rename_all = "lowercase")]
pub enum Metadata {
    File(FileMetadata),
    Folder(FolderMetadata),
    Deleted(DeletedMetadata),
}

#[derive(Debug, Deserialize)]
pub struct FileMetadata {
    pub name: String,
    pub path_lower: Option<String>,
    pub path_display: Option<String>,
    pub server_modified: DateTime<Utc>,
    pub client_modified: Option<DateTime<Utc>>,
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct FolderMetadata {
    pub name: String,
    pub path_lower: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeletedMetadata {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
}

fn default_expires_in() -> i64 {
    14400 // Dropbox short-lived tokens last four hours
}

impl FileMetadata {
    pub fn into_record(self) -> RemoteFileRecord {
        let path_display = self
            .path_display
            .or_else(|| self.path_lower.clone())
            .unwrap_or_else(|| format!("/{}", self.name));
        let path_lower = self.path_lower.unwrap_or_else(|| path_display.to_lowercase());
        RemoteFileRecord {
            name: self.name,
            path_lower,
            path_display,
            server_modified: self.server_modified,
        }
    }
}

/// Dropbox requires second precision and a literal `Z` for `client_modified`
pub fn format_client_modified(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Serialize the `Dropbox-API-Arg` header. Header values must be ASCII, so
/// every non-ASCII char is escaped as `\uXXXX` (surrogate pairs above the BMP).
pub fn header_safe_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut buf = [0u16; 2];
            for unit in c.encode_utf16(&mut buf) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    Ok(out)
}

/// Dropbox answers 409 with a `path/not_found` summary for missing paths
pub fn is_not_found(status: u16, body: &str) -> bool {
    status == 409 && body.contains("not_found")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_list_folder_result_parsing() {
        let json = r#"{
            "entries": [
                {".tag": "folder", "name": "images", "path_lower": "/watchdeck/images", "path_display": "/WatchDeck/images", "id": "id:a"},
                {".tag": "file", "name": "titles.json", "path_lower": "/watchdeck/titles.json", "path_display": "/WatchDeck/titles.json", "id": "id:b", "client_modified": "2024-03-01T10:00:00Z", "server_modified": "2024-03-01T10:00:02Z", "rev": "1", "size": 120},
                {".tag": "deleted", "name": "old.json", "path_lower": "/watchdeck/old.json"}
            ],
            "cursor": "AAA",
            "has_more": false
        }"#;
        let result: ListFolderResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.entries.len(), 3);
        let files: Vec<RemoteFileRecord> = result
            .entries
            .into_iter()
            .filter_map(|e| match e {
                Metadata::File(f) => Some(f.into_record()),
                _ => None,
            })
            .collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path_display, "/WatchDeck/titles.json");
        assert_eq!(files[0].path_lower, "/watchdeck/titles.json");
        assert_eq!(files[0].server_modified, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 2).unwrap());
    }

    #[test]
    fn test_format_client_modified_drops_fraction() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap() + chrono::Duration::milliseconds(678);
        assert_eq!(format_client_modified(ts), "2024-01-02T03:04:05Z");
    }

    #[test]
    fn test_header_safe_json_escapes_non_ascii() {
        let arg = PathArg { path: "/images/café.jpg" };
        assert_eq!(header_safe_json(&arg).unwrap(), r#"{"path":"/images/caf\u00e9.jpg"}"#);
    }

    #[test]
    fn test_not_found_detection() {
        assert!(is_not_found(409, r#"{"error_summary": "path/not_found/..", "error": {".tag": "path"}}"#));
        assert!(!is_not_found(409, r#"{"error_summary": "path/conflict/"}"#));
        assert!(!is_not_found(500, "not_found"));
    }
}
