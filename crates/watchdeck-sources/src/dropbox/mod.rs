//! Dropbox v2 implementation of [`RemoteStorage`].

pub mod api;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};
use watchdeck_models::RemoteFileRecord;
use crate::error::StorageError;
use crate::traits::RemoteStorage;
use api::{
    FileMetadata, ListFolderArg, ListFolderContinueArg, ListFolderResult, Metadata, PathArg, TokenResponse,
    UploadArg,
};

/// How the client obtains bearer tokens
pub enum DropboxAuth {
    /// Long-lived or externally managed token
    AccessToken(String),
    /// Short-lived tokens minted from a refresh token (PKCE apps, no secret)
    Refresh { app_key: String, refresh_token: String },
}

struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

pub struct DropboxClient {
    client: Client,
    auth: DropboxAuth,
    token: Mutex<Option<CachedToken>>,
}

impl DropboxClient {
    pub fn new(client: Client, auth: DropboxAuth) -> Self {
        Self {
            client,
            auth,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, StorageError> {
        let (app_key, refresh_token) = match &self.auth {
            DropboxAuth::AccessToken(token) => return Ok(token.clone()),
            DropboxAuth::Refresh { app_key, refresh_token } => (app_key, refresh_token),
        };

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            // Refresh a little early so a long transfer doesn't outlive the token
            if token.expires_at > Utc::now() + Duration::minutes(5) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.refresh_access_token(app_key, refresh_token).await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    async fn refresh_access_token(&self, app_key: &str, refresh_token: &str) -> Result<CachedToken, StorageError> {
        let response = self
            .client
            .post(api::TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", app_key),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!("token refresh failed: {} - {}", status, body)));
        }

        let token: TokenResponse = response.json().await?;
        info!("Refreshed Dropbox access token (expires in {}s)", token.expires_in);
        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }

    async fn rpc<A, R>(&self, endpoint: &str, arg: &A) -> Result<R, StorageError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let token = self.access_token().await?;
        let url = format!("{}/{}", api::API_BASE, endpoint);
        let response = self.client.post(&url).bearer_auth(token).json(arg).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StorageError::Api {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

fn is_missing_path(err: &StorageError) -> bool {
    matches!(err, StorageError::Api { status, body, .. } if api::is_not_found(*status, body))
}

/// Follow a recursive listing through its cursors and keep only file entries.
///
/// `fetch` gets `None` for the first page and the previous page's cursor
/// afterwards. A root that does not exist yet lists as empty.
async fn collect_listing<F, Fut>(root: &str, mut fetch: F) -> Result<Vec<RemoteFileRecord>, StorageError>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<ListFolderResult, StorageError>>,
{
    let mut page = match fetch(None).await {
        Ok(page) => page,
        Err(e) if is_missing_path(&e) => {
            debug!(root, "Remote folder does not exist yet, treating as empty");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    loop {
        files.extend(page.entries.into_iter().filter_map(|entry| match entry {
            Metadata::File(file) => Some(file.into_record()),
            Metadata::Folder(_) | Metadata::Deleted(_) => None,
        }));
        if !page.has_more {
            return Ok(files);
        }
        page = fetch(Some(page.cursor)).await?;
    }
}

#[async_trait]
impl RemoteStorage for DropboxClient {
    fn storage_name(&self) -> &str {
        "dropbox"
    }

    async fn list_files(&self, root: &str) -> Result<Vec<RemoteFileRecord>, StorageError> {
        let files = collect_listing(root, move |cursor| async move {
            match cursor {
                None => {
                    let arg = ListFolderArg {
                        path: root,
                        recursive: true,
                        include_deleted: false,
                    };
                    self.rpc::<_, ListFolderResult>("files/list_folder", &arg).await
                }
                Some(cursor) => {
                    self.rpc::<_, ListFolderResult>("files/list_folder/continue", &ListFolderContinueArg { cursor: &cursor })
                        .await
                }
            }
        })
        .await?;

        debug!(root, count = files.len(), "Listed remote files");
        Ok(files)
    }

    async fn upload(
        &self,
        local_path: &Path,
        remote_path: &str,
        client_modified: DateTime<Utc>,
    ) -> Result<RemoteFileRecord, StorageError> {
        let bytes = tokio::fs::read(local_path).await?;
        let arg = UploadArg {
            path: remote_path,
            mode: "overwrite",
            autorename: false,
            mute: true,
            client_modified: api::format_client_modified(client_modified),
        };

        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}/files/upload", api::CONTENT_BASE))
            .bearer_auth(token)
            .header("Dropbox-API-Arg", api::header_safe_json(&arg)?)
            .header("Content-Type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(StorageError::Api {
                endpoint: "files/upload".to_string(),
                status: status.as_u16(),
                body,
            });
        }

        let metadata: FileMetadata = serde_json::from_str(&body)?;
        Ok(metadata.into_record())
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), StorageError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .post(format!("{}/files/download", api::CONTENT_BASE))
            .bearer_auth(token)
            .header("Dropbox-API-Arg", api::header_safe_json(&PathArg { path: remote_path })?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Api {
                endpoint: "files/download".to_string(),
                status: status.as_u16(),
                body,
            });
        }
        let bytes = response.bytes().await?;

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write next to the target and rename so a failed transfer never truncates the local copy
        let temp_path = local_path.with_extension("part");
        tokio::fs::write(&temp_path, &bytes).await?;
        tokio::fs::rename(&temp_path, local_path).await?;
        Ok(())
    }

    async fn metadata(&self, remote_path: &str) -> Result<Option<RemoteFileRecord>, StorageError> {
        match self.rpc::<_, Metadata>("files/get_metadata", &PathArg { path: remote_path }).await {
            Ok(Metadata::File(file)) => Ok(Some(file.into_record())),
            Ok(_) => Ok(None),
            Err(e) if is_missing_path(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    fn page(json: &str) -> ListFolderResult {
        serde_json::from_str(json).unwrap()
    }

    #[tokio::test]
    async fn test_listing_follows_cursor_and_keeps_files_only() {
        let mut pages = VecDeque::from([
            page(
                r#"{"entries": [
                    {".tag": "folder", "name": "images", "path_lower": "/watchdeck/images"},
                    {".tag": "file", "name": "titles.json", "path_lower": "/watchdeck/titles.json", "path_display": "/WatchDeck/titles.json", "server_modified": "2024-03-01T10:00:02Z"}
                ], "cursor": "c1", "has_more": true}"#,
            ),
            page(
                r#"{"entries": [
                    {".tag": "deleted", "name": "old.jpg", "path_lower": "/watchdeck/images/old.jpg"},
                    {".tag": "file", "name": "2.jpg", "path_lower": "/watchdeck/images/2.jpg", "path_display": "/WatchDeck/images/2.jpg", "server_modified": "2024-03-01T10:05:00Z"}
                ], "cursor": "c2", "has_more": false}"#,
            ),
        ]);
        let mut cursors = Vec::new();

        let files = collect_listing("/WatchDeck", |cursor| {
            cursors.push(cursor);
            let next = pages.pop_front();
            async move { Ok(next.unwrap()) }
        })
        .await
        .unwrap();

        assert_eq!(cursors, vec![None, Some("c1".to_string())]);
        let paths: Vec<&str> = files.iter().map(|f| f.path_display.as_str()).collect();
        assert_eq!(paths, vec!["/WatchDeck/titles.json", "/WatchDeck/images/2.jpg"]);
    }

    #[tokio::test]
    async fn test_missing_root_lists_as_empty() {
        let files = collect_listing("/WatchDeck", |_| async {
            Err(StorageError::Api {
                endpoint: "files/list_folder".to_string(),
                status: 409,
                body: r#"{"error_summary": "path/not_found/.."}"#.to_string(),
            })
        })
        .await
        .unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_failed_continuation_is_an_error() {
        let mut first = Some(page(r#"{"entries": [], "cursor": "c1", "has_more": true}"#));
        let result = collect_listing("/WatchDeck", |_| {
            let next = first.take();
            async move {
                next.ok_or_else(|| StorageError::Api {
                    endpoint: "files/list_folder/continue".to_string(),
                    status: 409,
                    body: r#"{"error_summary": "reset/.."}"#.to_string(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(StorageError::Api { status: 409, .. })));
    }
}
