use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::core::credentials::{Credential, CredentialStore, StoreError};

/// Keeps the credential in a JSON file (`token.json` by default).
pub struct JsonCredentialStore {
    path: PathBuf,
}

impl JsonCredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file the next record is written to before it replaces the
    /// real one.
    fn staging_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("token.json"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl CredentialStore for JsonCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        if !fs::try_exists(&self.path).await? {
            return Ok(None);
        }

        let text = fs::read_to_string(&self.path).await?;
        let credential: Credential = serde_json::from_str(&text)?;
        Ok(Some(credential))
    }

    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        // Write then rename; the token file is never seen half-written.
        let text = serde_json::to_string_pretty(credential)?;
        let staging = self.staging_path();
        fs::write(&staging, text).await?;
        if let Err(e) = fs::rename(&staging, &self.path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::valid_credential;

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path().join("token.json"));

        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn saved_credential_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonCredentialStore::new(dir.path().join("nested/state/token.json"));
        let credential = valid_credential("ya29.saved");

        store.save(&credential).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded, Some(credential));
    }

    #[tokio::test]
    async fn save_replaces_the_record_and_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, r#"{"token": "ya29.old"}"#).unwrap();
        let store = JsonCredentialStore::new(&path);
        let credential = valid_credential("ya29.replaced");

        store.save(&credential).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(credential));
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![OsString::from("token.json")]);
    }

    #[tokio::test]
    async fn reads_token_files_written_by_google_client_libraries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(
            &path,
            r#"{
                "token": "ya29.legacy",
                "refresh_token": "1//legacy",
                "token_uri": "https://oauth2.googleapis.com/token",
                "client_id": "123.apps.googleusercontent.com",
                "client_secret": "shh",
                "scopes": ["https://www.googleapis.com/auth/drive"],
                "expiry": "2031-05-04T10:11:12.345678Z"
            }"#,
        )
        .unwrap();

        let loaded = JsonCredentialStore::new(&path).load().await.unwrap().unwrap();

        assert_eq!(loaded.access_token, "ya29.legacy");
        assert_eq!(loaded.refresh_token.as_deref(), Some("1//legacy"));
        assert!(loaded
            .scopes
            .contains("https://www.googleapis.com/auth/drive"));
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonCredentialStore::new(&path).load().await.unwrap_err();

        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
