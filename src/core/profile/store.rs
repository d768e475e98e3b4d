use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::error::{LauncherError, LauncherResult};

use super::codec::{decode_shared_profile, parse_import_link, ShareableProfile};

/// Collaborator contract: whoever owns profile data applies imports.
/// The core only decodes the payload and hands over a typed document.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn apply_imported_profile(&self, profile: ShareableProfile) -> LauncherResult<()>;
}

/// Minimal file-backed store: imported profiles land as pretty JSON in
/// a `profiles/` directory. Enough for the binary to be useful; a real
/// profile catalog replaces this behind the same trait.
pub struct FileProfileStore {
    profiles_dir: PathBuf,
}

impl FileProfileStore {
    pub fn new(profiles_dir: PathBuf) -> Self {
        Self { profiles_dir }
    }
}

#[async_trait]
impl ProfileStore for FileProfileStore {
    async fn apply_imported_profile(&self, profile: ShareableProfile) -> LauncherResult<()> {
        tokio::fs::create_dir_all(&self.profiles_dir)
            .await
            .map_err(|source| LauncherError::Io {
                path: self.profiles_dir.clone(),
                source,
            })?;

        let file_name = format!("{}.json", sanitize_file_name(&profile.name));
        let path = self.profiles_dir.join(file_name);
        let json = serde_json::to_string_pretty(&profile)?;

        tokio::fs::write(&path, json)
            .await
            .map_err(|source| LauncherError::Io {
                path: path.clone(),
                source,
            })?;

        info!("Imported profile '{}' to {:?}", profile.name, path);
        Ok(())
    }
}

/// Scan one invocation's arguments for import-profile deep links and
/// apply each in argument order. Garbled payloads are logged and
/// skipped; a deep link must never take the launcher down.
pub async fn process_invocation(args: &[String], store: &dyn ProfileStore) {
    for arg in args {
        let Some(payload) = parse_import_link(arg) else {
            continue;
        };

        match decode_shared_profile(payload) {
            Ok(profile) => {
                if let Err(e) = store.apply_imported_profile(profile).await {
                    warn!("Profile import failed: {}", e);
                }
            }
            Err(e) => warn!("Ignoring malformed import link: {}", e),
        }
    }
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | ' ' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.trim().is_empty() {
        "imported-profile".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profile::codec::encode_shared_profile;
    use std::sync::Mutex;

    struct RecordingStore {
        applied: Mutex<Vec<ShareableProfile>>,
    }

    #[async_trait]
    impl ProfileStore for RecordingStore {
        async fn apply_imported_profile(&self, profile: ShareableProfile) -> LauncherResult<()> {
            self.applied.lock().unwrap().push(profile);
            Ok(())
        }
    }

    #[tokio::test]
    async fn import_links_in_argv_are_applied_in_order() {
        let store = RecordingStore {
            applied: Mutex::new(Vec::new()),
        };

        let first = ShareableProfile {
            name: "alpha".into(),
            data: serde_json::Value::Null,
        };
        let second = ShareableProfile {
            name: "beta".into(),
            data: serde_json::Value::Null,
        };

        let args = vec![
            "--windowed".to_string(),
            format!(
                "vanguard://import-profile/{}",
                encode_shared_profile(&first).unwrap()
            ),
            format!(
                "<vanguard://import-profile/{}>",
                encode_shared_profile(&second).unwrap()
            ),
        ];

        process_invocation(&args, &store).await;

        let applied = store.applied.lock().unwrap();
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0].name, "alpha");
        assert_eq!(applied[1].name, "beta");
    }

    #[tokio::test]
    async fn garbled_links_are_skipped_without_stopping_the_rest() {
        let store = RecordingStore {
            applied: Mutex::new(Vec::new()),
        };

        let good = ShareableProfile {
            name: "good".into(),
            data: serde_json::Value::Null,
        };

        let args = vec![
            "vanguard://import-profile/%%%garbage%%%".to_string(),
            format!(
                "vanguard://import-profile/{}",
                encode_shared_profile(&good).unwrap()
            ),
        ];

        process_invocation(&args, &store).await;

        let applied = store.applied.lock().unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0].name, "good");
    }

    #[tokio::test]
    async fn file_store_writes_the_imported_document() {
        let tmp = tempfile::tempdir().unwrap();
        let store = FileProfileStore::new(tmp.path().join("profiles"));

        let profile = ShareableProfile {
            name: "shared/loadout".into(),
            data: serde_json::json!({"primary": "rifle"}),
        };

        store.apply_imported_profile(profile).await.unwrap();

        let written = tmp.path().join("profiles").join("shared_loadout.json");
        let raw = std::fs::read_to_string(written).unwrap();
        let restored: ShareableProfile = serde_json::from_str(&raw).unwrap();
        assert_eq!(restored.name, "shared/loadout");
    }
}
