use super::StorageProvider;
use crate::error::{PaperMapError, StorageError};
use crate::model::Paper;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Key namespace for stored papers.
pub const PAPER_KEY_PREFIX: &str = "paper:";

/// Persists [`Paper`] aggregates under `paper:<id>`.
#[derive(Clone)]
pub struct PaperRepository {
    storage: Arc<dyn StorageProvider>,
}

impl PaperRepository {
    pub fn new(storage: Arc<dyn StorageProvider>) -> Self {
        Self { storage }
    }

    fn key(id: &Uuid) -> String {
        format!("{PAPER_KEY_PREFIX}{id}")
    }

    pub async fn save(&self, paper: &Paper) -> Result<(), PaperMapError> {
        let key = Self::key(&paper.id);
        let value = serde_json::to_value(paper).map_err(|e| StorageError::Encoding {
            key: key.clone(),
            detail: e.to_string(),
        })?;
        self.storage.save(&key, &value).await?;
        debug!(
            "Saved paper {} ({} affiliations, {} located)",
            paper.id,
            paper.affiliations.len(),
            paper.geo_points().len()
        );
        Ok(())
    }

    /// Load one paper. A stored record that no longer decodes is an error here.
    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<Paper>, PaperMapError> {
        let key = Self::key(id);
        match self.storage.load(&key).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                StorageError::Encoding {
                    key,
                    detail: e.to_string(),
                }
                .into()
            }),
        }
    }

    /// Every stored paper, in key order.
    ///
    /// Best effort: entries that vanish between `list` and `load`, whose
    /// stored text is not JSON, or that do not decode as a [`Paper`], are
    /// skipped instead of failing the whole listing.
    /// Backend failures still propagate.
    pub async fn find_all(&self) -> Result<Vec<Paper>, PaperMapError> {
        let keys = self.storage.list().await?;
        let mut papers = Vec::new();

        for key in keys.iter().filter(|k| k.starts_with(PAPER_KEY_PREFIX)) {
            let value = match self.storage.load(key).await {
                Ok(Some(value)) => value,
                Ok(None) => {
                    debug!("Paper {} disappeared during listing", key);
                    continue;
                }
                Err(e @ StorageError::Encoding { .. }) => {
                    warn!("Skipping unreadable record {}: {}", key, e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_value::<Paper>(value) {
                Ok(paper) => papers.push(paper),
                Err(e) => warn!("Skipping undecodable record {}: {}", key, e),
            }
        }

        Ok(papers)
    }

    pub async fn delete(&self, id: &Uuid) -> Result<(), PaperMapError> {
        self.storage.delete(&Self::key(id)).await?;
        Ok(())
    }

    pub async fn exists(&self, id: &Uuid) -> Result<bool, PaperMapError> {
        Ok(self.storage.exists(&Self::key(id)).await?)
    }
}
