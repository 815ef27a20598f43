use crate::data_structures::CompanyProfile;
use crate::error::UpstreamError;
use crate::source::IncomeStatementSource;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Company profiles loaded once from the provider's bulk export.
///
/// The export is reference data, so it is kept for the life of the process.
/// A failed or empty load leaves the cell unset and the next lookup tries again.
pub struct ProfileDirectory {
    source: Arc<dyn IncomeStatementSource>,
    profiles: OnceCell<Vec<CompanyProfile>>,
}

impl ProfileDirectory {
    pub fn new(source: Arc<dyn IncomeStatementSource>) -> Self {
        Self {
            source,
            profiles: OnceCell::new(),
        }
    }

    async fn profiles(&self) -> Result<&[CompanyProfile], UpstreamError> {
        if let Some(profiles) = self.profiles.get() {
            return Ok(profiles.as_slice());
        }

        info!("Loading bulk company profiles");
        let loaded = self.source.company_profiles().await?;
        if loaded.is_empty() {
            warn!("Bulk profile export was empty, will reload on next lookup");
            return Ok(&[]);
        }

        let profiles = self.profiles.get_or_init(|| async move { loaded }).await;
        Ok(profiles.as_slice())
    }

    pub async fn lookup(&self, symbol: &str) -> Result<Option<CompanyProfile>, UpstreamError> {
        let wanted = symbol.trim();
        let found = self
            .profiles()
            .await?
            .iter()
            .find(|profile| profile.symbol() == Some(wanted))
            .cloned();
        debug!(symbol = wanted, found = found.is_some(), "Profile lookup");
        Ok(found)
    }
}
