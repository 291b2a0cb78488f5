//! Source of tuner configuration for the aggregation layer
//!
//! The aggregator and arbiter re-resolve tuners on every call and never watch
//! for changes, so a provider only has to return the current list.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::AppResult;
use crate::models::TunerEndpointConfig;

#[async_trait]
pub trait TunerConfigProvider: Send + Sync {
    /// Tuners of `tuner_type`, in configuration order
    async fn tuner_hosts(&self, tuner_type: &str) -> Vec<TunerEndpointConfig>;
}

/// Provider backed by the `[[tuners]]` section of the loaded configuration
#[derive(Clone, Default)]
pub struct ConfigTunerProvider {
    tuners: Arc<RwLock<Vec<TunerEndpointConfig>>>,
}

impl ConfigTunerProvider {
    pub fn new(tuners: Vec<TunerEndpointConfig>) -> Self {
        Self {
            tuners: Arc::new(RwLock::new(tuners)),
        }
    }

    /// Swap in a new tuner list, e.g. after the configuration file was edited.
    /// In-flight calls keep the list they already resolved.
    pub async fn replace(&self, tuners: Vec<TunerEndpointConfig>) -> AppResult<()> {
        for tuner in &tuners {
            tuner.validate()?;
        }
        let count = tuners.len();
        *self.tuners.write().await = tuners;
        info!("Tuner configuration replaced ({} tuners)", count);
        Ok(())
    }

    pub async fn all(&self) -> Vec<TunerEndpointConfig> {
        self.tuners.read().await.clone()
    }
}

#[async_trait]
impl TunerConfigProvider for ConfigTunerProvider {
    async fn tuner_hosts(&self, tuner_type: &str) -> Vec<TunerEndpointConfig> {
        self.tuners
            .read()
            .await
            .iter()
            .filter(|t| t.tuner_type.eq_ignore_ascii_case(tuner_type))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_filters_by_type_in_order() {
        let provider = ConfigTunerProvider::new(vec![
            TunerEndpointConfig::new("a", "m3u", "http://a/list.m3u"),
            TunerEndpointConfig::new("b", "hdhomerun", "http://192.168.1.20"),
            TunerEndpointConfig::new("c", "M3U", "/srv/list.m3u"),
        ]);

        let ids: Vec<String> = provider
            .tuner_hosts("m3u")
            .await
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_replace_validates() {
        let provider = ConfigTunerProvider::default();
        assert!(
            provider
                .replace(vec![TunerEndpointConfig::new("a", "m3u", "")])
                .await
                .is_err()
        );
        assert!(provider.all().await.is_empty());

        provider
            .replace(vec![TunerEndpointConfig::new("a", "m3u", "http://a/list.m3u")])
            .await
            .unwrap();
        assert_eq!(provider.tuner_hosts("m3u").await.len(), 1);
    }
}
