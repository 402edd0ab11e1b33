use anyhow::{bail, Result};
use relocate_providers::ComputeProvider;
use std::sync::Arc;

#[cfg(feature = "provider-ec2")]
use relocate_providers::ec2::Ec2Provider;
#[cfg(feature = "provider-mock")]
use relocate_providers::mock::MockCloud;

pub struct ProviderManager;

impl ProviderManager {
    /// Providers compiled into this binary.
    pub fn available() -> Vec<&'static str> {
        let mut names = Vec::new();
        if cfg!(feature = "provider-ec2") {
            names.push("ec2");
        }
        if cfg!(feature = "provider-mock") {
            names.push("mock");
        }
        names
    }

    /// One provider per region. Both share the same backend (for the mock,
    /// the same in-memory cloud, so copies can see the source image).
    pub async fn connect_pair(
        provider_name: &str,
        source_region: &str,
        destination_region: &str,
    ) -> Result<(Arc<dyn ComputeProvider>, Arc<dyn ComputeProvider>)> {
        match provider_name.trim().to_lowercase().as_str() {
            #[cfg(feature = "provider-ec2")]
            "ec2" | "aws" => Ok((
                Arc::new(Ec2Provider::connect(source_region).await),
                Arc::new(Ec2Provider::connect(destination_region).await),
            )),
            #[cfg(feature = "provider-mock")]
            "mock" => {
                let cloud = mock_cloud()?;
                Ok((
                    Arc::new(cloud.provider(source_region)),
                    Arc::new(cloud.provider(destination_region)),
                ))
            }
            other => bail!(
                "unknown provider '{}' (available: {})",
                other,
                Self::available().join(", ")
            ),
        }
    }

    pub async fn connect(provider_name: &str, region: &str) -> Result<Arc<dyn ComputeProvider>> {
        match provider_name.trim().to_lowercase().as_str() {
            #[cfg(feature = "provider-ec2")]
            "ec2" | "aws" => Ok(Arc::new(Ec2Provider::connect(region).await)),
            #[cfg(feature = "provider-mock")]
            "mock" => Ok(Arc::new(mock_cloud()?.provider(region))),
            other => bail!(
                "unknown provider '{}' (available: {})",
                other,
                Self::available().join(", ")
            ),
        }
    }
}

// MOCK_FIXTURE points at a JSON fixture; without it the mock cloud is empty.
#[cfg(feature = "provider-mock")]
fn mock_cloud() -> Result<MockCloud> {
    match std::env::var("MOCK_FIXTURE") {
        Ok(path) if !path.trim().is_empty() => {
            MockCloud::load_fixture(std::path::Path::new(path.trim()))
        }
        _ => Ok(MockCloud::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_provider_lists_the_available_ones() {
        let err = ProviderManager::connect("scaleway", "fr-par-1")
            .await
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("unknown provider 'scaleway'"));
    }

    #[cfg(feature = "provider-mock")]
    #[tokio::test]
    async fn mock_pair_is_bound_to_both_regions() {
        let (src, dst) = ProviderManager::connect_pair("MOCK", "us-east-1", "eu-west-1")
            .await
            .unwrap();
        assert_eq!(src.region(), "us-east-1");
        assert_eq!(dst.region(), "eu-west-1");
    }
}
