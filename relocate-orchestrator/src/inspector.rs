use anyhow::anyhow;
use relocate_common::{InstanceDetails, InstanceId, LifecycleState, MigrationError, Result};

use crate::gateway::RegionGateway;

/// Current type and lifecycle state of exactly one instance.
/// Fails with `NotFound` when the id matches zero or several instances.
pub async fn get_instance_details(
    instance_id: &InstanceId,
    gateway: &RegionGateway,
) -> Result<InstanceDetails> {
    let mut matches = gateway.describe_instance(instance_id).await?;
    if matches.len() != 1 {
        return Err(MigrationError::NotFound {
            instance_id: instance_id.to_string(),
            region: gateway.region().to_string(),
            matches: matches.len(),
        });
    }
    let found = matches.remove(0);
    let state = LifecycleState::parse(&found.state).ok_or_else(|| {
        MigrationError::Provider(anyhow!(
            "instance {} reported unknown state '{}'",
            instance_id,
            found.state
        ))
    })?;
    Ok(InstanceDetails {
        instance_type: found.instance_type,
        state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waiter::Waits;
    use relocate_providers::mock::{Fault, MockCloud, MockOperation};
    use std::sync::Arc;

    fn gateway(cloud: &MockCloud) -> RegionGateway {
        RegionGateway::new(Arc::new(cloud.provider("us-east-1")), Waits::default())
    }

    #[tokio::test]
    async fn reads_type_and_state() {
        let cloud = MockCloud::new();
        cloud.add_instance("us-east-1", "i-001", "m5.large", "running");
        let details = get_instance_details(&InstanceId::new("i-001"), &gateway(&cloud))
            .await
            .unwrap();
        assert_eq!(
            details,
            InstanceDetails {
                instance_type: "m5.large".to_string(),
                state: LifecycleState::Running,
            }
        );
    }

    #[tokio::test]
    async fn missing_instance_is_not_found() {
        let cloud = MockCloud::new();
        cloud.add_instance("eu-west-1", "i-001", "m5.large", "running");
        let err = get_instance_details(&InstanceId::new("i-001"), &gateway(&cloud))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::NotFound { matches: 0, .. }));
    }

    #[tokio::test]
    async fn ambiguous_instance_is_not_found() {
        let cloud = MockCloud::new();
        cloud.add_instance("us-east-1", "i-001", "m5.large", "running");
        cloud.add_instance("us-east-1", "i-001", "m5.large", "stopped");
        let err = get_instance_details(&InstanceId::new("i-001"), &gateway(&cloud))
            .await
            .unwrap_err();
        assert!(matches!(err, MigrationError::NotFound { matches: 2, .. }));
    }

    #[tokio::test]
    async fn unknown_state_is_a_provider_error() {
        let cloud = MockCloud::new();
        cloud.add_instance("us-east-1", "i-001", "m5.large", "hibernating");
        let err = get_instance_details(&InstanceId::new("i-001"), &gateway(&cloud))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "provider");
    }

    #[tokio::test]
    async fn describe_rejection_surfaces_the_provider_message() {
        let cloud = MockCloud::new();
        cloud.add_instance("us-east-1", "i-001", "m5.large", "running");
        cloud.inject_fault(
            MockOperation::Describe,
            "i-001",
            Fault::Reject("UnauthorizedOperation".to_string()),
        );
        let err = get_instance_details(&InstanceId::new("i-001"), &gateway(&cloud))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "UnauthorizedOperation");
    }
}
