//! Names and descriptions attached to the images a migration creates.
//!
//! Names are derived only from the instance id so that repeated runs for the
//! same instance are easy to trace. They are not unique: a re-run creates
//! another image with the same name.
use crate::InstanceId;

pub fn source_image_name(instance_id: &InstanceId) -> String {
    format!("Latest-image-of-{}", instance_id)
}

pub fn destination_image_name(instance_id: &InstanceId) -> String {
    format!("New image of instance {}", instance_id)
}

pub fn copy_description(instance_id: &InstanceId, source_region: &str) -> String {
    format!(
        "copied image of instance: {} from region: {}",
        instance_id, source_region
    )
}
