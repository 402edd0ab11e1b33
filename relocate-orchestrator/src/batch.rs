use anyhow::{Context, Result};
use relocate_common::InstanceId;
use std::path::Path;

/// Ordered list of instances to migrate. Order is processing order.
/// Consumed by the coordinator; not reusable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationBatch {
    instances: Vec<InstanceId>,
}

impl MigrationBatch {
    pub fn new(instances: impl IntoIterator<Item = InstanceId>) -> Self {
        Self {
            instances: instances.into_iter().collect(),
        }
    }

    /// Command-line ids first, then the file's ids, in order.
    pub fn from_sources(ids: &[String], file: Option<&Path>) -> Result<Self> {
        let mut instances: Vec<InstanceId> = ids
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(InstanceId::from)
            .collect();
        if let Some(path) = file {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading instance list {}", path.display()))?;
            instances.extend(parse_instance_list(&raw));
        }
        Ok(Self { instances })
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn instances(&self) -> &[InstanceId] {
        &self.instances
    }
}

impl IntoIterator for MigrationBatch {
    type Item = InstanceId;
    type IntoIter = std::vec::IntoIter<InstanceId>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.into_iter()
    }
}

/// One id per line. Blank lines and `#` comments are ignored.
pub fn parse_instance_list(raw: &str) -> Vec<InstanceId> {
    raw.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|s| !s.is_empty())
        .map(InstanceId::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_comments_and_blanks() {
        let ids = parse_instance_list(
            "# instances to move\ni-001\n\n  i-002  # web tier\n#i-003\ni-004\n",
        );
        let ids: Vec<&str> = ids.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["i-001", "i-002", "i-004"]);
    }

    #[test]
    fn arguments_come_before_file_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.txt");
        std::fs::write(&path, "i-file-1\ni-file-2\n").unwrap();

        let batch =
            MigrationBatch::from_sources(&["i-arg".to_string(), " ".to_string()], Some(&path))
                .unwrap();
        let ids: Vec<&str> = batch.instances().iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["i-arg", "i-file-1", "i-file-2"]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = MigrationBatch::from_sources(&[], Some(Path::new("/nonexistent/ids.txt")))
            .unwrap_err();
        assert!(err.to_string().contains("reading instance list"));
    }
}
