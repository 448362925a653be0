use std::collections::BTreeMap;
use std::sync::Arc;

use crate::{Error, Provider, aws, mock};

/// Builds a `Provider` for the named backend, as selected by `Config::provider_name`.
pub fn new(cluster_name: &str, provider_name: &str, config: &BTreeMap<String, String>) -> Result<Arc<dyn Provider>, Error> {
    let cluster_name = cluster_name.trim();
    if cluster_name.is_empty() {
        return Err(Error::NoClusterName);
    }

    match provider_name {
        aws::NAME => Ok(Arc::new(aws::AwsProvider::new(cluster_name, config)?)),
        mock::NAME => Ok(Arc::new(mock::MockProvider::new(cluster_name))),
        other => Err(Error::Unsupported(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_mock_provider() {
        let provider = new("demo", mock::NAME, &BTreeMap::new()).unwrap();
        assert_eq!(provider.name(), mock::NAME);
    }

    #[test]
    fn rejects_blank_cluster_name() {
        assert!(matches!(
            new("  ", mock::NAME, &BTreeMap::new()),
            Err(Error::NoClusterName)
        ));
    }

    #[test]
    fn rejects_unknown_provider() {
        assert!(matches!(
            new("demo", "gcp", &BTreeMap::new()),
            Err(Error::Unsupported(_))
        ));
    }
}
