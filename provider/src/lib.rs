use std::collections::BTreeMap;

use async_trait::async_trait;
use capacity_types::{Machine, MachineType};

pub mod aws;
pub mod error;
pub mod factory;
pub mod mock;

pub use error::Error;

/// Everything the reconciliation engine needs from a cloud. Implementations own their
/// own credentials and wire format; the engine only ever sees `Machine`/`MachineType`.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Stable catalogue of machine types available in the configured region.
    async fn machine_types(&self) -> Result<Vec<MachineType>, Error>;

    /// Snapshot of instances tagged with this cluster's name, in any state.
    async fn machines(&self) -> Result<Vec<Machine>, Error>;

    async fn get_machine(&self, id: &str) -> Result<Machine, Error>;

    /// Idempotency is not required of implementations; callers must guard against
    /// duplicate submission themselves.
    async fn create_machine(
        &self,
        name: &str,
        machine_type: &str,
        role: &str,
        userdata: &str,
        extra_tags: &BTreeMap<String, String>,
    ) -> Result<Machine, Error>;

    /// Not-found is treated as success: the instance is already gone.
    async fn delete_machine(&self, id: &str) -> Result<(), Error>;

    fn parse_machine_id(&self, provider_id: &str) -> Result<String, Error>;
}

/// Parses a `providerID` of the form `<scheme>:///<zone>/<id>`, `<scheme>:////<id>`, or a
/// bare `<id>` into the canonical instance id. Grounded on the AWS cloud provider's
/// `GetMachineID`, generalized to an arbitrary scheme prefix.
pub fn parse_provider_id(scheme: &str, provider_id: &str) -> Result<String, Error> {
    let prefix = format!("{scheme}://");
    let rest = if let Some(stripped) = provider_id.strip_prefix(&prefix) {
        stripped
    } else {
        provider_id
    };
    let trimmed = rest.trim_start_matches('/');
    let id = trimmed.rsplit('/').next().unwrap_or("");
    if id.is_empty() {
        return Err(Error::InvalidProviderId(provider_id.to_string()));
    }
    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_zoned_provider_id() {
        let id = parse_provider_id("aws", "aws:///us-east-1a/i-0123456789abcdef0").unwrap();
        assert_eq!(id, "i-0123456789abcdef0");
    }

    #[test]
    fn parses_zoneless_provider_id() {
        let id = parse_provider_id("aws", "aws:////i-0123456789abcdef0").unwrap();
        assert_eq!(id, "i-0123456789abcdef0");
    }

    #[test]
    fn parses_bare_id() {
        let id = parse_provider_id("aws", "i-0123456789abcdef0").unwrap();
        assert_eq!(id, "i-0123456789abcdef0");
    }

    #[test]
    fn rejects_empty_id() {
        assert!(parse_provider_id("aws", "aws:///us-east-1a/").is_err());
    }
}
