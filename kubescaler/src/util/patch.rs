use k8s_openapi::api::core::v1::Node;
use kube::{
    Api, Client,
    api::{Patch, PatchParams},
};

use super::{Error, MANAGER_NAME};

/// Merge-patches a single label on a node. Grounded on the original worker manager's
/// `setReserved`, which sent a raw JSON merge-patch body of
/// `{"metadata":{"labels":{key: value}}}` rather than a full read-modify-write.
pub async fn patch_node_label(
    client: Client,
    node_name: &str,
    key: &str,
    value: &str,
) -> Result<Node, Error> {
    let api: Api<Node> = Api::all(client);
    let patch = serde_json::json!({
        "metadata": {
            "labels": {
                key: value,
            }
        }
    });
    Ok(api
        .patch(
            node_name,
            &PatchParams::apply(MANAGER_NAME),
            &Patch::Merge(&patch),
        )
        .await?)
}

pub async fn delete_node(client: Client, node_name: &str) -> Result<(), Error> {
    let api: Api<Node> = Api::all(client);
    match api.delete(node_name, &Default::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => Ok(()),
        Err(e) => Err(e.into()),
    }
}
