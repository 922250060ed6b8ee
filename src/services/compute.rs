//! Compute service bindings: servers, volume attachments and keypairs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rest::probe::ResourceClient;
use crate::rest::{RestClient, RestError, RestFuture, Response, ResponseBody, Transport};

/// A server document as returned by show and detailed list operations.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Server {
    /// Unique identifier.
    pub id: String,
    /// Lifecycle status, for example `BUILD` or `ACTIVE`.
    pub status: String,
    /// Display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Free-form metadata attached to the server.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// The abbreviated document returned when a server is created.
///
/// Creation answers with little more than the identity; status and
/// addressing appear on subsequent shows.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct CreatedServer {
    /// Unique identifier of the new server.
    pub id: String,
}

/// Payload wrapper for server creation responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct CreatedServerEnvelope {
    /// The created server.
    pub server: CreatedServer,
}

/// Payload wrapper for single server responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ServerEnvelope {
    /// The server document.
    pub server: Server,
}

/// Payload wrapper for server listings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct ServerListEnvelope {
    /// The listed servers.
    pub servers: Vec<Server>,
}

/// A volume attachment as seen by the compute service.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeAttachment {
    /// Identifier of the attachment.
    #[serde(default)]
    pub id: Option<String>,
    /// Volume bound by the attachment.
    #[serde(rename = "volumeId")]
    pub volume_id: String,
    /// Server the volume is bound to.
    #[serde(default, rename = "serverId")]
    pub server_id: Option<String>,
    /// Device node presented to the server, for example `/dev/vdb`.
    #[serde(default)]
    pub device: Option<String>,
}

/// Payload wrapper for single attachment responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeAttachmentEnvelope {
    /// The attachment document.
    #[serde(rename = "volumeAttachment")]
    pub volume_attachment: VolumeAttachment,
}

/// Payload wrapper for attachment listings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct VolumeAttachmentListEnvelope {
    /// The listed attachments.
    #[serde(rename = "volumeAttachments")]
    pub volume_attachments: Vec<VolumeAttachment>,
}

/// A keypair document.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct Keypair {
    /// Keypair name, unique per project.
    pub name: String,
    /// Public half of the keypair.
    #[serde(default)]
    pub public_key: Option<String>,
    /// Private half, returned only when the service generated the pair.
    #[serde(default)]
    pub private_key: Option<String>,
}

/// Payload wrapper for keypair responses.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct KeypairEnvelope {
    /// The keypair document.
    pub keypair: Keypair,
}

/// Parameters accepted by [`ServersClient::create_server`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CreateServerParams {
    /// Display name of the server.
    pub name: String,
    /// Image to boot from.
    #[serde(rename = "imageRef")]
    pub image_ref: String,
    /// Flavor governing the server's resources.
    #[serde(rename = "flavorRef")]
    pub flavor_ref: String,
    /// Keypair to authorise for login.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    /// Metadata to attach at creation time.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

/// Parameters accepted by [`ServersClient::attach_volume`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct AttachVolumeParams {
    /// Volume to attach.
    #[serde(rename = "volumeId")]
    pub volume_id: String,
    /// Requested device node; the service picks one when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
}

/// Parameters accepted by [`ServersClient::create_keypair`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CreateKeypairParams {
    /// Keypair name, unique per project.
    pub name: String,
    /// Existing public key to import; the service generates a pair when
    /// unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Query filters accepted by [`ServersClient::list_servers`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ServerFilters {
    /// Return full documents rather than summaries.
    pub detail: bool,
    /// Only servers whose name matches this expression.
    pub name: Option<String>,
    /// Only servers in this status.
    pub status: Option<String>,
}

impl ServerFilters {
    fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(name) = &self.name {
            pairs.push(("name", name.clone()));
        }
        if let Some(status) = &self.status {
            pairs.push(("status", status.clone()));
        }
        pairs
    }
}

#[derive(Serialize)]
struct ServerBody<'a, B> {
    server: &'a B,
}

#[derive(Serialize)]
struct AttachmentBody<'a> {
    #[serde(rename = "volumeAttachment")]
    volume_attachment: &'a AttachVolumeParams,
}

#[derive(Serialize)]
struct KeypairBody<'a> {
    keypair: &'a CreateKeypairParams,
}

/// Client for the compute API.
#[derive(Clone, Debug)]
pub struct ServersClient<T> {
    rest: RestClient<T>,
}

impl<T: Transport> ServersClient<T> {
    /// Creates a compute client over an existing REST client.
    #[must_use]
    pub const fn new(rest: RestClient<T>) -> Self {
        Self { rest }
    }

    /// Boots a server. Accepted with 202; the document carries only the
    /// identity until the build finishes.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is not acknowledged.
    pub async fn create_server(
        &self,
        params: &CreateServerParams,
    ) -> Result<ResponseBody<CreatedServerEnvelope>, RestError> {
        let resp = self
            .rest
            .post("servers", &ServerBody { server: params })
            .await?;
        resp.expected_success(&[202])?;
        resp.json()
    }

    /// Shows a single server.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the server does not exist.
    pub async fn show_server(
        &self,
        server_id: &str,
    ) -> Result<ResponseBody<ServerEnvelope>, RestError> {
        let resp = self.rest.get(&format!("servers/{server_id}"), &[]).await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Lists servers, optionally in detail and with server side filters.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or the listing does not
    /// decode.
    pub async fn list_servers(
        &self,
        filters: &ServerFilters,
    ) -> Result<ResponseBody<ServerListEnvelope>, RestError> {
        let path = if filters.detail {
            "servers/detail"
        } else {
            "servers"
        };
        let resp = self.rest.get(path, &filters.query_pairs()).await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Requests deletion of a server. Unlike the storage APIs the compute
    /// service answers 204.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the server is already gone.
    pub async fn delete_server(&self, server_id: &str) -> Result<Response, RestError> {
        let resp = self.rest.delete(&format!("servers/{server_id}")).await?;
        resp.expected_success(&[204])?;
        Ok(resp)
    }

    /// Attaches a volume to a server.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn attach_volume(
        &self,
        server_id: &str,
        params: &AttachVolumeParams,
    ) -> Result<ResponseBody<VolumeAttachmentEnvelope>, RestError> {
        let resp = self
            .rest
            .post(
                &format!("servers/{server_id}/os-volume_attachments"),
                &AttachmentBody {
                    volume_attachment: params,
                },
            )
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Lists the volume attachments of a server.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or the listing does not
    /// decode.
    pub async fn list_volume_attachments(
        &self,
        server_id: &str,
    ) -> Result<ResponseBody<VolumeAttachmentListEnvelope>, RestError> {
        let resp = self
            .rest
            .get(&format!("servers/{server_id}/os-volume_attachments"), &[])
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Detaches a volume from a server. Accepted with 202; the volume drifts
    /// back to `available` once the detach completes.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when no such attachment exists.
    pub async fn detach_volume(
        &self,
        server_id: &str,
        volume_id: &str,
    ) -> Result<Response, RestError> {
        let resp = self
            .rest
            .delete(&format!(
                "servers/{server_id}/os-volume_attachments/{volume_id}"
            ))
            .await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }

    /// Creates or imports a keypair.
    ///
    /// # Errors
    ///
    /// Returns [`RestError`] when the request fails or is rejected.
    pub async fn create_keypair(
        &self,
        params: &CreateKeypairParams,
    ) -> Result<ResponseBody<KeypairEnvelope>, RestError> {
        let resp = self
            .rest
            .post("os-keypairs", &KeypairBody { keypair: params })
            .await?;
        resp.expected_success(&[200])?;
        resp.json()
    }

    /// Deletes a keypair by name.
    ///
    /// # Errors
    ///
    /// Returns [`RestError::NotFound`] when the keypair does not exist.
    pub async fn delete_keypair(&self, name: &str) -> Result<Response, RestError> {
        let resp = self.rest.delete(&format!("os-keypairs/{name}")).await?;
        resp.expected_success(&[202])?;
        Ok(resp)
    }
}

impl<T: Transport> ResourceClient for ServersClient<T> {
    fn resource_type(&self) -> &'static str {
        "server"
    }

    fn is_resource_deleted<'a>(&'a self, resource_id: &'a str) -> RestFuture<'a, bool> {
        Box::pin(async move {
            let presence = self.rest.probe(&format!("servers/{resource_id}")).await?;
            Ok(presence.is_deleted())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::{Method, ServiceEndpoint};
    use crate::test_support::{StubTransport, json_attachment, json_keypair, json_server};
    use rstest::rstest;

    fn client(stub: &StubTransport) -> ServersClient<StubTransport> {
        ServersClient::new(RestClient::new(
            ServiceEndpoint::new("https://compute.example.test", "v2.1"),
            "token-1",
            stub.clone(),
        ))
    }

    #[rstest]
    fn create_params_use_nova_field_spellings() {
        let params = CreateServerParams {
            name: String::from("zond-server"),
            image_ref: String::from("img-1"),
            flavor_ref: String::from("1"),
            key_name: Some(String::from("zond-key")),
            ..CreateServerParams::default()
        };
        let body =
            serde_json::to_string(&ServerBody { server: &params }).expect("params serialise");
        assert_eq!(
            body,
            "{\"server\":{\"name\":\"zond-server\",\"imageRef\":\"img-1\",\
             \"flavorRef\":\"1\",\"key_name\":\"zond-key\"}}"
        );
    }

    #[tokio::test]
    async fn create_server_decodes_abbreviated_document() {
        let stub = StubTransport::new();
        stub.push_response(202, "{\"server\":{\"id\":\"srv-1\"}}");
        let params = CreateServerParams {
            name: String::from("zond-server"),
            image_ref: String::from("img-1"),
            flavor_ref: String::from("1"),
            ..CreateServerParams::default()
        };

        let body = client(&stub)
            .create_server(&params)
            .await
            .expect("create succeeds");
        assert_eq!(body.server.id, "srv-1");
    }

    #[tokio::test]
    async fn delete_server_expects_204() {
        let stub = StubTransport::new();
        stub.push_status(202);

        let err = client(&stub)
            .delete_server("srv-1")
            .await
            .expect_err("202 is not the compute acknowledgement");
        assert!(matches!(err, RestError::UnexpectedStatus { status: 202, .. }));
    }

    #[tokio::test]
    async fn attach_volume_posts_camel_case_document() {
        let stub = StubTransport::new();
        stub.push_response(200, json_attachment("att-1", "srv-1", "vol-1"));
        let params = AttachVolumeParams {
            volume_id: String::from("vol-1"),
            device: None,
        };

        let body = client(&stub)
            .attach_volume("srv-1", &params)
            .await
            .expect("attach succeeds");
        assert_eq!(body.volume_attachment.volume_id, "vol-1");
        assert_eq!(body.volume_attachment.device.as_deref(), Some("/dev/vdb"));

        let requests = stub.requests();
        let request = requests.first().expect("one request");
        assert!(
            request
                .url
                .ends_with("v2.1/servers/srv-1/os-volume_attachments")
        );
        assert_eq!(
            request.body_text().as_deref(),
            Some("{\"volumeAttachment\":{\"volumeId\":\"vol-1\"}}")
        );
    }

    #[tokio::test]
    async fn detach_volume_deletes_attachment_resource() {
        let stub = StubTransport::new();
        stub.push_status(202);

        client(&stub)
            .detach_volume("srv-1", "vol-1")
            .await
            .expect("detach accepted");

        let requests = stub.requests();
        let request = requests.first().expect("one request");
        assert_eq!(request.method, Method::Delete);
        assert!(
            request
                .url
                .ends_with("servers/srv-1/os-volume_attachments/vol-1")
        );
    }

    #[tokio::test]
    async fn keypair_lifecycle_round_trips() {
        let stub = StubTransport::new();
        stub.push_response(200, json_keypair("zond-key"));
        stub.push_status(202);
        let servers = client(&stub);

        let params = CreateKeypairParams {
            name: String::from("zond-key"),
            public_key: None,
        };
        let body = servers
            .create_keypair(&params)
            .await
            .expect("create succeeds");
        assert_eq!(body.keypair.name, "zond-key");

        servers
            .delete_keypair("zond-key")
            .await
            .expect("delete accepted");

        let urls: Vec<String> = stub
            .requests()
            .into_iter()
            .map(|request| request.url)
            .collect();
        assert_eq!(
            urls,
            vec![
                String::from("https://compute.example.test/v2.1/os-keypairs"),
                String::from("https://compute.example.test/v2.1/os-keypairs/zond-key"),
            ]
        );
    }

    #[tokio::test]
    async fn show_server_surfaces_status_for_wait_loops() {
        let stub = StubTransport::new();
        stub.push_response(200, json_server("srv-1", "ACTIVE"));

        let body = client(&stub)
            .show_server("srv-1")
            .await
            .expect("show succeeds");
        assert_eq!(body.server.status, "ACTIVE");
    }
}
