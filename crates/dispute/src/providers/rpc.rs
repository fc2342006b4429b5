//! The JSON-RPC client every provider talks through.

use crate::DisputeError;
use alloy_json_rpc::{RpcParam, RpcReturn};
use alloy_rpc_client::RpcClient;
use alloy_transport::{TransportError, TransportResult};
use alloy_transport_http::Http;
use anyhow::Result;
use reqwest::{Client, Url};
use std::fmt;

/// The [JsonRpcClient] wraps an HTTP [RpcClient] and classifies its failures as [DisputeError::Rpc].
#[derive(Clone)]
pub struct JsonRpcClient {
    rpc_client: RpcClient<Http<Client>>,
    url: Url,
}

impl fmt::Debug for JsonRpcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcClient").field("url", &self.url.as_str()).finish()
    }
}

impl JsonRpcClient {
    pub fn try_new(url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| DisputeError::Config(format!("invalid RPC url {}: {e}", url.as_ref())))?;
        let rpc_client = RpcClient::builder().http(url.clone());
        Ok(Self { rpc_client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Calls `method` with `params` and decodes the result into `R`.
    pub async fn request<P, R>(&self, method: &'static str, params: P) -> Result<R>
    where
        P: RpcParam,
        R: RpcReturn,
    {
        let result: TransportResult<R> = self.rpc_client.request(method, params).await;
        result.map_err(|err| rpc_error(method, err))
    }
}

fn rpc_error(method: &str, err: TransportError) -> anyhow::Error {
    DisputeError::Rpc(format!("{method}: {err}")).into()
}

#[cfg(test)]
mod test {
    use super::*;
    use alloy_primitives::U64;
    use alloy_transport::TransportErrorKind;

    #[test]
    fn transport_failures_are_rpc_errors() {
        let err = rpc_error("eth_call", TransportErrorKind::custom_str("connection reset"));
        assert!(matches!(err.downcast_ref::<DisputeError>(), Some(DisputeError::Rpc(_))));
        assert!(err.to_string().contains("eth_call"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_an_rpc_error() {
        let client = JsonRpcClient::try_new("http://127.0.0.1:1").unwrap();
        let err = client.request::<_, U64>("eth_blockNumber", ()).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<DisputeError>(), Some(DisputeError::Rpc(_))));
    }

    #[test]
    fn rejects_bad_urls() {
        assert!(JsonRpcClient::try_new("not a url").is_err());
        assert!(JsonRpcClient::try_new("http://localhost:8545").is_ok());
    }
}
