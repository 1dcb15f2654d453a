//! JSON-RPC client for a Zcash full node (`zcashd`/`zebrad`), used by the
//! blockchain monitor to fetch blocks, transactions, and mempool state.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient, HttpClientBuilder};
use jsonrpsee::rpc_params;

use crate::error::TransientError;

use super::types::{BlockHeader, RawTransaction, ValidateAddressResult};

/// The RPC operations the monitor and protocol engine depend on. A trait so
/// tests can substitute a stub client without spinning up a node.
#[async_trait]
pub trait ZcashRpcClient: Send + Sync {
    async fn get_block_count(&self) -> Result<u32, TransientError>;
    async fn get_block_hash(&self, height: u32) -> Result<String, TransientError>;
    async fn get_block(&self, hash: &str) -> Result<BlockHeader, TransientError>;
    async fn get_raw_transaction(
        &self,
        txid: &str,
    ) -> Result<Option<RawTransaction>, TransientError>;
    async fn get_raw_mempool(&self) -> Result<Vec<String>, TransientError>;
    async fn validate_address(&self, address: &str) -> Result<bool, TransientError>;
}

/// Thin wrapper over [`jsonrpsee`]'s HTTP client, authenticated with HTTP
/// Basic auth the way `zcashd`'s RPC server expects.
pub struct NodeRpcClient {
    inner: HttpClient,
}

impl NodeRpcClient {
    pub fn new(url: &url::Url, user: &str, password: &str) -> Result<Self, TransientError> {
        let mut headers = HeaderMap::new();
        let credentials = BASE64.encode(format!("{user}:{password}"));
        let value = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| TransientError::NodeRpc(e.to_string()))?;
        headers.insert("authorization", value);

        let inner = HttpClientBuilder::default()
            .set_headers(headers)
            .request_timeout(std::time::Duration::from_secs(30))
            .build(url.as_str())
            .map_err(|e| TransientError::NodeRpc(e.to_string()))?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl ZcashRpcClient for NodeRpcClient {
    async fn get_block_count(&self) -> Result<u32, TransientError> {
        self.inner
            .request("getblockcount", rpc_params![])
            .await
            .map_err(|e| TransientError::NodeRpc(e.to_string()))
    }

    async fn get_block_hash(&self, height: u32) -> Result<String, TransientError> {
        self.inner
            .request("getblockhash", rpc_params![height])
            .await
            .map_err(|e| TransientError::NodeRpc(e.to_string()))
    }

    async fn get_block(&self, hash: &str) -> Result<BlockHeader, TransientError> {
        self.inner
            .request("getblock", rpc_params![hash, 1])
            .await
            .map_err(|e| TransientError::NodeRpc(e.to_string()))
    }

    async fn get_raw_transaction(
        &self,
        txid: &str,
    ) -> Result<Option<RawTransaction>, TransientError> {
        match self
            .inner
            .request::<RawTransaction, _>("getrawtransaction", rpc_params![txid, 1])
            .await
        {
            Ok(tx) => Ok(Some(tx)),
            Err(jsonrpsee::core::ClientError::Call(call_err)) if call_err.code() == -5 => {
                Ok(None)
            }
            Err(e) => Err(TransientError::NodeRpc(e.to_string())),
        }
    }

    async fn get_raw_mempool(&self) -> Result<Vec<String>, TransientError> {
        self.inner
            .request("getrawmempool", rpc_params![])
            .await
            .map_err(|e| TransientError::NodeRpc(e.to_string()))
    }

    async fn validate_address(&self, address: &str) -> Result<bool, TransientError> {
        let result: ValidateAddressResult = self
            .inner
            .request("validateaddress", rpc_params![address])
            .await
            .map_err(|e| TransientError::NodeRpc(e.to_string()))?;
        Ok(result.is_valid)
    }
}
