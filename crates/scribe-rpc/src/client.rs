//! JSON-RPC implementation of the ledger contract.

use async_trait::async_trait;
use bitcoin::Txid;
use jsonrpsee::core::client::ClientT;
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient, HttpClientBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use scribe_core::constants::{LIST_UNSPENT_MAX_CONF, LIST_UNSPENT_MIN_CONF};
use scribe_core::error::RpcError;
use scribe_core::network::NetworkParams;
use scribe_core::traits::LedgerClient;
use scribe_core::types::{Balance, sum_balance_values};

use crate::config::RpcConfig;
use crate::parse::{classify, parse_signed, parse_txid, parse_unspent};

/// Ledger node reached over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct JsonRpcLedger {
    client: HttpClient,
    network: NetworkParams,
}

fn push<T: Serialize>(params: &mut ArrayParams, value: T) -> Result<(), RpcError> {
    params
        .insert(value)
        .map_err(|e| RpcError::Fatal(format!("cannot encode parameter: {e}")))
}

impl JsonRpcLedger {
    /// Build a client for `config.url`. No request is sent yet.
    pub fn connect(config: &RpcConfig, network: NetworkParams) -> Result<Self, RpcError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(config.basic_auth().as_str())
            .map_err(|e| RpcError::Fatal(format!("invalid credentials: {e}")))?;
        headers.insert("Authorization", auth);

        let client = HttpClientBuilder::default()
            .set_headers(headers)
            .request_timeout(config.timeout)
            .build(&config.url)
            .map_err(|e| RpcError::Fatal(format!("cannot build RPC client for {}: {e}", config.url)))?;

        Ok(Self { client, network })
    }

    pub fn network(&self) -> &NetworkParams {
        &self.network
    }

    async fn call<R: DeserializeOwned>(&self, method: &str, params: ArrayParams) -> Result<R, RpcError> {
        debug!(method, "rpc request");
        self.client.request(method, params).await.map_err(|e| {
            let err = classify(e);
            warn!(method, error = %err, "rpc request failed");
            err
        })
    }
}

#[async_trait]
impl LedgerClient for JsonRpcLedger {
    async fn get_balance(&self, address: &str) -> Result<u64, RpcError> {
        // `getbalance` reports the whole wallet; only this address funds us.
        let balances = self.list_unspent(address).await?;
        sum_balance_values(&balances).ok_or_else(|| RpcError::Fatal("balance overflows u64".into()))
    }

    async fn list_unspent(&self, address: &str) -> Result<Vec<Balance>, RpcError> {
        let mut params = ArrayParams::new();
        push(&mut params, LIST_UNSPENT_MIN_CONF)?;
        push(&mut params, LIST_UNSPENT_MAX_CONF)?;
        push(&mut params, [address])?;
        let result: Value = self.call("listunspent", params).await?;
        parse_unspent(&result, &self.network)
    }

    async fn decode_raw_transaction(&self, tx_hex: &str) -> Result<Value, RpcError> {
        let mut params = ArrayParams::new();
        push(&mut params, tx_hex)?;
        self.call("decoderawtransaction", params).await
    }

    async fn sign_raw_transaction(&self, tx_hex: &str) -> Result<String, RpcError> {
        let mut params = ArrayParams::new();
        push(&mut params, tx_hex)?;
        let result: Value = self.call("signrawtransaction", params).await?;
        parse_signed(&result)
    }

    async fn send_raw_transaction(&self, tx_hex: &str) -> Result<Txid, RpcError> {
        let mut params = ArrayParams::new();
        push(&mut params, tx_hex)?;
        let txid: String = self.call("sendrawtransaction", params).await?;
        parse_txid(&txid)
    }
}
