//! Solana JSON-RPC client implementing both ledger collaborators.
//!
//! Response parsing is split into pure functions so it can be tested against
//! recorded node responses without a network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ed25519_dalek::SigningKey;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::ledger::{
    Commitment, LedgerError, LedgerQuery, LedgerSubmit, LedgerTransaction, SignaturePage,
};
use crate::transaction::build_signed;
use crate::types::{Address, TxSignature};

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct SolanaRpcClient {
    url: String,
    client: reqwest::Client,
    /// Program whose instruction data carries envelopes
    program: Address,
    commitment: Commitment,
    confirm_timeout: Duration,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl SolanaRpcClient {
    /// Create a client for `url`. `timeout` bounds every HTTP request.
    pub fn new(
        url: impl Into<String>,
        program: Address,
        timeout: Duration,
        commitment: Commitment,
    ) -> Result<Self, LedgerError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::Transport(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            client,
            program,
            commitment,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            next_id: AtomicU64::new(1),
        })
    }

    /// Override how long `submit` waits for confirmation and how often it polls.
    pub fn with_confirmation(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.confirm_timeout = timeout;
        self.poll_interval = poll_interval;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn confirm_timeout(&self) -> Duration {
        self.confirm_timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = request_body(id, method, params);
        debug!(method, id, "rpc request");

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Transport(e.to_string()))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(LedgerError::Transport(format!(
                "status={} body={:?}",
                status,
                resp.text().await.ok()
            )));
        }

        let value: Value = resp
            .json()
            .await
            .map_err(|e| LedgerError::BadResponse(e.to_string()))?;
        parse_response(value)
    }

    /// Account balance in lamports.
    pub async fn get_balance(&self, address: &Address) -> Result<u64, LedgerError> {
        let res: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address.to_string(), { "commitment": self.commitment.as_str() }]),
            )
            .await?;
        Ok(res.value)
    }

    pub async fn latest_blockhash(&self) -> Result<[u8; 32], LedgerError> {
        let res: WithContext<BlockhashValue> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment.as_str() }]),
            )
            .await?;
        decode_blockhash(&res.value.blockhash)
    }

    /// Submit a serialized transaction without preflight simulation.
    pub async fn send_transaction(&self, wire: &[u8]) -> Result<TxSignature, LedgerError> {
        let sig: String = self
            .call(
                "sendTransaction",
                json!([
                    STANDARD.encode(wire),
                    {
                        "encoding": "base64",
                        "skipPreflight": true,
                        "preflightCommitment": self.commitment.as_str(),
                    }
                ]),
            )
            .await?;
        Ok(TxSignature::new(sig))
    }

    /// Poll until `signature` reaches the configured commitment.
    pub async fn confirm(&self, signature: &TxSignature) -> Result<(), LedgerError> {
        let deadline = Instant::now() + self.confirm_timeout;
        loop {
            let res: WithContext<Vec<Option<SignatureStatus>>> = self
                .call(
                    "getSignatureStatuses",
                    json!([[signature.as_str()], { "searchTransactionHistory": false }]),
                )
                .await?;
            let status = res.value.into_iter().next().flatten();
            if confirmation_reached(signature, status.as_ref(), self.commitment)? {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(LedgerError::ConfirmationTimeout(signature.clone()));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl LedgerQuery for SolanaRpcClient {
    async fn signatures_for_address(
        &self,
        address: &Address,
        page: &SignaturePage,
    ) -> Result<Vec<TxSignature>, LedgerError> {
        let infos: Vec<SignatureInfo> = self
            .call(
                "getSignaturesForAddress",
                json!([address.to_string(), signature_page_config(page, self.commitment)]),
            )
            .await?;
        Ok(infos.into_iter().map(|i| TxSignature::new(i.signature)).collect())
    }

    async fn transaction(
        &self,
        signature: &TxSignature,
    ) -> Result<Option<LedgerTransaction>, LedgerError> {
        let commitment = query_commitment(self.commitment);
        let raw: Option<RpcTransaction> = self
            .call(
                "getTransaction",
                json!([
                    signature.as_str(),
                    {
                        "encoding": "json",
                        "maxSupportedTransactionVersion": 0,
                        "commitment": commitment.as_str(),
                    }
                ]),
            )
            .await?;
        raw.map(|tx| tx.into_ledger(signature, &self.program)).transpose()
    }
}

#[async_trait]
impl LedgerSubmit for SolanaRpcClient {
    async fn submit(
        &self,
        signer: &SigningKey,
        program: &Address,
        payload: &[u8],
    ) -> Result<TxSignature, LedgerError> {
        let blockhash = self.latest_blockhash().await?;
        let signed = build_signed(signer, program, &blockhash, payload)
            .map_err(|e| LedgerError::InvalidTransaction(e.to_string()))?;

        let signature = self.send_transaction(&signed.wire).await?;
        if signature != signed.signature {
            return Err(LedgerError::BadResponse(format!(
                "node returned signature {} for transaction {}",
                signature, signed.signature
            )));
        }
        info!(signature = %signature, "transaction submitted, awaiting confirmation");

        self.confirm(&signature).await?;
        Ok(signature)
    }
}

// ============================================================================
// Wire types and pure helpers
// ============================================================================

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Value,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Debug, Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Debug, Deserialize)]
struct SignatureInfo {
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    err: Option<Value>,
    confirmation_status: Option<Commitment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcTransaction {
    block_time: Option<i64>,
    meta: Option<RpcMeta>,
    transaction: RpcTransactionBody,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMeta {
    err: Option<Value>,
    loaded_addresses: Option<RpcLoadedAddresses>,
}

#[derive(Debug, Default, Deserialize)]
struct RpcLoadedAddresses {
    #[serde(default)]
    writable: Vec<String>,
    #[serde(default)]
    readonly: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RpcTransactionBody {
    message: RpcMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcMessage {
    account_keys: Vec<String>,
    instructions: Vec<RpcInstruction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcInstruction {
    program_id_index: usize,
    /// base58
    data: String,
}

impl RpcTransaction {
    fn into_ledger(
        self,
        signature: &TxSignature,
        program: &Address,
    ) -> Result<LedgerTransaction, LedgerError> {
        let bad = |what: &str| LedgerError::BadResponse(format!("{what} in transaction {signature}"));

        let mut keys = self.transaction.message.account_keys;
        let (failed, loaded) = match self.meta {
            Some(meta) => (meta.err.is_some(), meta.loaded_addresses.unwrap_or_default()),
            None => (false, RpcLoadedAddresses::default()),
        };
        // Instruction indexes span static keys, then loaded writable, then loaded readonly.
        keys.extend(loaded.writable);
        keys.extend(loaded.readonly);

        let sender: Address = keys
            .first()
            .ok_or_else(|| bad("no account keys"))?
            .parse()
            .map_err(|_| bad("invalid fee payer"))?;

        let program_str = program.to_string();
        let payload = self
            .transaction
            .message
            .instructions
            .iter()
            .find(|ix| keys.get(ix.program_id_index) == Some(&program_str))
            .map(|ix| bs58::decode(&ix.data).into_vec())
            .transpose()
            .map_err(|_| bad("instruction data is not base58"))?;

        Ok(LedgerTransaction {
            signature: signature.clone(),
            sender,
            payload,
            block_time: self.block_time,
            failed,
        })
    }
}

fn request_body(id: u64, method: &str, params: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

fn parse_response<T: DeserializeOwned>(body: Value) -> Result<T, LedgerError> {
    let envelope: RpcEnvelope =
        serde_json::from_value(body).map_err(|e| LedgerError::BadResponse(e.to_string()))?;
    if let Some(err) = envelope.error {
        return Err(LedgerError::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    serde_json::from_value(envelope.result).map_err(|e| LedgerError::BadResponse(e.to_string()))
}

/// History queries (`getSignaturesForAddress`, `getTransaction`) reject
/// "processed"; they run at `confirmed` or stricter.
fn query_commitment(commitment: Commitment) -> Commitment {
    commitment.max(Commitment::Confirmed)
}

fn signature_page_config(page: &SignaturePage, commitment: Commitment) -> Value {
    let mut config = json!({
        "limit": page.limit,
        "commitment": query_commitment(commitment).as_str(),
    });
    if let Some(before) = &page.before {
        config["before"] = json!(before.as_str());
    }
    if let Some(until) = &page.until {
        config["until"] = json!(until.as_str());
    }
    config
}

fn decode_blockhash(encoded: &str) -> Result<[u8; 32], LedgerError> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .map_err(|_| LedgerError::BadResponse(format!("blockhash {encoded} is not base58")))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| LedgerError::BadResponse(format!("blockhash is {} bytes", bytes.len())))
}

fn confirmation_reached(
    signature: &TxSignature,
    status: Option<&SignatureStatus>,
    wanted: Commitment,
) -> Result<bool, LedgerError> {
    let Some(status) = status else {
        return Ok(false);
    };
    if let Some(err) = &status.err {
        return Err(LedgerError::Rejected(signature.clone(), err.to_string()));
    }
    Ok(status.confirmation_status.is_some_and(|level| level >= wanted))
}
