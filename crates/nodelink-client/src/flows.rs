//! Wallet refresh flows built on batch correlation

use crate::batch::BatchCorrelator;
use crate::channel::RpcChannel;
use crate::error::{FailureKind, RpcFailure};
use crate::poller::TxWatchPoller;
use nodelink_protocol::RpcRequest;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Memo field of an output that carries no memo
const EMPTY_MEMO_PREFIX: &str = "f600";

/// One row of transaction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionItem {
    /// `receive` or `send`
    pub kind: String,
    pub timestamp: i64,
    pub address: String,
    pub txid: String,
    pub amount: f64,
    pub confirmations: i64,
    pub memo: String,
}

/// Decode a hex memo; `None` for the empty-memo marker, bad hex, or blank text
pub fn decode_memo(hex_memo: &str) -> Option<String> {
    if hex_memo.starts_with(EMPTY_MEMO_PREFIX) {
        return None;
    }
    let bytes = hex::decode(hex_memo).ok()?;
    let text = bytes.split(|b| *b == 0).next().unwrap_or_default();
    let memo = String::from_utf8_lossy(text).trim().to_string();
    (!memo.is_empty()).then_some(memo)
}

/// Received shielded transactions for `zaddrs`
///
/// Lists the received notes per address, then fetches details for each
/// distinct non-change txid and joins both. `None` if the channel shut down
/// before the two batches finished.
pub async fn received_transactions(
    channel: &Arc<RpcChannel>,
    zaddrs: Vec<String>,
) -> Option<Vec<TransactionItem>> {
    let batch = BatchCorrelator::new(Arc::clone(channel));

    let listed = batch
        .collect(zaddrs.clone(), |addr: &String| {
            Some(
                RpcRequest::new("z_listreceivedbyaddress")
                    .with_id("z_lrba")
                    .param(addr.clone())
                    .param(0),
            )
        })
        .await?;

    let mut txids = BTreeSet::new();
    let mut memos: HashMap<(String, String), String> = HashMap::new();
    for (addr, notes) in &listed {
        for note in notes.as_array().into_iter().flatten() {
            if note["change"].as_bool().unwrap_or(false) {
                continue;
            }
            let Some(txid) = note["txid"].as_str() else {
                continue;
            };
            txids.insert(txid.to_string());
            if let Some(memo) = note["memo"].as_str().and_then(decode_memo) {
                memos.insert((addr.clone(), txid.to_string()), memo);
            }
        }
    }

    let details = batch
        .collect(txids.into_iter().collect(), |txid: &String| {
            Some(
                RpcRequest::new("gettransaction")
                    .with_id("gettx")
                    .param(txid.clone()),
            )
        })
        .await?;

    let mut items = Vec::new();
    for addr in &zaddrs {
        let Some(notes) = listed.get(addr).and_then(Value::as_array) else {
            continue;
        };
        for note in notes {
            if note["change"].as_bool().unwrap_or(false) {
                continue;
            }
            let Some(txid) = note["txid"].as_str() else {
                continue;
            };
            let info = details.get(txid).unwrap_or(&Value::Null);
            let timestamp = info
                .get("time")
                .or_else(|| info.get("blocktime"))
                .and_then(Value::as_i64)
                .unwrap_or_default();

            items.push(TransactionItem {
                kind: "receive".to_string(),
                timestamp,
                address: addr.clone(),
                txid: txid.to_string(),
                amount: note["amount"].as_f64().unwrap_or_default(),
                confirmations: info["confirmations"].as_i64().unwrap_or_default(),
                memo: memos
                    .get(&(addr.clone(), txid.to_string()))
                    .cloned()
                    .unwrap_or_default(),
            });
        }
    }
    debug!(count = items.len(), "Received transactions refreshed");
    Some(items)
}

/// Refresh confirmation counts of previously sent transactions
///
/// Entries the daemon has no answer for keep their old count.
pub async fn refresh_sent_confirmations(
    channel: &Arc<RpcChannel>,
    mut sent: Vec<TransactionItem>,
) -> Option<Vec<TransactionItem>> {
    if sent.is_empty() {
        return Some(sent);
    }

    let txids: Vec<String> = sent.iter().map(|tx| tx.txid.clone()).collect();
    let details = BatchCorrelator::new(Arc::clone(channel))
        .collect(txids, |txid: &String| {
            Some(
                RpcRequest::new("gettransaction")
                    .with_id("senttxid")
                    .param(txid.clone()),
            )
        })
        .await?;

    for tx in &mut sent {
        if let Some(confirmations) = details
            .get(&tx.txid)
            .and_then(|info| info.get("confirmations"))
            .and_then(Value::as_i64)
        {
            tx.confirmations = confirmations;
        }
    }
    Some(sent)
}

/// Shielded and transparent addresses held by the wallet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalletAddresses {
    pub shielded: Vec<String>,
    pub transparent: Vec<String>,
}

/// Sapling (`zs`) or Sprout (`zc`) address
pub fn is_shielded(address: &str) -> bool {
    address.starts_with("zs") || address.starts_with("zc")
}

/// Strings in a JSON array; objects contribute their `address` field
fn address_list(reply: &Value) -> Vec<String> {
    reply
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.as_str().or_else(|| entry["address"].as_str()))
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

/// List the wallet's addresses
///
/// Both listings run concurrently; either failing fails the whole refresh.
pub async fn wallet_addresses(channel: &RpcChannel) -> Result<WalletAddresses, RpcFailure> {
    let (shielded, transparent) = tokio::join!(
        channel.request(RpcRequest::new("z_listaddresses")),
        channel.request(RpcRequest::new("getaddressesbyaccount").param("")),
    );
    Ok(WalletAddresses {
        shielded: address_list(&shielded?),
        transparent: address_list(&transparent?)
            .into_iter()
            .filter(|addr| !is_shielded(addr))
            .collect(),
    })
}

/// Result of [`refresh_addresses`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddressRefresh {
    pub addresses: WalletAddresses,
    pub received: Vec<TransactionItem>,
    pub sent: Vec<TransactionItem>,
}

/// Re-list addresses, then refresh received and sent history for them
pub async fn refresh_addresses(
    channel: &Arc<RpcChannel>,
    sent: Vec<TransactionItem>,
) -> Result<AddressRefresh, RpcFailure> {
    let addresses = wallet_addresses(channel).await?;
    let received = received_transactions(channel, addresses.shielded.clone())
        .await
        .ok_or_else(RpcFailure::shut_down)?;
    let sent = refresh_sent_confirmations(channel, sent)
        .await
        .ok_or_else(RpcFailure::shut_down)?;
    debug!(
        shielded = addresses.shielded.len(),
        transparent = addresses.transparent.len(),
        "Addresses refreshed"
    );
    Ok(AddressRefresh {
        addresses,
        received,
        sent,
    })
}

/// Wallet totals from `z_gettotalbalance`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub transparent: f64,
    pub shielded: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub address: String,
    pub txid: String,
    pub amount: f64,
    pub confirmations: i64,
    pub spendable: bool,
}

/// Totals plus every unspent output, transparent first
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BalanceSnapshot {
    pub totals: Balances,
    pub per_address: BTreeMap<String, f64>,
    pub utxos: Vec<UnspentOutput>,
    /// Some output has zero confirmations; sending should wait
    pub any_unconfirmed: bool,
}

impl BalanceSnapshot {
    fn add_unspent(&mut self, reply: &Value) {
        for output in reply.as_array().into_iter().flatten() {
            let address = output["address"].as_str().unwrap_or_default().to_string();
            let amount = output["amount"].as_f64().unwrap_or_default();
            let confirmations = output["confirmations"].as_i64().unwrap_or_default();
            if confirmations == 0 {
                self.any_unconfirmed = true;
            }
            *self.per_address.entry(address.clone()).or_default() += amount;
            self.utxos.push(UnspentOutput {
                address,
                txid: output["txid"].as_str().unwrap_or_default().to_string(),
                amount,
                confirmations,
                spendable: output["spendable"].as_bool().unwrap_or(false),
            });
        }
    }
}

/// Amounts arrive as decimal strings or plain numbers
fn amount(value: &Value) -> f64 {
    match value {
        Value::String(text) => text.trim().parse().unwrap_or_default(),
        other => other.as_f64().unwrap_or_default(),
    }
}

/// Fetch totals and unspent outputs, unconfirmed included
///
/// Transparent outputs are listed before shielded ones; the totals query
/// runs alongside.
pub async fn refresh_balances(channel: &RpcChannel) -> Result<BalanceSnapshot, RpcFailure> {
    let totals = async {
        let reply = channel
            .request(RpcRequest::new("z_gettotalbalance").param(0))
            .await?;
        Ok::<_, RpcFailure>(Balances {
            transparent: amount(&reply["transparent"]),
            shielded: amount(&reply["private"]),
            total: amount(&reply["total"]),
        })
    };
    let unspent = async {
        let mut snapshot = BalanceSnapshot::default();
        let transparent = channel
            .request(RpcRequest::new("listunspent").param(0))
            .await?;
        snapshot.add_unspent(&transparent);
        let shielded = channel
            .request(RpcRequest::new("z_listunspent").param(0))
            .await?;
        snapshot.add_unspent(&shielded);
        Ok::<_, RpcFailure>(snapshot)
    };

    let (totals, snapshot) = tokio::join!(totals, unspent);
    let mut snapshot = snapshot?;
    snapshot.totals = totals?;
    debug!(
        utxos = snapshot.utxos.len(),
        any_unconfirmed = snapshot.any_unconfirmed,
        "Balances refreshed"
    );
    Ok(snapshot)
}

/// Export the private key of every wallet address as `(address, key)`
///
/// Addresses come from the account listing, unspent outputs without an
/// account, and the shielded listing. A listing that fails is skipped, as
/// are keys the daemon refuses. Sorted by address, descending, which puts
/// shielded addresses first. `None` if the channel shut down.
pub async fn all_private_keys(channel: &Arc<RpcChannel>) -> Option<Vec<(String, String)>> {
    let sources = [
        (RpcRequest::new("getaddressesbyaccount"), "dumpprivkey"),
        (RpcRequest::new("listunspent").param(-2), "dumpprivkey"),
        (RpcRequest::new("z_listaddresses"), "z_exportkey"),
    ];
    let batch = BatchCorrelator::new(Arc::clone(channel));
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    for (listing, export) in sources {
        let method = listing.method.clone();
        let addresses: Vec<String> = match channel.request(listing).await {
            Ok(reply) => address_list(&reply)
                .into_iter()
                .filter(|addr| seen.insert(addr.clone()))
                .collect(),
            Err(failure) if failure.kind == FailureKind::ShutDown => return None,
            Err(failure) => {
                debug!(%method, error = %failure, "Address listing failed, skipping");
                continue;
            }
        };
        if addresses.is_empty() {
            continue;
        }

        let exported = batch
            .collect(addresses, |addr: &String| {
                Some(RpcRequest::new(export).param(addr.clone()))
            })
            .await?;
        keys.extend(
            exported
                .into_iter()
                .filter_map(|(addr, key)| Some((addr, key.as_str()?.to_string()))),
        );
    }

    keys.sort_by(|a, b| b.0.cmp(&a.0));
    Some(keys)
}

/// Submit `z_sendmany` and watch the resulting operation
///
/// `on_submitted(opid)` fires once the daemon accepted the request;
/// afterwards exactly one of `on_computed(opid, txid)` or
/// `on_error(opid, message)` fires. A rejected submission calls
/// `on_error` with an empty opid.
pub async fn submit_transaction<S, C, E>(
    channel: &Arc<RpcChannel>,
    poller: &TxWatchPoller,
    params: Vec<Value>,
    payload: Value,
    on_submitted: S,
    on_computed: C,
    on_error: E,
) where
    S: FnOnce(String),
    C: FnOnce(String, String) + Send + 'static,
    E: FnOnce(String, String) + Send + 'static,
{
    let request = RpcRequest::new("z_sendmany").params(params);
    match channel.request(request).await {
        Ok(reply) => match reply.as_str().filter(|opid| !opid.is_empty()) {
            Some(opid) => {
                let opid = opid.to_string();
                poller.watch(opid.clone(), payload, on_computed, on_error);
                on_submitted(opid);
            }
            None => {
                warn!(%reply, "z_sendmany returned no operation id");
                on_error(
                    String::new(),
                    format!("Unexpected reply to z_sendmany: {reply}"),
                );
            }
        },
        Err(failure) if failure.kind == FailureKind::ShutDown => {}
        Err(failure) => {
            warn!(error = %failure, "z_sendmany rejected");
            on_error(String::new(), failure.user_message());
        }
    }
}
