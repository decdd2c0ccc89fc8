pub mod chain;
pub mod consensus;
pub mod constants;
pub mod error;
pub mod mine;
pub mod peers;
pub mod pow;
pub mod validate;

#[cfg(test)]
pub(crate) mod test_support;

pub use chain::{Ledger, MiningJob};
pub use consensus::{resolve, resolve_conflicts, ChainFetcher, ChainResponse, Resolution};
pub use error::{Error, Result};
pub use peers::PeerSet;
pub use validate::{is_valid, verify_chain, ChainFault};

use constants::{GENESIS_INDEX, GENESIS_PREVIOUS_HASH, GENESIS_PROOF, GENESIS_TIMESTAMP};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
}

impl Transaction {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, amount: f64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }

    fn canonical_value(&self) -> Value {
        json!({
            "sender": self.sender,
            "recipient": self.recipient,
            "amount": self.amount,
        })
    }
}

/// Inbound transaction as submitted by a client. Every field is required;
/// conversion into a [`Transaction`] reports the first one missing.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub amount: Option<f64>,
}

impl TryFrom<TransactionRequest> for Transaction {
    type Error = Error;

    fn try_from(req: TransactionRequest) -> Result<Self> {
        Ok(Transaction {
            sender: req.sender.ok_or(Error::MissingField("sender"))?,
            recipient: req.recipient.ok_or(Error::MissingField("recipient"))?,
            amount: req.amount.ok_or(Error::MissingField("amount"))?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

impl Block {
    /// The block as a JSON value; key order is irrelevant here since
    /// [`canonical_json`] sorts on the way out.
    pub fn canonical_value(&self) -> Value {
        let transactions: Vec<Value> = self
            .transactions
            .iter()
            .map(Transaction::canonical_value)
            .collect();
        json!({
            "index": self.index,
            "timestamp": self.timestamp,
            "transactions": transactions,
            "proof": self.proof,
            "previous_hash": self.previous_hash,
        })
    }

    pub fn canonical_bytes(&self) -> Vec<u8> {
        canonical_json(&self.canonical_value()).into_bytes()
    }

    /// Lowercase hex SHA-256 of the canonical encoding.
    pub fn hash(&self) -> String {
        hex::encode(Sha256::digest(self.canonical_bytes()))
    }
}

/// Compact JSON with object keys sorted at every level.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Display on a JSON string takes care of escaping.
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(val, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Every node derives this exact block, so chains from different nodes share
/// a root.
pub fn genesis_block() -> Block {
    Block {
        index: GENESIS_INDEX,
        timestamp: GENESIS_TIMESTAMP,
        transactions: vec![],
        proof: GENESIS_PROOF,
        previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
    }
}

pub(crate) fn now_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use constants::HASH_HEX_SIZE;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn sample_block() -> Block {
        Block {
            index: 2,
            timestamp: 1_600_000_000.5,
            transactions: vec![
                Transaction::new("Alice", "Bob", 10.0),
                Transaction::new("Bob", "Charlie", 5.0),
            ],
            proof: 7,
            previous_hash: "abc".to_string(),
        }
    }

    #[test]
    fn genesis_block_example() {
        let genesis = genesis_block();
        assert_eq!(genesis.index, 1);
        assert_eq!(genesis.proof, 100);
        assert_eq!(genesis.previous_hash, "1");
        assert_eq!(genesis.timestamp, 0.0);
        assert!(genesis.transactions.is_empty());
    }

    #[test]
    fn genesis_hash_is_pinned() {
        // Changing this breaks interoperability with every existing node.
        assert_eq!(
            genesis_block().hash(),
            "30a5e9bbfddba2909845c88c93004b73102b618fa492d3a68187a8e5e2d9b349"
        );
    }

    #[test]
    fn block_hash_example() {
        let block = sample_block();
        assert_eq!(
            String::from_utf8(block.canonical_bytes()).unwrap(),
            r#"{"index":2,"previous_hash":"abc","proof":7,"timestamp":1600000000.5,"transactions":[{"amount":10.0,"recipient":"Bob","sender":"Alice"},{"amount":5.0,"recipient":"Charlie","sender":"Bob"}]}"#
        );
        assert_eq!(
            block.hash(),
            "e8d781d0e5906fa2a9328742b0a70d5544ca10057a390c3712a07670d2a22762"
        );
        assert_eq!(block.hash().len(), HASH_HEX_SIZE);
    }

    #[test]
    fn block_hash_consistency() {
        let block = sample_block();
        assert_eq!(block.hash(), block.hash());
        assert_eq!(block.hash(), block.clone().hash());
    }

    #[test]
    fn block_hash_ignores_field_order() {
        let shuffled = r#"{
            "previous_hash": "abc",
            "transactions": [
                {"amount": 10, "sender": "Alice", "recipient": "Bob"},
                {"recipient": "Charlie", "amount": 5, "sender": "Bob"}
            ],
            "proof": 7,
            "timestamp": 1600000000.5,
            "index": 2
        }"#;
        let parsed: Block = serde_json::from_str(shuffled).unwrap();
        assert_eq!(parsed, sample_block());
        assert_eq!(parsed.hash(), sample_block().hash());
    }

    #[test]
    fn block_hash_survives_wire_round_trip() {
        let mut rng = StdRng::seed_from_u64(0x1ed6e7);
        let mut timestamps = vec![now_timestamp(), 1_760_000_000.001_358_3];
        timestamps.extend((0..20_000).map(|_| rng.gen_range(1.7e9..1.8e9)));

        let mut block = sample_block();
        for timestamp in timestamps {
            block.timestamp = timestamp;
            let wire = serde_json::to_string(&block).unwrap();
            let back: Block = serde_json::from_str(&wire).unwrap();
            assert_eq!(back.timestamp.to_bits(), timestamp.to_bits(), "{wire}");
            assert_eq!(back.hash(), block.hash());
        }
    }

    #[test]
    fn block_hash_changes_with_proof() {
        let mut block = sample_block();
        let before = block.hash();
        block.proof += 1;
        assert_ne!(before, block.hash());
    }

    #[test]
    fn block_hash_changes_with_transaction_order() {
        let mut block = sample_block();
        let before = block.hash();
        block.transactions.reverse();
        assert_ne!(before, block.hash());
    }

    #[test]
    fn canonical_json_sorts_nested_keys() {
        let value = json!({"b": 1, "a": {"d": 2, "c": [{"z": 1, "y": "q\"uote"}]}});
        assert_eq!(
            canonical_json(&value),
            r#"{"a":{"c":[{"y":"q\"uote","z":1}],"d":2},"b":1}"#
        );
    }

    #[test]
    fn transaction_serialization_example() {
        let tx = Transaction::new("Alice", "Bob", 10.0);
        let json = serde_json::to_string(&tx).unwrap();
        assert_eq!(json, r#"{"sender":"Alice","recipient":"Bob","amount":10.0}"#);
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(tx, back);
    }

    #[test]
    fn transaction_request_complete() {
        let req: TransactionRequest =
            serde_json::from_str(r#"{"sender":"a","recipient":"b","amount":-3.5}"#).unwrap();
        let tx = Transaction::try_from(req).unwrap();
        assert_eq!(tx, Transaction::new("a", "b", -3.5));
    }

    #[test]
    fn transaction_request_missing_amount() {
        let req: TransactionRequest =
            serde_json::from_str(r#"{"sender":"a","recipient":"b"}"#).unwrap();
        assert_eq!(
            Transaction::try_from(req),
            Err(Error::MissingField("amount"))
        );
    }

    #[test]
    fn transaction_request_missing_sender_reported_first() {
        let req = TransactionRequest::default();
        assert_eq!(
            Transaction::try_from(req),
            Err(Error::MissingField("sender"))
        );
    }
}
