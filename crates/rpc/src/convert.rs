//! Conversion of encoded RPC payloads into owned transaction records
//!
//! This is the typing boundary of the pipeline: everything downstream works
//! with `TransactionRecord`, and malformed payloads are rejected here as
//! parse failures instead of surfacing deep in extraction or accounting.

use chrono::{TimeZone, Utc};
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiInstruction, UiLoadedAddresses,
    UiMessage, UiParsedInstruction, UiTransactionTokenBalance,
};

use wallet_perf_core::{InstructionRecord, TokenBalanceRecord, TransactionRecord};

use crate::LedgerError;

/// Convert an encoded transaction into an owned record
pub fn transaction_record(
    signature: &str,
    encoded: EncodedConfirmedTransactionWithStatusMeta,
) -> Result<TransactionRecord, LedgerError> {
    let meta = encoded
        .transaction
        .meta
        .ok_or_else(|| LedgerError::Malformed("transaction has no meta".to_string()))?;

    let loaded = Option::<UiLoadedAddresses>::from(meta.loaded_addresses.clone());

    let (account_keys, instructions) = match encoded.transaction.transaction {
        EncodedTransaction::Json(ui_tx) => match ui_tx.message {
            UiMessage::Raw(raw) => {
                let mut keys = raw.account_keys;
                // Lookup-table addresses extend the static key list, in
                // writable-then-readonly order, so balance owners resolve
                if let Some(loaded) = loaded {
                    keys.extend(loaded.writable);
                    keys.extend(loaded.readonly);
                }
                let instructions = raw
                    .instructions
                    .iter()
                    .filter_map(|ix| {
                        keys.get(ix.program_id_index as usize)
                            .map(|program_id| InstructionRecord {
                                program_id: program_id.clone(),
                                account_indexes: ix.accounts.clone(),
                            })
                    })
                    .collect();
                (keys, instructions)
            }
            UiMessage::Parsed(parsed) => {
                let keys: Vec<String> = parsed
                    .account_keys
                    .iter()
                    .map(|k| k.pubkey.clone())
                    .collect();
                let instructions = parsed
                    .instructions
                    .iter()
                    .filter_map(|ix| match ix {
                        UiInstruction::Compiled(c) => {
                            keys.get(c.program_id_index as usize)
                                .map(|program_id| InstructionRecord {
                                    program_id: program_id.clone(),
                                    account_indexes: c.accounts.clone(),
                                })
                        }
                        UiInstruction::Parsed(UiParsedInstruction::Parsed(p)) => {
                            Some(InstructionRecord {
                                program_id: p.program_id.clone(),
                                account_indexes: Vec::new(),
                            })
                        }
                        UiInstruction::Parsed(UiParsedInstruction::PartiallyDecoded(p)) => {
                            Some(InstructionRecord {
                                program_id: p.program_id.clone(),
                                account_indexes: Vec::new(),
                            })
                        }
                    })
                    .collect();
                (keys, instructions)
            }
        },
        _ => {
            return Err(LedgerError::Malformed(
                "unsupported transaction encoding".to_string(),
            ))
        }
    };

    let pre_token_balances = token_balances(meta.pre_token_balances, signature)?;
    let post_token_balances = token_balances(meta.post_token_balances, signature)?;

    Ok(TransactionRecord {
        signature: signature.to_string(),
        slot: encoded.slot,
        block_time: encoded
            .block_time
            .and_then(|t| Utc.timestamp_opt(t, 0).single()),
        failed: meta.err.is_some(),
        fee_lamports: meta.fee,
        account_keys,
        instructions,
        pre_token_balances,
        post_token_balances,
    })
}

/// Convert one side of the token-balance metadata
fn token_balances(
    balances: OptionSerializer<Vec<UiTransactionTokenBalance>>,
    signature: &str,
) -> Result<Vec<TokenBalanceRecord>, LedgerError> {
    let Some(balances) = Option::<Vec<UiTransactionTokenBalance>>::from(balances) else {
        return Ok(Vec::new());
    };

    balances
        .into_iter()
        .map(|b| {
            let raw_amount = b.ui_token_amount.amount.parse::<u64>().map_err(|_| {
                LedgerError::Malformed(format!(
                    "unparseable token amount {:?} in {}",
                    b.ui_token_amount.amount, signature
                ))
            })?;

            Ok(TokenBalanceRecord {
                owner: Option::<String>::from(b.owner),
                mint: b.mint,
                raw_amount,
                decimals: b.ui_token_amount.decimals,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_account_decoder::parse_token::UiTokenAmount;
    use solana_transaction_status::UiTransactionTokenBalance;

    fn balance(mint: &str, amount: &str, decimals: u8, owner: Option<&str>) -> UiTransactionTokenBalance {
        UiTransactionTokenBalance {
            account_index: 1,
            mint: mint.to_string(),
            ui_token_amount: UiTokenAmount {
                ui_amount: None,
                decimals,
                amount: amount.to_string(),
                ui_amount_string: String::new(),
            },
            owner: match owner {
                Some(o) => OptionSerializer::Some(o.to_string()),
                None => OptionSerializer::None,
            },
            program_id: OptionSerializer::Skip,
        }
    }

    #[test]
    fn parses_raw_amounts_and_owner() {
        let records = token_balances(
            OptionSerializer::Some(vec![balance("MintA", "1500000", 6, Some("Owner1"))]),
            "sig",
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].raw_amount, 1_500_000);
        assert_eq!(records[0].decimals, 6);
        assert_eq!(records[0].owner.as_deref(), Some("Owner1"));
    }

    #[test]
    fn missing_balances_are_empty_not_errors() {
        let records = token_balances(OptionSerializer::None, "sig").unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn garbage_amount_is_a_parse_failure() {
        let result = token_balances(
            OptionSerializer::Some(vec![balance("MintA", "not-a-number", 6, None)]),
            "sig",
        );
        assert!(matches!(result, Err(LedgerError::Malformed(_))));
    }
}
