//! # Ingress
//!
//! Both funding protocols translate into one [`Command`]:
//!
//! - direct-value calls build it from their typed arguments;
//! - token callbacks decode it from the transfer payload.
//!
//! ## Payload layout
//!
//! ```text
//! byte 0      discriminant: 0x00 = setup, 0x01 = deposit
//! bytes 1..   ABI-encoded arguments
//!             setup:   (address[] addresses, uint256[] expected_amounts)
//!             deposit: (uint256 pool_index, uint256 contributor_position)
//! ```
//!
//! Decoding is strict. Only the canonical encoding is accepted: head offsets
//! must point directly after the preceding data, address words must be
//! zero-padded, integers must fit their Rust types and no trailing bytes
//! are allowed.

use crate::errors::{PoolError, Result};
use crate::types::{Address, Amount};

const WORD: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Setup {
        addresses: Vec<Address>,
        expected_amounts: Vec<Amount>,
    },
    Deposit {
        pool_index: u64,
        contributor_position: usize,
    },
}

impl Command {
    pub const SETUP: u8 = 0x00;
    pub const DEPOSIT: u8 = 0x01;

    pub fn discriminant(&self) -> u8 {
        match self {
            Self::Setup { .. } => Self::SETUP,
            Self::Deposit { .. } => Self::DEPOSIT,
        }
    }

    /// Decode a token-transfer payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let (&discriminant, args) = payload
            .split_first()
            .ok_or_else(|| decode_error("empty payload"))?;
        match discriminant {
            Self::SETUP => decode_setup(args),
            Self::DEPOSIT => decode_deposit(args),
            other => Err(PoolError::UnknownOperation(other)),
        }
    }

    /// Encode as a token-transfer payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.discriminant()];
        match self {
            Self::Setup {
                addresses,
                expected_amounts,
            } => {
                let addresses_offset = 2 * WORD;
                let amounts_offset = addresses_offset + WORD * (1 + addresses.len());
                push_word(&mut out, Amount::from(addresses_offset));
                push_word(&mut out, Amount::from(amounts_offset));
                push_word(&mut out, Amount::from(addresses.len()));
                for address in addresses {
                    out.extend_from_slice(&[0u8; 12]);
                    out.extend_from_slice(address.as_bytes());
                }
                push_word(&mut out, Amount::from(expected_amounts.len()));
                for amount in expected_amounts {
                    push_word(&mut out, *amount);
                }
            }
            Self::Deposit {
                pool_index,
                contributor_position,
            } => {
                push_word(&mut out, Amount::from(*pool_index));
                push_word(&mut out, Amount::from(*contributor_position));
            }
        }
        out
    }
}

fn decode_setup(args: &[u8]) -> Result<Command> {
    let addresses_offset = read_usize(args, 0)?;
    let amounts_offset = read_usize(args, WORD)?;
    if addresses_offset != 2 * WORD {
        return Err(decode_error("non-canonical offset for addresses"));
    }

    let address_count = read_len(args, addresses_offset)?;
    let expected_amounts_offset = addresses_offset + WORD * (1 + address_count);
    if amounts_offset != expected_amounts_offset {
        return Err(decode_error("non-canonical offset for expected amounts"));
    }
    let amount_count = read_len(args, amounts_offset)?;
    if args.len() != amounts_offset + WORD * (1 + amount_count) {
        return Err(decode_error("payload length does not match encoded arrays"));
    }

    let addresses = (0..address_count)
        .map(|i| read_address(args, addresses_offset + WORD * (1 + i)))
        .collect::<Result<Vec<_>>>()?;
    let expected_amounts = (0..amount_count)
        .map(|i| read_word(args, amounts_offset + WORD * (1 + i)))
        .collect::<Result<Vec<_>>>()?;

    Ok(Command::Setup {
        addresses,
        expected_amounts,
    })
}

fn decode_deposit(args: &[u8]) -> Result<Command> {
    if args.len() != 2 * WORD {
        return Err(decode_error(format!(
            "deposit arguments must be {} bytes, got {}",
            2 * WORD,
            args.len()
        )));
    }
    let pool_index = read_word(args, 0)?;
    if pool_index > Amount::from(u64::MAX) {
        return Err(decode_error("pool index out of range"));
    }
    Ok(Command::Deposit {
        pool_index: pool_index.as_u64(),
        contributor_position: read_usize(args, WORD)?,
    })
}

fn decode_error(msg: impl Into<String>) -> PoolError {
    PoolError::DecodeError(msg.into())
}

fn word_at(data: &[u8], offset: usize) -> Result<&[u8]> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| decode_error(format!("truncated word at offset {offset}")))
}

fn read_word(data: &[u8], offset: usize) -> Result<Amount> {
    Ok(Amount::from_big_endian(word_at(data, offset)?))
}

fn read_usize(data: &[u8], offset: usize) -> Result<usize> {
    let value = read_word(data, offset)?;
    if value > Amount::from(usize::MAX) {
        return Err(decode_error(format!("integer at offset {offset} out of range")));
    }
    Ok(value.as_usize())
}

/// Array length, bounded by what the payload could possibly hold.
fn read_len(data: &[u8], offset: usize) -> Result<usize> {
    let len = read_usize(data, offset)?;
    if len > data.len() / WORD {
        return Err(decode_error(format!("array length {len} exceeds payload")));
    }
    Ok(len)
}

fn read_address(data: &[u8], offset: usize) -> Result<Address> {
    let word = word_at(data, offset)?;
    if word[..12].iter().any(|b| *b != 0) {
        return Err(decode_error(format!("dirty address padding at offset {offset}")));
    }
    Address::from_slice(&word[12..]).ok_or_else(|| decode_error("bad address"))
}

fn push_word(out: &mut Vec<u8>, value: Amount) {
    let mut buf = [0u8; WORD];
    value.to_big_endian(&mut buf);
    out.extend_from_slice(&buf);
}
