//! Electrode wiring of a single-shank 2.0 probe
//!
//! 1280 electrodes are split into four banks of 384. Inside a bank, electrodes
//! form 12 blocks of 32, each block 16 rows of 2. A bank-specific row
//! permutation decides which channel an electrode lands on:
//!
//! ```text
//! channel = ((row * M + parity * O) mod 16) * 2 + block * 32 + parity
//!
//!   bank   M   O
//!   A      1   0
//!   B      7   4
//!   C      5   8
//!   D      3  12
//! ```
//!
//! M is odd for every bank, so each permutation is a bijection on the 16 rows.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::{NUM_BANKS, NUM_CHANNELS, NUM_ELECTRODES};
use crate::error::MappingError;
use crate::hardware::ElectrodeBank;

/// Electrodes per block
const BLOCK_SIZE: usize = 32;

/// Rows per block
const ROWS_PER_BLOCK: usize = 16;

/// Bank of a single-shank probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bank {
    A,
    B,
    C,
    D,
}

impl Bank {
    pub const ALL: [Bank; NUM_BANKS] = [Bank::A, Bank::B, Bank::C, Bank::D];

    pub fn from_index(index: usize) -> Option<Bank> {
        Self::ALL.get(index).copied()
    }

    pub fn index(&self) -> usize {
        match self {
            Bank::A => 0,
            Bank::B => 1,
            Bank::C => 2,
            Bank::D => 3,
        }
    }

    /// Bank value understood by the hardware boundary
    pub fn hardware(&self) -> ElectrodeBank {
        match self {
            Bank::A => ElectrodeBank::A,
            Bank::B => ElectrodeBank::B,
            Bank::C => ElectrodeBank::C,
            Bank::D => ElectrodeBank::D,
        }
    }

    fn row_multiplier(&self) -> usize {
        match self {
            Bank::A => 1,
            Bank::B => 7,
            Bank::C => 5,
            Bank::D => 3,
        }
    }

    /// Multiplicative inverse of the row multiplier mod 16
    fn inverse_multiplier(&self) -> usize {
        match self {
            Bank::A => 1,
            Bank::B => 7,
            Bank::C => 13,
            Bank::D => 11,
        }
    }

    fn parity_offset(&self) -> usize {
        match self {
            Bank::A => 0,
            Bank::B => 4,
            Bank::C => 8,
            Bank::D => 12,
        }
    }
}

impl fmt::Display for Bank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Bank::A => 'A',
            Bank::B => 'B',
            Bank::C => 'C',
            Bank::D => 'D',
        };
        write!(f, "{}", letter)
    }
}

/// Physical location and routing of one electrode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElectrodeSite {
    pub electrode: usize,
    pub bank: Bank,
    pub block: usize,
    pub row: usize,
    pub channel: usize,
}

/// Resolve the bank and channel of an electrode
pub fn electrode_site(electrode: usize) -> Result<ElectrodeSite, MappingError> {
    if electrode >= NUM_ELECTRODES {
        return Err(MappingError::ElectrodeOutOfRange(electrode));
    }

    let bank_index = electrode / NUM_CHANNELS;
    let bank = Bank::from_index(bank_index).ok_or(MappingError::InvalidBank {
        electrode,
        bank: bank_index,
    })?;

    let local = electrode % NUM_CHANNELS;
    let block = local / BLOCK_SIZE;
    let row = (local / 2) % ROWS_PER_BLOCK;
    let parity = electrode % 2;

    let permuted_row =
        (row * bank.row_multiplier() + parity * bank.parity_offset()) % ROWS_PER_BLOCK;
    let channel = permuted_row * 2 + block * BLOCK_SIZE + parity;

    Ok(ElectrodeSite {
        electrode,
        bank,
        block,
        row,
        channel,
    })
}

/// Electrode of `bank` wired to `channel`, if the bank reaches that channel
pub fn electrode_for_channel(channel: usize, bank: Bank) -> Option<usize> {
    if channel >= NUM_CHANNELS {
        return None;
    }

    let block = channel / BLOCK_SIZE;
    let parity = channel % 2;
    let permuted_row = (channel % BLOCK_SIZE) / 2;

    let shifted = (permuted_row + ROWS_PER_BLOCK * ROWS_PER_BLOCK
        - parity * bank.parity_offset())
        % ROWS_PER_BLOCK;
    let row = (shifted * bank.inverse_multiplier()) % ROWS_PER_BLOCK;

    let electrode = bank.index() * NUM_CHANNELS + block * BLOCK_SIZE + row * 2 + parity;
    (electrode < NUM_ELECTRODES).then_some(electrode)
}
