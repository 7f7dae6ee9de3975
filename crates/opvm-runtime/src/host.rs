//! External collaborators reachable from bytecode
//!
//! The VM never talks to the outside world directly. Storage reads and
//! token/tier oracles go through a [`Host`], which the embedder injects per
//! evaluation. Reads are pure: a failure aborts the whole evaluation.

use crate::word::Word;
use std::collections::BTreeMap;
use thiserror::Error;

/// Number of tiers packed into a tier report (32 bits each)
pub const TIER_COUNT: u64 = 8;

/// Bits per tier timestamp in a report
pub const TIER_BITS: u32 = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("{what} {key} does not exist")]
    NotFound { what: &'static str, key: Word },

    #[error("tier {tier} is out of range 0..={max}")]
    InvalidTier { tier: Word, max: u64 },

    #[error("{0}")]
    Failed(String),
}

/// Read-only view of the world an evaluation runs against
pub trait Host {
    /// Persistent storage read (missing keys read as zero)
    fn get(&self, key: &Word) -> Result<Word, HostError>;

    fn erc20_balance_of(&self, token: &Word, account: &Word) -> Result<Word, HostError>;

    fn erc20_total_supply(&self, token: &Word) -> Result<Word, HostError>;

    fn erc721_balance_of(&self, token: &Word, account: &Word) -> Result<Word, HostError>;

    fn erc721_owner_of(&self, token: &Word, id: &Word) -> Result<Word, HostError>;

    fn erc1155_balance_of(&self, token: &Word, account: &Word, id: &Word)
        -> Result<Word, HostError>;

    /// Packed tier report: 8 little-endian 32-bit timestamps
    fn tier_report(&self, contract: &Word, account: &Word, context: &[Word])
        -> Result<Word, HostError>;

    /// Timestamp at which `account` reached `tier` (0 for tier 0)
    fn tier_report_time_for_tier(
        &self,
        contract: &Word,
        account: &Word,
        tier: &Word,
        context: &[Word],
    ) -> Result<Word, HostError> {
        let report = self.tier_report(contract, account, context)?;
        report_time_for_tier(report, tier)
    }
}

/// Timestamp of `tier` within a packed report
pub fn report_time_for_tier(report: Word, tier: &Word) -> Result<Word, HostError> {
    let invalid = || HostError::InvalidTier {
        tier: *tier,
        max: TIER_COUNT,
    };
    let index = tier.to_u64().filter(|t| *t <= TIER_COUNT).ok_or_else(invalid)?;
    if index == 0 {
        return Ok(Word::ZERO);
    }
    let shift = (index as u32 - 1) * TIER_BITS;
    Ok((report >> shift).low_bits(TIER_BITS))
}

// ============================================================================
// In-memory host
// ============================================================================

/// Deterministic in-memory host for tests and tooling
///
/// Unset balances and storage read as zero, unset tier reports read as
/// `Word::MAX` (no tier ever held) and unset ERC721 owners are an error.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    storage: BTreeMap<Word, Word>,
    erc20_balances: BTreeMap<(Word, Word), Word>,
    erc20_supplies: BTreeMap<Word, Word>,
    erc721_balances: BTreeMap<(Word, Word), Word>,
    erc721_owners: BTreeMap<(Word, Word), Word>,
    erc1155_balances: BTreeMap<(Word, Word, Word), Word>,
    tier_reports: BTreeMap<(Word, Word), Word>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, key: Word, value: Word) -> Self {
        self.storage.insert(key, value);
        self
    }

    pub fn with_erc20_balance(mut self, token: Word, account: Word, balance: Word) -> Self {
        self.erc20_balances.insert((token, account), balance);
        self
    }

    pub fn with_erc20_supply(mut self, token: Word, supply: Word) -> Self {
        self.erc20_supplies.insert(token, supply);
        self
    }

    pub fn with_erc721_balance(mut self, token: Word, account: Word, balance: Word) -> Self {
        self.erc721_balances.insert((token, account), balance);
        self
    }

    pub fn with_erc721_owner(mut self, token: Word, id: Word, owner: Word) -> Self {
        self.erc721_owners.insert((token, id), owner);
        self
    }

    pub fn with_erc1155_balance(mut self, token: Word, account: Word, id: Word, balance: Word) -> Self {
        self.erc1155_balances.insert((token, account, id), balance);
        self
    }

    pub fn with_tier_report(mut self, contract: Word, account: Word, report: Word) -> Self {
        self.tier_reports.insert((contract, account), report);
        self
    }
}

impl Host for MemoryHost {
    fn get(&self, key: &Word) -> Result<Word, HostError> {
        Ok(self.storage.get(key).copied().unwrap_or_default())
    }

    fn erc20_balance_of(&self, token: &Word, account: &Word) -> Result<Word, HostError> {
        Ok(self
            .erc20_balances
            .get(&(*token, *account))
            .copied()
            .unwrap_or_default())
    }

    fn erc20_total_supply(&self, token: &Word) -> Result<Word, HostError> {
        Ok(self.erc20_supplies.get(token).copied().unwrap_or_default())
    }

    fn erc721_balance_of(&self, token: &Word, account: &Word) -> Result<Word, HostError> {
        Ok(self
            .erc721_balances
            .get(&(*token, *account))
            .copied()
            .unwrap_or_default())
    }

    fn erc721_owner_of(&self, token: &Word, id: &Word) -> Result<Word, HostError> {
        self.erc721_owners
            .get(&(*token, *id))
            .copied()
            .ok_or(HostError::NotFound {
                what: "erc721 token",
                key: *id,
            })
    }

    fn erc1155_balance_of(&self, token: &Word, account: &Word, id: &Word) -> Result<Word, HostError> {
        Ok(self
            .erc1155_balances
            .get(&(*token, *account, *id))
            .copied()
            .unwrap_or_default())
    }

    fn tier_report(&self, contract: &Word, account: &Word, _context: &[Word]) -> Result<Word, HostError> {
        Ok(self
            .tier_reports
            .get(&(*contract, *account))
            .copied()
            .unwrap_or(Word::MAX))
    }
}
