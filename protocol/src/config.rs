//! # Protocol Configuration & Constants
//!
//! Every magic number in Nullifier lives here. If you're hardcoding a
//! validity period or a dollar threshold somewhere else, you're doing it
//! wrong and you owe the team coffee.
//!
//! Changing the credential constants after launch changes what "accredited"
//! means for every holder on the network, so treat this file as consensus
//! code even though it looks like a list of numbers.

// ---------------------------------------------------------------------------
// Chain Identifiers
// ---------------------------------------------------------------------------

/// Mantle Sepolia, the chain the registry and vaults were first deployed on.
pub const CHAIN_ID_MANTLE_SEPOLIA: u64 = 5003;

/// Local devnet chain id. Reset whenever you feel like it.
pub const CHAIN_ID_DEVNET: u64 = 31337;

/// Protocol version string reported by the node.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Credential Lifecycle
// ---------------------------------------------------------------------------

/// One day in seconds.
pub const SECONDS_PER_DAY: u64 = 86_400;

/// How long a freshly minted credential stays valid: 365 days.
///
/// Reg D does not define a shelf life for accreditation evidence, but
/// issuers generally stop trusting a bank statement after a year.
pub const CREDENTIAL_VALIDITY_SECS: u64 = 365 * SECONDS_PER_DAY;

/// Maximum age of an attested claim at mint time: 30 days.
pub const MAX_CLAIM_AGE_SECS: u64 = 30 * SECONDS_PER_DAY;

/// Clock skew tolerated between the attestor and the chain. A claim
/// stamped further in the future than this is rejected.
pub const MAX_CLOCK_SKEW_SECS: u64 = 300;

/// Minimum number of distinct trusted attestors that must sign a claim.
pub const DEFAULT_ATTESTOR_QUORUM: usize = 1;

/// Domain separation tag mixed into every claim digest.
pub const CLAIM_DOMAIN_TAG: &[u8] = b"nullifier-claim-v1";

// ---------------------------------------------------------------------------
// Accreditation Thresholds (SEC Regulation D, Rule 501)
// ---------------------------------------------------------------------------

/// Annual income threshold in whole US dollars.
pub const INCOME_THRESHOLD_USD: u64 = 200_000;

/// Net worth threshold (excluding primary residence) in whole US dollars.
pub const NET_WORTH_THRESHOLD_USD: u64 = 1_000_000;

// ---------------------------------------------------------------------------
// Attestation Providers
// ---------------------------------------------------------------------------

/// Provider id for bank-income attestations.
pub const PROVIDER_INCOME: &str = "plaid-income-verification";

/// Provider id for bank net-worth attestations.
pub const PROVIDER_NET_WORTH: &str = "plaid-net-worth-verification";

/// Providers the reference verifier accepts out of the box.
pub const SUPPORTED_PROVIDERS: &[&str] = &[PROVIDER_INCOME, PROVIDER_NET_WORTH];

/// Public URL advertised by the reference attestor.
pub const DEFAULT_ATTESTOR_URL: &str = "https://attestor.reclaimprotocol.org";

// ---------------------------------------------------------------------------
// Token Metadata
// ---------------------------------------------------------------------------

/// ERC-721-style name of the credential token.
pub const CREDENTIAL_TOKEN_NAME: &str = "Nullifier Accreditation Credential";

/// ERC-721-style symbol of the credential token.
pub const CREDENTIAL_TOKEN_SYMBOL: &str = "NAC";

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default REST API port.
pub const DEFAULT_RPC_PORT: u16 = 9741;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9742;

/// Returns a friendly name for a chain id, mainly for logging.
pub fn chain_name(chain_id: u64) -> String {
    match chain_id {
        CHAIN_ID_MANTLE_SEPOLIA => "mantle-sepolia".to_string(),
        CHAIN_ID_DEVNET => "devnet".to_string(),
        other => format!("unknown({})", other),
    }
}
