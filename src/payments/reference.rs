//! Signed merchant reference codec.
//!
//! The gateway only echoes back an opaque string, so the tenant and
//! transaction identity travelling through it are bound together with a
//! truncated HMAC. A notification carrying a reference that does not verify
//! is treated as forged and never touches storage.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::payments::utils::secure_eq;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEX_LEN: usize = 12;
const TRANSACTION_ID_LEN: usize = 26;

/// Result of parsing an inbound reference. Callers must check `is_valid`
/// before trusting the identifiers; on failure both are zeroed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference {
    pub tenant_id: i64,
    pub transaction_id: String,
    pub is_valid: bool,
}

impl ParsedReference {
    fn invalid() -> Self {
        Self {
            tenant_id: 0,
            transaction_id: String::new(),
            is_valid: false,
        }
    }
}

/// Generates and verifies `tenant:transaction:signature` tokens using the
/// platform-wide signing secret.
#[derive(Clone)]
pub struct ReferenceCodec {
    signing_secret: Vec<u8>,
}

impl ReferenceCodec {
    pub fn new(signing_secret: &str) -> Self {
        Self {
            signing_secret: signing_secret.as_bytes().to_vec(),
        }
    }

    pub fn generate(&self, tenant_id: i64, transaction_id: &str) -> String {
        let signature = self.sign(tenant_id, transaction_id);
        format!("{}:{}:{}", tenant_id, transaction_id, signature)
    }

    /// Parse and verify a reference. Never errors: any structural or
    /// signature problem yields a zeroed, invalid result so the caller has a
    /// single branch to take.
    pub fn parse(&self, reference: &str) -> ParsedReference {
        let mut parts = reference.splitn(4, ':');
        let (tenant_part, tx_part, sig_part) = match (
            parts.next(),
            parts.next(),
            parts.next(),
            parts.next(),
        ) {
            (Some(t), Some(tx), Some(sig), None) => (t, tx, sig),
            _ => return ParsedReference::invalid(),
        };

        let tenant_id = match tenant_part.parse::<i64>() {
            Ok(id) if id > 0 => id,
            _ => return ParsedReference::invalid(),
        };

        if tx_part.len() != TRANSACTION_ID_LEN
            || !tx_part.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return ParsedReference::invalid();
        }

        if sig_part.len() != SIGNATURE_HEX_LEN {
            return ParsedReference::invalid();
        }

        let expected = self.sign(tenant_id, tx_part);
        let received = sig_part.to_ascii_lowercase();
        if !secure_eq(expected.as_bytes(), received.as_bytes()) {
            return ParsedReference::invalid();
        }

        ParsedReference {
            tenant_id,
            transaction_id: tx_part.to_string(),
            is_valid: true,
        }
    }

    fn sign(&self, tenant_id: i64, transaction_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.signing_secret)
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{}:{}", tenant_id, transaction_id).as_bytes());
        let digest = mac.finalize().into_bytes();
        hex::encode(digest)[..SIGNATURE_HEX_LEN].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-signing-secret-0123456789abcdef";
    const TX_ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    fn codec() -> ReferenceCodec {
        ReferenceCodec::new(SECRET)
    }

    #[test]
    fn generated_references_round_trip() {
        let reference = codec().generate(42, TX_ID);
        let parsed = codec().parse(&reference);
        assert!(parsed.is_valid);
        assert_eq!(parsed.tenant_id, 42);
        assert_eq!(parsed.transaction_id, TX_ID);
    }

    #[test]
    fn flipped_signature_char_is_rejected() {
        let reference = codec().generate(42, TX_ID);
        let mut chars: Vec<char> = reference.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == '0' { '1' } else { '0' };
        let tampered: String = chars.into_iter().collect();
        let parsed = codec().parse(&tampered);
        assert!(!parsed.is_valid);
        assert_eq!(parsed.tenant_id, 0);
        assert!(parsed.transaction_id.is_empty());
    }

    #[test]
    fn tampered_tenant_is_rejected() {
        let reference = codec().generate(42, TX_ID);
        let tampered = reference.replacen("42:", "43:", 1);
        assert!(!codec().parse(&tampered).is_valid);
    }

    #[test]
    fn malformed_shapes_are_rejected() {
        let c = codec();
        assert!(!c.parse("").is_valid);
        assert!(!c.parse("no-colons-here").is_valid);
        assert!(!c.parse("1:2").is_valid);
        assert!(!c.parse("1:2:3:4").is_valid);
        assert!(!c.parse(&format!("0:{}:abcdef012345", TX_ID)).is_valid);
        assert!(!c.parse(&format!("-5:{}:abcdef012345", TX_ID)).is_valid);
        assert!(!c.parse(&format!("x:{}:abcdef012345", TX_ID)).is_valid);
        // wrong transaction id length
        assert!(!c.parse("1:SHORT:abcdef012345").is_valid);
        // wrong signature length
        assert!(!c.parse(&format!("1:{}:abc", TX_ID)).is_valid);
    }

    #[test]
    fn uppercase_signature_hex_is_accepted() {
        let reference = codec().generate(7, TX_ID);
        let (head, sig) = reference.rsplit_once(':').expect("reference has colons");
        let upper = format!("{}:{}", head, sig.to_ascii_uppercase());
        assert!(codec().parse(&upper).is_valid);
    }

    #[test]
    fn different_secret_does_not_verify() {
        let reference = codec().generate(42, TX_ID);
        let other = ReferenceCodec::new("another-secret-entirely-9876543210");
        assert!(!other.parse(&reference).is_valid);
    }
}
