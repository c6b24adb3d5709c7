//! Input Digest (C2): deterministic fingerprint of the inputs that determine
//! a credential's identity (`spec.md` §3, §4.2).

use sha2::{Digest, Sha224};

const BASE36_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// `base36(SHA-224(canonical(inputs)))`.
pub fn input_digest(canonical_inputs: &str) -> String {
    let hash = Sha224::digest(canonical_inputs.as_bytes());
    to_base36(&hash)
}

fn to_base36(bytes: &[u8]) -> String {
    // Treat the digest as a big-endian unsigned integer and repeatedly divide
    // by 36, following the usual arbitrary-precision base-conversion approach.
    let mut digits = bytes.to_vec();
    let mut out = Vec::new();

    while digits.iter().any(|&b| b != 0) {
        let mut remainder: u32 = 0;
        for byte in &mut digits {
            let value = (remainder << 8) | u32::from(*byte);
            *byte = (value / 36) as u8;
            remainder = value % 36;
        }
        out.push(BASE36_ALPHABET[remainder as usize]);
    }

    if out.is_empty() {
        out.push(b'0');
    }
    out.reverse();
    String::from_utf8(out).expect("base36 alphabet is ASCII")
}

/// v1beta1 input formula: `clientID + resolved-resourceID + server + scope`.
pub fn v1beta1_inputs(client_id: &str, resolved_resource_id: &str, server: &str, scope: &str) -> String {
    format!("{client_id}{resolved_resource_id}{server}{scope}")
}

/// v1beta2 input formula:
/// `serviceAccountName | "managedIdentity"+resourceID+clientID | "workloadIdentity"+serviceAccountRef | environment + server + scope`.
pub fn v1beta2_managed_identity_inputs(
    service_account_name: &str,
    resource_id: &str,
    client_id: &str,
    environment: &str,
    server: &str,
    scope: &str,
) -> String {
    format!(
        "{service_account_name}|managedIdentity{resource_id}{client_id}|{environment}{server}{scope}"
    )
}

pub fn v1beta2_workload_identity_inputs(
    service_account_name: &str,
    service_account_ref: &str,
    environment: &str,
    server: &str,
    scope: &str,
) -> String {
    format!(
        "{service_account_name}|workloadIdentity{service_account_ref}|{environment}{server}{scope}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = input_digest("same-input");
        let b = input_digest("same-input");
        assert_eq!(a, b);
    }

    #[test]
    fn differs_on_different_input() {
        assert_ne!(input_digest("a"), input_digest("b"));
    }

    #[test]
    fn only_base36_characters() {
        let d = input_digest("whatever");
        assert!(d.chars().all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn empty_input_is_stable() {
        let d = input_digest("");
        assert!(!d.is_empty());
    }
}
