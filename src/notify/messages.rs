// src/notify/messages.rs
//! Player-facing texts. `§` codes are Minecraft color/style markers; other
//! transports may strip them.

use crate::core::proof::VerifiedAttributes;

pub fn verification_started(location: &str) -> String {
    format!("§aVerification started! Scan QR: §b{location}")
}

pub fn connected() -> String {
    "§aConnected! Sending proof request...".to_string()
}

pub fn proof_requested() -> String {
    "§eProof request sent to your wallet. Please approve it!".to_string()
}

pub fn proof_request_failed() -> String {
    "§cFailed to send proof request. Retrying shortly, keep your wallet open.".to_string()
}

pub fn verified(attributes: &VerifiedAttributes) -> String {
    let details = attributes
        .attributes
        .iter()
        .map(|(name, value)| format!("{}: {}", capitalize(name), value))
        .collect::<Vec<_>>();

    if details.is_empty() {
        "§a✓ Identity verified!".to_string()
    } else {
        format!("§a✓ Identity verified! {}", details.join(", "))
    }
}

pub fn verified_broadcast(subject_id: &str) -> String {
    format!("§6{subject_id} §ahas been verified with SSI credentials!")
}

pub fn failed() -> String {
    "§cIdentity verification failed. Check your credentials and try /verify again.".to_string()
}

pub fn timed_out() -> String {
    "§cVerification timeout. Try /verify again.".to_string()
}

pub fn benefits_granted() -> String {
    "§a✓ You now have verified player benefits!".to_string()
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
