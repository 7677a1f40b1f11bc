//! Simulated SMS notifications.
//!
//! The deployment has no SMS gateway, so "sending" a text message is a
//! structured-log simulation that always succeeds. The message selection
//! mirrors the alert bands: a critical text at full capacity, a warning
//! text when a bin approaches it, nothing below that.

use trashtracker_core::threshold::{CRITICAL_BOUNDARY, WARNING_BOUNDARY};
use trashtracker_store::UserSession;

/// Placeholder recipient used when the user has no phone number on file.
const SIMULATED_NUMBER: &str = "+00000000000";

/// Compose the SMS body for a fill level.
///
/// Returns `None` below the warning band; not every level change is worth
/// a text message.
pub fn compose_message(bin_name: &str, fill_level: f64) -> Option<String> {
    let rounded = fill_level.round();
    if fill_level >= CRITICAL_BOUNDARY {
        Some(format!(
            "ALERT: bin \"{bin_name}\" has reached full capacity ({rounded}%). Immediate attention required."
        ))
    } else if fill_level >= WARNING_BOUNDARY {
        Some(format!(
            "Notice: bin \"{bin_name}\" is approaching capacity ({rounded}%). Schedule a collection soon."
        ))
    } else {
        None
    }
}

/// "Send" an SMS by logging it. Always succeeds, this is a simulation.
pub fn send_sms(phone_number: &str, message: &str) -> bool {
    tracing::info!(to = phone_number, message, "Simulated SMS sent");
    true
}

/// Text a user about a bin's fill level over the simulated gateway.
///
/// Falls back to a placeholder number when the profile has none. Returns
/// `false` when the level is below the warning band and no SMS applies.
pub fn notify_user_about_bin(user: Option<&UserSession>, bin_name: &str, fill_level: f64) -> bool {
    let Some(message) = compose_message(bin_name, fill_level) else {
        return false;
    };

    let number = user
        .and_then(|u| u.phone_number.as_deref())
        .unwrap_or(SIMULATED_NUMBER);
    send_sms(number, &message)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
