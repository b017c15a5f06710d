// Spoken scripts for each leg of the workflow

use crate::markup::VoiceResponse;

pub const DEFAULT_DESCRIPTION: &str = "An emergency has been reported.";
pub const DEFAULT_ADDRESS: &str = "Unknown location";
pub const DEFAULT_HOLD_MUSIC: &str =
    "http://com.twilio.music.classical.s3.amazonaws.com/BusyStrings.mp3";

/// Briefing read to the technician on the notification leg.
///
/// The message is spoken, paused, then repeated once so details missed on a
/// noisy line are heard a second time.
pub fn technician_briefing(address: Option<&str>, description: Option<&str>) -> VoiceResponse {
    let address = or_default(address, DEFAULT_ADDRESS);
    let description = or_default(description, DEFAULT_DESCRIPTION);

    let message = format!(
        "New Emergency Alert. Address: {address}. Issue: {description}. \
         Please listen to these details, then hang up. \
         You will be called back immediately to connect with the customer."
    );

    VoiceResponse::new()
        .pause(1)
        .say(message.clone())
        .pause(1)
        .say(format!("Repeating. {message}"))
}

pub fn hold_in_queue(queue_key: &str, hold_music: &str) -> VoiceResponse {
    VoiceResponse::new()
        .say("Please hold while we connect you to the technician.")
        .play(hold_music)
        .enqueue(queue_key)
}

pub fn no_active_emergency() -> VoiceResponse {
    VoiceResponse::new()
        .say("No active emergency is currently reported. Goodbye.")
        .hangup()
}

pub fn test_mode_greeting() -> VoiceResponse {
    VoiceResponse::new().say("This is a test of the emergency system. Goodbye.")
}

/// Executed when the technician answers the bridge leg.
pub fn bridge_to_queue(queue_key: &str) -> VoiceResponse {
    VoiceResponse::new()
        .say("Connecting you to the customer now.")
        .dial_queue(queue_key)
}

fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}
