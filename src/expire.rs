use chrono::{DateTime, Duration, Utc};

use crate::kubemodel::ObjectRef;

/// Relative time-to-live, counted from the object's creation timestamp
pub const TTL_LABEL: &str = "kube-custodian/ttl";
/// Absolute RFC 3339 deadline
pub const EXPIRES_LABEL: &str = "kube-custodian/expires";

/// Both expiry policies, in precedence order
pub const POLICY_LABELS: [&str; 2] = [TTL_LABEL, EXPIRES_LABEL];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Expiry {
    Expired,
    Live,
    /// Neither policy label present, object is not a candidate at all
    NoPolicy,
}

/// Parses a ttl label value like `2w3d` or `12h30m` into a duration.
///
/// Tokens are extracted by pattern match; anything else in the string is
/// ignored. A repeated unit overwrites the earlier occurrence rather than
/// accumulating. Never fails: no recognizable tokens means zero.
pub fn parse_ttl(value: &str) -> Duration {
    use std::sync::LazyLock;
    static TOKEN_RE: LazyLock<regex::Regex> =
        LazyLock::new(|| regex::Regex::new(r"(\d+)([wdhm])").unwrap());

    let (mut weeks, mut days, mut hours, mut minutes) = (0i64, 0i64, 0i64, 0i64);
    for caps in TOKEN_RE.captures_iter(value) {
        // Magnitudes too large for u32 degrade to zero for that unit
        let amount = i64::from(caps[1].parse::<u32>().unwrap_or(0));
        match &caps[2] {
            "w" => weeks = amount,
            "d" => days = amount,
            "h" => hours = amount,
            "m" => minutes = amount,
            _ => unreachable!(),
        }
    }
    Duration::minutes((weeks * 7 * 24 + days * 24 + hours) * 60 + minutes)
}

/// Decides whether an object's expiry policy has elapsed at `now`.
///
/// The ttl label wins over the expires label when both are present. A
/// deadline exactly equal to `now` is not yet expired. Unparseable expires
/// values are logged and treated as live, never deleted on ambiguous data.
pub fn evaluate(obj: &ObjectRef, now: DateTime<Utc>) -> Expiry {
    if let Some(value) = obj.labels.get(TTL_LABEL) {
        let deadline = obj
            .created
            .and_then(|created| created.checked_add_signed(parse_ttl(value)));
        match deadline {
            Some(deadline) if deadline < now => Expiry::Expired,
            _ => Expiry::Live,
        }
    } else if let Some(value) = obj.labels.get(EXPIRES_LABEL) {
        match DateTime::parse_from_rfc3339(value) {
            Ok(deadline) if deadline.with_timezone(&Utc) < now => Expiry::Expired,
            Ok(_) => Expiry::Live,
            Err(err) => {
                log::error!("unparseable {} label on {}: {}", EXPIRES_LABEL, obj, err);
                Expiry::Live
            }
        }
    } else {
        Expiry::NoPolicy
    }
}
