//! Session status derived from the stored descriptor and the current time
use crate::descriptor::SessionDescriptor;
use serde::Serialize;
use std::fmt;

/// Derived view of a session, never stored
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub is_active: bool,
    /// Seconds until expiry
    pub time_remaining: u64,
    pub usage_remaining: u32,
    pub total_usage: u32,
    pub usage_limit: u32,
}

impl SessionStatus {
    pub fn derive(descriptor: &SessionDescriptor, now: u64) -> Self {
        Self {
            is_active: descriptor.is_active && now < descriptor.valid_until,
            time_remaining: descriptor.valid_until.saturating_sub(now),
            usage_remaining: descriptor.usage_limit.saturating_sub(descriptor.usage_count),
            total_usage: descriptor.usage_count,
            usage_limit: descriptor.usage_limit,
        }
    }
}

/// Lifecycle state of the session slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Nothing stored
    None,
    Active,
    /// Active and unexpired, but every use is spent
    Exhausted,
    Expired,
    /// Stored with the active flag cleared
    Inactive,
}

impl SessionState {
    pub fn of(descriptor: Option<&SessionDescriptor>, now: u64) -> Self {
        match descriptor {
            None => Self::None,
            Some(d) if !d.is_active => Self::Inactive,
            Some(d) if now >= d.valid_until => Self::Expired,
            Some(d) if d.usage_count >= d.usage_limit => Self::Exhausted,
            Some(_) => Self::Active,
        }
    }

    /// A new session may be granted unless an unexpired one is active
    pub fn can_grant(&self) -> bool {
        !matches!(self, Self::Active | Self::Exhausted)
    }

    pub fn can_consume(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether there is anything to revoke
    pub fn can_revoke(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Active => "active",
            Self::Exhausted => "exhausted",
            Self::Expired => "expired",
            Self::Inactive => "inactive",
        };
        f.write_str(s)
    }
}

/// `Expired`, `1h 5m`, `5m 10s` or `10s`
pub fn format_time_remaining(secs: u64) -> String {
    if secs == 0 {
        return "Expired".into();
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}
