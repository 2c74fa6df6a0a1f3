//! Best-effort leases over the key-value store.
//!
//! A lease is a `holder|expires_at` value under a key. Nothing makes the
//! read-then-write in [`acquire`] atomic, so two holders can both believe they
//! hold a lease; callers must stay correct when that happens and use the lease
//! only to avoid duplicate work.

use crate::errors::Result;
use crate::repository::KeyValueStore;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use tracing::{debug, warn};

/// Decoded lease value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseRecord {
    /// Who holds the lease
    pub holder: String,
    /// When it lapses
    pub expires_at: DateTime<Utc>,
}

impl LeaseRecord {
    fn encode(&self) -> String {
        format!("{}|{}", self.holder, self.expires_at.to_rfc3339())
    }

    fn decode(raw: &str) -> Option<Self> {
        let (holder, expires_at) = raw.rsplit_once('|')?;
        let expires_at = DateTime::parse_from_rfc3339(expires_at).ok()?;
        Some(Self {
            holder: holder.to_string(),
            expires_at: expires_at.with_timezone(&Utc),
        })
    }

    /// True once `now` reaches the expiry.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A random holder id for this process.
#[must_use]
pub fn new_holder_id() -> String {
    format!("session-{:016x}", rand::thread_rng().r#gen::<u64>())
}

/// Reads the current lease on `key`. Unreadable values count as no lease.
pub async fn current(kv: &dyn KeyValueStore, key: &str) -> Result<Option<LeaseRecord>> {
    let Some(raw) = kv.get_value(key).await? else {
        return Ok(None);
    };
    let record = LeaseRecord::decode(&raw);
    if record.is_none() {
        warn!("Ignoring unreadable lease on '{}': {:?}", key, raw);
    }
    Ok(record)
}

/// Takes the lease if it is free, lapsed, or already ours.
pub async fn acquire(
    kv: &dyn KeyValueStore,
    key: &str,
    holder: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<bool> {
    if let Some(existing) = current(kv, key).await? {
        if existing.holder != holder && !existing.is_expired(now) {
            debug!(
                "Lease '{}' held by {} until {}",
                key, existing.holder, existing.expires_at
            );
            return Ok(false);
        }
    }

    let record = LeaseRecord {
        holder: holder.to_string(),
        expires_at: now + ttl,
    };
    kv.set_value(key, &record.encode()).await?;
    debug!("Lease '{}' acquired by {}", key, holder);
    Ok(true)
}

/// Extends a lease we still hold. Returns false if someone else has it.
pub async fn renew(
    kv: &dyn KeyValueStore,
    key: &str,
    holder: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<bool> {
    match current(kv, key).await? {
        Some(existing) if existing.holder == holder => {
            let record = LeaseRecord {
                holder: holder.to_string(),
                expires_at: now + ttl,
            };
            kv.set_value(key, &record.encode()).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Drops a lease we hold. A lease held by someone else is left alone.
pub async fn release(kv: &dyn KeyValueStore, key: &str, holder: &str) -> Result<bool> {
    match current(kv, key).await? {
        Some(existing) if existing.holder != holder => Ok(false),
        _ => {
            kv.remove_value(key).await?;
            debug!("Lease '{}' released by {}", key, holder);
            Ok(true)
        }
    }
}
