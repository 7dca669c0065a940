use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use aerohold_core::{ExclusionLock, LockCompensation, StoreError, StoreResult};
use aerohold_shared::{Ticket, TicketId, TravelerId};

use crate::redis_repo::RedisClient;

// The traveler key holds a JSON ticket snapshot; identity is its "id" field.
const UNLOCK_TRAVELER_SCRIPT: &str = r#"
    local v = redis.call("GET", KEYS[1])
    if not v then
        return 0
    end
    local ok, snapshot = pcall(cjson.decode, v)
    if ok and tostring(snapshot["id"]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    end
    return 0
"#;

const UNLOCK_TICKET_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
    end
    return 0
"#;

// KEYS: traveler key, ticket key
// ARGV: ticket id, traveler id, new expiry (epoch ms)
// Returns the previous PTTL of each extended key, -1 where nothing was extended.
const EXTEND_SCRIPT: &str = r#"
    local result = {-1, -1}

    local claimant = redis.call("GET", KEYS[1])
    if claimant then
        local ok, snapshot = pcall(cjson.decode, claimant)
        local ttl = redis.call("PTTL", KEYS[1])
        if ok and tostring(snapshot["id"]) == ARGV[1] and ttl > 0 then
            redis.call("PEXPIREAT", KEYS[1], ARGV[3])
            result[1] = ttl
        end
    end

    local holder = redis.call("GET", KEYS[2])
    if holder == ARGV[2] then
        local ttl = redis.call("PTTL", KEYS[2])
        if ttl > 0 then
            redis.call("PEXPIREAT", KEYS[2], ARGV[3])
            result[2] = ttl
        end
    end

    return result
"#;

const RESTORE_TRAVELER_SCRIPT: &str = r#"
    local v = redis.call("GET", KEYS[1])
    if not v then
        return 0
    end
    local ok, snapshot = pcall(cjson.decode, v)
    if ok and tostring(snapshot["id"]) == ARGV[1] then
        return redis.call("PEXPIREAT", KEYS[1], ARGV[2])
    end
    return 0
"#;

const RESTORE_TICKET_SCRIPT: &str = r#"
    if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("PEXPIREAT", KEYS[1], ARGV[2])
    end
    return 0
"#;

/// Distributed two-key lock. Acquisition is `SET NX PXAT`, every
/// check-then-act step runs as a Lua script.
#[derive(Clone)]
pub struct RedisLock {
    redis: RedisClient,
    prefix: String,
    unlock_traveler: redis::Script,
    unlock_ticket: redis::Script,
    extend: redis::Script,
    restore_traveler: redis::Script,
    restore_ticket: redis::Script,
}

impl RedisLock {
    pub fn new(redis: RedisClient) -> Self {
        Self {
            redis,
            prefix: "lock:".to_string(),
            unlock_traveler: redis::Script::new(UNLOCK_TRAVELER_SCRIPT),
            unlock_ticket: redis::Script::new(UNLOCK_TICKET_SCRIPT),
            extend: redis::Script::new(EXTEND_SCRIPT),
            restore_traveler: redis::Script::new(RESTORE_TRAVELER_SCRIPT),
            restore_ticket: redis::Script::new(RESTORE_TICKET_SCRIPT),
        }
    }

    fn traveler_key(&self, id: TravelerId) -> String {
        format!("{}traveler:{}", self.prefix, id)
    }

    fn ticket_key(&self, id: TicketId) -> String {
        format!("{}ticket:{}", self.prefix, id)
    }

    async fn set_if_absent(&self, key: &str, value: &str, expires_at: DateTime<Utc>) -> StoreResult<bool> {
        let mut conn = self.redis.connection();

        // SET NX: Only set if key does not exist
        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PXAT")
            .arg(expires_at.timestamp_millis())
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        Ok(result.is_some())
    }
}

/// Turns a remaining PTTL reported by the extend script into the absolute
/// expiry it stood for.
fn previous_expiry(now: DateTime<Utc>, pttl: i64) -> Option<DateTime<Utc>> {
    (pttl > 0).then(|| now + Duration::milliseconds(pttl))
}

#[async_trait]
impl ExclusionLock for RedisLock {
    async fn lock_traveler(
        &self,
        traveler_id: TravelerId,
        ticket: &Ticket,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let snapshot = serde_json::to_string(ticket)?;
        let key = self.traveler_key(traveler_id);
        let locked = self.set_if_absent(&key, &snapshot, expires_at).await?;
        debug!("lock {} ticket {}: {}", key, ticket.id, locked);
        Ok(locked)
    }

    async fn lock_ticket(
        &self,
        traveler_id: TravelerId,
        ticket_id: TicketId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let key = self.ticket_key(ticket_id);
        let locked = self.set_if_absent(&key, &traveler_id.to_string(), expires_at).await?;
        debug!("lock {} traveler {}: {}", key, traveler_id, locked);
        Ok(locked)
    }

    async fn unlock_traveler(&self, traveler_id: TravelerId, ticket_id: TicketId) -> StoreResult<()> {
        let mut conn = self.redis.connection();
        let key = self.traveler_key(traveler_id);

        let removed: i64 = self
            .unlock_traveler
            .key(&key)
            .arg(ticket_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        debug!("unlock {} ticket {}: {}", key, ticket_id, removed == 1);
        Ok(())
    }

    async fn unlock_ticket(&self, traveler_id: TravelerId, ticket_id: TicketId) -> StoreResult<()> {
        let mut conn = self.redis.connection();
        let key = self.ticket_key(ticket_id);

        let removed: i64 = self
            .unlock_ticket
            .key(&key)
            .arg(traveler_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        debug!("unlock {} traveler {}: {}", key, traveler_id, removed == 1);
        Ok(())
    }

    async fn get_traveler_locked_ticket(&self, traveler_id: TravelerId) -> StoreResult<Option<Ticket>> {
        let mut conn = self.redis.connection();
        let key = self.traveler_key(traveler_id);

        let raw: Option<String> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        match raw {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    async fn extend_lock_time(
        &self,
        traveler_id: TravelerId,
        ticket_id: TicketId,
        expires_at: DateTime<Utc>,
    ) -> StoreResult<Vec<LockCompensation>> {
        let mut conn = self.redis.connection();
        let now = Utc::now();

        let previous: Vec<i64> = self
            .extend
            .key(self.traveler_key(traveler_id))
            .key(self.ticket_key(ticket_id))
            .arg(ticket_id.to_string())
            .arg(traveler_id.to_string())
            .arg(expires_at.timestamp_millis())
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        let claimant_ttl = previous.first().copied().unwrap_or(-1);
        let unit_ttl = previous.get(1).copied().unwrap_or(-1);

        let mut compensations = Vec::with_capacity(2);
        if let Some(at) = previous_expiry(now, claimant_ttl) {
            compensations.push(LockCompensation::RestoreClaimantExpiry {
                traveler_id,
                ticket_id,
                expires_at: at,
            });
        }
        if let Some(at) = previous_expiry(now, unit_ttl) {
            compensations.push(LockCompensation::RestoreUnitExpiry {
                traveler_id,
                ticket_id,
                expires_at: at,
            });
        }

        info!(
            "Extended locks of traveler {} ticket {} to {}: {} key(s)",
            traveler_id,
            ticket_id,
            expires_at.to_rfc3339(),
            compensations.len()
        );
        Ok(compensations)
    }

    async fn compensate(&self, compensation: &LockCompensation) -> StoreResult<()> {
        let mut conn = self.redis.connection();

        let restored: i64 = match compensation {
            LockCompensation::RestoreClaimantExpiry { traveler_id, ticket_id, expires_at } => {
                self.restore_traveler
                    .key(self.traveler_key(*traveler_id))
                    .arg(ticket_id.to_string())
                    .arg(expires_at.timestamp_millis())
                    .invoke_async(&mut conn)
                    .await
            }
            LockCompensation::RestoreUnitExpiry { traveler_id, ticket_id, expires_at } => {
                self.restore_ticket
                    .key(self.ticket_key(*ticket_id))
                    .arg(traveler_id.to_string())
                    .arg(expires_at.timestamp_millis())
                    .invoke_async(&mut conn)
                    .await
            }
        }
        .map_err(StoreError::backend)?;

        debug!("{}: {}", compensation, restored == 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_previous_expiry() {
        let now = Utc::now();
        assert_eq!(previous_expiry(now, 1500), Some(now + Duration::milliseconds(1500)));
        assert_eq!(previous_expiry(now, 0), None);
        assert_eq!(previous_expiry(now, -1), None);
        // -2: key does not exist
        assert_eq!(previous_expiry(now, -2), None);
    }
}
