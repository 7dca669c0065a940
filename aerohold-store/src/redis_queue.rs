use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use aerohold_core::{InventoryQueue, StoreError, StoreResult};
use aerohold_shared::{FlightId, TicketId};

use crate::redis_repo::RedisClient;

// Select-and-remove in one step so concurrent pollers never share a member.
const POP_SCRIPT: &str = r#"
    local due = redis.call("ZRANGEBYSCORE", KEYS[1], "-inf", ARGV[1], "LIMIT", 0, 1)
    if #due == 0 then
        return false
    end
    redis.call("ZREM", KEYS[1], due[1])
    return due[1]
"#;

/// Delay queue backed by one sorted set per flight; the score is the
/// epoch millisecond at which the ticket becomes available.
#[derive(Clone)]
pub struct RedisQueue {
    redis: RedisClient,
    prefix: String,
    pop_script: redis::Script,
}

impl RedisQueue {
    pub fn new(redis: RedisClient, name: &str) -> Self {
        Self {
            redis,
            prefix: format!("queue:{}:", name),
            pop_script: redis::Script::new(POP_SCRIPT),
        }
    }

    fn queue_key(&self, flight_id: FlightId) -> String {
        format!("{}{}", self.prefix, flight_id)
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn available_at(delay_seconds: u64) -> i64 {
    now_ms() + (delay_seconds as i64) * 1000
}

fn parse_member(raw: String) -> StoreResult<TicketId> {
    raw.parse::<TicketId>().map_err(|_| StoreError::InvalidMember(raw))
}

#[async_trait]
impl InventoryQueue for RedisQueue {
    async fn pop(&self, flight_id: FlightId) -> StoreResult<Option<TicketId>> {
        let mut conn = self.redis.connection();
        let key = self.queue_key(flight_id);

        let member: Option<String> = self
            .pop_script
            .key(&key)
            .arg(now_ms())
            .invoke_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        match member {
            Some(raw) => {
                debug!("pop {} value: {}", key, raw);
                parse_member(raw).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn push(&self, flight_id: FlightId, ticket_id: TicketId, delay_seconds: u64) -> StoreResult<()> {
        let mut conn = self.redis.connection();
        let key = self.queue_key(flight_id);
        let score = available_at(delay_seconds);

        let _: i64 = redis::cmd("ZADD")
            .arg(&key)
            .arg(score)
            .arg(ticket_id)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        debug!("push {} value: {} score: {}", key, ticket_id, score);
        Ok(())
    }

    async fn push_list(
        &self,
        flight_id: FlightId,
        ticket_ids: &[TicketId],
        delay_seconds: u64,
    ) -> StoreResult<()> {
        if ticket_ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.redis.connection();
        let key = self.queue_key(flight_id);
        let score = available_at(delay_seconds);

        let mut cmd = redis::cmd("ZADD");
        cmd.arg(&key).arg("NX");
        for ticket_id in ticket_ids {
            cmd.arg(score).arg(*ticket_id);
        }

        let added: i64 = cmd.query_async(&mut conn).await.map_err(StoreError::backend)?;
        info!("Seeded {}: {} of {} tickets added", key, added, ticket_ids.len());
        Ok(())
    }

    async fn fix(&self, flight_id: FlightId, ticket_id: TicketId) -> StoreResult<()> {
        let mut conn = self.redis.connection();
        let key = self.queue_key(flight_id);

        let _: i64 = redis::cmd("ZREM")
            .arg(&key)
            .arg(ticket_id)
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        debug!("fix {} value: {}", key, ticket_id);
        Ok(())
    }

    async fn count(&self, flight_id: FlightId) -> StoreResult<u32> {
        let mut conn = self.redis.connection();
        let key = self.queue_key(flight_id);

        let held: i64 = redis::cmd("ZCOUNT")
            .arg(&key)
            .arg(format!("({}", now_ms()))
            .arg("+inf")
            .query_async(&mut conn)
            .await
            .map_err(StoreError::backend)?;

        Ok(u32::try_from(held).unwrap_or(u32::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_member() {
        assert_eq!(parse_member("42".to_string()).unwrap(), 42);
        assert!(matches!(
            parse_member("fakeId".to_string()),
            Err(StoreError::InvalidMember(m)) if m == "fakeId"
        ));
    }

    #[test]
    fn test_available_at_is_in_future() {
        let before = now_ms();
        let at = available_at(180);
        assert!(at >= before + 180_000);
        assert!(available_at(0) >= before);
    }
}
