use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use redis::AsyncCommands;
use warden_application::ThrottleRepository;
use warden_domain::{Principal, UserId};

use super::{RedisThrottleRepository, parse_member, record_from_raw};

fn test_repository() -> Option<(RedisThrottleRepository, redis::Client)> {
    let Ok(redis_url) = std::env::var("REDIS_URL") else {
        return None;
    };

    let client = match redis::Client::open(redis_url.as_str()) {
        Ok(client) => client,
        Err(error) => panic!("failed to open REDIS_URL in test: {error}"),
    };
    let key_prefix = format!("warden-test:{}", uuid::Uuid::new_v4());

    Some((
        RedisThrottleRepository::new(client.clone(), key_prefix),
        client,
    ))
}

async fn restricted_index_size(repository: &RedisThrottleRepository, client: &redis::Client) -> i64 {
    let mut connection = match client.get_multiplexed_async_connection().await {
        Ok(connection) => connection,
        Err(error) => panic!("failed to connect to redis in test: {error}"),
    };

    let size: redis::RedisResult<i64> = connection.zcard(repository.index_key()).await;
    match size {
        Ok(size) => size,
        Err(error) => panic!("failed to read restricted index: {error}"),
    }
}

#[test]
fn missing_hash_decodes_to_zero_record() {
    let principal = Principal::User(UserId::new());
    let record = record_from_raw(principal, (None, None, None, None, None, None));
    assert!(matches!(
        record,
        Ok(record) if record.attempt_count == 0
            && record.last_attempt_at.is_none()
            && !record.is_restricted()
    ));
}

#[test]
fn stored_fields_decode_into_record() {
    let principal = Principal::User(UserId::new());
    let record = record_from_raw(
        principal,
        (
            Some(4),
            Some(1_700_000_000_000),
            Some(1),
            Some(1_700_000_100_000),
            Some(0),
            None,
        ),
    );
    assert!(matches!(
        record,
        Ok(record) if record.attempt_count == 4
            && record.suspended
            && record.suspended_at.is_some()
            && !record.banned
    ));
}

#[test]
fn negative_counts_are_rejected() {
    let principal = Principal::User(UserId::new());
    let record = record_from_raw(principal, (Some(-1), None, None, None, None, None));
    assert!(record.is_err());
}

#[test]
fn index_members_keep_ipv6_colons() {
    let principal = Principal::ip(IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)));
    let parsed = parse_member(&principal.to_string());
    assert!(matches!(parsed, Ok(value) if value == principal));
    assert!(parse_member("garbage").is_err());
}

#[tokio::test]
async fn concurrent_failures_are_not_lost() {
    let Some((repository, _)) = test_repository() else {
        return;
    };

    let repository = Arc::new(repository);
    let principal = Principal::User(UserId::new());

    let mut handles = Vec::new();
    for _ in 0..20 {
        let repository = repository.clone();
        handles.push(tokio::spawn(async move {
            repository.record_failure(&principal).await
        }));
    }
    for handle in handles {
        assert!(matches!(handle.await, Ok(Ok(_))));
    }

    let record = repository.get(&principal).await;
    assert!(matches!(record, Ok(record) if record.attempt_count == 20 && record.last_attempt_at.is_some()));

    assert!(repository.record_success(&principal).await.is_ok());
    let record = repository.get(&principal).await;
    assert!(matches!(record, Ok(record) if record.attempt_count == 0));
}

#[tokio::test]
async fn suspension_and_ban_keep_first_transition_time() {
    let Some((repository, _)) = test_repository() else {
        return;
    };

    let principal = Principal::User(UserId::new());

    assert!(repository.suspend(&principal).await.is_ok());
    let first = repository.get(&principal).await.ok().and_then(|record| record.suspended_at);
    assert!(first.is_some());

    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert!(repository.suspend(&principal).await.is_ok());
    let second = repository.get(&principal).await.ok().and_then(|record| record.suspended_at);
    assert_eq!(first, second);

    assert!(repository.ban(&principal).await.is_ok());
    let first_ban = repository.get(&principal).await.ok().and_then(|record| record.banned_at);
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert!(repository.ban(&principal).await.is_ok());
    let record = repository.get(&principal).await;
    assert!(matches!(
        record,
        Ok(record) if record.suspended
            && record.banned
            && record.banned_at.is_some()
            && record.banned_at == first_ban
            && record.attempt_count == 0
    ));
}

#[tokio::test]
async fn restricted_index_follows_suspension_and_ban() {
    let Some((repository, client)) = test_repository() else {
        return;
    };

    let principal = Principal::ip(IpAddr::V4(Ipv4Addr::new(198, 18, 0, 7)));

    assert!(repository.suspend(&principal).await.is_ok());
    assert!(repository.ban(&principal).await.is_ok());
    assert_eq!(restricted_index_size(&repository, &client).await, 1);

    let listed = repository.list_restricted(10).await.unwrap_or_default();
    assert!(listed.iter().any(|record| record.principal == principal && record.banned));

    assert!(repository.unsuspend(&principal).await.is_ok());
    assert_eq!(restricted_index_size(&repository, &client).await, 1);

    assert!(repository.unban(&principal).await.is_ok());
    assert_eq!(restricted_index_size(&repository, &client).await, 0);

    let record = repository.get(&principal).await;
    assert!(matches!(
        record,
        Ok(record) if !record.is_restricted()
            && record.suspended_at.is_none()
            && record.banned_at.is_none()
    ));
    assert!(repository.list_restricted(10).await.unwrap_or_default().is_empty());
    assert!(repository.ping().await.is_ok());
}

#[tokio::test]
async fn clearing_an_absent_principal_creates_nothing() {
    let Some((repository, client)) = test_repository() else {
        return;
    };

    let principal = Principal::User(UserId::new());

    assert!(repository.unban(&principal).await.is_ok());
    assert!(repository.record_success(&principal).await.is_ok());
    assert_eq!(restricted_index_size(&repository, &client).await, 0);

    let mut connection = match client.get_multiplexed_async_connection().await {
        Ok(connection) => connection,
        Err(error) => panic!("failed to connect to redis in test: {error}"),
    };
    let exists: redis::RedisResult<bool> = connection.exists(repository.key_for(&principal)).await;
    assert!(matches!(exists, Ok(false)));
}
