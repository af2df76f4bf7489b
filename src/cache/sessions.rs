use redis::{aio::ConnectionManager, AsyncCommands, FromRedisValue, ToRedisArgs};
use redis_macros::{FromRedisValue, ToRedisArgs};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::{
    database::{error::CacheError, schema::Id},
    error::Error,
    jwt::JwtSessionData,
};

// Caching - keys

#[derive(Clone, Debug)]
pub struct CacheKey<T: ToString> {
    _value: T,
    _type: CacheKeyType,
}

impl<T: ToString> CacheKey<T> {
    pub fn from(r#type: CacheKeyType, key: T) -> Self {
        Self {
            _value: key,
            _type: r#type,
        }
    }
}

impl<T: ToString> From<&CacheKey<T>> for String {
    fn from(key: &CacheKey<T>) -> String {
        match key._type {
            CacheKeyType::Session => format!("token-{}", key._value.to_string()),
        }
    }
}

#[derive(Clone, Debug)]
pub enum CacheKeyType {
    Session,
}

impl CacheKeyType {
    pub fn new<T: ToString>(self, key: T) -> CacheKey<T> {
        CacheKey::from(self, key)
    }
}

// Sessions

/// What the server remembers about an issued token.
#[derive(Serialize, Deserialize, FromRedisValue, ToRedisArgs, Clone, Debug, PartialEq)]
pub struct SessionRecord {
    pub user_id: Id,
    pub username: String,
}

impl From<&JwtSessionData> for SessionRecord {
    fn from(session: &JwtSessionData) -> Self {
        Self {
            user_id: session.user_id,
            username: session.username.to_owned(),
        }
    }
}

/// Registry of issued tokens. A token stays valid only while its id is
/// registered here, so logging out revokes it before it expires.
///
/// The manager is created on first use and reconnects by itself when the
/// cache goes away; a failed first attempt is retried on the next request.
pub struct SessionStore {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
}

impl SessionStore {
    /// Does not connect; the connection is opened on first use.
    pub fn open(url: &str) -> Result<Self, Error> {
        let client = redis::Client::open(url).map_err(CacheError::from)?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, Error> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                log::info!("Connecting to session cache");
                self.client
                    .get_connection_manager_with_backoff(2, 100, 1)
                    .await
                    .map_err(CacheError::from)
            })
            .await?;

        Ok(connection.clone())
    }

    pub async fn register(&self, session: &JwtSessionData) -> Result<(), Error> {
        let mut cache = self.connection().await?;
        let key = CacheKeyType::Session.new(&session.jti);

        set_cache_value(
            String::from(&key),
            SessionRecord::from(session),
            session.remaining_seconds().max(1),
            &mut cache,
        )
        .await?;

        log::trace!("> Registered session for {}", session.username);
        Ok(())
    }

    pub async fn find(&self, jti: &str) -> Result<Option<SessionRecord>, Error> {
        let mut cache = self.connection().await?;
        let key = CacheKeyType::Session.new(jti);

        get_cache_value::<String, SessionRecord>(String::from(&key), &mut cache).await
    }

    pub async fn revoke(&self, jti: &str) -> Result<(), Error> {
        let mut cache = self.connection().await?;
        let key = CacheKeyType::Session.new(jti);

        delete_cache_value(String::from(&key), &mut cache).await?;

        log::trace!("> Revoked session {jti}");
        Ok(())
    }
}

// Cache - raw handlers

pub async fn set_cache_value<K: ToRedisArgs + Send + Sync, V: ToRedisArgs + Send + Sync>(
    key: K,
    value: V,
    seconds: u64,
    cache: &mut ConnectionManager,
) -> Result<(), Error> {
    let _: () = cache
        .set_ex(key, value, seconds)
        .await
        .map_err(CacheError::from)?;

    Ok(())
}

pub async fn delete_cache_value<K: ToRedisArgs + Send + Sync>(
    key: K,
    cache: &mut ConnectionManager,
) -> Result<(), Error> {
    let _: () = cache.del(key).await.map_err(CacheError::from)?;

    Ok(())
}

pub async fn get_cache_value<K: ToRedisArgs + Send + Sync, V: FromRedisValue>(
    key: K,
    cache: &mut ConnectionManager,
) -> Result<Option<V>, Error> {
    let value: Option<V> = cache.get(key).await.map_err(CacheError::from)?;

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_keys_are_prefixed() {
        let key = CacheKeyType::Session.new("abc");
        assert_eq!(String::from(&key), "token-abc");
    }

    #[test]
    fn opening_does_not_connect() {
        assert!(SessionStore::open("redis://127.0.0.1:1/").is_ok());
        assert!(SessionStore::open("not a url").is_err());
    }

    #[tokio::test]
    async fn unreachable_cache_fails_each_request_without_sticking() {
        let store = SessionStore::open("redis://127.0.0.1:1/").unwrap();

        assert_eq!(store.find("abc").await.unwrap_err().code, 500);
        assert!(store.connection.get().is_none());
        assert_eq!(store.revoke("abc").await.unwrap_err().code, 500);
    }
}
