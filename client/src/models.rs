//! Typed models for the seven deck entities.

use crate::model::{
    opt_string, opt_uuid, req_datetime, req_string, req_uuid, Model, Role, ServerType,
    TimelineType,
};
use chrono::{DateTime, Utc};
use deckdb_core::{Record, StoreResult};
use uuid::Uuid;

/// A local account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for User {
    const ENTITY: &'static str = "User";

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: req_uuid(record, Self::ENTITY, "id")?,
            email: req_string(record, Self::ENTITY, "email")?,
            name: opt_string(record, "name"),
            password_hash: req_string(record, Self::ENTITY, "password_hash")?,
            role: Role::parse(&req_string(record, Self::ENTITY, "role")?)?,
            created_at: req_datetime(record, Self::ENTITY, "created_at")?,
            updated_at: req_datetime(record, Self::ENTITY, "updated_at")?,
        })
    }
}

/// One key/value preference of a user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserSetting {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for UserSetting {
    const ENTITY: &'static str = "UserSetting";

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: req_uuid(record, Self::ENTITY, "id")?,
            user_id: req_uuid(record, Self::ENTITY, "user_id")?,
            key: req_string(record, Self::ENTITY, "key")?,
            value: req_string(record, Self::ENTITY, "value")?,
            created_at: req_datetime(record, Self::ENTITY, "created_at")?,
            updated_at: req_datetime(record, Self::ENTITY, "updated_at")?,
        })
    }
}

/// An authenticated session against one remote server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSession {
    pub id: Uuid,
    pub origin: String,
    pub server_token: String,
    pub server_type: ServerType,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for ServerSession {
    const ENTITY: &'static str = "ServerSession";

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: req_uuid(record, Self::ENTITY, "id")?,
            origin: req_string(record, Self::ENTITY, "origin")?,
            server_token: req_string(record, Self::ENTITY, "server_token")?,
            server_type: ServerType::parse(&req_string(record, Self::ENTITY, "server_type")?)?,
            user_id: req_uuid(record, Self::ENTITY, "user_id")?,
            created_at: req_datetime(record, Self::ENTITY, "created_at")?,
            updated_at: req_datetime(record, Self::ENTITY, "updated_at")?,
        })
    }
}

/// Cached metadata of a remote server.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerInfo {
    pub id: Uuid,
    pub server_session_id: Uuid,
    pub name: Option<String>,
    pub icon_url: Option<String>,
    pub favicon_url: Option<String>,
    pub theme_color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for ServerInfo {
    const ENTITY: &'static str = "ServerInfo";

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: req_uuid(record, Self::ENTITY, "id")?,
            server_session_id: req_uuid(record, Self::ENTITY, "server_session_id")?,
            name: opt_string(record, "name"),
            icon_url: opt_string(record, "icon_url"),
            favicon_url: opt_string(record, "favicon_url"),
            theme_color: opt_string(record, "theme_color"),
            created_at: req_datetime(record, Self::ENTITY, "created_at")?,
            updated_at: req_datetime(record, Self::ENTITY, "updated_at")?,
        })
    }
}

/// Cached remote profile of a session, optionally linked to a local user.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub id: Uuid,
    pub server_session_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: Option<String>,
    pub username: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for UserInfo {
    const ENTITY: &'static str = "UserInfo";

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: req_uuid(record, Self::ENTITY, "id")?,
            server_session_id: req_uuid(record, Self::ENTITY, "server_session_id")?,
            user_id: opt_uuid(record, "user_id"),
            name: opt_string(record, "name"),
            username: req_string(record, Self::ENTITY, "username")?,
            avatar_url: opt_string(record, "avatar_url"),
            created_at: req_datetime(record, Self::ENTITY, "created_at")?,
            updated_at: req_datetime(record, Self::ENTITY, "updated_at")?,
        })
    }
}

/// One dashboard panel of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub id: Uuid,
    pub server_session_id: Uuid,
    pub panel_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for Panel {
    const ENTITY: &'static str = "Panel";

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: req_uuid(record, Self::ENTITY, "id")?,
            server_session_id: req_uuid(record, Self::ENTITY, "server_session_id")?,
            panel_type: req_string(record, Self::ENTITY, "panel_type")?,
            created_at: req_datetime(record, Self::ENTITY, "created_at")?,
            updated_at: req_datetime(record, Self::ENTITY, "updated_at")?,
        })
    }
}

/// One timeline of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    pub id: Uuid,
    pub server_session_id: Uuid,
    pub timeline_type: TimelineType,
    pub list_id: Option<String>,
    pub channel_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model for Timeline {
    const ENTITY: &'static str = "Timeline";

    fn from_record(record: &Record) -> StoreResult<Self> {
        Ok(Self {
            id: req_uuid(record, Self::ENTITY, "id")?,
            server_session_id: req_uuid(record, Self::ENTITY, "server_session_id")?,
            timeline_type: TimelineType::parse(&req_string(
                record,
                Self::ENTITY,
                "timeline_type",
            )?)?,
            list_id: opt_string(record, "list_id"),
            channel_id: opt_string(record, "channel_id"),
            created_at: req_datetime(record, Self::ENTITY, "created_at")?,
            updated_at: req_datetime(record, Self::ENTITY, "updated_at")?,
        })
    }
}
