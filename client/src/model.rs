//! The typed-model contract and schema enums.

use chrono::{DateTime, Utc};
use deckdb_core::{Record, StoreError, StoreResult, Value};
use uuid::Uuid;

/// A typed view over one entity's rows.
pub trait Model: Sized {
    /// The entity this model materializes.
    const ENTITY: &'static str;

    /// Build the model from a full stored row. Projected rows (select/omit)
    /// stay untyped; this is only for unprojected records.
    fn from_record(record: &Record) -> StoreResult<Self>;
}

/// Local account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::User => "USER",
        }
    }

    pub fn parse(s: &str) -> StoreResult<Self> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "USER" => Ok(Role::User),
            other => Err(StoreError::validation(format!("unknown role: {}", other))),
        }
    }
}

impl From<Role> for Value {
    fn from(role: Role) -> Self {
        Value::from(role.as_str())
    }
}

/// Kind of remote server a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerType {
    Misskey,
    OtherServer,
}

impl ServerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerType::Misskey => "Misskey",
            ServerType::OtherServer => "OtherServer",
        }
    }

    pub fn parse(s: &str) -> StoreResult<Self> {
        match s {
            "Misskey" => Ok(ServerType::Misskey),
            "OtherServer" => Ok(ServerType::OtherServer),
            other => Err(StoreError::validation(format!(
                "unknown server type: {}",
                other
            ))),
        }
    }
}

impl From<ServerType> for Value {
    fn from(kind: ServerType) -> Self {
        Value::from(kind.as_str())
    }
}

/// What a timeline shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimelineType {
    Home,
    Local,
    Global,
    List,
    User,
    Channel,
}

impl TimelineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimelineType::Home => "HOME",
            TimelineType::Local => "LOCAL",
            TimelineType::Global => "GLOBAL",
            TimelineType::List => "LIST",
            TimelineType::User => "USER",
            TimelineType::Channel => "CHANNEL",
        }
    }

    pub fn parse(s: &str) -> StoreResult<Self> {
        match s {
            "HOME" => Ok(TimelineType::Home),
            "LOCAL" => Ok(TimelineType::Local),
            "GLOBAL" => Ok(TimelineType::Global),
            "LIST" => Ok(TimelineType::List),
            "USER" => Ok(TimelineType::User),
            "CHANNEL" => Ok(TimelineType::Channel),
            other => Err(StoreError::validation(format!(
                "unknown timeline type: {}",
                other
            ))),
        }
    }
}

impl From<TimelineType> for Value {
    fn from(kind: TimelineType) -> Self {
        Value::from(kind.as_str())
    }
}

// Field extraction helpers shared by the model impls.

pub(crate) fn req_uuid(record: &Record, entity: &str, name: &str) -> StoreResult<Uuid> {
    record
        .get_or_null(name)
        .as_uuid()
        .ok_or_else(|| missing(entity, name))
}

pub(crate) fn opt_uuid(record: &Record, name: &str) -> Option<Uuid> {
    record.get_or_null(name).as_uuid()
}

pub(crate) fn req_string(record: &Record, entity: &str, name: &str) -> StoreResult<String> {
    record
        .get_or_null(name)
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| missing(entity, name))
}

pub(crate) fn opt_string(record: &Record, name: &str) -> Option<String> {
    record.get_or_null(name).as_str().map(str::to_string)
}

pub(crate) fn req_datetime(
    record: &Record,
    entity: &str,
    name: &str,
) -> StoreResult<DateTime<Utc>> {
    record
        .get_or_null(name)
        .as_datetime()
        .ok_or_else(|| missing(entity, name))
}

fn missing(entity: &str, name: &str) -> StoreError {
    StoreError::validation(format!("{} row is missing field {}", entity, name))
}
