//! The fixed schema of the social-deck application.
//!
//! Seven entities: User, UserSetting, ServerSession, ServerInfo, UserInfo,
//! Panel, Timeline. A user owns sessions against remote servers; each
//! session owns its dashboard panels, timelines, cached server metadata
//! and its own remote profile.
//!
//! Delete policy: everything a ServerSession owns (timelines, panels,
//! server info, own profile) cascades with it. Deleting a User is
//! restricted while sessions or settings exist; cached remote profiles
//! pointing at a User (`UserInfo.user_id`) are set to null instead,
//! since they must never block account removal.

use crate::{
    FieldDef, FieldDefault, FieldKind, OnDeleteAction, RelationDef, RelationKind, SchemaBuilder,
    SchemaRegistry, SchemaResult,
};

/// User role values.
pub const ROLE_VALUES: [&str; 2] = ["ADMIN", "USER"];

/// Remote server type values.
pub const SERVER_TYPE_VALUES: [&str; 2] = ["Misskey", "OtherServer"];

/// Timeline type values.
pub const TIMELINE_TYPE_VALUES: [&str; 6] = ["HOME", "LOCAL", "GLOBAL", "LIST", "USER", "CHANNEL"];

fn enum_kind(values: &[&str]) -> FieldKind {
    FieldKind::Enum(values.iter().map(|v| v.to_string()).collect())
}

fn id_field() -> FieldDef {
    FieldDef::new("id", FieldKind::Uuid)
        .unique()
        .with_default(FieldDefault::UuidV4)
}

fn timestamp_fields() -> [FieldDef; 2] {
    [
        FieldDef::new("created_at", FieldKind::DateTime).with_default(FieldDefault::Now),
        FieldDef::new("updated_at", FieldKind::DateTime).with_default(FieldDefault::Now),
    ]
}

/// Build the registry for the deck schema.
pub fn deck_schema() -> SchemaResult<SchemaRegistry> {
    let mut builder = SchemaBuilder::new();

    let [created_at, updated_at] = timestamp_fields();
    builder
        .entity("User")
        .field(id_field())
        .field(FieldDef::new("email", FieldKind::String).unique().with_format("email"))
        .field(FieldDef::new("name", FieldKind::String).nullable())
        .field(FieldDef::new("password_hash", FieldKind::String))
        .field(FieldDef::new("role", enum_kind(&ROLE_VALUES)))
        .field(created_at)
        .field(updated_at)
        .relation(RelationDef::new(
            "sessions",
            "ServerSession",
            RelationKind::HasMany,
            "user_id",
        ))
        .relation(RelationDef::new(
            "settings",
            "UserSetting",
            RelationKind::HasMany,
            "user_id",
        ))
        // Cached remote profiles referencing this local account.
        .relation(
            RelationDef::new("profiles", "UserInfo", RelationKind::HasMany, "user_id")
                .on_delete(OnDeleteAction::SetNull),
        )
        .done()?;

    let [created_at, updated_at] = timestamp_fields();
    builder
        .entity("UserSetting")
        .field(id_field())
        .field(FieldDef::new("user_id", FieldKind::Uuid))
        .field(FieldDef::new("key", FieldKind::String))
        .field(FieldDef::new("value", FieldKind::String))
        .field(created_at)
        .field(updated_at)
        .relation(RelationDef::new(
            "user",
            "User",
            RelationKind::BelongsTo,
            "user_id",
        ))
        .done()?;

    let [created_at, updated_at] = timestamp_fields();
    builder
        .entity("ServerSession")
        .field(id_field())
        .field(FieldDef::new("origin", FieldKind::String).with_format("url"))
        .field(FieldDef::new("server_token", FieldKind::String))
        .field(FieldDef::new("server_type", enum_kind(&SERVER_TYPE_VALUES)))
        .field(FieldDef::new("user_id", FieldKind::Uuid))
        .field(created_at)
        .field(updated_at)
        // A user may have at most one session per origin.
        .unique(&["origin", "user_id"])
        .relation(RelationDef::new(
            "user",
            "User",
            RelationKind::BelongsTo,
            "user_id",
        ))
        .relation(
            RelationDef::new("timelines", "Timeline", RelationKind::HasMany, "server_session_id")
                .on_delete(OnDeleteAction::Cascade),
        )
        .relation(
            RelationDef::new("panels", "Panel", RelationKind::HasMany, "server_session_id")
                .on_delete(OnDeleteAction::Cascade),
        )
        .relation(
            RelationDef::new("server_info", "ServerInfo", RelationKind::HasOne, "server_session_id")
                .on_delete(OnDeleteAction::Cascade),
        )
        // The session owner's own remote profile (distinct from UserInfo.user).
        .relation(
            RelationDef::new("profile", "UserInfo", RelationKind::HasOne, "server_session_id")
                .on_delete(OnDeleteAction::Cascade),
        )
        .done()?;

    let [created_at, updated_at] = timestamp_fields();
    builder
        .entity("ServerInfo")
        .field(id_field())
        .field(FieldDef::new("server_session_id", FieldKind::Uuid).unique())
        .field(FieldDef::new("name", FieldKind::String).nullable())
        .field(FieldDef::new("icon_url", FieldKind::String).nullable())
        .field(FieldDef::new("favicon_url", FieldKind::String).nullable())
        .field(FieldDef::new("theme_color", FieldKind::String).nullable())
        .field(created_at)
        .field(updated_at)
        .relation(RelationDef::new(
            "server_session",
            "ServerSession",
            RelationKind::BelongsTo,
            "server_session_id",
        ))
        .done()?;

    let [created_at, updated_at] = timestamp_fields();
    builder
        .entity("UserInfo")
        .field(id_field())
        .field(FieldDef::new("server_session_id", FieldKind::Uuid).unique())
        .field(FieldDef::new("user_id", FieldKind::Uuid).nullable())
        .field(FieldDef::new("name", FieldKind::String).nullable())
        .field(FieldDef::new("username", FieldKind::String))
        .field(FieldDef::new("avatar_url", FieldKind::String).nullable())
        .field(created_at)
        .field(updated_at)
        .relation(RelationDef::new(
            "server_session",
            "ServerSession",
            RelationKind::BelongsTo,
            "server_session_id",
        ))
        .relation(RelationDef::new(
            "user",
            "User",
            RelationKind::BelongsTo,
            "user_id",
        ))
        .done()?;

    let [created_at, updated_at] = timestamp_fields();
    builder
        .entity("Panel")
        .field(id_field())
        .field(FieldDef::new("server_session_id", FieldKind::Uuid))
        .field(FieldDef::new("panel_type", FieldKind::String))
        .field(created_at)
        .field(updated_at)
        .relation(RelationDef::new(
            "server_session",
            "ServerSession",
            RelationKind::BelongsTo,
            "server_session_id",
        ))
        .done()?;

    let [created_at, updated_at] = timestamp_fields();
    builder
        .entity("Timeline")
        .field(id_field())
        .field(FieldDef::new("server_session_id", FieldKind::Uuid))
        .field(FieldDef::new("timeline_type", enum_kind(&TIMELINE_TYPE_VALUES)))
        // Meaningful only when timeline_type = LIST / CHANNEL respectively.
        .field(FieldDef::new("list_id", FieldKind::String).nullable())
        .field(FieldDef::new("channel_id", FieldKind::String).nullable())
        .field(created_at)
        .field(updated_at)
        .relation(RelationDef::new(
            "server_session",
            "ServerSession",
            RelationKind::BelongsTo,
            "server_session_id",
        ))
        .done()?;

    builder.build()
}
