//! Supplier groups: a tagging entity for organizing suppliers in the UI.
//! Groups have no interaction with the quote lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

pub const DEFAULT_GROUP_COLOR: &str = "#007bff";

/// A named label a quoter or admin attaches to a set of suppliers.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct SupplierGroup {
    pub id: Uuid,

    /// Unique display name.
    pub name: String,

    pub description: String,

    /// UI badge color, `#rrggbb`.
    pub color: String,

    /// Staff member who created the group.
    pub created_by: Uuid,

    /// Supplier ids tagged with this group.
    pub members: Json<Vec<Uuid>>,

    pub created_at: DateTime<Utc>,
}
