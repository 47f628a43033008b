//! Admin item browser.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};

use stockbot_core::{Action, AvailabilityFilter, Item, ItemId};

use crate::db::{ItemBrowse, ItemRead, ItemRepository};
use crate::error::AppError;
use crate::middleware::RequireAdminSession;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/items", get(browse_items))
}

/// Query string for `/admin/items`.
#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    pub page: Option<i64>,
    pub search: Option<String>,
    pub avail: Option<AvailabilityFilter>,
}

/// An item row as shown in the browser.
///
/// Rows whose fields cannot be decrypted are listed by id only.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ItemView {
    Readable(Item),
    Unreadable { id: ItemId, unreadable: bool },
}

impl From<ItemRead> for ItemView {
    fn from(read: ItemRead) -> Self {
        match read {
            Ok(item) => Self::Readable(item),
            Err(e) => Self::Unreadable {
                id: e.id,
                unreadable: true,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ItemPageView {
    pub items: Vec<ItemView>,
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
}

/// GET /admin/items?page=&search=&avail=all|yes|no
async fn browse_items(
    session: RequireAdminSession,
    State(state): State<AppState>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<ItemPageView>, AppError> {
    session.authorize(Action::ViewItems)?;

    let browse = ItemBrowse {
        page: query.page.unwrap_or(1),
        search: query.search.filter(|s| !s.trim().is_empty()),
        availability: query.avail.unwrap_or_default(),
    };
    let page = ItemRepository::new(state.pool(), state.cipher())
        .browse(&browse)
        .await?;

    Ok(Json(ItemPageView {
        items: page.items.into_iter().map(ItemView::from).collect(),
        page: page.page,
        total_pages: page.total_pages,
        total: page.total,
    }))
}
