//! Quest catalog fetch.
//!
//! One authenticated `GET /quests/@me`, decoded into entities in server
//! order. No filtering happens here; validity is the orchestrator's call.

use serde::Deserialize;

use crate::error::{QuestError, Result};
use crate::quests::quest::{Quest, QuestRecord};
use crate::session::SessionProvider;

#[derive(Debug, Deserialize)]
struct QuestsResponse {
    #[serde(default)]
    quests: Vec<QuestRecord>,
}

/// Fetch the full quest list for the current identity.
///
/// Any transport failure or malformed payload is a
/// [`QuestError::CatalogFetch`]; the caller treats it as fatal for the run —
/// there is no partial catalog.
pub async fn fetch(session: &SessionProvider) -> Result<Vec<Quest>> {
    let response = session
        .get("/quests/@me")
        .await
        .map_err(|e| QuestError::CatalogFetch(e.to_string()))?;

    let decoded: QuestsResponse = serde_json::from_value(response)
        .map_err(|e| QuestError::CatalogFetch(format!("malformed quest list: {e}")))?;

    Ok(decoded.quests.into_iter().map(Quest::new).collect())
}
