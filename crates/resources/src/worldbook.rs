//! Worldbooks over the host's REST API.
//!
//! The host keys entries by `uid` inside an object and uses its own field names
//! (`key`, `keysecondary`, `disable`). Translation is applied in both
//! directions so callers only ever see [`WorldbookEntry`].

use async_trait::async_trait;
use model::{
    ClientError, ClientResult, WorldbookApi, WorldbookData, WorldbookEntry, WorldbookEntryId,
    WorldbookEntryPatch, WorldbookInfo, WorldbookName,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use transport::{found, Method, RequestClient, Target};

use crate::wire::{decode, required};

const BOOK_PATH: &str = "/api/worldinfo/get";
const EDIT_PATH: &str = "/api/worldinfo/edit";
const CREATE_ENTRY_PATH: &str = "/api/worldinfo/create-entry";
const DELETE_ENTRY_PATH: &str = "/api/worldinfo/delete-entry";

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireEntry {
    uid: Option<u64>,
    key: Option<Vec<String>>,
    keysecondary: Option<Vec<String>>,
    content: Option<String>,
    comment: Option<String>,
    disable: Option<bool>,
    position: Option<u32>,
    depth: Option<u32>,
    order: Option<i64>,
    probability: Option<u32>,
}

impl WireEntry {
    fn into_entry(self, index: usize) -> WorldbookEntry {
        WorldbookEntry {
            id: WorldbookEntryId::new(self.uid.unwrap_or(index as u64)),
            keys: self.key.unwrap_or_default(),
            secondary_keys: self.keysecondary.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            comment: self.comment.unwrap_or_default(),
            enabled: !self.disable.unwrap_or(false),
            position: self.position.unwrap_or(0),
            depth: self.depth,
            order: self.order,
            probability: self.probability,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireBook {
    #[serde(default)]
    entries: Value,
}

/// Outgoing entry fields in the host's naming. Unset fields are omitted so a
/// patch only touches what it names.
#[derive(Debug, Default, PartialEq, Serialize)]
struct WireEntryFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    keysecondary: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    depth: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    probability: Option<u32>,
}

impl From<&WorldbookEntryPatch> for WireEntryFields {
    fn from(patch: &WorldbookEntryPatch) -> Self {
        Self {
            key: patch.keys.clone(),
            keysecondary: patch.secondary_keys.clone(),
            content: patch.content.clone(),
            comment: patch.comment.clone(),
            disable: patch.enabled.map(|enabled| !enabled),
            position: patch.position,
            depth: patch.depth,
            order: patch.order,
            probability: patch.probability,
        }
    }
}

impl From<&WorldbookEntry> for WireEntryFields {
    fn from(entry: &WorldbookEntry) -> Self {
        Self {
            key: Some(entry.keys.clone()),
            keysecondary: Some(entry.secondary_keys.clone()),
            content: Some(entry.content.clone()),
            comment: Some(entry.comment.clone()),
            disable: Some(!entry.enabled),
            position: Some(entry.position),
            depth: entry.depth,
            order: entry.order,
            probability: entry.probability,
        }
    }
}

#[derive(Serialize)]
struct BookRef<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct EntryRef<'a> {
    name: &'a str,
    uid: u64,
}

#[derive(Serialize)]
struct EntryWrite<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    uid: Option<u64>,
    #[serde(flatten)]
    fields: WireEntryFields,
}

#[derive(Deserialize)]
struct CreatedEntry {
    uid: u64,
}

/// Orders the host's entry map the way the host enumerates it: integer keys
/// ascending, then any other keys.
fn ordered_entries(context: &str, entries: Value) -> ClientResult<Vec<Value>> {
    match entries {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            let mut keyed: Vec<(String, Value)> = map.into_iter().collect();
            keyed.sort_by(|(a, _), (b, _)| match (a.parse::<u64>(), b.parse::<u64>()) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                (Err(_), Err(_)) => std::cmp::Ordering::Equal,
            });
            Ok(keyed.into_iter().map(|(_, value)| value).collect())
        }
        other => Err(ClientError::malformed(
            context,
            format!("`entries` must be an object or array, got {other}"),
        )),
    }
}

fn translate_book(name: &WorldbookName, raw: Value) -> ClientResult<WorldbookData> {
    let book: WireBook = decode(BOOK_PATH, raw)?;
    let entries = ordered_entries(BOOK_PATH, book.entries)?
        .into_iter()
        .enumerate()
        .map(|(index, value)| Ok(decode::<WireEntry>(BOOK_PATH, value)?.into_entry(index)))
        .collect::<ClientResult<Vec<_>>>()?;
    Ok(WorldbookData {
        name: name.clone(),
        entries,
    })
}

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// REST strategy for [`WorldbookApi`].
#[derive(Clone)]
pub struct RestWorldbooks {
    client: RequestClient,
}

impl RestWorldbooks {
    pub fn new(client: RequestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WorldbookApi for RestWorldbooks {
    /// The listing endpoint only reports names; entry counts are not known
    /// until a book is fetched.
    #[instrument(skip(self))]
    async fn list(&self) -> ClientResult<Vec<WorldbookInfo>> {
        let names: Vec<String> = self.client.get_json(Target::Host, BOOK_PATH).await?;
        names
            .into_iter()
            .map(|name| {
                Ok(WorldbookInfo {
                    name: required(BOOK_PATH, "name", WorldbookName::new(name))?,
                    entries_count: 0,
                    enabled: true,
                })
            })
            .collect()
    }

    #[instrument(skip(self), fields(book = %name))]
    async fn get(&self, name: &WorldbookName) -> ClientResult<Option<WorldbookData>> {
        let body = BookRef {
            name: name.as_str(),
        };
        let raw: Option<Value> =
            found(self.client.send_json(Target::Host, Method::Post, BOOK_PATH, &body).await)?;
        raw.map(|raw| translate_book(name, raw)).transpose()
    }

    #[instrument(skip(self, entry), fields(book = %book))]
    async fn create_entry(
        &self,
        book: &WorldbookName,
        entry: &WorldbookEntry,
    ) -> ClientResult<WorldbookEntryId> {
        let body = EntryWrite {
            name: book.as_str(),
            uid: None,
            fields: WireEntryFields::from(entry),
        };
        let created: CreatedEntry = self
            .client
            .send_json(Target::Host, Method::Post, CREATE_ENTRY_PATH, &body)
            .await?;
        Ok(WorldbookEntryId::new(created.uid))
    }

    #[instrument(skip(self, patch), fields(book = %book, entry = %entry))]
    async fn update_entry(
        &self,
        book: &WorldbookName,
        entry: WorldbookEntryId,
        patch: &WorldbookEntryPatch,
    ) -> ClientResult<()> {
        let body = EntryWrite {
            name: book.as_str(),
            uid: Some(entry.as_u64()),
            fields: WireEntryFields::from(patch),
        };
        self.client
            .send_unit(Target::Host, Method::Post, EDIT_PATH, &body)
            .await
    }

    #[instrument(skip(self), fields(book = %book, entry = %entry))]
    async fn delete_entry(&self, book: &WorldbookName, entry: WorldbookEntryId) -> ClientResult<()> {
        let body = EntryRef {
            name: book.as_str(),
            uid: entry.as_u64(),
        };
        self.client
            .send_unit(Target::Host, Method::Post, DELETE_ENTRY_PATH, &body)
            .await
    }
}
