//! Character cards over the host's REST API.

use async_trait::async_trait;
use model::{
    CharacterApi, CharacterData, CharacterId, CharacterInfo, CharacterPatch, ClientResult,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use transport::{found, Method, RequestClient, Target};

use crate::wire::{decode, non_empty, required};

const LIST_PATH: &str = "/api/characters/all";
const GET_PATH: &str = "/api/characters/get";
const CREATE_PATH: &str = "/api/characters/create";
const EDIT_PATH: &str = "/api/characters/edit";
const DELETE_PATH: &str = "/api/characters/delete";

/// Card as the host stores it. Newer cards keep most fields under `data`.
#[derive(Debug, Default, Deserialize)]
struct WireCharacter {
    name: Option<String>,
    avatar: Option<String>,
    description: Option<String>,
    creator: Option<String>,
    tags: Option<Vec<String>>,
    personality: Option<String>,
    scenario: Option<String>,
    first_mes: Option<String>,
    mes_example: Option<String>,
    system_prompt: Option<String>,
    post_history_instructions: Option<String>,
    creator_notes: Option<String>,
    data: Option<Box<WireCharacter>>,
}

impl WireCharacter {
    /// Top-level value first, then the nested `data` block.
    fn field(&self, pick: impl Fn(&WireCharacter) -> &Option<String>) -> Option<String> {
        non_empty(pick(self).clone())
            .or_else(|| self.data.as_deref().and_then(|data| non_empty(pick(data).clone())))
    }

    fn into_info(self, context: &str) -> ClientResult<CharacterInfo> {
        let name = required(context, "name", self.field(|c| &c.name))?;
        let avatar = self.field(|c| &c.avatar);
        let id = avatar
            .clone()
            .and_then(CharacterId::new)
            .or_else(|| CharacterId::new(name.clone()));
        let id = required(context, "avatar or name", id)?;
        let tags = self
            .tags
            .clone()
            .or_else(|| self.data.as_ref().and_then(|data| data.tags.clone()))
            .unwrap_or_default();
        Ok(CharacterInfo {
            id,
            name,
            avatar,
            description: self.field(|c| &c.description),
            creator: self.field(|c| &c.creator),
            tags,
        })
    }

    fn into_data(self, context: &str) -> ClientResult<CharacterData> {
        let personality = self.field(|c| &c.personality);
        let scenario = self.field(|c| &c.scenario);
        let first_mes = self.field(|c| &c.first_mes);
        let mes_example = self.field(|c| &c.mes_example);
        let system_prompt = self.field(|c| &c.system_prompt);
        let post_history_instructions = self.field(|c| &c.post_history_instructions);
        let creator_notes = self.field(|c| &c.creator_notes);
        Ok(CharacterData {
            info: self.into_info(context)?,
            personality,
            scenario,
            first_mes,
            mes_example,
            system_prompt,
            post_history_instructions,
            creator_notes,
            character_book: None,
        })
    }
}

#[derive(Serialize)]
struct AvatarRef<'a> {
    avatar_url: &'a str,
}

#[derive(Serialize)]
struct EditRequest<'a> {
    avatar_url: &'a str,
    #[serde(flatten)]
    patch: &'a CharacterPatch,
}

#[derive(Deserialize)]
struct Created {
    file_name: String,
}

/// REST strategy for [`CharacterApi`].
#[derive(Clone)]
pub struct RestCharacters {
    client: RequestClient,
}

impl RestCharacters {
    pub fn new(client: RequestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CharacterApi for RestCharacters {
    #[instrument(skip(self))]
    async fn list(&self) -> ClientResult<Vec<CharacterInfo>> {
        let raw: Vec<Value> = self.client.get_json(Target::Host, LIST_PATH).await?;
        raw.into_iter()
            .map(|value| decode::<WireCharacter>(LIST_PATH, value)?.into_info(LIST_PATH))
            .collect()
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn get(&self, id: &CharacterId) -> ClientResult<Option<CharacterData>> {
        let body = AvatarRef {
            avatar_url: id.as_str(),
        };
        let raw: Option<Value> =
            found(self.client.send_json(Target::Host, Method::Post, GET_PATH, &body).await)?;
        raw.map(|value| decode::<WireCharacter>(GET_PATH, value)?.into_data(GET_PATH))
            .transpose()
    }

    #[instrument(skip(self, data), fields(name = %data.info.name))]
    async fn create(&self, data: &CharacterData) -> ClientResult<CharacterId> {
        let created: Created = self
            .client
            .send_json(Target::Host, Method::Post, CREATE_PATH, data)
            .await?;
        required(CREATE_PATH, "file_name", CharacterId::new(created.file_name))
    }

    #[instrument(skip(self, patch), fields(id = %id))]
    async fn update(&self, id: &CharacterId, patch: &CharacterPatch) -> ClientResult<()> {
        let body = EditRequest {
            avatar_url: id.as_str(),
            patch,
        };
        self.client
            .send_unit(Target::Host, Method::Post, EDIT_PATH, &body)
            .await
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: &CharacterId) -> ClientResult<()> {
        let body = AvatarRef {
            avatar_url: id.as_str(),
        };
        self.client
            .send_unit(Target::Host, Method::Post, DELETE_PATH, &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::test_support::{host_client, url};
    use model::ClientError;
    use serde_json::json;
    use transport::testing::unreachable;
    use transport::HttpResponse;

    #[tokio::test]
    async fn test_list_derives_identity_and_default_tags() {
        let (client, _) = host_client(|request| {
            assert_eq!(request.url, url(LIST_PATH));
            Ok(HttpResponse::json(
                200,
                &json!([
                    {"name": "Seraphina", "avatar": "Seraphina.png", "tags": ["fantasy"], "description": "A guardian"},
                    {"name": "Nameless"},
                    {"name": "Blank", "avatar": ""}
                ]),
            ))
        });
        let characters = RestCharacters::new(client).list().await.unwrap();

        assert_eq!(characters.len(), 3);
        assert_eq!(characters[0].id.as_str(), "Seraphina.png");
        assert_eq!(characters[0].tags, vec!["fantasy".to_string()]);
        assert_eq!(characters[0].description.as_deref(), Some("A guardian"));
        assert_eq!(characters[1].id.as_str(), "Nameless");
        assert!(characters[1].tags.is_empty());
        assert_eq!(characters[1].avatar, None);
        assert_eq!(characters[2].id.as_str(), "Blank");
    }

    #[tokio::test]
    async fn test_list_rejects_card_without_name() {
        let (client, _) = host_client(|_| Ok(HttpResponse::json(200, &json!([{"avatar": "x.png"}]))));
        let err = RestCharacters::new(client).list().await.unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_get_reads_nested_card_data() {
        let (client, transport) = host_client(|_| {
            Ok(HttpResponse::json(
                200,
                &json!({
                    "name": "Seraphina",
                    "avatar": "Seraphina.png",
                    "first_mes": "Welcome, traveler.",
                    "data": {"creator": "st", "system_prompt": "Stay in character.", "tags": ["a"]}
                }),
            ))
        });
        let id = CharacterId::new("Seraphina.png").unwrap();
        let card = RestCharacters::new(client).get(&id).await.unwrap().unwrap();

        assert_eq!(card.info.creator.as_deref(), Some("st"));
        assert_eq!(card.info.tags, vec!["a".to_string()]);
        assert_eq!(card.first_mes.as_deref(), Some("Welcome, traveler."));
        assert_eq!(card.system_prompt.as_deref(), Some("Stay in character."));
        assert_eq!(
            transport.last_request(&url(GET_PATH)).unwrap().json_body(),
            Some(json!({"avatar_url": "Seraphina.png"}))
        );
    }

    #[tokio::test]
    async fn test_get_missing_card_is_none() {
        let (client, _) = host_client(|_| Ok(HttpResponse::text(404, "Not Found")));
        let id = CharacterId::new("ghost.png").unwrap();
        assert_eq!(RestCharacters::new(client).get(&id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_get_propagates_server_failure() {
        let (client, _) = host_client(|_| Ok(HttpResponse::text(500, "boom")));
        let id = CharacterId::new("x.png").unwrap();
        let err = RestCharacters::new(client).get(&id).await.unwrap_err();
        assert!(matches!(err, ClientError::HttpApplicationError { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_update_merges_patch_into_body() {
        let (client, transport) = host_client(|_| Ok(HttpResponse::text(200, "OK")));
        let id = CharacterId::new("Seraphina.png").unwrap();
        let patch = CharacterPatch {
            scenario: Some("A forest glade".to_string()),
            ..Default::default()
        };
        RestCharacters::new(client).update(&id, &patch).await.unwrap();
        assert_eq!(
            transport.last_request(&url(EDIT_PATH)).unwrap().json_body(),
            Some(json!({"avatar_url": "Seraphina.png", "scenario": "A forest glade"}))
        );
    }

    #[tokio::test]
    async fn test_create_returns_host_file_name() {
        let (client, _) = host_client(|_| Ok(HttpResponse::json(200, &json!({"file_name": "Nova.png"}))));
        let data = CharacterData {
            info: CharacterInfo {
                id: CharacterId::new("Nova").unwrap(),
                name: "Nova".to_string(),
                avatar: None,
                description: None,
                creator: None,
                tags: Vec::new(),
            },
            personality: None,
            scenario: None,
            first_mes: None,
            mes_example: None,
            system_prompt: None,
            post_history_instructions: None,
            creator_notes: None,
            character_book: None,
        };
        let id = RestCharacters::new(client).create(&data).await.unwrap();
        assert_eq!(id.as_str(), "Nova.png");
    }

    #[tokio::test]
    async fn test_delete_failure_is_not_swallowed() {
        let (client, _) = host_client(|request| Err(unreachable(&request.url)));
        let id = CharacterId::new("x.png").unwrap();
        let err = RestCharacters::new(client).delete(&id).await.unwrap_err();
        assert!(err.is_unreachable());
    }
}
