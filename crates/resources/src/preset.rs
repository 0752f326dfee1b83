//! Generation presets over the host's REST API.

use async_trait::async_trait;
use model::{
    ApiName, ClientError, ClientResult, PresetApi, PresetData, PresetInfo, PresetName, PresetPatch,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::instrument;
use transport::{found, Method, RequestClient, Target};

use crate::wire::required;

const PRESETS_PATH: &str = "/api/presets/get";
const SAVE_PATH: &str = "/api/presets/save";

/// Flattens `{api: [name, ...]}` into `{name, api}` pairs, keeping group
/// order and then listing order. Groups that are not arrays hold no presets.
fn flatten_listing(listing: Map<String, Value>) -> ClientResult<Vec<PresetInfo>> {
    let mut presets = Vec::new();
    for (api, names) in listing {
        let Value::Array(names) = names else {
            continue;
        };
        let api = required(PRESETS_PATH, "api", ApiName::new(api))?;
        for name in names {
            let Value::String(name) = name else {
                return Err(ClientError::malformed(
                    PRESETS_PATH,
                    format!("preset name in `{api}` must be a string, got {name}"),
                ));
            };
            presets.push(PresetInfo {
                name: required(PRESETS_PATH, "name", PresetName::new(name))?,
                api: api.clone(),
            });
        }
    }
    Ok(presets)
}

fn translate_preset(name: &PresetName, api: &ApiName, body: Value) -> ClientResult<PresetData> {
    let Value::Object(settings) = body else {
        return Err(ClientError::malformed(
            PRESETS_PATH,
            format!("preset body must be an object, got {body}"),
        ));
    };
    let prompts = match settings.get("prompts") {
        Some(Value::Array(prompts)) => prompts.clone(),
        _ => Vec::new(),
    };
    Ok(PresetData {
        info: PresetInfo {
            name: name.clone(),
            api: api.clone(),
        },
        prompts,
        settings,
    })
}

#[derive(Serialize)]
struct PresetRef<'a> {
    name: &'a str,
    api: &'a str,
}

#[derive(Serialize)]
struct SaveRequest<'a> {
    name: &'a str,
    #[serde(flatten)]
    patch: &'a PresetPatch,
}

/// REST strategy for [`PresetApi`].
#[derive(Clone)]
pub struct RestPresets {
    client: RequestClient,
}

impl RestPresets {
    pub fn new(client: RequestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PresetApi for RestPresets {
    #[instrument(skip(self))]
    async fn list(&self) -> ClientResult<Vec<PresetInfo>> {
        let listing: Map<String, Value> = self.client.get_json(Target::Host, PRESETS_PATH).await?;
        flatten_listing(listing)
    }

    #[instrument(skip(self), fields(name = %name, api = %api))]
    async fn get(&self, name: &PresetName, api: &ApiName) -> ClientResult<Option<PresetData>> {
        let body = PresetRef {
            name: name.as_str(),
            api: api.as_str(),
        };
        let raw: Option<Value> = found(
            self.client
                .send_json(Target::Host, Method::Post, PRESETS_PATH, &body)
                .await,
        )?;
        raw.map(|raw| translate_preset(name, api, raw)).transpose()
    }

    #[instrument(skip(self, patch), fields(name = %name))]
    async fn update(&self, name: &PresetName, patch: &PresetPatch) -> ClientResult<()> {
        let body = SaveRequest {
            name: name.as_str(),
            patch,
        };
        self.client
            .send_unit(Target::Host, Method::Post, SAVE_PATH, &body)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::test_support::{host_client, url};
    use serde_json::json;
    use transport::HttpResponse;

    fn listing(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_listing_is_flattened_in_group_order() {
        let presets = flatten_listing(listing(json!({
            "openai": ["Default", "Creative"],
            "kobold": ["Balanced"],
            "novel": null
        })))
        .unwrap();
        let pairs: Vec<(&str, &str)> = presets
            .iter()
            .map(|p| (p.name.as_str(), p.api.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("Default", "openai"),
                ("Creative", "openai"),
                ("Balanced", "kobold")
            ]
        );
    }

    #[test]
    fn test_listing_rejects_non_string_names() {
        let err = flatten_listing(listing(json!({"openai": [42]}))).unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse { .. }));
    }

    #[test]
    fn test_preset_body_becomes_settings() {
        let name = PresetName::new("Default").unwrap();
        let api = ApiName::new("openai").unwrap();
        let preset = translate_preset(
            &name,
            &api,
            json!({"temperature": 0.7, "prompts": [{"identifier": "main"}]}),
        )
        .unwrap();
        assert_eq!(preset.prompts, vec![json!({"identifier": "main"})]);
        assert_eq!(preset.settings["temperature"], json!(0.7));
        assert!(preset.settings.contains_key("prompts"));

        let bare = translate_preset(&name, &api, json!({"temperature": 1.0})).unwrap();
        assert!(bare.prompts.is_empty());
    }

    #[tokio::test]
    async fn test_get_posts_name_and_api() {
        let (client, transport) = host_client(|_| Ok(HttpResponse::json(200, &json!({"top_p": 1}))));
        let name = PresetName::new("Default").unwrap();
        let api = ApiName::new("openai").unwrap();
        let preset = RestPresets::new(client).get(&name, &api).await.unwrap().unwrap();
        assert_eq!(preset.info.api.as_str(), "openai");
        assert_eq!(
            transport.last_request(&url(PRESETS_PATH)).unwrap().json_body(),
            Some(json!({"name": "Default", "api": "openai"}))
        );
    }

    #[tokio::test]
    async fn test_update_spreads_patch_after_name() {
        let (client, transport) = host_client(|_| Ok(HttpResponse::text(200, "OK")));
        let patch = PresetPatch {
            prompts: Some(vec![json!({"identifier": "jailbreak"})]),
            ..Default::default()
        };
        RestPresets::new(client)
            .update(&PresetName::new("Default").unwrap(), &patch)
            .await
            .unwrap();
        assert_eq!(
            transport.last_request(&url(SAVE_PATH)).unwrap().json_body(),
            Some(json!({"name": "Default", "prompts": [{"identifier": "jailbreak"}]}))
        );
    }
}
