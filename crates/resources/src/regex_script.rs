//! Regex scripts over the host's REST API.

use async_trait::async_trait;
use model::{
    ClientResult, RegexScriptApi, RegexScriptData, RegexScriptId, RegexScriptInfo,
    RegexScriptPatch,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::instrument;
use transport::{found, Method, RequestClient, Target};

use crate::wire::{decode, non_empty, required};

const SCRIPTS_PATH: &str = "/api/regex/get";
const SAVE_PATH: &str = "/api/regex/save";
const DELETE_PATH: &str = "/api/regex/delete";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireScript {
    id: Option<String>,
    script_name: Option<String>,
    disabled: Option<bool>,
    find_regex: Option<String>,
    replace_string: Option<String>,
    placement: Option<Vec<u32>>,
    flags: Option<Vec<String>>,
}

impl WireScript {
    fn into_info(self, context: &str) -> ClientResult<(RegexScriptInfo, WireRest)> {
        let script_name = required(context, "scriptName", non_empty(self.script_name))?;
        let id = non_empty(self.id)
            .and_then(RegexScriptId::new)
            .or_else(|| RegexScriptId::new(script_name.clone()));
        let info = RegexScriptInfo {
            id: required(context, "id or scriptName", id)?,
            script_name,
            enabled: !self.disabled.unwrap_or(false),
        };
        let rest = WireRest {
            find_regex: self.find_regex,
            replace_string: self.replace_string,
            placement: self.placement,
            flags: self.flags,
        };
        Ok((info, rest))
    }

    fn into_data(self, context: &str) -> ClientResult<RegexScriptData> {
        let (info, rest) = self.into_info(context)?;
        Ok(RegexScriptData {
            info,
            find_regex: required(context, "findRegex", rest.find_regex)?,
            replace_string: rest.replace_string.unwrap_or_default(),
            placement: rest.placement.unwrap_or_default(),
            flags: rest.flags.unwrap_or_default(),
        })
    }
}

/// Fields left over once the listing identity has been taken out.
struct WireRest {
    find_regex: Option<String>,
    replace_string: Option<String>,
    placement: Option<Vec<u32>>,
    flags: Option<Vec<String>>,
}

#[derive(Serialize)]
struct ScriptRef<'a> {
    id: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveRequest<'a> {
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    script_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    disabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    find_regex: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replace_string: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    placement: Option<&'a [u32]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    flags: Option<&'a [String]>,
}

impl<'a> SaveRequest<'a> {
    fn new(id: &'a RegexScriptId, patch: &'a RegexScriptPatch) -> Self {
        Self {
            id: id.as_str(),
            script_name: patch.script_name.as_deref(),
            disabled: patch.enabled.map(|enabled| !enabled),
            find_regex: patch.find_regex.as_deref(),
            replace_string: patch.replace_string.as_deref(),
            placement: patch.placement.as_deref(),
            flags: patch.flags.as_deref(),
        }
    }
}

/// REST strategy for [`RegexScriptApi`].
#[derive(Clone)]
pub struct RestRegexScripts {
    client: RequestClient,
}

impl RestRegexScripts {
    pub fn new(client: RequestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RegexScriptApi for RestRegexScripts {
    #[instrument(skip(self))]
    async fn list(&self) -> ClientResult<Vec<RegexScriptInfo>> {
        let raw: Vec<Value> = self.client.get_json(Target::Host, SCRIPTS_PATH).await?;
        raw.into_iter()
            .map(|value| {
                let (info, _) = decode::<WireScript>(SCRIPTS_PATH, value)?.into_info(SCRIPTS_PATH)?;
                Ok(info)
            })
            .collect()
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn get(&self, id: &RegexScriptId) -> ClientResult<Option<RegexScriptData>> {
        let body = ScriptRef { id: id.as_str() };
        let raw: Option<Value> = found(
            self.client
                .send_json(Target::Host, Method::Post, SCRIPTS_PATH, &body)
                .await,
        )?;
        raw.map(|value| decode::<WireScript>(SCRIPTS_PATH, value)?.into_data(SCRIPTS_PATH))
            .transpose()
    }

    #[instrument(skip(self, patch), fields(id = %id))]
    async fn update(&self, id: &RegexScriptId, patch: &RegexScriptPatch) -> ClientResult<()> {
        self.client
            .send_unit(Target::Host, Method::Post, SAVE_PATH, &SaveRequest::new(id, patch))
            .await
    }

    #[instrument(skip(self), fields(id = %id))]
    async fn delete(&self, id: &RegexScriptId) -> ClientResult<()> {
        let body = ScriptRef { id: id.as_str() };
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
    use transport::HttpResponse;

    #[tokio::test]
    async fn test_list_inverts_disabled_and_falls_back_to_name() {
        let (client, _) = host_client(|_| {
            Ok(HttpResponse::json(
                200,
                &json!([
                    {"id": "r-1", "scriptName": "Trim", "disabled": true, "findRegex": "\\s+$"},
                    {"scriptName": "Censor", "findRegex": "bad"}
                ]),
            ))
        });
        let scripts = RestRegexScripts::new(client).list().await.unwrap();
        assert_eq!(scripts[0].id.as_str(), "r-1");
        assert!(!scripts[0].enabled);
        assert_eq!(scripts[1].id.as_str(), "Censor");
        assert!(scripts[1].enabled);
    }

    #[tokio::test]
    async fn test_list_rejects_unnamed_script() {
        let (client, _) = host_client(|_| Ok(HttpResponse::json(200, &json!([{"id": "r-9"}]))));
        let err = RestRegexScripts::new(client).list().await.unwrap_err();
        assert!(matches!(err, ClientError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_get_fills_defaults() {
        let (client, transport) = host_client(|_| {
            Ok(HttpResponse::json(200, &json!({"scriptName": "Trim", "findRegex": "x"})))
        });
        let id = RegexScriptId::new("Trim").unwrap();
        let script = RestRegexScripts::new(client).get(&id).await.unwrap().unwrap();
        assert_eq!(script.find_regex, "x");
        assert_eq!(script.replace_string, "");
        assert!(script.placement.is_empty() && script.flags.is_empty());
        assert_eq!(
            transport.last_request(&url(SCRIPTS_PATH)).unwrap().json_body(),
            Some(json!({"id": "Trim"}))
        );
    }

    #[tokio::test]
    async fn test_update_sends_disabled_flag() {
        let (client, transport) = host_client(|_| Ok(HttpResponse::text(200, "")));
        let patch = RegexScriptPatch {
            enabled: Some(false),
            replace_string: Some("***".to_string()),
            ..Default::default()
        };
        RestRegexScripts::new(client)
            .update(&RegexScriptId::new("r-1").unwrap(), &patch)
            .await
            .unwrap();
        assert_eq!(
            transport.last_request(&url(SAVE_PATH)).unwrap().json_body(),
            Some(json!({"id": "r-1", "disabled": true, "replaceString": "***"}))
        );
    }

    #[tokio::test]
    async fn test_delete_reports_host_rejection() {
        let (client, _) = host_client(|_| {
            Ok(HttpResponse::json(403, &json!({"message": "forbidden"})))
        });
        let err = RestRegexScripts::new(client)
            .delete(&RegexScriptId::new("r-1").unwrap())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ClientError::HttpApplicationError {
                status: 403,
                message: "forbidden".to_string()
            }
        );
    }
}
