//! Signup table fetch: Bitable link → raw signup text blob.
//!
//! The core only needs "the concatenation of all signup-bearing cells"; this
//! client owns authentication, table discovery and record flattening. Any
//! failure surfaces as `FetchFailed`, which the dispatcher renders as a
//! denial; there is no retry here.

use cadence_core::{CadenceError, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::config::ChatConfig;
use crate::token::tenant_access_token;

/// Field in the signup table holding one cell's worth of self-introductions.
const SIGNUP_FIELD: &str = "接龙信息";

pub struct SheetClient {
    config: ChatConfig,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TableList {
    #[serde(default)]
    items: Vec<TableInfo>,
}

#[derive(Debug, Deserialize)]
struct TableInfo {
    table_id: String,
}

#[derive(Debug, Deserialize)]
struct RecordList {
    #[serde(default)]
    items: Vec<Record>,
}

#[derive(Debug, Deserialize)]
struct Record {
    #[serde(default)]
    fields: serde_json::Map<String, serde_json::Value>,
}

impl SheetClient {
    pub fn new(config: ChatConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    /// Fetch and flatten the signup table behind `link` into one text blob.
    pub async fn fetch_raw_signup_text(&self, link: &str) -> Result<String> {
        let base_id = extract_base_id(link)
            .ok_or_else(|| CadenceError::FetchFailed(format!("no base id in link: {link}")))?;

        let token = tenant_access_token(
            &self.client,
            &self.config.api_base,
            &self.config.app_id,
            &self.config.app_secret,
        )
        .await
        .map_err(|e| CadenceError::FetchFailed(e.to_string()))?;

        let table_id = self.first_table_id(&base_id, &token).await?;

        let url = format!(
            "{}/open-apis/bitable/v1/apps/{base_id}/tables/{table_id}/records",
            self.config.api_base
        );
        let resp: ApiResponse<RecordList> = self
            .get_json(&url, &token, &[("page_size", "100")])
            .await?;
        let records = unwrap_api(resp)?.items;

        let mut blob = String::new();
        for record in records {
            if let Some(serde_json::Value::String(cell)) = record.fields.get(SIGNUP_FIELD) {
                let cell = cell.trim();
                if cell.is_empty() {
                    continue;
                }
                if !blob.is_empty() {
                    blob.push('\n');
                }
                blob.push_str(cell);
            }
        }
        Ok(blob)
    }

    async fn first_table_id(&self, base_id: &str, token: &str) -> Result<String> {
        let url = format!(
            "{}/open-apis/bitable/v1/apps/{base_id}/tables",
            self.config.api_base
        );
        let resp: ApiResponse<TableList> = self.get_json(&url, token, &[]).await?;
        let tables = unwrap_api(resp)?.items;
        tables
            .into_iter()
            .next()
            .map(|t| t.table_id)
            .ok_or_else(|| CadenceError::FetchFailed("signup base has no tables".to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        self.client
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|e| CadenceError::FetchFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| CadenceError::FetchFailed(e.to_string()))?
            .json()
            .await
            .map_err(|e| CadenceError::FetchFailed(e.to_string()))
    }
}

fn unwrap_api<T>(resp: ApiResponse<T>) -> Result<T> {
    if resp.code != 0 {
        return Err(CadenceError::FetchFailed(format!(
            "{} (code {})",
            resp.msg, resp.code
        )));
    }
    resp.data
        .ok_or_else(|| CadenceError::FetchFailed("response missing data".to_string()))
}

/// The base id is the last path segment longer than 20 characters.
/// Query strings and `tbl*` segments are ignored; the table is discovered
/// by listing the base, not trusted from the link.
pub fn extract_base_id(link: &str) -> Option<String> {
    let without_scheme = link.split("://").nth(1).unwrap_or(link);
    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or(without_scheme);
    path.split('/')
        .rev()
        .find(|part| part.len() > 20 && !part.starts_with("tbl"))
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_id_from_typical_link() {
        let link = "https://example.feishu.cn/base/AbCdEfGhIjKlMnOpQrStUvWx?table=tblabc123";
        assert_eq!(
            extract_base_id(link).as_deref(),
            Some("AbCdEfGhIjKlMnOpQrStUvWx")
        );
    }

    #[test]
    fn base_id_skips_short_and_table_segments() {
        let link = "https://example.feishu.cn/wiki/x/AbCdEfGhIjKlMnOpQrStUvWx/tblZZZZZZZZZZZZZZZZZZZZZ";
        assert_eq!(
            extract_base_id(link).as_deref(),
            Some("AbCdEfGhIjKlMnOpQrStUvWx")
        );
    }

    #[test]
    fn base_id_missing_yields_none() {
        assert_eq!(extract_base_id("https://example.feishu.cn/short/path"), None);
    }

    #[tokio::test]
    async fn fetch_flattens_signup_cells() {
        let mut server = mockito::Server::new_async().await;
        let base = server.url();

        let _token = server
            .mock("POST", "/open-apis/auth/v3/tenant_access_token/internal")
            .with_body(r#"{"code":0,"tenant_access_token":"t-abc"}"#)
            .create_async()
            .await;
        let _tables = server
            .mock(
                "GET",
                "/open-apis/bitable/v1/apps/AbCdEfGhIjKlMnOpQrStUvWx/tables",
            )
            .with_body(r#"{"code":0,"data":{"items":[{"table_id":"tbl1"},{"table_id":"tbl2"}]}}"#)
            .create_async()
            .await;
        let _records = server
            .mock(
                "GET",
                "/open-apis/bitable/v1/apps/AbCdEfGhIjKlMnOpQrStUvWx/tables/tbl1/records",
            )
            .match_query(mockito::Matcher::UrlEncoded(
                "page_size".into(),
                "100".into(),
            ))
            .with_body(
                r#"{"code":0,"data":{"items":[
                    {"fields":{"接龙信息":"Alice-dev-backend"}},
                    {"fields":{"其他":"ignored"}},
                    {"fields":{"接龙信息":"Bob-x-frontend"}}
                ]}}"#,
            )
            .create_async()
            .await;

        let client = SheetClient::new(ChatConfig {
            api_base: base,
            app_id: "id".into(),
            app_secret: "secret".into(),
        });
        let blob = client
            .fetch_raw_signup_text(&format!(
                "{}/base/AbCdEfGhIjKlMnOpQrStUvWx",
                server.url()
            ))
            .await
            .unwrap();
        assert_eq!(blob, "Alice-dev-backend\nBob-x-frontend");
    }

    #[tokio::test]
    async fn api_error_code_becomes_fetch_failed() {
        let mut server = mockito::Server::new_async().await;
        let _token = server
            .mock("POST", "/open-apis/auth/v3/tenant_access_token/internal")
            .with_body(r#"{"code":0,"tenant_access_token":"t-abc"}"#)
            .create_async()
            .await;
        let _tables = server
            .mock(
                "GET",
                "/open-apis/bitable/v1/apps/AbCdEfGhIjKlMnOpQrStUvWx/tables",
            )
            .with_body(r#"{"code":91402,"msg":"NOTEXIST"}"#)
            .create_async()
            .await;

        let client = SheetClient::new(ChatConfig {
            api_base: server.url(),
            app_id: "id".into(),
            app_secret: "secret".into(),
        });
        let err = client
            .fetch_raw_signup_text(&format!(
                "{}/base/AbCdEfGhIjKlMnOpQrStUvWx",
                server.url()
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, CadenceError::FetchFailed(ref m) if m.contains("NOTEXIST")));
    }
}
