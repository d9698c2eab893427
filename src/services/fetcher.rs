use crate::config::Config;
use crate::error::{NotionAssistantError, Result};
use crate::types::{
    BlockContent, Credential, FetchedContent, NotionBlock, PageContent, PageReference,
    ResourceKind, RichText, SharedResource, TextSegment,
};
use futures::future::{BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const PAGE_SIZE: u32 = 100;

/// One page of a paginated Notion list (block children, query, search).
#[derive(Debug, Deserialize)]
struct ListResponse {
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl ListResponse {
    fn decode(value: Value, id: &str) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| NotionAssistantError::InvalidResponse {
            reason: format!("Unexpected list response for {}: {}", id, e),
        })
    }

    fn next_cursor(&self) -> Option<String> {
        if self.has_more {
            self.next_cursor.clone()
        } else {
            None
        }
    }
}

/// Reads pages and databases from the Notion API with a bearer token.
pub struct ContentFetcher {
    client: reqwest::Client,
    base_url: String,
    notion_version: String,
    credential: Option<Credential>,
}

impl ContentFetcher {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("notion-assistant/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.notion_base_url.as_str().trim_end_matches('/').to_string(),
            notion_version: config.notion_version.clone(),
            credential: config.notion_token.clone(),
        })
    }

    /// Fetches a page, or a database when no page has that id, and flattens
    /// it into text segments in the order Notion returns the blocks.
    pub async fn fetch(&self, reference: &PageReference) -> Result<FetchedContent> {
        self.credential()?;

        match self.get_page_content(reference).await {
            Ok(page) => {
                let segments = page.flatten();
                info!(
                    "Fetched page '{}' ({} segments)",
                    page.title,
                    segments.len()
                );
                Ok(FetchedContent {
                    id: page.id,
                    title: page.title,
                    kind: ResourceKind::Page,
                    segments,
                })
            }
            Err(NotionAssistantError::NotFound { .. }) => {
                debug!("No page with id {}, trying databases", reference);
                self.fetch_database(reference).await
            }
            // Notion rejects database ids on the page endpoint with a 400.
            Err(NotionAssistantError::HttpStatus {
                status: 400,
                message,
                ..
            }) if message.to_lowercase().contains("database") => {
                debug!("Id {} names a database: {}", reference, message);
                self.fetch_database(reference).await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_page_content(&self, reference: &PageReference) -> Result<PageContent> {
        info!("Fetching page: {}", reference);

        let page = self
            .get_json(&format!("pages/{}", reference), &[], reference.as_str())
            .await?;
        let title = Self::title_from_properties(&page);
        let blocks = self.fetch_block_children(reference.as_str()).await?;

        Ok(PageContent {
            id: reference.to_string(),
            title,
            blocks,
        })
    }

    async fn fetch_database(&self, reference: &PageReference) -> Result<FetchedContent> {
        info!("Fetching database: {}", reference);

        let database = self
            .get_json(&format!("databases/{}", reference), &[], reference.as_str())
            .await?;
        let title = Self::join_plain_text(&database["title"]);

        let mut segments = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }
            let response = self
                .post_json(
                    &format!("databases/{}/query", reference),
                    &body,
                    reference.as_str(),
                )
                .await?;
            let response = ListResponse::decode(response, reference.as_str())?;

            for row in &response.results {
                segments.push(TextSegment {
                    block_id: row["id"].as_str().unwrap_or_default().to_string(),
                    block_type: "page".to_string(),
                    depth: 0,
                    text: Self::title_from_properties(row),
                    checked: None,
                });
            }

            cursor = response.next_cursor();
            if cursor.is_none() {
                break;
            }
        }

        info!("Fetched database '{}' ({} rows)", title, segments.len());
        Ok(FetchedContent {
            id: reference.to_string(),
            title,
            kind: ResourceKind::Database,
            segments,
        })
    }

    /// Lists every page shared with the integration.
    pub async fn list_shared_pages(&self) -> Result<Vec<SharedResource>> {
        self.search(ResourceKind::Page).await
    }

    /// Lists every database shared with the integration.
    pub async fn list_shared_databases(&self) -> Result<Vec<SharedResource>> {
        self.search(ResourceKind::Database).await
    }

    async fn search(&self, kind: ResourceKind) -> Result<Vec<SharedResource>> {
        info!("Searching shared {}s", kind);

        let mut resources = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({
                "filter": { "property": "object", "value": kind.to_string() },
                "page_size": PAGE_SIZE,
            });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }
            let response = self.post_json("search", &body, "search").await?;
            let response = ListResponse::decode(response, "search")?;

            for item in &response.results {
                let Some(id) = item["id"].as_str() else {
                    warn!("Skipping search result without an id");
                    continue;
                };
                let title = match kind {
                    ResourceKind::Page => Self::title_from_properties(item),
                    ResourceKind::Database => Self::join_plain_text(&item["title"]),
                };
                resources.push(SharedResource {
                    id: id.to_string(),
                    title: Self::or_untitled(title),
                    url: item["url"].as_str().unwrap_or_default().to_string(),
                    kind,
                });
            }

            cursor = response.next_cursor();
            if cursor.is_none() {
                break;
            }
        }

        debug!("Found {} shared {}s", resources.len(), kind);
        Ok(resources)
    }

    fn fetch_block_children<'a>(
        &'a self,
        block_id: &'a str,
    ) -> BoxFuture<'a, Result<Vec<NotionBlock>>> {
        async move {
            let mut blocks = Vec::new();
            let mut cursor: Option<String> = None;

            loop {
                let page_size = PAGE_SIZE.to_string();
                let mut query = vec![("page_size", page_size.as_str())];
                if let Some(cursor) = cursor.as_deref() {
                    query.push(("start_cursor", cursor));
                }
                let response = self
                    .get_json(&format!("blocks/{}/children", block_id), &query, block_id)
                    .await?;
                let response = ListResponse::decode(response, block_id)?;

                for raw in &response.results {
                    let mut block = Self::parse_block(raw);
                    if block.has_children && !Self::is_child_resource(&block.block_type) {
                        block.children = self.fetch_block_children(&block.id).await?;
                    }
                    blocks.push(block);
                }

                cursor = response.next_cursor();
                if cursor.is_none() {
                    break;
                }
                debug!("Following block cursor for {}", block_id);
            }

            Ok(blocks)
        }
        .boxed()
    }

    fn credential(&self) -> Result<&Credential> {
        self.credential
            .as_ref()
            .ok_or_else(|| NotionAssistantError::Authentication {
                reason: "NOTION_TOKEN not found in environment variables".to_string(),
            })
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)], id: &str) -> Result<Value> {
        let request = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .query(query);
        self.send(request, id).await
    }

    async fn post_json(&self, path: &str, body: &Value, id: &str) -> Result<Value> {
        let request = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .json(body);
        self.send(request, id).await
    }

    async fn send(&self, request: reqwest::RequestBuilder, id: &str) -> Result<Value> {
        let credential = self.credential()?;
        let response = request
            .bearer_auth(credential.expose())
            .header("Notion-Version", &self.notion_version)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response.json::<Value>().await.map_err(|e| {
                if e.is_decode() {
                    NotionAssistantError::InvalidResponse {
                        reason: format!("Response for {} is not JSON: {}", id, e),
                    }
                } else {
                    NotionAssistantError::Transport(e)
                }
            });
        }

        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                debug!("Could not read Notion error body for {}: {}", id, e);
                Value::Null
            }
        };
        let code = body["code"].as_str().unwrap_or("unknown").to_string();
        let message = body["message"].as_str().unwrap_or_default().to_string();
        warn!("Notion returned {} ({}) for {}", status.as_u16(), code, id);

        Err(match status.as_u16() {
            401 | 403 => NotionAssistantError::Authentication {
                reason: if message.is_empty() { code } else { message },
            },
            404 => NotionAssistantError::NotFound { id: id.to_string() },
            status => NotionAssistantError::HttpStatus {
                status,
                code,
                message,
            },
        })
    }

    fn parse_block(raw: &Value) -> NotionBlock {
        let block_type = raw["type"].as_str().unwrap_or_default().to_string();
        let payload = &raw[block_type.as_str()];

        let mut content = BlockContent {
            rich_text: Self::parse_rich_text(&payload["rich_text"]),
            color: payload["color"].as_str().map(str::to_string),
            title: payload["title"].as_str().map(str::to_string),
            ..Default::default()
        };

        match block_type.as_str() {
            "to_do" => content.checked = Some(payload["checked"].as_bool().unwrap_or(false)),
            "bulleted_list_item" | "numbered_list_item" => {
                content.items = Some(
                    content
                        .rich_text
                        .iter()
                        .map(|rt| rt.plain_text.clone())
                        .collect(),
                )
            }
            "code" => content.language = payload["language"].as_str().map(str::to_string),
            _ => {}
        }

        NotionBlock {
            id: raw["id"].as_str().unwrap_or_default().to_string(),
            block_type,
            content,
            has_children: raw["has_children"].as_bool().unwrap_or(false),
            children: Vec::new(),
        }
    }

    fn parse_rich_text(value: &Value) -> Vec<RichText> {
        value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| RichText {
                        plain_text: item["plain_text"].as_str().unwrap_or_default().to_string(),
                        annotations: item["annotations"].clone(),
                        href: item["href"].as_str().map(str::to_string),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Pages in a database name their title property freely, so match on type.
    fn title_from_properties(object: &Value) -> String {
        let title = object["properties"]
            .as_object()
            .and_then(|properties| {
                properties
                    .values()
                    .find(|property| property["type"] == "title")
            })
            .map(|property| Self::join_plain_text(&property["title"]))
            .unwrap_or_default();
        Self::or_untitled(title)
    }

    fn join_plain_text(value: &Value) -> String {
        Self::parse_rich_text(value)
            .into_iter()
            .map(|rt| rt.plain_text)
            .collect()
    }

    fn or_untitled(title: String) -> String {
        if title.trim().is_empty() {
            "Untitled".to_string()
        } else {
            title
        }
    }

    fn is_child_resource(block_type: &str) -> bool {
        matches!(block_type, "child_page" | "child_database")
    }

    pub fn validate_references(sources: &[String]) -> Result<Vec<PageReference>> {
        sources
            .iter()
            .map(|source| PageReference::parse(source))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_block_to_do_and_list_items() {
        let todo = ContentFetcher::parse_block(&json!({
            "id": "b1",
            "type": "to_do",
            "has_children": false,
            "to_do": {
                "rich_text": [{ "plain_text": "Call ", "href": null }, { "plain_text": "Sam" }],
                "checked": true,
                "color": "default"
            }
        }));
        assert_eq!(todo.plain_text(), "Call Sam");
        assert_eq!(todo.content.checked, Some(true));
        assert_eq!(todo.content.color.as_deref(), Some("default"));

        let bullet = ContentFetcher::parse_block(&json!({
            "id": "b2",
            "type": "bulleted_list_item",
            "has_children": true,
            "bulleted_list_item": { "rich_text": [{ "plain_text": "milk" }] }
        }));
        assert_eq!(bullet.content.items, Some(vec!["milk".to_string()]));
        assert!(bullet.has_children);
    }

    #[test]
    fn test_parse_child_page_uses_title() {
        let block = ContentFetcher::parse_block(&json!({
            "id": "b3",
            "type": "child_page",
            "has_children": true,
            "child_page": { "title": "Meeting notes" }
        }));
        assert_eq!(block.plain_text(), "Meeting notes");
        assert!(ContentFetcher::is_child_resource(&block.block_type));
    }

    #[test]
    fn test_title_from_any_title_property() {
        let page = json!({
            "properties": {
                "Status": { "type": "select", "select": null },
                "Name": { "type": "title", "title": [{ "plain_text": "Daily " }, { "plain_text": "Log" }] }
            }
        });
        assert_eq!(ContentFetcher::title_from_properties(&page), "Daily Log");
        assert_eq!(ContentFetcher::title_from_properties(&json!({})), "Untitled");
    }

    #[test]
    fn test_next_cursor_requires_has_more() {
        let decode = |value: Value| ListResponse::decode(value, "b").unwrap().next_cursor();
        assert_eq!(
            decode(json!({ "results": [], "has_more": true, "next_cursor": "abc" })),
            Some("abc".to_string())
        );
        assert_eq!(
            decode(json!({ "results": [], "has_more": false, "next_cursor": "abc" })),
            None
        );
        assert_eq!(
            decode(json!({ "results": [], "has_more": true, "next_cursor": null })),
            None
        );
    }

    #[test]
    fn test_list_without_results_is_rejected() {
        let result = ListResponse::decode(json!({ "object": "error", "unexpected": true }), "b");
        assert!(matches!(
            result,
            Err(NotionAssistantError::InvalidResponse { .. })
        ));
    }

    #[test]
    fn test_validate_references() {
        let valid = ContentFetcher::validate_references(&[
            "0f2d3c4b5a6947889a0b1c2d3e4f5a6b".to_string(),
        ])
        .unwrap();
        assert_eq!(valid.len(), 1);

        let invalid = ContentFetcher::validate_references(&[
            "0f2d3c4b5a6947889a0b1c2d3e4f5a6b".to_string(),
            "nope".to_string(),
        ]);
        assert!(matches!(
            invalid,
            Err(NotionAssistantError::InvalidPageReference { .. })
        ));
    }
}
