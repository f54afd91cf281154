// =============================================================================
// GOOGLE DOCS TOOLS
// =============================================================================
//
// Document reads and edits go through the Docs API. Edits are all
// `documents/{id}:batchUpdate` calls with a single request inside. Deleting a
// whole document is a Drive operation, since the Docs API has no delete.
//
// Indexes are the Docs API's UTF-16 based body indexes; index 1 is the start
// of the body.

use std::sync::Arc;

use serde_json::{json, Value};

use super::support::{
    required_str, route, str_or_empty, timestamp, RemoteAction, RemoteResultExt,
};
use crate::core::services::{ApiMethod, ServiceClient, ServiceClientFactory, ServiceFamily};
use crate::core::tools::{InputSchema, PropertyDef, ToolDescriptor, ToolError};

const RETRIEVE: RemoteAction = RemoteAction::new("Error retrieving document", "retrieve document");
const CREATE: RemoteAction = RemoteAction::new("Error creating document", "create document");
const UPDATE: RemoteAction = RemoteAction::new("Error updating document", "update document");
const APPEND: RemoteAction =
    RemoteAction::new("Error appending to document", "append to document");
const DELETE_CONTENT: RemoteAction =
    RemoteAction::new("Error deleting document content", "delete content");
const FORMAT: RemoteAction = RemoteAction::new("Error formatting document text", "format text");
const DELETE: RemoteAction = RemoteAction::new("Error deleting document", "delete document");

/// Optional character styles for `format_document_text`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextStyle {
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub font_size: Option<i64>,
}

impl TextStyle {
    /// The Docs `textStyle` object plus the names of the fields it sets, in
    /// the order they were applied.
    fn to_request(self) -> (Value, Vec<&'static str>) {
        let mut style = serde_json::Map::new();
        let mut applied = Vec::new();

        for (key, value) in [
            ("bold", self.bold),
            ("italic", self.italic),
            ("underline", self.underline),
        ] {
            if let Some(value) = value {
                style.insert(key.to_string(), json!(value));
                applied.push(key);
            }
        }
        if let Some(size) = self.font_size {
            style.insert(
                "fontSize".to_string(),
                json!({"magnitude": size, "unit": "PT"}),
            );
            applied.push("fontSize");
        }

        (Value::Object(style), applied)
    }
}

pub struct DocsTools {
    clients: Arc<ServiceClientFactory>,
}

impl DocsTools {
    pub fn new(clients: Arc<ServiceClientFactory>) -> Self {
        Self { clients }
    }

    async fn documents(&self) -> Result<Arc<ServiceClient>, ToolError> {
        Ok(self.clients.client(ServiceFamily::Documents).await?)
    }

    async fn batch_update(
        &self,
        document_id: &str,
        request: Value,
        action: RemoteAction,
    ) -> Result<Value, ToolError> {
        let docs = self.documents().await?;
        docs.send(
            docs.request(ApiMethod::Post)
                .segment(format!("{}:batchUpdate", document_id))
                .json(json!({ "requests": [request] })),
        )
        .await
        .or_fail(action)
    }

    pub async fn get_document_content(&self, document_id: &str) -> Result<Value, ToolError> {
        let docs = self.documents().await?;
        let document = docs
            .send(docs.request(ApiMethod::Get).segment(document_id))
            .await
            .or_fail(RETRIEVE)?;

        // Only top-level paragraphs; tables and section breaks carry no runs here.
        let content: String = document["body"]["content"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|element| element.get("paragraph"))
            .flat_map(|paragraph| paragraph["elements"].as_array().into_iter().flatten())
            .filter_map(|element| element["textRun"]["content"].as_str())
            .collect();

        Ok(json!({
            "title": str_or_empty(&document, "title"),
            "document_id": document_id,
            "content": content,
            "revision_id": str_or_empty(&document, "revisionId"),
        }))
    }

    pub async fn create_document(&self, title: &str) -> Result<Value, ToolError> {
        let docs = self.documents().await?;
        let document = docs
            .send(docs.request(ApiMethod::Post).json(json!({ "title": title })))
            .await
            .or_fail(CREATE)?;

        let document_id = required_str(&document, "documentId").or_fail(CREATE)?;
        Ok(json!({
            "document_id": document_id,
            "title": required_str(&document, "title").or_fail(CREATE)?,
            "url": format!("https://docs.google.com/document/d/{}/edit", document_id),
        }))
    }

    pub async fn update_document_content(
        &self,
        document_id: &str,
        content: &str,
        start_index: i64,
    ) -> Result<Value, ToolError> {
        let result = self
            .batch_update(
                document_id,
                json!({
                    "insertText": {
                        "location": { "index": start_index },
                        "text": content,
                    }
                }),
                UPDATE,
            )
            .await?;

        Ok(json!({
            "document_id": document_id,
            "status": "success",
            "replies": result.get("replies").cloned().unwrap_or_else(|| json!([])),
        }))
    }

    pub async fn append_to_document(
        &self,
        document_id: &str,
        content: &str,
    ) -> Result<Value, ToolError> {
        let docs = self.documents().await?;
        let document = docs
            .send(docs.request(ApiMethod::Get).segment(document_id))
            .await
            .or_fail(APPEND)?;

        // The body always ends with a newline that can't be written past.
        let end_index = document["body"]["content"]
            .as_array()
            .and_then(|content| content.last())
            .and_then(|last| last["endIndex"].as_i64())
            .unwrap_or(1)
            - 1;

        self.batch_update(
            document_id,
            json!({
                "insertText": {
                    "location": { "index": end_index },
                    "text": content,
                }
            }),
            APPEND,
        )
        .await?;

        Ok(json!({
            "document_id": document_id,
            "status": "success",
            "appended_at_index": end_index,
        }))
    }

    pub async fn delete_document_content(
        &self,
        document_id: &str,
        start_index: i64,
        end_index: i64,
    ) -> Result<Value, ToolError> {
        self.batch_update(
            document_id,
            json!({
                "deleteContentRange": {
                    "range": { "startIndex": start_index, "endIndex": end_index }
                }
            }),
            DELETE_CONTENT,
        )
        .await?;

        Ok(json!({
            "document_id": document_id,
            "status": "success",
            "deleted_range": format!("{}-{}", start_index, end_index),
        }))
    }

    pub async fn format_document_text(
        &self,
        document_id: &str,
        start_index: i64,
        end_index: i64,
        style: TextStyle,
    ) -> Result<Value, ToolError> {
        let (text_style, applied) = style.to_request();
        if applied.is_empty() {
            return Err(FORMAT.reject("no text style was supplied".to_string()));
        }

        self.batch_update(
            document_id,
            json!({
                "updateTextStyle": {
                    "range": { "startIndex": start_index, "endIndex": end_index },
                    "textStyle": text_style,
                    "fields": applied.join(","),
                }
            }),
            FORMAT,
        )
        .await?;

        Ok(json!({
            "document_id": document_id,
            "status": "success",
            "formatted_range": format!("{}-{}", start_index, end_index),
            "applied_styles": applied,
        }))
    }

    pub async fn delete_document(&self, document_id: &str) -> Result<Value, ToolError> {
        let drive = self.clients.client(ServiceFamily::Files).await?;
        drive
            .send(drive.request(ApiMethod::Delete).segment(document_id))
            .await
            .or_fail(DELETE)?;

        Ok(json!({
            "document_id": document_id,
            "status": "deleted",
            "timestamp": timestamp(),
        }))
    }

    // =========================================================================
    // TOOL DESCRIPTORS
    // =========================================================================

    pub fn descriptors(self: Arc<Self>) -> Vec<ToolDescriptor> {
        let document_id = || {
            PropertyDef::string("document_id")
                .required()
                .describe("The ID of the Google Doc")
        };

        vec![
            ToolDescriptor::new(
                "get_document_content",
                "Retrieve content from a Google Doc",
                InputSchema::new(vec![document_id()]),
                route(&self, |docs, args| async move {
                    docs.get_document_content(args.str("document_id")?).await
                }),
            ),
            ToolDescriptor::new(
                "create_document",
                "Create a new Google Doc",
                InputSchema::new(vec![PropertyDef::string("title")
                    .required()
                    .describe("Title for the new document")]),
                route(&self, |docs, args| async move {
                    docs.create_document(args.str("title")?).await
                }),
            ),
            ToolDescriptor::new(
                "update_document_content",
                "Replace content in a Google Doc",
                InputSchema::new(vec![
                    document_id(),
                    PropertyDef::string("content").required(),
                    PropertyDef::integer("start_index").default_value(json!(1)),
                ]),
                route(&self, |docs, args| async move {
                    docs.update_document_content(
                        args.str("document_id")?,
                        args.str("content")?,
                        args.int("start_index")?,
                    )
                    .await
                }),
            ),
            ToolDescriptor::new(
                "append_to_document",
                "Add content to the end of a Google Doc",
                InputSchema::new(vec![document_id(), PropertyDef::string("content").required()]),
                route(&self, |docs, args| async move {
                    docs.append_to_document(args.str("document_id")?, args.str("content")?)
                        .await
                }),
            ),
            ToolDescriptor::new(
                "delete_document_content",
                "Remove content from a Google Doc",
                InputSchema::new(vec![
                    document_id(),
                    PropertyDef::integer("start_index").required(),
                    PropertyDef::integer("end_index").required(),
                ]),
                route(&self, |docs, args| async move {
                    docs.delete_document_content(
                        args.str("document_id")?,
                        args.int("start_index")?,
                        args.int("end_index")?,
                    )
                    .await
                }),
            ),
            ToolDescriptor::new(
                "format_document_text",
                "Apply formatting (bold, italic, etc.) to document text",
                InputSchema::new(vec![
                    document_id(),
                    PropertyDef::integer("start_index").required(),
                    PropertyDef::integer("end_index").required(),
                    PropertyDef::boolean("bold"),
                    PropertyDef::boolean("italic"),
                    PropertyDef::boolean("underline"),
                    PropertyDef::integer("font_size").describe("Font size in points"),
                ]),
                route(&self, |docs, args| async move {
                    let style = TextStyle {
                        bold: args.opt_bool("bold"),
                        italic: args.opt_bool("italic"),
                        underline: args.opt_bool("underline"),
                        font_size: args.opt_int("font_size"),
                    };
                    docs.format_document_text(
                        args.str("document_id")?,
                        args.int("start_index")?,
                        args.int("end_index")?,
                        style,
                    )
                    .await
                }),
            ),
            ToolDescriptor::new(
                "delete_document",
                "Delete a Google Doc",
                InputSchema::new(vec![document_id()]),
                route(&self, |docs, args| async move {
                    docs.delete_document(args.str("document_id")?).await
                }),
            ),
        ]
    }
}
