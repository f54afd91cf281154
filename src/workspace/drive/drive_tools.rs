// =============================================================================
// GOOGLE DRIVE TOOLS
// =============================================================================
//
// File management against Drive v3. Uploads read a file from the server's
// local filesystem and send it as a multipart upload, so `file_path` is a
// path on the machine running this server, not on the client.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use super::support::{
    required_str, route, str_or_empty, timestamp, RemoteAction, RemoteResultExt,
};
use crate::core::services::{ApiMethod, ServiceClient, ServiceClientFactory, ServiceFamily};
use crate::core::tools::{InputSchema, PropertyDef, ToolDescriptor, ToolError};

const LIST: RemoteAction = RemoteAction::new("Error listing drive files", "list files");
const UPLOAD: RemoteAction = RemoteAction::new("Error uploading file", "upload file");
const DELETE: RemoteAction = RemoteAction::new("Error deleting file", "delete file");
const SHARE: RemoteAction = RemoteAction::new("Error sharing file", "share file");
const COPY: RemoteAction = RemoteAction::new("Error copying file", "copy file");
const MOVE: RemoteAction = RemoteAction::new("Error moving file", "move file");
const CREATE_FOLDER: RemoteAction = RemoteAction::new("Error creating folder", "create folder");
const SEARCH: RemoteAction = RemoteAction::new("Error searching files", "search files");

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const SEARCH_PAGE_SIZE: i64 = 20;

/// Content type from the file extension, `application/octet-stream` when unknown.
fn guess_mime_type(file_path: &str) -> String {
    mime_guess::from_path(file_path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Quotes a value for use inside a Drive `q` string literal.
fn quote_query_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub struct DriveTools {
    clients: Arc<ServiceClientFactory>,
}

impl DriveTools {
    pub fn new(clients: Arc<ServiceClientFactory>) -> Self {
        Self { clients }
    }

    async fn files(&self) -> Result<Arc<ServiceClient>, ToolError> {
        Ok(self.clients.client(ServiceFamily::Files).await?)
    }

    pub async fn list_drive_files(
        &self,
        page_size: i64,
        query: Option<&str>,
        order_by: &str,
    ) -> Result<Value, ToolError> {
        let drive = self.files().await?;
        let mut request = drive
            .request(ApiMethod::Get)
            .query("pageSize", page_size)
            .query("orderBy", order_by)
            .query(
                "fields",
                "nextPageToken, files(id, name, mimeType, createdTime, modifiedTime, size)",
            );
        if let Some(query) = query {
            request = request.query("q", query);
        }

        let results = drive.send(request).await.or_fail(LIST)?;
        let files: Vec<Value> = results["files"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|file| {
                json!({
                    "id": str_or_empty(file, "id"),
                    "name": str_or_empty(file, "name"),
                    "mime_type": str_or_empty(file, "mimeType"),
                    "created_time": str_or_empty(file, "createdTime"),
                    "modified_time": str_or_empty(file, "modifiedTime"),
                    "size": file.get("size").and_then(Value::as_str).unwrap_or("0"),
                })
            })
            .collect();

        Ok(json!({
            "file_count": files.len(),
            "files": files,
            "next_page_token": str_or_empty(&results, "nextPageToken"),
        }))
    }

    pub async fn upload_file_to_drive(
        &self,
        file_path: &str,
        name: Option<&str>,
        mime_type: Option<&str>,
        folder_id: Option<&str>,
    ) -> Result<Value, ToolError> {
        let media = tokio::fs::read(file_path)
            .await
            .map_err(|e| UPLOAD.reject(format!("cannot read {}: {}", file_path, e)))?;

        let file_name = name.map(str::to_string).unwrap_or_else(|| {
            Path::new(file_path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_path.to_string())
        });
        let mime_type = mime_type
            .map(str::to_string)
            .unwrap_or_else(|| guess_mime_type(file_path));
        let mut metadata = json!({ "name": file_name });
        if let Some(folder_id) = folder_id.filter(|f| !f.is_empty()) {
            metadata["parents"] = json!([folder_id]);
        }

        let drive = self.files().await?;
        let file = drive
            .send(
                drive
                    .upload_request()
                    .query("fields", "id, name, mimeType, webViewLink")
                    .multipart(metadata, media, &mime_type),
            )
            .await
            .or_fail(UPLOAD)?;

        Ok(json!({
            "file_id": required_str(&file, "id").or_fail(UPLOAD)?,
            "name": required_str(&file, "name").or_fail(UPLOAD)?,
            "mime_type": str_or_empty(&file, "mimeType"),
            "url": str_or_empty(&file, "webViewLink"),
            "status": "uploaded",
        }))
    }

    pub async fn delete_drive_file(&self, file_id: &str) -> Result<Value, ToolError> {
        let drive = self.files().await?;
        drive
            .send(drive.request(ApiMethod::Delete).segment(file_id))
            .await
            .or_fail(DELETE)?;

        Ok(json!({
            "file_id": file_id,
            "status": "deleted",
            "timestamp": timestamp(),
        }))
    }

    pub async fn share_drive_file(
        &self,
        file_id: &str,
        email: &str,
        role: &str,
        send_notification: bool,
    ) -> Result<Value, ToolError> {
        let drive = self.files().await?;
        let permission = drive
            .send(
                drive
                    .request(ApiMethod::Post)
                    .segment(file_id)
                    .segment("permissions")
                    .query("sendNotificationEmail", send_notification)
                    .query("fields", "id")
                    .json(json!({
                        "type": "user",
                        "role": role,
                        "emailAddress": email,
                    })),
            )
            .await
            .or_fail(SHARE)?;

        Ok(json!({
            "file_id": file_id,
            "permission_id": required_str(&permission, "id").or_fail(SHARE)?,
            "shared_with": email,
            "role": role,
            "status": "shared",
        }))
    }

    pub async fn copy_drive_file(
        &self,
        file_id: &str,
        new_name: &str,
        folder_id: Option<&str>,
    ) -> Result<Value, ToolError> {
        let mut body = json!({ "name": new_name });
        if let Some(folder_id) = folder_id.filter(|f| !f.is_empty()) {
            body["parents"] = json!([folder_id]);
        }

        let drive = self.files().await?;
        let copied = drive
            .send(
                drive
                    .request(ApiMethod::Post)
                    .segment(file_id)
                    .segment("copy")
                    .query("fields", "id, name, webViewLink")
                    .json(body),
            )
            .await
            .or_fail(COPY)?;

        Ok(json!({
            "original_file_id": file_id,
            "copied_file_id": required_str(&copied, "id").or_fail(COPY)?,
            "name": required_str(&copied, "name").or_fail(COPY)?,
            "url": str_or_empty(&copied, "webViewLink"),
            "status": "copied",
        }))
    }

    pub async fn move_drive_file(
        &self,
        file_id: &str,
        new_folder_id: &str,
        old_folder_id: Option<&str>,
    ) -> Result<Value, ToolError> {
        let drive = self.files().await?;

        let old_parents = match old_folder_id.filter(|f| !f.is_empty()) {
            Some(old) => old.to_string(),
            None => {
                let current = drive
                    .send(
                        drive
                            .request(ApiMethod::Get)
                            .segment(file_id)
                            .query("fields", "parents"),
                    )
                    .await
                    .or_fail(MOVE)?;
                current["parents"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(",")
            }
        };

        let moved = drive
            .send(
                drive
                    .request(ApiMethod::Patch)
                    .segment(file_id)
                    .query("addParents", new_folder_id)
                    .query("removeParents", old_parents)
                    .query("fields", "id, name, parents")
                    .json(json!({})),
            )
            .await
            .or_fail(MOVE)?;

        Ok(json!({
            "file_id": file_id,
            "name": required_str(&moved, "name").or_fail(MOVE)?,
            "new_parent": new_folder_id,
            "status": "moved",
        }))
    }

    pub async fn create_drive_folder(
        &self,
        name: &str,
        parent_folder_id: Option<&str>,
    ) -> Result<Value, ToolError> {
        let mut metadata = json!({ "name": name, "mimeType": FOLDER_MIME_TYPE });
        if let Some(parent) = parent_folder_id.filter(|p| !p.is_empty()) {
            metadata["parents"] = json!([parent]);
        }

        let drive = self.files().await?;
        let folder = drive
            .send(
                drive
                    .request(ApiMethod::Post)
                    .query("fields", "id, name, webViewLink")
                    .json(metadata),
            )
            .await
            .or_fail(CREATE_FOLDER)?;

        Ok(json!({
            "folder_id": required_str(&folder, "id").or_fail(CREATE_FOLDER)?,
            "name": required_str(&folder, "name").or_fail(CREATE_FOLDER)?,
            "url": str_or_empty(&folder, "webViewLink"),
            "status": "created",
        }))
    }

    pub async fn search_drive_files(
        &self,
        search_term: &str,
        file_type: Option<&str>,
    ) -> Result<Value, ToolError> {
        let mut query = format!("name contains '{}'", quote_query_value(search_term));
        if let Some(file_type) = file_type.filter(|t| !t.is_empty()) {
            query.push_str(&format!(" and mimeType='{}'", quote_query_value(file_type)));
        }

        let drive = self.files().await?;
        let results = drive
            .send(
                drive
                    .request(ApiMethod::Get)
                    .query("q", &query)
                    .query("pageSize", SEARCH_PAGE_SIZE)
                    .query("fields", "files(id, name, mimeType, modifiedTime, webViewLink)"),
            )
            .await
            .or_fail(SEARCH)?;

        let files: Vec<Value> = results["files"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|file| {
                json!({
                    "id": str_or_empty(file, "id"),
                    "name": str_or_empty(file, "name"),
                    "mime_type": str_or_empty(file, "mimeType"),
                    "modified_time": str_or_empty(file, "modifiedTime"),
                    "url": str_or_empty(file, "webViewLink"),
                })
            })
            .collect();

        Ok(json!({
            "search_term": search_term,
            "result_count": files.len(),
            "files": files,
        }))
    }

    // =========================================================================
    // TOOL DESCRIPTORS
    // =========================================================================

    pub fn descriptors(self: Arc<Self>) -> Vec<ToolDescriptor> {
        let file_id = || PropertyDef::string("file_id").required();

        vec![
            ToolDescriptor::new(
                "list_drive_files",
                "List files in Drive",
                InputSchema::new(vec![
                    PropertyDef::integer("page_size")
                        .describe("Number of files to return (max 1000)")
                        .default_value(json!(10)),
                    PropertyDef::string("query")
                        .describe("Search query (e.g., \"name contains 'report'\")"),
                    PropertyDef::string("order_by").default_value(json!("modifiedTime desc")),
                ]),
                route(&self, |drive, args| async move {
                    drive
                        .list_drive_files(
                            args.int("page_size")?,
                            args.opt_str("query"),
                            args.str("order_by")?,
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "upload_file_to_drive",
                "Upload a file to Drive",
                InputSchema::new(vec![
                    PropertyDef::string("file_path")
                        .required()
                        .describe("Path to the file on the server"),
                    PropertyDef::string("name")
                        .describe("Name for the file in Drive (defaults to original filename)"),
                    PropertyDef::string("mime_type"),
                    PropertyDef::string("folder_id"),
                ]),
                route(&self, |drive, args| async move {
                    drive
                        .upload_file_to_drive(
                            args.str("file_path")?,
                            args.opt_str("name"),
                            args.opt_str("mime_type"),
                            args.opt_str("folder_id"),
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "delete_drive_file",
                "Delete a file from Drive",
                InputSchema::new(vec![file_id()]),
                route(&self, |drive, args| async move {
                    drive.delete_drive_file(args.str("file_id")?).await
                }),
            ),
            ToolDescriptor::new(
                "share_drive_file",
                "Share a file with permissions",
                InputSchema::new(vec![
                    file_id(),
                    PropertyDef::string("email").required(),
                    PropertyDef::string("role")
                        .describe("Permission role (reader, writer, commenter)")
                        .default_value(json!("reader")),
                    PropertyDef::boolean("send_notification").default_value(json!(true)),
                ]),
                route(&self, |drive, args| async move {
                    drive
                        .share_drive_file(
                            args.str("file_id")?,
                            args.str("email")?,
                            args.str("role")?,
                            args.bool("send_notification")?,
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "copy_drive_file",
                "Make a copy of a file",
                InputSchema::new(vec![
                    file_id(),
                    PropertyDef::string("new_name").required(),
                    PropertyDef::string("folder_id"),
                ]),
                route(&self, |drive, args| async move {
                    drive
                        .copy_drive_file(
                            args.str("file_id")?,
                            args.str("new_name")?,
                            args.opt_str("folder_id"),
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "move_drive_file",
                "Move a file to different location",
                InputSchema::new(vec![
                    file_id(),
                    PropertyDef::string("new_folder_id").required(),
                    PropertyDef::string("old_folder_id"),
                ]),
                route(&self, |drive, args| async move {
                    drive
                        .move_drive_file(
                            args.str("file_id")?,
                            args.str("new_folder_id")?,
                            args.opt_str("old_folder_id"),
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "create_drive_folder",
                "Create a new folder",
                InputSchema::new(vec![
                    PropertyDef::string("name").required(),
                    PropertyDef::string("parent_folder_id"),
                ]),
                route(&self, |drive, args| async move {
                    drive
                        .create_drive_folder(args.str("name")?, args.opt_str("parent_folder_id"))
                        .await
                }),
            ),
            ToolDescriptor::new(
                "search_drive_files",
                "Search for files by name/type",
                InputSchema::new(vec![
                    PropertyDef::string("search_term").required(),
                    PropertyDef::string("file_type").describe("Optional MIME type filter"),
                ]),
                route(&self, |drive, args| async move {
                    drive
                        .search_drive_files(args.str("search_term")?, args.opt_str("file_type"))
                        .await
                }),
            ),
        ]
    }
}
