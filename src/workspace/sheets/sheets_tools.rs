// =============================================================================
// GOOGLE SHEETS TOOLS
// =============================================================================
//
// Cell values go through `spreadsheets/{id}/values/{range}`; structural edits
// (rows, columns, formatting) are `spreadsheets/{id}:batchUpdate` requests.
// Ranges are A1 notation and are passed through untouched.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::support::{required_str, route, RemoteAction, RemoteResultExt};
use crate::core::services::{ApiMethod, ServiceClient, ServiceClientFactory, ServiceFamily};
use crate::core::tools::{InputSchema, PropertyDef, ToolDescriptor, ToolError};

const GET: RemoteAction = RemoteAction::new("Error getting sheet data", "get sheet data");
const CREATE: RemoteAction = RemoteAction::new("Error creating spreadsheet", "create spreadsheet");
const UPDATE: RemoteAction = RemoteAction::new("Error updating sheet data", "update sheet data");
const APPEND: RemoteAction = RemoteAction::new("Error appending sheet data", "append sheet data");
const CLEAR: RemoteAction = RemoteAction::new("Error clearing sheet range", "clear range");
const ADD_ROWS: RemoteAction = RemoteAction::new("Error adding sheet rows", "add rows");
const ADD_COLUMNS: RemoteAction = RemoteAction::new("Error adding sheet columns", "add columns");
const DELETE_ROWS: RemoteAction = RemoteAction::new("Error deleting sheet rows", "delete rows");
const DELETE_COLUMNS: RemoteAction =
    RemoteAction::new("Error deleting sheet columns", "delete columns");
const FORMAT: RemoteAction = RemoteAction::new("Error formatting sheet cells", "format cells");

const USER_ENTERED: &str = "USER_ENTERED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Rows,
    Columns,
}

impl Dimension {
    fn as_api(self) -> &'static str {
        match self {
            Dimension::Rows => "ROWS",
            Dimension::Columns => "COLUMNS",
        }
    }
}

/// Zero-based, end-exclusive cell block on one sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRange {
    pub sheet_id: i64,
    pub start_row: i64,
    pub end_row: i64,
    pub start_col: i64,
    pub end_col: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellFormat {
    /// RGB(A) color with components between 0 and 1.
    pub background_color: Option<Map<String, Value>>,
    pub text_color: Option<Map<String, Value>>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
}

impl CellFormat {
    /// The `userEnteredFormat` object and the top-level keys it sets.
    fn to_request(&self) -> (Value, Vec<&'static str>) {
        let mut format = Map::new();
        let mut fields = Vec::new();

        // An empty color object means "no color", not "reset to default".
        if let Some(color) = self.background_color.as_ref().filter(|c| !c.is_empty()) {
            format.insert("backgroundColor".to_string(), Value::Object(color.clone()));
            fields.push("backgroundColor");
        }

        let text_color = self.text_color.as_ref().filter(|c| !c.is_empty());
        if text_color.is_some() || self.bold.is_some() || self.italic.is_some() {
            let mut text = Map::new();
            if let Some(color) = text_color {
                text.insert("foregroundColor".to_string(), Value::Object(color.clone()));
            }
            if let Some(bold) = self.bold {
                text.insert("bold".to_string(), json!(bold));
            }
            if let Some(italic) = self.italic {
                text.insert("italic".to_string(), json!(italic));
            }
            format.insert("textFormat".to_string(), Value::Object(text));
            fields.push("textFormat");
        }

        (Value::Object(format), fields)
    }
}

pub struct SheetsTools {
    clients: Arc<ServiceClientFactory>,
}

impl SheetsTools {
    pub fn new(clients: Arc<ServiceClientFactory>) -> Self {
        Self { clients }
    }

    async fn sheets(&self) -> Result<Arc<ServiceClient>, ToolError> {
        Ok(self.clients.client(ServiceFamily::Spreadsheets).await?)
    }

    async fn batch_update(
        &self,
        spreadsheet_id: &str,
        request: Value,
        action: RemoteAction,
    ) -> Result<Value, ToolError> {
        let sheets = self.sheets().await?;
        sheets
            .send(
                sheets
                    .request(ApiMethod::Post)
                    .segment(format!("{}:batchUpdate", spreadsheet_id))
                    .json(json!({ "requests": [request] })),
            )
            .await
            .or_fail(action)
    }

    pub async fn get_sheet_data(
        &self,
        spreadsheet_id: &str,
        range_name: &str,
    ) -> Result<Value, ToolError> {
        let sheets = self.sheets().await?;
        let result = sheets
            .send(
                sheets
                    .request(ApiMethod::Get)
                    .segment(spreadsheet_id)
                    .segment("values")
                    .segment(range_name),
            )
            .await
            .or_fail(GET)?;

        let values = result.get("values").cloned().unwrap_or_else(|| json!([]));
        let row_count = values.as_array().map(Vec::len).unwrap_or(0);
        Ok(json!({
            "spreadsheet_id": spreadsheet_id,
            "range": result.get("range").and_then(Value::as_str).unwrap_or(""),
            "values": values,
            "row_count": row_count,
        }))
    }

    pub async fn create_spreadsheet(&self, title: &str) -> Result<Value, ToolError> {
        let sheets = self.sheets().await?;
        let result = sheets
            .send(
                sheets
                    .request(ApiMethod::Post)
                    .json(json!({ "properties": { "title": title } })),
            )
            .await
            .or_fail(CREATE)?;

        Ok(json!({
            "spreadsheet_id": required_str(&result, "spreadsheetId").or_fail(CREATE)?,
            "title": title,
            "url": required_str(&result, "spreadsheetUrl").or_fail(CREATE)?,
        }))
    }

    pub async fn update_sheet_data(
        &self,
        spreadsheet_id: &str,
        range_name: &str,
        values: &Value,
    ) -> Result<Value, ToolError> {
        let sheets = self.sheets().await?;
        let result = sheets
            .send(
                sheets
                    .request(ApiMethod::Put)
                    .segment(spreadsheet_id)
                    .segment("values")
                    .segment(range_name)
                    .query("valueInputOption", USER_ENTERED)
                    .json(json!({ "values": values })),
            )
            .await
            .or_fail(UPDATE)?;

        Ok(json!({
            "spreadsheet_id": spreadsheet_id,
            "updated_range": result.get("updatedRange").and_then(Value::as_str).unwrap_or(""),
            "updated_rows": count(&result, "updatedRows"),
            "updated_columns": count(&result, "updatedColumns"),
            "updated_cells": count(&result, "updatedCells"),
        }))
    }

    pub async fn append_sheet_data(
        &self,
        spreadsheet_id: &str,
        range_name: &str,
        values: &Value,
    ) -> Result<Value, ToolError> {
        let sheets = self.sheets().await?;
        let result = sheets
            .send(
                sheets
                    .request(ApiMethod::Post)
                    .segment(spreadsheet_id)
                    .segment("values")
                    .segment(format!("{}:append", range_name))
                    .query("valueInputOption", USER_ENTERED)
                    .query("insertDataOption", "INSERT_ROWS")
                    .json(json!({ "values": values })),
            )
            .await
            .or_fail(APPEND)?;

        let updates = &result["updates"];
        Ok(json!({
            "spreadsheet_id": spreadsheet_id,
            "updated_range": updates["updatedRange"].as_str().unwrap_or(""),
            "updated_rows": count(updates, "updatedRows"),
            "updated_cells": count(updates, "updatedCells"),
        }))
    }

    pub async fn clear_sheet_range(
        &self,
        spreadsheet_id: &str,
        range_name: &str,
    ) -> Result<Value, ToolError> {
        let sheets = self.sheets().await?;
        let result = sheets
            .send(
                sheets
                    .request(ApiMethod::Post)
                    .segment(spreadsheet_id)
                    .segment("values")
                    .segment(format!("{}:clear", range_name))
                    .json(json!({})),
            )
            .await
            .or_fail(CLEAR)?;

        Ok(json!({
            "spreadsheet_id": spreadsheet_id,
            "cleared_range": result.get("clearedRange").and_then(Value::as_str).unwrap_or(""),
            "status": "success",
        }))
    }

    pub async fn insert_dimension(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        dimension: Dimension,
        start_index: i64,
        count: i64,
    ) -> Result<Value, ToolError> {
        let (action, counted) = match dimension {
            Dimension::Rows => (ADD_ROWS, "rows_inserted"),
            Dimension::Columns => (ADD_COLUMNS, "columns_inserted"),
        };
        let end_index = start_index.checked_add(count).ok_or_else(|| {
            action.reject(format!(
                "start_index {} plus count {} is out of range",
                start_index, count
            ))
        })?;

        self.batch_update(
            spreadsheet_id,
            json!({
                "insertDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": dimension.as_api(),
                        "startIndex": start_index,
                        "endIndex": end_index,
                    },
                    "inheritFromBefore": false,
                }
            }),
            action,
        )
        .await?;

        let mut result = json!({
            "spreadsheet_id": spreadsheet_id,
            "sheet_id": sheet_id,
            "start_index": start_index,
            "status": "success",
        });
        result[counted] = json!(count);
        Ok(result)
    }

    pub async fn delete_dimension(
        &self,
        spreadsheet_id: &str,
        sheet_id: i64,
        dimension: Dimension,
        start_index: i64,
        end_index: i64,
    ) -> Result<Value, ToolError> {
        let (action, counted) = match dimension {
            Dimension::Rows => (DELETE_ROWS, "rows_deleted"),
            Dimension::Columns => (DELETE_COLUMNS, "columns_deleted"),
        };
        let deleted = end_index.checked_sub(start_index).ok_or_else(|| {
            action.reject(format!(
                "range {}..{} is out of range",
                start_index, end_index
            ))
        })?;

        self.batch_update(
            spreadsheet_id,
            json!({
                "deleteDimension": {
                    "range": {
                        "sheetId": sheet_id,
                        "dimension": dimension.as_api(),
                        "startIndex": start_index,
                        "endIndex": end_index,
                    }
                }
            }),
            action,
        )
        .await?;

        let mut result = json!({
            "spreadsheet_id": spreadsheet_id,
            "sheet_id": sheet_id,
            "status": "success",
        });
        result[counted] = json!(deleted);
        Ok(result)
    }

    pub async fn format_sheet_cells(
        &self,
        spreadsheet_id: &str,
        range: GridRange,
        format: &CellFormat,
    ) -> Result<Value, ToolError> {
        let (cell_format, fields) = format.to_request();

        self.batch_update(
            spreadsheet_id,
            json!({
                "repeatCell": {
                    "range": {
                        "sheetId": range.sheet_id,
                        "startRowIndex": range.start_row,
                        "endRowIndex": range.end_row,
                        "startColumnIndex": range.start_col,
                        "endColumnIndex": range.end_col,
                    },
                    "cell": { "userEnteredFormat": cell_format },
                    "fields": format!("userEnteredFormat({})", fields.join(",")),
                }
            }),
            FORMAT,
        )
        .await?;

        Ok(json!({
            "spreadsheet_id": spreadsheet_id,
            "sheet_id": range.sheet_id,
            "formatted_range": format!(
                "R{}C{}:R{}C{}",
                range.start_row, range.start_col, range.end_row, range.end_col
            ),
            "status": "success",
        }))
    }

    // =========================================================================
    // TOOL DESCRIPTORS
    // =========================================================================

    pub fn descriptors(self: Arc<Self>) -> Vec<ToolDescriptor> {
        let spreadsheet_id = || PropertyDef::string("spreadsheet_id").required();
        let range_name = || {
            PropertyDef::string("range_name")
                .required()
                .describe("A1 notation (e.g., 'Sheet1!A1:D10')")
        };
        let sheet_id = || {
            PropertyDef::integer("sheet_id")
                .required()
                .describe("The ID of the sheet (0 for first sheet)")
        };
        let dimension_schema = |last: &str| {
            InputSchema::new(vec![
                spreadsheet_id(),
                sheet_id(),
                PropertyDef::integer("start_index").required(),
                PropertyDef::integer(last).required(),
            ])
        };

        vec![
            ToolDescriptor::new(
                "get_sheet_data",
                "Get data from a spreadsheet range",
                InputSchema::new(vec![spreadsheet_id(), range_name()]),
                route(&self, |sheets, args| async move {
                    sheets
                        .get_sheet_data(args.str("spreadsheet_id")?, args.str("range_name")?)
                        .await
                }),
            ),
            ToolDescriptor::new(
                "create_spreadsheet",
                "Create a new Google Spreadsheet",
                InputSchema::new(vec![PropertyDef::string("title").required()]),
                route(&self, |sheets, args| async move {
                    sheets.create_spreadsheet(args.str("title")?).await
                }),
            ),
            ToolDescriptor::new(
                "update_sheet_data",
                "Update specific cells/ranges in a sheet",
                InputSchema::new(vec![
                    spreadsheet_id(),
                    range_name(),
                    PropertyDef::rows("values").required(),
                ]),
                route(&self, |sheets, args| async move {
                    sheets
                        .update_sheet_data(
                            args.str("spreadsheet_id")?,
                            args.str("range_name")?,
                            args.value("values")?,
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "append_sheet_data",
                "Add new rows to a sheet",
                InputSchema::new(vec![
                    spreadsheet_id(),
                    range_name(),
                    PropertyDef::rows("values").required(),
                ]),
                route(&self, |sheets, args| async move {
                    sheets
                        .append_sheet_data(
                            args.str("spreadsheet_id")?,
                            args.str("range_name")?,
                            args.value("values")?,
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "clear_sheet_range",
                "Clear content from a range",
                InputSchema::new(vec![spreadsheet_id(), range_name()]),
                route(&self, |sheets, args| async move {
                    sheets
                        .clear_sheet_range(args.str("spreadsheet_id")?, args.str("range_name")?)
                        .await
                }),
            ),
            ToolDescriptor::new(
                "add_sheet_rows",
                "Insert new rows",
                dimension_schema("count"),
                route(&self, |sheets, args| async move {
                    sheets
                        .insert_dimension(
                            args.str("spreadsheet_id")?,
                            args.int("sheet_id")?,
                            Dimension::Rows,
                            args.int("start_index")?,
                            args.int("count")?,
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "add_sheet_columns",
                "Insert new columns",
                dimension_schema("count"),
                route(&self, |sheets, args| async move {
                    sheets
                        .insert_dimension(
                            args.str("spreadsheet_id")?,
                            args.int("sheet_id")?,
                            Dimension::Columns,
                            args.int("start_index")?,
                            args.int("count")?,
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "delete_sheet_rows",
                "Delete rows from a sheet",
                dimension_schema("end_index"),
                route(&self, |sheets, args| async move {
                    sheets
                        .delete_dimension(
                            args.str("spreadsheet_id")?,
                            args.int("sheet_id")?,
                            Dimension::Rows,
                            args.int("start_index")?,
                            args.int("end_index")?,
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "delete_sheet_columns",
                "Delete columns from a sheet",
                dimension_schema("end_index"),
                route(&self, |sheets, args| async move {
                    sheets
                        .delete_dimension(
                            args.str("spreadsheet_id")?,
                            args.int("sheet_id")?,
                            Dimension::Columns,
                            args.int("start_index")?,
                            args.int("end_index")?,
                        )
                        .await
                }),
            ),
            ToolDescriptor::new(
                "format_sheet_cells",
                "Apply formatting to cells",
                InputSchema::new(vec![
                    spreadsheet_id(),
                    sheet_id(),
                    PropertyDef::integer("start_row").required(),
                    PropertyDef::integer("end_row").required(),
                    PropertyDef::integer("start_col").required(),
                    PropertyDef::integer("end_col").required(),
                    PropertyDef::object("background_color")
                        .describe("RGB color with values between 0 and 1"),
                    PropertyDef::object("text_color")
                        .describe("RGB color with values between 0 and 1"),
                    PropertyDef::boolean("bold"),
                    PropertyDef::boolean("italic"),
                ]),
                route(&self, |sheets, args| async move {
                    let range = GridRange {
                        sheet_id: args.int("sheet_id")?,
                        start_row: args.int("start_row")?,
                        end_row: args.int("end_row")?,
                        start_col: args.int("start_col")?,
                        end_col: args.int("end_col")?,
                    };
                    let format = CellFormat {
                        background_color: args.opt_object("background_color").cloned(),
                        text_color: args.opt_object("text_color").cloned(),
                        bold: args.opt_bool("bold"),
                        italic: args.opt_bool("italic"),
                    };
                    sheets
                        .format_sheet_cells(args.str("spreadsheet_id")?, range, &format)
                        .await
                }),
            ),
        ]
    }
}

fn count(response: &Value, key: &str) -> i64 {
    response.get(key).and_then(Value::as_i64).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::services::{ApiBody, ServiceError};
    use crate::test_support::{factory_with, RecordingTransport};

    fn sheets(transport: &Arc<RecordingTransport>) -> SheetsTools {
        SheetsTools::new(factory_with(Arc::clone(transport)))
    }

    fn json_body(body: ApiBody) -> Value {
        match body {
            ApiBody::Json(value) => value,
            other => panic!("expected a JSON body, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reading_an_empty_range_reports_no_rows() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(json!({"range": "Sheet1!A1:D10", "majorDimension": "ROWS"}));

        let result = sheets(&transport)
            .get_sheet_data("S1", "Sheet1!A1:D10")
            .await
            .unwrap();

        assert_eq!(
            result,
            json!({"spreadsheet_id": "S1", "range": "Sheet1!A1:D10", "values": [], "row_count": 0})
        );
        assert_eq!(
            transport.last_request().path,
            vec!["S1", "values", "Sheet1!A1:D10"]
        );
    }

    #[tokio::test]
    async fn updates_are_user_entered() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(json!({
            "updatedRange": "Sheet1!A1:B2",
            "updatedRows": 2,
            "updatedColumns": 2,
            "updatedCells": 4
        }));
        let values = json!([["a", 1], ["=SUM(B1)", true]]);

        let result = sheets(&transport)
            .update_sheet_data("S1", "Sheet1!A1:B2", &values)
            .await
            .unwrap();

        assert_eq!(result["updated_cells"], 4);
        let request = transport.last_request();
        assert_eq!(request.method, ApiMethod::Put);
        assert_eq!(request.query_value("valueInputOption"), Some("USER_ENTERED"));
        assert_eq!(json_body(request.body), json!({"values": values}));
    }

    #[tokio::test]
    async fn appends_insert_rows_and_read_nested_updates() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(json!({
            "tableRange": "Sheet1!A1:B3",
            "updates": {"updatedRange": "Sheet1!A4:B4", "updatedRows": 1, "updatedCells": 2}
        }));

        let result = sheets(&transport)
            .append_sheet_data("S1", "Sheet1!A:B", &json!([["x", "y"]]))
            .await
            .unwrap();

        assert_eq!(
            result,
            json!({"spreadsheet_id": "S1", "updated_range": "Sheet1!A4:B4", "updated_rows": 1, "updated_cells": 2})
        );
        let request = transport.last_request();
        assert_eq!(request.path.last().map(String::as_str), Some("Sheet1!A:B:append"));
        assert_eq!(request.query_value("insertDataOption"), Some("INSERT_ROWS"));
    }

    #[tokio::test]
    async fn inserting_rows_spans_count_from_start() {
        let transport = Arc::new(RecordingTransport::new());

        let result = sheets(&transport)
            .insert_dimension("S1", 0, Dimension::Rows, 3, 2)
            .await
            .unwrap();

        assert_eq!(result["rows_inserted"], 2);
        assert_eq!(result["start_index"], 3);
        let request = transport.last_request();
        assert_eq!(request.path, vec!["S1:batchUpdate"]);
        assert_eq!(
            json_body(request.body)["requests"][0],
            json!({"insertDimension": {
                "range": {"sheetId": 0, "dimension": "ROWS", "startIndex": 3, "endIndex": 5},
                "inheritFromBefore": false
            }})
        );
    }

    #[tokio::test]
    async fn deleting_columns_reports_the_span() {
        let transport = Arc::new(RecordingTransport::new());

        let result = sheets(&transport)
            .delete_dimension("S1", 7, Dimension::Columns, 1, 4)
            .await
            .unwrap();

        assert_eq!(
            result,
            json!({"spreadsheet_id": "S1", "sheet_id": 7, "columns_deleted": 3, "status": "success"})
        );
    }

    #[tokio::test]
    async fn cell_format_lists_the_fields_it_sets() {
        let transport = Arc::new(RecordingTransport::new());
        let color = json!({"red": 1.0, "green": 0.5, "blue": 0.0});
        let format = CellFormat {
            background_color: color.as_object().cloned(),
            bold: Some(true),
            ..CellFormat::default()
        };
        let range = GridRange {
            sheet_id: 0,
            start_row: 0,
            end_row: 1,
            start_col: 0,
            end_col: 3,
        };

        let result = sheets(&transport)
            .format_sheet_cells("S1", range, &format)
            .await
            .unwrap();

        assert_eq!(result["formatted_range"], "R0C0:R1C3");
        let body = json_body(transport.last_request().body);
        let repeat = &body["requests"][0]["repeatCell"];
        assert_eq!(repeat["fields"], "userEnteredFormat(backgroundColor,textFormat)");
        assert_eq!(
            repeat["cell"]["userEnteredFormat"],
            json!({"backgroundColor": color, "textFormat": {"bold": true}})
        );
    }

    #[test]
    fn empty_colors_are_ignored() {
        let format = CellFormat {
            background_color: Some(Map::new()),
            text_color: Some(Map::new()),
            ..CellFormat::default()
        };

        let (value, fields) = format.to_request();

        assert_eq!(value, json!({}));
        assert!(fields.is_empty());
    }

    #[tokio::test]
    async fn missing_spreadsheet_id_in_create_response_is_a_failure() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(json!({"properties": {"title": "Budget"}}));

        let err = sheets(&transport).create_spreadsheet("Budget").await.unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to create spreadsheet: invalid response: response is missing 'spreadsheetId'"
        );
    }

    #[tokio::test]
    async fn update_failure_is_reported_with_its_action() {
        let transport = Arc::new(RecordingTransport::new());
        transport.fail(ServiceError::Http {
            status: 400,
            message: "Unable to parse range: Nope!A1".to_string(),
        });

        let err = sheets(&transport)
            .update_sheet_data("S1", "Nope!A1", &json!([[1]]))
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Failed to update sheet data: HTTP 400: Unable to parse range: Nope!A1"
        );
    }

    #[tokio::test]
    async fn creating_a_spreadsheet_returns_its_id_and_url() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(json!({
            "spreadsheetId": "S9",
            "spreadsheetUrl": "https://docs.google.com/spreadsheets/d/S9/edit",
            "properties": {"title": "Budget"}
        }));

        let result = sheets(&transport).create_spreadsheet("Budget").await.unwrap();

        assert_eq!(
            result,
            json!({
                "spreadsheet_id": "S9",
                "title": "Budget",
                "url": "https://docs.google.com/spreadsheets/d/S9/edit"
            })
        );
        let request = transport.last_request();
        assert_eq!(request.method, ApiMethod::Post);
        assert!(request.path.is_empty());
        assert_eq!(json_body(request.body), json!({"properties": {"title": "Budget"}}));
    }

    #[tokio::test]
    async fn clearing_a_range_posts_to_the_clear_endpoint() {
        let transport = Arc::new(RecordingTransport::new());
        transport.respond(json!({"spreadsheetId": "S1", "clearedRange": "Sheet1!A1:C3"}));

        let result = sheets(&transport)
            .clear_sheet_range("S1", "Sheet1!A1:C3")
            .await
            .unwrap();

        assert_eq!(
            result,
            json!({"spreadsheet_id": "S1", "cleared_range": "Sheet1!A1:C3", "status": "success"})
        );
        let request = transport.last_request();
        assert_eq!(request.method, ApiMethod::Post);
        assert_eq!(request.path, vec!["S1", "values", "Sheet1!A1:C3:clear"]);
        assert_eq!(json_body(request.body), json!({}));
    }

    #[tokio::test]
    async fn overflowing_insert_is_rejected_before_any_request() {
        let transport = Arc::new(RecordingTransport::new());

        let err = sheets(&transport)
            .insert_dimension("S1", 0, Dimension::Rows, i64::MAX, 1)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Failed to add rows: "));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn overflowing_delete_is_rejected_before_any_request() {
        let transport = Arc::new(RecordingTransport::new());

        let err = sheets(&transport)
            .delete_dimension("S1", 0, Dimension::Rows, i64::MIN, 1)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Failed to delete rows: "));
        assert!(transport.requests().is_empty());
    }
}
