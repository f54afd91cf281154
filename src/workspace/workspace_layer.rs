// The workspace module holds the domain adapters: one per Google service,
// each exposing its operations as tools, plus the catalog that registers
// them all.

#[path = "adapter_support.rs"]
mod support;

#[path = "docs/docs_tools.rs"]
pub mod docs;

#[path = "sheets/sheets_tools.rs"]
pub mod sheets;

#[path = "drive/drive_tools.rs"]
pub mod drive;

#[path = "catalog.rs"]
pub mod catalog;
