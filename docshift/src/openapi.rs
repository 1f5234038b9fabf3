//! OpenAPI documentation for the HTTP API, served by Scalar at `/docs`.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health,
        api::handlers::files::upload_file,
        api::handlers::files::download_file,
        api::handlers::files::get_file_info,
        api::handlers::process::process_file,
        api::handlers::share::share_via_email,
        api::handlers::cleanup::cleanup,
        api::handlers::assistant::health,
        api::handlers::assistant::upload_workbook,
        api::handlers::assistant::download_workbook,
        api::handlers::assistant::status,
        api::handlers::assistant::chat,
    ),
    components(
        schemas(
            api::models::health::HealthResponse,
            api::models::health::HealthServices,
            api::models::files::UploadResponse,
            api::models::files::UploadedFileInfo,
            api::models::files::FileInfoResponse,
            api::models::process::ProcessRequest,
            api::models::process::ProcessResponse,
            api::models::process::ProcessOutput,
            api::models::share::EmailShareRequest,
            api::models::share::EmailShareResponse,
            api::models::cleanup::CleanupRequest,
            api::models::cleanup::CleanupResponse,
            api::models::assistant::AssistantHealth,
            api::models::assistant::AssistantReply,
            api::models::assistant::ChatRequest,
            api::models::assistant::ChatResponse,
            api::models::assistant::WorkbookStatus,
            crate::storage::FileMetadata,
            crate::share::ShareLinks,
            crate::convert::DocumentKind,
            crate::convert::Action,
            crate::convert::SpreadsheetInfo,
            crate::convert::DocumentInfo,
            crate::convert::WordExportOptions,
            crate::convert::SpreadsheetExportOptions,
        )
    ),
    tags(
        (name = "files", description = "Upload source files, download converted files and read their metadata.

Uploads are limited to `.xlsx`, `.xls`, `.docx` and `.pdf`. Stored names are sanitized to ASCII letters, digits, `.`, `-` and `_`."),
        (name = "conversion", description = "Convert an uploaded file into another format.

Supported actions:
- **excel_to_word**: the first sheet becomes a table in a `.docx`
- **word_to_excel**: tables, paragraphs and headings become sheets in an `.xlsx`
- **excel_to_csv**: the first sheet as UTF-8 CSV
- **excel_to_json**: the first sheet as an array of row objects"),
        (name = "sharing", description = "Build links for handing a converted file to someone else."),
        (name = "maintenance", description = "Remove old uploads and outputs. A background janitor does the same on a schedule when enabled."),
        (name = "health", description = "Liveness and service status."),
        (name = "assistant", description = "Edit a single active workbook through short chat commands.

Upload a workbook, send commands such as `put 100 in Sheet1 A1` or `delete row 3 in Sheet1`, then download the result."),
    ),
    info(
        title = "Document conversion API",
        description = "Convert spreadsheets and Word documents, share the results, and edit workbooks through a chat assistant.

## Errors

Errors return a JSON body with an `error` field:

```json
{ \"error\": \"File not found\" }
```

Assistant endpoints answer with a `reply` field instead, so clients can show the text in the conversation.",
    ),
)]
pub struct ApiDoc;
