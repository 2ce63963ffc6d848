use super::error::ClientError;
use super::http::{ApiRequest, AuthenticatedClient, MultipartField};
use crate::types::Watchlist;

/// Spreadsheet imports under `/upload/excel`.
#[derive(Clone)]
pub struct UploadApi {
    client: AuthenticatedClient,
}

fn mime_for(filename: &str) -> &'static str {
    let lower = filename.to_lowercase();
    if lower.ends_with(".csv") {
        "text/csv"
    } else if lower.ends_with(".xls") {
        "application/vnd.ms-excel"
    } else if lower.ends_with(".xlsx") {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    } else {
        "application/octet-stream"
    }
}

fn file_field(filename: &str, bytes: Vec<u8>) -> MultipartField {
    MultipartField::File {
        name: "file".to_string(),
        filename: filename.to_string(),
        bytes,
        mime: Some(mime_for(filename).to_string()),
    }
}

impl UploadApi {
    pub fn new(client: AuthenticatedClient) -> Self {
        Self { client }
    }

    /// Create a new watchlist from the symbols in a spreadsheet.
    pub async fn upload_spreadsheet(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        watchlist_name: Option<&str>,
    ) -> Result<Watchlist, ClientError> {
        let mut fields = vec![file_field(filename, bytes)];
        if let Some(name) = watchlist_name {
            fields.push(MultipartField::Text {
                name: "watchlist_name".to_string(),
                value: name.to_string(),
            });
        }
        let req = ApiRequest::post(&["upload", "excel"]).multipart(fields);
        self.client.send_json(req).await
    }

    /// Merge a spreadsheet's symbols into an existing watchlist.
    pub async fn append_spreadsheet(
        &self,
        watchlist_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<Watchlist, ClientError> {
        let req = ApiRequest::post(&["upload", "excel", "append", watchlist_id])
            .multipart(vec![file_field(filename, bytes)]);
        self.client.send_json(req).await
    }
}
