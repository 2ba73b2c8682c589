// src/pagination.rs

//! Translates client paging parameters into store requests and back.

use crate::{
    error::AppError,
    models::response::{StatsPage, StatsRequest, StatsResponse},
    utils::cursor::CursorCipher,
};

/// Used when the client asks for zero or a negative number of records.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

pub const MAX_PAGE_SIZE: u32 = 100;

/// Builds a statistics request from the raw query parameters.
///
/// * A non-numeric page size is rejected before the cursor is looked at.
/// * An empty cursor string means the first page and is never decrypted.
/// * A cursor that fails to decrypt is a client error, not "no cursor".
pub fn prepare_stats_request(
    quiz_id: &str,
    page_cursor: &str,
    page_size: &str,
    cipher: &dyn CursorCipher,
) -> Result<StatsRequest, AppError> {
    let requested: i64 = page_size
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidInput(format!("Invalid page size '{page_size}'")))?;

    let page_size = if requested <= 0 {
        DEFAULT_PAGE_SIZE
    } else {
        requested.min(MAX_PAGE_SIZE as i64) as u32
    };

    let cursor = if page_cursor.is_empty() {
        None
    } else {
        let bytes = cipher.decrypt_from_string(page_cursor).map_err(|e| {
            tracing::debug!(error = %e, "Rejected page cursor");
            AppError::InvalidInput("Invalid page cursor".to_string())
        })?;
        Some(bytes)
    };

    Ok(StatsRequest {
        quiz_id: quiz_id.to_owned(),
        cursor,
        page_size,
    })
}

/// Packages a store page for the client, encrypting the continuation cursor.
pub fn prepare_stats_response(
    page: StatsPage,
    quiz_id: &str,
    cipher: &dyn CursorCipher,
) -> Result<StatsResponse, AppError> {
    let page_cursor = match page.cursor.as_deref() {
        Some(cursor) if !cursor.is_empty() => cipher.encrypt_to_string(cursor).map_err(|e| {
            tracing::error!(error = %e, "Failed to encrypt page cursor");
            AppError::Internal("Failed to encrypt page cursor".to_string())
        })?,
        _ => String::new(),
    };

    // A terminal page never advertises a size.
    let next = if page_cursor.is_empty() {
        None
    } else if page.page_size > 0 {
        Some(format!(
            "pageCursor={}&pageSize={}",
            page_cursor, page.page_size
        ))
    } else {
        Some(format!("pageCursor={page_cursor}"))
    };

    Ok(StatsResponse {
        quiz_id: quiz_id.to_owned(),
        total: page.records.len(),
        records: page.records,
        page_cursor,
        next,
    })
}
