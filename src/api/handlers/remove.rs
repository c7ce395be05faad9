//! `POST /remove-background`

use axum::{
    extract::{multipart::Field, Multipart, Query, State},
    response::Response,
    Extension,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

use crate::credentials::Principal;
use crate::error::{AppError, Result};
use crate::imaging::{check_extension, MattingParams};
use crate::pipeline::{ModelHint, RemovalOptions};
use crate::response::{parse_bool, removal_response, ResponseFormat};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RemoveQuery {
    pub return_json: Option<String>,
}

/// Raw multipart fields before validation
#[derive(Debug, Default)]
struct RemovalForm {
    file: Option<Vec<u8>>,
    filename: Option<String>,
    model_hint: Option<String>,
    enhance_quality: Option<String>,
    refine_edges: Option<String>,
    alpha_matting: Option<String>,
    foreground_threshold: Option<String>,
    background_threshold: Option<String>,
    erode_size: Option<String>,
    return_json: Option<String>,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    AppError::InvalidRequest(format!("Malformed multipart body: {}", e))
}

async fn read_file(mut field: Field<'_>, max_bytes: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if data.len() + chunk.len() > max_bytes {
            return Err(AppError::InvalidRequest(format!(
                "File too large. Maximum size is {} MB",
                max_bytes / (1024 * 1024)
            )));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

fn parse_flag(value: Option<&str>, default: bool) -> Result<bool> {
    value.map(parse_bool).transpose().map(|v| v.unwrap_or(default))
}

fn parse_number<T: FromStr>(field: &str, value: Option<&str>, default: T) -> Result<T> {
    match value.map(str::trim) {
        None | Some("") => Ok(default),
        Some(v) => v
            .parse()
            .map_err(|_| AppError::InvalidRequest(format!("Invalid value '{}' for {}", v, field))),
    }
}

impl RemovalForm {
    async fn read(multipart: &mut Multipart, max_bytes: usize) -> Result<Self> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "file" {
                form.filename = field.file_name().map(str::to_string);
                form.file = Some(read_file(field, max_bytes).await?);
                continue;
            }

            let value = field.text().await.map_err(multipart_error)?;
            let slot = match name.as_str() {
                "model_hint" => &mut form.model_hint,
                "enhance_quality" => &mut form.enhance_quality,
                "refine_edges" => &mut form.refine_edges,
                "alpha_matting" => &mut form.alpha_matting,
                "alpha_matting_foreground_threshold" => &mut form.foreground_threshold,
                "alpha_matting_background_threshold" => &mut form.background_threshold,
                "alpha_matting_erode_size" => &mut form.erode_size,
                "return_json" => &mut form.return_json,
                other => {
                    debug!(field = other, "Ignoring unknown form field");
                    continue;
                }
            };
            *slot = Some(value);
        }

        Ok(form)
    }

    fn options(&self, defaults: RemovalOptions) -> Result<RemovalOptions> {
        let alpha_matting = if parse_flag(self.alpha_matting.as_deref(), false)? {
            let base = MattingParams::default();
            Some(MattingParams {
                foreground_threshold: parse_number(
                    "alpha_matting_foreground_threshold",
                    self.foreground_threshold.as_deref(),
                    base.foreground_threshold,
                )?,
                background_threshold: parse_number(
                    "alpha_matting_background_threshold",
                    self.background_threshold.as_deref(),
                    base.background_threshold,
                )?,
                erode_size: parse_number("alpha_matting_erode_size", self.erode_size.as_deref(), base.erode_size)?,
            })
        } else {
            None
        };

        Ok(RemovalOptions {
            model_hint: ModelHint::parse(self.model_hint.as_deref())?,
            enhance_quality: parse_flag(self.enhance_quality.as_deref(), defaults.enhance_quality)?,
            refine_edges: parse_flag(self.refine_edges.as_deref(), defaults.refine_edges)?,
            alpha_matting,
        })
    }
}

pub async fn remove_background(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<RemoveQuery>,
    mut multipart: Multipart,
) -> Result<Response> {
    let config = state.remover.config();
    let mut form = RemovalForm::read(&mut multipart, config.max_upload_bytes).await?;

    let file = form
        .file
        .take()
        .ok_or_else(|| AppError::InvalidRequest("No file uploaded. Send the image in the 'file' field".to_string()))?;
    if let Some(filename) = &form.filename {
        check_extension(filename, &config.allowed_extensions)?;
    }

    let options = form.options(RemovalOptions::from_config(config))?;
    let format = ResponseFormat::from_flag(form.return_json.as_deref().or(query.return_json.as_deref()))?;

    debug!(
        credential = %principal.display_name(),
        bytes = file.len(),
        hint = ?options.model_hint,
        "Accepted removal request"
    );

    let output = state.remover.remove_background(file, options).await?;
    Ok(removal_response(
        output,
        format,
        principal.display_name(),
        form.filename.as_deref(),
    ))
}
