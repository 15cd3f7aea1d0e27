use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::Multipart;

use crate::config::Config;
use crate::error::{AppError, Result};

/// A file part lifted out of the multipart stream, validated but not yet
/// written anywhere.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: String,
    pub data: Bytes,
}

/// The parsed submission for create and update requests.
#[derive(Debug, Clone, Default)]
pub struct UserForm {
    pub name: String,
    pub email: String,
    pub photo: Option<UploadedFile>,
}

/// Reads the multipart stream once, collecting the text fields and at most
/// one file under the configured field name. Size and type limits are
/// enforced here, before anything touches storage.
pub async fn parse_user_form(mut multipart: Multipart, config: &Config) -> Result<UserForm> {
    let mut form = UserForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to parse multipart data: {}", e)))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field_name == config.upload_field {
            // A file input left empty still arrives as a part with an empty
            // filename; that counts as "no photo".
            let original_name = match field.file_name() {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => continue,
            };

            if form.photo.is_some() {
                return Err(AppError::Validation(
                    "Only one file upload is allowed".to_string(),
                ));
            }

            let declared = field.content_type().map(|s| s.to_string());
            let data = read_limited(field, config.max_file_size).await?;

            if data.is_empty() {
                continue;
            }

            let content_type = resolve_content_type(declared, &original_name);
            validate_content_type(&content_type, &config.allowed_mime_types)?;

            form.photo = Some(UploadedFile {
                original_name,
                content_type,
                data: Bytes::from(data),
            });
        } else {
            match field_name.as_str() {
                "name" => {
                    form.name = field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read name: {}", e)))?;
                }
                "email" => {
                    form.email = field.text().await.map_err(|e| {
                        AppError::Validation(format!("Failed to read email: {}", e))
                    })?;
                }
                _ => {} // Ignore unknown fields
            }
        }
    }

    Ok(form)
}

/// Accumulates the file part, failing with 413 as soon as the running size
/// passes the cap rather than after buffering the whole body.
async fn read_limited(mut field: Field<'_>, max_file_size: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read file data: {}", e)))?
    {
        if data.len() + chunk.len() > max_file_size {
            return Err(AppError::FileTooLarge {
                size: data.len() + chunk.len(),
                max: max_file_size,
            });
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

/// The part's declared content type, or a guess from the filename when the
/// client sent none. Unguessable falls through to octet-stream, which the
/// allow-list then rejects with a clear message.
fn resolve_content_type(declared: Option<String>, original_name: &str) -> String {
    declared.unwrap_or_else(|| {
        mime_guess::from_path(original_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    })
}

/// Compares on the MIME essence, so `image/jpeg; charset=utf-8` and
/// `IMAGE/JPEG` both match an `image/jpeg` allow-list entry.
pub fn validate_content_type(content_type: &str, allowed: &[String]) -> Result<()> {
    let offered: mime::Mime = content_type
        .parse()
        .map_err(|_| AppError::UnsupportedMediaType(content_type.to_string()))?;

    let permitted = allowed.iter().any(|entry| {
        entry
            .parse::<mime::Mime>()
            .map(|m| m.essence_str() == offered.essence_str())
            .unwrap_or(false)
    });

    if !permitted {
        return Err(AppError::UnsupportedMediaType(
            offered.essence_str().to_string(),
        ));
    }

    Ok(())
}
