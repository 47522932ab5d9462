use axum::body::Bytes;
use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::models::group::Group;

use super::{check, FormErrors, REQUIRED};

pub const INVALID_GROUP: &str = "Select a valid choice. That choice is not one of the available choices.";
pub const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: Option<String>,
    pub bytes: Bytes,
}

impl UploadedImage {
    /// Extension matching the file's signature, `None` for anything that is not
    /// a GIF, PNG, JPEG or WebP image.
    pub fn extension(&self) -> Option<&'static str> {
        let b = &self.bytes[..];
        if b.starts_with(b"GIF87a") || b.starts_with(b"GIF89a") {
            Some("gif")
        } else if b.starts_with(b"\x89PNG\r\n\x1a\n") {
            Some("png")
        } else if b.starts_with(b"\xFF\xD8\xFF") {
            Some("jpg")
        } else if b.len() >= 12 && &b[..4] == b"RIFF" && &b[8..12] == b"WEBP" {
            Some("webp")
        } else {
            None
        }
    }
}

/// Oversized bodies stay 413 and malformed ones 400 instead of a 500.
fn upload_error(e: MultipartError) -> AppError {
    let status = e.status();
    AppError::with_status(e, status)
}

/// Raw post form as submitted (multipart, because of the image).
#[derive(Serialize, Debug, Default, Clone)]
pub struct PostForm {
    pub text: String,
    pub group: String,
    #[serde(skip)]
    pub image: Option<UploadedImage>,
    #[serde(skip)]
    pub clear_image: bool,
}

#[derive(Debug, Clone)]
pub struct CleanPost {
    pub text: String,
    pub group_id: Option<i32>,
    pub image: Option<UploadedImage>,
    pub clear_image: bool,
}

impl PostForm {
    pub async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = PostForm::default();
        while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "text" => form.text = field.text().await.map_err(upload_error)?,
                "group" => form.group = field.text().await.map_err(upload_error)?,
                "image" => {
                    let file_name = field.file_name().map(str::to_owned);
                    let bytes = field.bytes().await.map_err(upload_error)?;
                    if !bytes.is_empty() {
                        form.image = Some(UploadedImage { file_name, bytes });
                    }
                }
                "image-clear" => form.clear_image = true,
                _ => {}
            }
        }
        Ok(form)
    }

    /// `groups` are the choices offered by the select box.
    pub fn clean(&self, groups: &[Group]) -> Result<CleanPost, FormErrors> {
        let mut errors = FormErrors::default();

        let text = self.text.trim().to_owned();
        if text.is_empty() {
            errors.add("text", REQUIRED);
        }

        let raw_group = self.group.trim();
        let group_id = if raw_group.is_empty() {
            None
        } else {
            match raw_group.parse::<i32>() {
                Ok(id) if groups.iter().any(|g| g.id == id) => Some(id),
                _ => {
                    errors.add("group", INVALID_GROUP);
                    None
                }
            }
        };

        if let Some(image) = &self.image {
            if image.extension().is_none() {
                errors.add("image", INVALID_IMAGE);
            }
        }

        errors.into_result()?;
        Ok(CleanPost {
            text,
            group_id,
            image: self.image.clone(),
            clear_image: self.clear_image,
        })
    }
}

#[derive(Deserialize, Serialize, Validate, Debug, Default, Clone)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub text: String,
}

impl CommentForm {
    pub fn clean(mut self) -> Result<String, FormErrors> {
        self.text = self.text.trim().to_owned();
        check(&self).into_result()?;
        Ok(self.text)
    }
}

#[cfg(test)]
pub(crate) const SMALL_GIF: &[u8] = b"\x47\x49\x46\x38\x39\x61\x02\x00\
\x01\x00\x80\x00\x00\x00\x00\x00\
\xFF\xFF\xFF\x21\xF9\x04\x00\x00\
\x00\x00\x00\x2C\x00\x00\x00\x00\
\x02\x00\x01\x00\x00\x02\x02\x0C\
\x0A\x00\x3B";
