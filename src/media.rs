use std::path::Path;

use crate::forms::post::UploadedImage;

/// Subdirectory of the media root that post images go to.
pub const POST_IMAGES: &str = "posts";

/// Write an uploaded image under `media_dir` and return its path relative to
/// the media root, e.g. `posts/0190c3b1-....gif`.
#[tracing::instrument(skip(image), fields(file_name = ?image.file_name, size = image.bytes.len()))]
pub async fn save_post_image(media_dir: &str, image: &UploadedImage) -> anyhow::Result<String> {
    let ext = image
        .extension()
        .ok_or_else(|| anyhow::anyhow!("not an image"))?;
    let relative = format!("{POST_IMAGES}/{}.{ext}", uuid::Uuid::now_v7());

    let dir = Path::new(media_dir).join(POST_IMAGES);
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(Path::new(media_dir).join(&relative), &image.bytes).await?;
    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::post::SMALL_GIF;
    use axum::body::Bytes;

    #[tokio::test]
    async fn image_lands_under_posts() {
        let dir = tempfile::tempdir().unwrap();
        let media = dir.path().to_str().unwrap();
        let image = UploadedImage {
            file_name: Some("small.gif".into()),
            bytes: Bytes::from_static(SMALL_GIF),
        };

        let relative = save_post_image(media, &image).await.unwrap();
        assert!(relative.starts_with("posts/"));
        assert!(relative.ends_with(".gif"));

        let written = tokio::fs::read(dir.path().join(&relative)).await.unwrap();
        assert_eq!(written, SMALL_GIF);
    }

    #[tokio::test]
    async fn non_images_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let image = UploadedImage {
            file_name: None,
            bytes: Bytes::from_static(b"hello"),
        };
        assert!(save_post_image(dir.path().to_str().unwrap(), &image)
            .await
            .is_err());
    }
}
