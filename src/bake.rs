//! PNG export with the originating source embedded as a text chunk.
//!
//! The source is percent-encoded before it is stored so that it survives the
//! Latin-1 restriction of PNG `tEXt` chunks; [`decode_source`] reverses it.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use anyhow::Context as _;

use crate::foundation::core::CanvasSize;
use crate::foundation::error::{LabError, LabResult};
use crate::surface::Surface;

/// Text chunk keyword the source is stored under.
pub const SOURCE_FIELD_KEY: &str = "tiny-turtle-source";

/// MIME type of baked images and of importable drops.
pub const PNG_MIME: &str = "image/png";

/// An exported canvas: PNG bytes carrying the source that drew them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BakedImage {
    pub size: CanvasSize,
    pub bytes: Vec<u8>,
}

impl BakedImage {
    /// Source text recovered from the image's metadata.
    pub fn source(&self) -> Option<String> {
        extract_source(&self.bytes)
    }

    /// Write the PNG to disk with its metadata intact.
    pub fn save_as(&self, path: &Path) -> LabResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create output dir '{}'", parent.display()))?;
        }
        std::fs::write(path, &self.bytes)
            .with_context(|| format!("failed to write png '{}'", path.display()))?;
        Ok(())
    }
}

pub fn encode_source(source: &str) -> String {
    urlencoding::encode(source).into_owned()
}

pub fn decode_source(field: &str) -> Option<String> {
    urlencoding::decode(field).ok().map(|s| s.into_owned())
}

/// Encode straight-alpha RGBA8 pixels as PNG with the given text chunks.
pub fn encode_png(
    rgba: &[u8],
    size: CanvasSize,
    text_fields: &[(&str, &str)],
) -> LabResult<Vec<u8>> {
    if rgba.len() != size.pixel_count() * 4 {
        return Err(LabError::validation(format!(
            "pixel buffer has {} bytes, expected {} for {}x{}",
            rgba.len(),
            size.pixel_count() * 4,
            size.width,
            size.height
        )));
    }

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, size.width, size.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        for (key, value) in text_fields {
            encoder
                .add_text_chunk((*key).to_owned(), (*value).to_owned())
                .map_err(|e| LabError::codec(format!("png text chunk '{key}': {e}")))?;
        }
        let mut writer = encoder
            .write_header()
            .map_err(|e| LabError::codec(format!("png header failed: {e}")))?;
        writer
            .write_image_data(rgba)
            .map_err(|e| LabError::codec(format!("png write failed: {e}")))?;
        writer
            .finish()
            .map_err(|e| LabError::codec(format!("png finish failed: {e}")))?;
    }
    Ok(out)
}

/// Text chunks (`tEXt` and `zTXt`) anywhere in the image.
pub fn read_text_fields(bytes: &[u8]) -> LabResult<BTreeMap<String, String>> {
    let decoder = png::Decoder::new(Cursor::new(bytes));
    let mut reader = decoder
        .read_info()
        .map_err(|e| LabError::codec(format!("png decode failed: {e}")))?;

    // Chunks after IDAT only show up once the image data has been consumed.
    let len = reader
        .output_buffer_size()
        .ok_or_else(|| LabError::codec("png image is too large"))?;
    let mut frame = vec![0; len];
    reader
        .next_frame(&mut frame)
        .map_err(|e| LabError::codec(format!("png decode failed: {e}")))?;
    reader
        .finish()
        .map_err(|e| LabError::codec(format!("png decode failed: {e}")))?;
    let info = reader.info();

    let mut fields = BTreeMap::new();
    for chunk in &info.uncompressed_latin1_text {
        fields.insert(chunk.keyword.clone(), chunk.text.clone());
    }
    for chunk in &info.compressed_latin1_text {
        let text = chunk
            .get_text()
            .map_err(|e| LabError::codec(format!("png zTXt '{}': {e}", chunk.keyword)))?;
        fields.entry(chunk.keyword.clone()).or_insert(text);
    }
    Ok(fields)
}

/// Rasterize `surface` and embed `source` under [`SOURCE_FIELD_KEY`].
pub fn bake(surface: &Surface, source: &str) -> LabResult<BakedImage> {
    let size = surface.size();
    let encoded = encode_source(source);
    let bytes = encode_png(
        &surface.to_rgba8(),
        size,
        &[(SOURCE_FIELD_KEY, encoded.as_str())],
    )?;
    Ok(BakedImage { size, bytes })
}

/// The source embedded in a baked PNG, if any. Unreadable images and
/// malformed fields both yield `None`.
pub fn extract_source(bytes: &[u8]) -> Option<String> {
    let fields = match read_text_fields(bytes) {
        Ok(fields) => fields,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unreadable image");
            return None;
        }
    };
    let raw = fields.get(SOURCE_FIELD_KEY)?;
    let decoded = decode_source(raw);
    if decoded.is_none() {
        tracing::debug!("ignoring undecodable {SOURCE_FIELD_KEY} field");
    }
    decoded
}
