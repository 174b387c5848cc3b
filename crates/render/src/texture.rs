use lumen_common::{Extent, Image};

use crate::device::GraphicsDevice;
use crate::error::TextureError;

/// A decoded image uploaded as an immutable sampleable GPU texture.
pub struct Texture<D: GraphicsDevice> {
    resource: D::Texture,
    extent: Extent,
    label: String,
}

impl<D: GraphicsDevice> Texture<D> {
    pub fn create(device: &mut D, image: &Image, label: &str) -> Result<Self, TextureError> {
        let resource = device
            .create_texture(image, label)
            .map_err(|source| TextureError {
                label: label.to_owned(),
                source,
            })?;
        tracing::debug!(
            label,
            width = image.width(),
            height = image.height(),
            "created texture"
        );
        Ok(Self {
            resource,
            extent: image.extent(),
            label: label.to_owned(),
        })
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn resource(&self) -> &D::Texture {
        &self.resource
    }
}
