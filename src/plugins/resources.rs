//! Resource collaborators

use crate::cache::ResourceCache;
use crate::resource::ResourceType;
use crate::resource::sniff::image_dimensions;

use super::ResourcePlugin;

/// Empties raster images of at most one pixel, the usual shape of tracking beacons
///
/// Emptied images inline as an empty `src`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrackingPixelRemover;

impl ResourcePlugin for TrackingPixelRemover {
    fn name(&self) -> &str {
        "tracking-pixel-remover"
    }

    fn apply(&self, cache: &ResourceCache) -> anyhow::Result<()> {
        let mut removed = 0;
        for handle in cache.subset_by_type(ResourceType::Image).handles() {
            let is_pixel = {
                let resource = handle.lock();
                resource.status().is_success()
                    && resource
                        .bytes()
                        .and_then(image_dimensions)
                        .is_some_and(|(width, height)| width <= 1 && height <= 1)
            };
            if is_pixel {
                handle.update(None);
                removed += 1;
            }
        }
        log::debug!("Removed {removed} tracking pixels");
        Ok(())
    }
}

/// Empties every resource of the configured types
#[derive(Debug, Clone, Default)]
pub struct TypeDropper {
    types: Vec<ResourceType>,
}

impl TypeDropper {
    pub fn new(types: impl IntoIterator<Item = ResourceType>) -> Self {
        let mut types: Vec<ResourceType> = types.into_iter().collect();
        types.sort();
        types.dedup();
        Self { types }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl ResourcePlugin for TypeDropper {
    fn name(&self) -> &str {
        "type-dropper"
    }

    fn apply(&self, cache: &ResourceCache) -> anyhow::Result<()> {
        for resource_type in &self.types {
            let subset = cache.subset_by_type(*resource_type);
            for handle in subset.handles() {
                handle.update(None);
            }
            log::debug!("Dropped {} {resource_type} resources", subset.len());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportOptions;
    use crate::resource::sniff::{PIXEL_GIF, encoded_pixel};
    use crate::transport::{FetchRequest, Transport, TransportFuture, TransportResponse};
    use image::ImageFormat;
    use std::sync::Arc;

    /// Serves 1x1 images by suffix (`.gif`, `.jpg`, `.webp`) and a 2x1 GIF
    /// for anything else
    struct PixelTransport;

    impl Transport for PixelTransport {
        fn fetch<'a>(&'a self, request: &'a FetchRequest) -> TransportFuture<'a> {
            let url = request.absolute_url.as_str();
            let body = if url.ends_with(".gif") {
                PIXEL_GIF.to_vec()
            } else if url.ends_with(".jpg") {
                encoded_pixel(ImageFormat::Jpeg)
            } else if url.ends_with(".webp") {
                encoded_pixel(ImageFormat::WebP)
            } else {
                let mut wide = PIXEL_GIF.to_vec();
                wide[6] = 2;
                wide
            };
            Box::pin(async move { TransportResponse::success(body, 200) })
        }
    }

    async fn fetched_cache() -> ResourceCache {
        let mut cache = ResourceCache::new(Arc::new(PixelTransport), Arc::new(TransportOptions::default()));
        cache.register("https://t.test/beacon.gif", ResourceType::Image).unwrap();
        cache.register("https://t.test/beacon.jpg", ResourceType::Image).unwrap();
        cache.register("https://t.test/beacon.webp", ResourceType::Image).unwrap();
        cache.register("https://t.test/logo.img", ResourceType::Image).unwrap();
        cache.register("https://t.test/app.js", ResourceType::Script).unwrap();
        cache.fetch_all_unfetched().await;
        cache
    }

    #[tokio::test]
    async fn test_tracking_pixels_are_emptied() {
        let cache = fetched_cache().await;
        TrackingPixelRemover.apply(&cache).unwrap();

        for beacon in ["gif", "jpg", "webp"] {
            let handle = cache.get(&format!("https://t.test/beacon.{beacon}")).unwrap();
            assert!(handle.lock().bytes().is_none(), "{beacon} beacon kept");
            assert_eq!(handle.to_base64(), "");
        }

        let logo = cache.get("https://t.test/logo.img").unwrap();
        assert!(logo.lock().bytes().is_some());
    }

    #[tokio::test]
    async fn test_type_dropper_only_touches_listed_types() {
        let cache = fetched_cache().await;
        TypeDropper::new([ResourceType::Script]).apply(&cache).unwrap();

        let script = cache.get("https://t.test/app.js").unwrap();
        assert!(script.lock().bytes().is_none());
        assert!(script.lock().mime_type().is_none());
        assert!(cache.get("https://t.test/beacon.gif").unwrap().lock().bytes().is_some());
    }
}
