//! Renderer bridge – turns a view into a bitmap surface.
//!
//! Mount into the host container, let it settle, rasterize at the upscaling
//! factor, detach. The detach runs whether rasterization succeeds or not.

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ExportError, Result};
use crate::host::{HostEnvironment, MountGuard};
use crate::surface::Surface;
use crate::view::View;

/// Rasterization capability: paints a mounted view into a surface.
///
/// `scale` is the upscaling factor applied to the container's CSS px.
#[allow(async_fn_in_trait)]
pub trait Rasterizer {
    async fn rasterize(&self, mounted: &MountGuard<'_>, scale: f32) -> Result<Surface>;
}

impl<R: Rasterizer + ?Sized> Rasterizer for &R {
    async fn rasterize(&self, mounted: &MountGuard<'_>, scale: f32) -> Result<Surface> {
        (**self).rasterize(mounted, scale).await
    }
}

pub struct RendererBridge<R> {
    rasterizer: R,
    hosts: Arc<HostEnvironment>,
    scale: f32,
    settle_delay: Duration,
}

impl<R: Rasterizer> RendererBridge<R> {
    pub fn new(rasterizer: R, hosts: Arc<HostEnvironment>, scale: f32, settle_delay: Duration) -> Self {
        Self {
            rasterizer,
            hosts,
            scale,
            settle_delay,
        }
    }

    pub fn hosts(&self) -> &Arc<HostEnvironment> {
        &self.hosts
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    /// Render `view` inside the host container `host_id`.
    pub async fn render(&self, view: &View, host_id: &str) -> Result<Surface> {
        let mounted = self.hosts.mount(host_id, view)?;
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        let surface = self
            .rasterizer
            .rasterize(&mounted, self.scale)
            .await
            .map_err(|e| match e {
                ExportError::Render { .. } | ExportError::Configuration(_) => e,
                other => ExportError::render(view.section.to_string(), other.to_string()),
            })?;
        drop(mounted);

        log::debug!(
            "Rendered {} at {}x: {}x{} px",
            view.section,
            self.scale,
            surface.width(),
            surface.height()
        );
        Ok(surface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Block, SectionKind};

    struct Fixed(Option<(u32, u32)>);

    impl Rasterizer for Fixed {
        async fn rasterize(&self, mounted: &MountGuard<'_>, scale: f32) -> Result<Surface> {
            match self.0 {
                Some((w, h)) => Ok(Surface::filled(
                    (w as f32 * scale) as u32,
                    (h as f32 * scale) as u32,
                    [255; 4],
                )),
                None => Err(ExportError::Font(format!("no glyphs for {}", mounted.host_id()))),
            }
        }
    }

    fn view() -> View {
        View::new(SectionKind::Invoice, Block::column(vec![]))
    }

    #[tokio::test]
    async fn renders_at_scale_and_detaches() {
        let hosts = HostEnvironment::new();
        let host = hosts.create_container(794.0);
        let bridge = RendererBridge::new(Fixed(Some((100, 50))), Arc::clone(&hosts), 2.0, Duration::ZERO);
        let v = view();
        let surface = bridge.render(&v, host.id()).await.unwrap();
        assert_eq!((surface.width(), surface.height()), (200, 100));
        assert_eq!(hosts.container(host.id()).unwrap().mounted, None);
    }

    #[tokio::test]
    async fn failure_is_a_render_error_and_detaches() {
        let hosts = HostEnvironment::new();
        let host = hosts.create_container(794.0);
        let bridge = RendererBridge::new(Fixed(None), Arc::clone(&hosts), 2.0, Duration::ZERO);
        let v = view();
        let err = bridge.render(&v, host.id()).await.unwrap_err();
        assert!(matches!(err, ExportError::Render { ref section, .. } if section == "invoice"));
        assert_eq!(hosts.container(host.id()).unwrap().mounted, None);
    }

    #[tokio::test]
    async fn missing_host_is_configuration_error() {
        let hosts = HostEnvironment::new();
        let bridge = RendererBridge::new(Fixed(Some((1, 1))), hosts, 2.0, Duration::ZERO);
        let v = view();
        let err = bridge.render(&v, "export-host-gone").await.unwrap_err();
        assert!(err.is_configuration());
    }
}
