//! Application icon next to the title
//!
//! Icon names come from desktop entries and are looked up in the current
//! icon theme. The image is scaled once, blended onto the bar background
//! and uploaded with `PutImage`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::imageops::FilterType;
use linicon::IconType;
use tracing::{debug, warn};
use x11rb::protocol::xproto::{ImageOrder, Screen, Setup, VisualClass};

/// Theme searched when the desktop does not name one
const FALLBACK_THEME: &str = "hicolor";

/// How the screen stores pixels; only 32-bit TrueColor is painted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub depth: u8,
    pub lsb_first: bool,
}

impl PixelFormat {
    pub fn for_screen(setup: &Setup, screen: &Screen) -> Option<Self> {
        let depth = screen.root_depth;
        let bpp = setup
            .pixmap_formats
            .iter()
            .find(|f| f.depth == depth)
            .map(|f| f.bits_per_pixel)?;
        let visual = screen
            .allowed_depths
            .iter()
            .flat_map(|d| d.visuals.iter())
            .find(|v| v.visual_id == screen.root_visual)?;

        let truecolor = visual.class == VisualClass::TRUE_COLOR
            && visual.red_mask == 0x00FF_0000
            && visual.green_mask == 0x0000_FF00
            && visual.blue_mask == 0x0000_00FF;
        if bpp != 32 || !truecolor {
            debug!("Root visual (depth {}, {} bpp) cannot show icons", depth, bpp);
            return None;
        }
        Some(Self {
            depth,
            lsb_first: setup.image_byte_order == ImageOrder::LSB_FIRST,
        })
    }
}

/// A square icon scaled to the bar
#[derive(Debug, Clone)]
pub struct IconImage {
    pub side: u32,
    /// RGBA, row by row
    pub rgba: Vec<u8>,
}

/// Finds the file for an icon name, or takes an absolute path as is
pub fn resolve(name: &str, side: u32) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }
    let path = Path::new(name);
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    let theme = linicon::get_system_theme().unwrap_or_else(|| FALLBACK_THEME.to_string());
    let size = u16::try_from(side).unwrap_or(u16::MAX);
    // Only raster formats; `image` has no SVG decoder
    linicon::lookup_icon(name)
        .from_theme(&theme)
        .with_size(size)
        .into_iter()
        .filter_map(|found| found.ok())
        .find(|found| matches!(found.icon_type, IconType::PNG))
        .map(|found| found.path)
}

pub fn load(path: &Path, side: u32) -> Result<IconImage> {
    let rgba = image::open(path)
        .with_context(|| format!("Failed to decode icon {}", path.display()))?
        .resize_exact(side, side, FilterType::Triangle)
        .to_rgba8();
    Ok(IconImage {
        side,
        rgba: rgba.into_raw(),
    })
}

/// Blends RGBA over `background` (0xRRGGBB) into 32-bit ZPixmap data
pub fn to_zpixmap(rgba: &[u8], background: u32, lsb_first: bool) -> Vec<u8> {
    let [_, bg_r, bg_g, bg_b] = background.to_be_bytes();
    let mut out = Vec::with_capacity(rgba.len());
    for px in rgba.chunks_exact(4) {
        let alpha = u32::from(px[3]);
        let mix = |src: u8, dst: u8| {
            ((u32::from(src) * alpha + u32::from(dst) * (255 - alpha) + 127) / 255) as u8
        };
        let pixel = u32::from_be_bytes([0, mix(px[0], bg_r), mix(px[1], bg_g), mix(px[2], bg_b)]);
        if lsb_first {
            out.extend_from_slice(&pixel.to_le_bytes());
        } else {
            out.extend_from_slice(&pixel.to_be_bytes());
        }
    }
    out
}

/// The icon of the active application, reloaded when the name changes
pub struct IconCache {
    side: u32,
    name: String,
    image: Option<IconImage>,
}

impl IconCache {
    pub fn new(side: u32) -> Self {
        Self {
            side,
            name: String::new(),
            image: None,
        }
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn get(&mut self, name: &str) -> Option<&IconImage> {
        if name != self.name {
            self.name = name.to_string();
            self.image = if self.side == 0 {
                None
            } else {
                resolve(name, self.side).and_then(|path| match load(&path, self.side) {
                    Ok(image) => Some(image),
                    Err(e) => {
                        warn!("{:#}", e);
                        None
                    }
                })
            };
            debug!("Icon {:?} loaded: {}", name, self.image.is_some());
        }
        self.image.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_zpixmap_blends_onto_background() {
        let rgba = [
            255, 0, 0, 255, // opaque red
            9, 9, 9, 0, // transparent
            255, 255, 255, 128, // half white
        ];

        let lsb = to_zpixmap(&rgba, 0x0010_2030, true);
        assert_eq!(&lsb[0..4], &[0, 0, 255, 0]);
        assert_eq!(&lsb[4..8], &[0x30, 0x20, 0x10, 0]);
        assert_eq!(&lsb[8..12], &[0x98, 0x90, 0x88, 0]);

        let msb = to_zpixmap(&rgba, 0x0010_2030, false);
        assert_eq!(&msb[0..4], &[0, 255, 0, 0]);
        assert_eq!(&msb[4..8], &[0, 0x10, 0x20, 0x30]);
    }

    #[test]
    fn test_load_scales_to_side() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.png");
        RgbaImage::from_pixel(48, 48, Rgba([10, 20, 30, 255])).save(&path).unwrap();

        let icon = load(&path, 16).unwrap();
        assert_eq!(icon.side, 16);
        assert_eq!(icon.rgba.len(), 16 * 16 * 4);
    }

    #[test]
    fn test_cache_reloads_on_name_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.png");
        RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])).save(&path).unwrap();
        let name = path.to_string_lossy().into_owned();

        let mut cache = IconCache::new(4);
        assert!(cache.get("").is_none());
        assert_eq!(cache.get(&name).map(|i| i.rgba.len()), Some(4 * 4 * 4));
        assert!(cache.get("/nonexistent/statusbar/app.png").is_none());
        assert!(cache.get(&name).is_some());
    }

    #[test]
    fn test_unreadable_icon_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not a png").unwrap();

        let mut cache = IconCache::new(4);
        assert!(cache.get(&path.to_string_lossy()).is_none());
    }
}
