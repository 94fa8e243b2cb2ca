//! Core X drawing for the bar and its popups

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::*;

use crate::config::BarColors;

/// Longest run `ImageText16` accepts
const MAX_TEXT: usize = 255;

/// Text as 2-byte characters; anything outside the BMP becomes `?`
pub fn to_char2b(text: &str) -> Vec<Char2b> {
    text.chars()
        .take(MAX_TEXT)
        .map(|c| {
            let code = u16::try_from(u32::from(c)).unwrap_or(u16::from(b'?'));
            let [byte1, byte2] = code.to_be_bytes();
            Char2b { byte1, byte2 }
        })
        .collect()
}

/// Keeps the first characters of `text` that fit in `max_width`.
/// Each `measure` call is a server round-trip, so the cut is bisected.
pub fn elide(text: &str, max_width: u32, measure: impl Fn(&str) -> u32) -> String {
    if measure(text) <= max_width {
        return text.to_string();
    }

    // Byte offset after the first k characters is ends[k - 1]
    let ends: Vec<usize> = text
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .collect();
    let fits = |kept: usize| {
        let end = if kept == 0 { 0 } else { ends[kept - 1] };
        measure(&format!("{}...", &text[..end])) <= max_width
    };

    // Keeping `lo` characters fits (or nothing does), keeping `hi` does not
    let (mut lo, mut hi) = (0, ends.len());
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if fits(mid) {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let end = if lo == 0 { 0 } else { ends[lo - 1] };
    format!("{}...", &text[..end])
}

/// Font and graphics contexts for one drawable
pub struct Painter {
    font: Font,
    /// Text on the background colour
    text_gc: Gcontext,
    disabled_gc: Gcontext,
    /// Plain fills
    fill_gc: Gcontext,
    ascent: i16,
    descent: i16,
    colors: BarColors,
}

impl Painter {
    pub fn new<C: Connection>(conn: &C, drawable: Drawable, font_name: &str, colors: BarColors) -> Result<Self> {
        let font = conn.generate_id()?;
        if conn.open_font(font, font_name.as_bytes())?.check().is_err() {
            tracing::warn!("Font {:?} unavailable, falling back to \"fixed\"", font_name);
            conn.open_font(font, b"fixed")?
                .check()
                .context("Failed to open the \"fixed\" font")?;
        }
        let info = conn.query_font(font)?.reply()?;

        let text_gc = conn.generate_id()?;
        conn.create_gc(
            text_gc,
            drawable,
            &CreateGCAux::new()
                .font(font)
                .foreground(colors.foreground)
                .background(colors.background)
                .graphics_exposures(0),
        )?;

        let disabled_gc = conn.generate_id()?;
        conn.create_gc(
            disabled_gc,
            drawable,
            &CreateGCAux::new()
                .font(font)
                .foreground(colors.disabled)
                .background(colors.background)
                .graphics_exposures(0),
        )?;

        let fill_gc = conn.generate_id()?;
        conn.create_gc(
            fill_gc,
            drawable,
            &CreateGCAux::new()
                .foreground(colors.background)
                .graphics_exposures(0),
        )?;

        Ok(Self {
            font,
            text_gc,
            disabled_gc,
            fill_gc,
            ascent: info.font_ascent,
            descent: info.font_descent,
            colors,
        })
    }

    pub fn line_height(&self) -> u32 {
        (self.ascent + self.descent).max(1) as u32
    }

    /// Pixel width of `text` as the server would draw it
    pub fn measure<C: Connection>(&self, conn: &C, text: &str) -> u32 {
        let chars = to_char2b(text);
        if chars.is_empty() {
            return 0;
        }
        match conn.query_text_extents(self.font, &chars).map(|c| c.reply()) {
            Ok(Ok(extents)) => extents.overall_width.max(0) as u32,
            _ => 0,
        }
    }

    /// Uploads a square of ZPixmap data in the screen's format
    pub fn image<C: Connection>(
        &self,
        conn: &C,
        drawable: Drawable,
        x: i32,
        y: i32,
        side: u32,
        depth: u8,
        data: &[u8],
    ) -> Result<()> {
        conn.put_image(
            ImageFormat::Z_PIXMAP,
            drawable,
            self.fill_gc,
            side as u16,
            side as u16,
            x as i16,
            y as i16,
            0,
            depth,
            data,
        )?;
        Ok(())
    }

    pub fn fill<C: Connection>(&self, conn: &C, drawable: Drawable, color: u32, rect: Rectangle) -> Result<()> {
        conn.change_gc(self.fill_gc, &ChangeGCAux::new().foreground(color))?;
        conn.poly_fill_rectangle(drawable, self.fill_gc, &[rect])?;
        Ok(())
    }

    pub fn clear<C: Connection>(&self, conn: &C, drawable: Drawable, width: u16, height: u16) -> Result<()> {
        self.fill(
            conn,
            drawable,
            self.colors.background,
            Rectangle {
                x: 0,
                y: 0,
                width,
                height,
            },
        )
    }

    /// Draw `text` at `x`, vertically centred in a row of `row_height`
    /// starting at `row_y`. `background` overrides the text background.
    pub fn text<C: Connection>(
        &self,
        conn: &C,
        drawable: Drawable,
        x: i32,
        row_y: i32,
        row_height: u32,
        text: &str,
        enabled: bool,
        background: Option<u32>,
    ) -> Result<()> {
        let chars = to_char2b(text);
        if chars.is_empty() {
            return Ok(());
        }
        let gc = if enabled { self.text_gc } else { self.disabled_gc };
        let baseline = row_y + (row_height as i32 - self.line_height() as i32) / 2 + self.ascent as i32;

        if let Some(color) = background {
            conn.change_gc(gc, &ChangeGCAux::new().background(color))?;
        }
        conn.image_text16(drawable, gc, x as i16, baseline as i16, &chars)?;
        if background.is_some() {
            conn.change_gc(gc, &ChangeGCAux::new().background(self.colors.background))?;
        }
        Ok(())
    }

    pub fn colors(&self) -> &BarColors {
        &self.colors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char2b_encoding() {
        let bytes = |text: &str| -> Vec<(u8, u8)> {
            to_char2b(text).iter().map(|c| (c.byte1, c.byte2)).collect()
        };
        assert_eq!(bytes("Aé€"), vec![(0, 0x41), (0, 0xe9), (0x20, 0xac)]);

        // outside the BMP
        assert_eq!(bytes("🙂"), vec![(0, b'?')]);
        assert_eq!(to_char2b(&"x".repeat(400)).len(), MAX_TEXT);
    }

    #[test]
    fn test_elide() {
        let measure = |t: &str| t.chars().count() as u32 * 10;
        assert_eq!(elide("Terminal", 100, measure), "Terminal");
        assert_eq!(elide("Terminal", 60, measure), "Ter...");
        assert_eq!(elide("Terminal", 20, measure), "...");
        assert_eq!(elide("Ünïcödé title", 70, measure), "Ünïc...");
    }

    #[test]
    fn test_elide_measures_logarithmically() {
        let calls = std::cell::Cell::new(0);
        let measure = |t: &str| {
            calls.set(calls.get() + 1);
            t.chars().count() as u32 * 7
        };
        let title = "a".repeat(500);

        let elided = elide(&title, 700, measure);
        assert_eq!(elided.chars().count(), 100);
        assert!(calls.get() <= 11, "{} measurements", calls.get());
    }
}
