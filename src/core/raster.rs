//! Software raster surface for the persistent-canvas backends
//!
//! Pixels are stored as premultiplied RGBA floats so repeated erosion
//! (destination-out) and source-over blending stay exact between frames.
//! Pixel centers sit at `(x + 0.5, y + 0.5)`.

use image::{Rgba32FImage, RgbaImage};

use super::data::PixelPoint;

/// Straight (non-premultiplied) RGBA color, components in [0, 1]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    fn premultiplied(self, coverage: f32) -> [f32; 4] {
        let a = (self.a * coverage).clamp(0.0, 1.0);
        [self.r * a, self.g * a, self.b * a, a]
    }

    #[inline]
    pub fn lerp(self, other: Rgba, t: f32) -> Rgba {
        Rgba::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
            self.a + (other.a - self.a) * t,
        )
    }
}

/// Color stop at `offset` in [0, 1]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GradientStop {
    pub offset: f32,
    pub color: Rgba,
}

impl GradientStop {
    pub const fn new(offset: f32, color: Rgba) -> Self {
        Self { offset, color }
    }
}

/// Sample a sorted stop list, clamping outside the first and last stop
pub fn sample_stops(stops: &[GradientStop], t: f32) -> Rgba {
    let Some(first) = stops.first() else {
        return Rgba::TRANSPARENT;
    };
    if t <= first.offset {
        return first.color;
    }
    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if t <= hi.offset {
            let span = hi.offset - lo.offset;
            if span <= f32::EPSILON {
                return hi.color;
            }
            return lo.color.lerp(hi.color, (t - lo.offset) / span);
        }
    }
    stops[stops.len() - 1].color
}

/// Backing store: premultiplied RGBA floats, row-major
pub type FrameBuffer = Rgba32FImage;

/// RGBA drawing surface
#[derive(Clone, Debug)]
pub struct Raster {
    buffer: FrameBuffer,
}

impl Raster {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            buffer: FrameBuffer::new(width, height),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Resize to the viewport. Contents are dropped only when the size changes.
    /// Returns true if the surface was reallocated.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if self.buffer.dimensions() == (width, height) {
            return false;
        }
        *self = Self::new(width, height);
        true
    }

    pub fn clear(&mut self) {
        for c in self.buffer.iter_mut() {
            *c = 0.0;
        }
    }

    /// Flood the surface with an opaque or translucent color (no blending)
    pub fn fill(&mut self, color: Rgba) {
        let px = image::Rgba(color.premultiplied(1.0));
        for p in self.buffer.pixels_mut() {
            *p = px;
        }
    }

    /// True when no pixel has any coverage
    pub fn is_clear(&self) -> bool {
        self.buffer.pixels().all(|p| p[3] <= 0.0)
    }

    /// Premultiplied pixel value, None outside the surface
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        self.buffer.get_pixel_checked(x, y).map(|p| p.0)
    }

    #[inline]
    pub fn alpha_at(&self, x: u32, y: u32) -> f32 {
        self.pixel(x, y).map_or(0.0, |p| p[3])
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Composite a full-surface fill of opacity `alpha` with destination-out:
    /// every pixel keeps `1 - alpha` of its coverage.
    pub fn erase(&mut self, alpha: f32) {
        let keep = 1.0 - alpha.clamp(0.0, 1.0);
        for c in self.buffer.iter_mut() {
            *c *= keep;
        }
    }

    /// Anti-aliased filled circle, source-over
    pub fn fill_circle(&mut self, center: PixelPoint, radius: f32, color: Rgba) {
        if radius <= 0.0 || color.a <= 0.0 {
            return;
        }
        self.for_each_in_disc(center, radius, |d| {
            let coverage = (radius + 0.5 - d).clamp(0.0, 1.0);
            (coverage > 0.0).then(|| color.premultiplied(coverage))
        });
    }

    /// Circle of radius `outer` filled with a concentric radial gradient that
    /// runs from `inner` to `outer`; the core inside `inner` takes the first stop.
    pub fn fill_radial_gradient(
        &mut self,
        center: PixelPoint,
        inner: f32,
        outer: f32,
        stops: &[GradientStop],
    ) {
        if outer <= 0.0 || stops.is_empty() {
            return;
        }
        let span = (outer - inner).max(f32::EPSILON);
        self.for_each_in_disc(center, outer, |d| {
            let edge = (outer + 0.5 - d).clamp(0.0, 1.0);
            if edge <= 0.0 {
                return None;
            }
            let t = ((d - inner) / span).clamp(0.0, 1.0);
            let color = sample_stops(stops, t);
            (color.a > 0.0).then(|| color.premultiplied(edge))
        });
    }

    /// Source-over blend of one premultiplied pixel
    #[inline]
    pub fn blend_over(&mut self, x: u32, y: u32, src: [f32; 4]) {
        let Some(dst) = self.buffer.get_pixel_mut_checked(x, y) else {
            return;
        };
        let inv = 1.0 - src[3];
        for (d, s) in dst.0.iter_mut().zip(src) {
            *d = s + *d * inv;
        }
    }

    /// Source-over composite of a whole surface, aligned at the origin
    pub fn blend_from(&mut self, other: &Raster) {
        for (x, y, p) in other.buffer.enumerate_pixels() {
            if p[3] > 0.0 {
                self.blend_over(x, y, p.0);
            }
        }
    }

    /// Unpremultiplied 8-bit image (texture upload and PNG export)
    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width(), self.height(), |x, y| {
            let p = self.buffer.get_pixel(x, y);
            let a = p[3].clamp(0.0, 1.0);
            if a <= 0.0 {
                return image::Rgba([0, 0, 0, 0]);
            }
            let c = |v: f32| ((v / a).clamp(0.0, 1.0) * 255.0).round() as u8;
            image::Rgba([c(p[0]), c(p[1]), c(p[2]), (a * 255.0).round() as u8])
        })
    }

    /// Visit pixels whose center lies within `radius + 1` of `center`.
    /// `shade` receives the center distance and returns a premultiplied source.
    fn for_each_in_disc<F>(&mut self, center: PixelPoint, radius: f32, mut shade: F)
    where
        F: FnMut(f32) -> Option<[f32; 4]>,
    {
        let (width, height) = self.buffer.dimensions();
        if width == 0 || height == 0 || !center.x.is_finite() || !center.y.is_finite() {
            return;
        }
        let reach = radius + 1.0;
        let x0 = (center.x - reach).floor().max(0.0) as u32;
        let y0 = (center.y - reach).floor().max(0.0) as u32;
        let x1 = (center.x + reach).ceil().min(width as f32 - 1.0);
        let y1 = (center.y + reach).ceil().min(height as f32 - 1.0);
        if x1 < 0.0 || y1 < 0.0 {
            return;
        }
        let (x1, y1) = (x1 as u32, y1 as u32);
        for y in y0..=y1 {
            let dy = y as f32 + 0.5 - center.y;
            for x in x0..=x1 {
                let dx = x as f32 + 0.5 - center.x;
                let d = (dx * dx + dy * dy).sqrt();
                if d > reach {
                    continue;
                }
                if let Some(src) = shade(d) {
                    self.blend_over(x, y, src);
                }
            }
        }
    }
}
