use std::fmt;

/// Straight-alpha RGBA8 pixels, rows packed without padding.
///
/// This is the layout bitmap data crosses the foreign boundary in.
#[derive(Clone, PartialEq, Eq)]
pub struct RgbaImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaImage {
    /// Fully transparent image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; Self::byte_len(width, height)],
        }
    }

    /// Wraps `pixels`, returning `None` when the buffer length does not match the dimensions.
    pub fn from_raw(pixels: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if pixels.len() != Self::byte_len(width, height) {
            return None;
        }
        Some(Self { width, height, pixels })
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 4
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let p = &self.pixels[i..i + 4];
        Some([p[0], p[1], p[2], p[3]])
    }
}

impl fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RgbaImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.pixels.len())
            .finish()
    }
}

/// Premultiplied RGBA8 pixels ready to be drawn or used as a fill pattern.
///
/// Produced from a [`RgbaImage`] by the bitmap compiler or read back from a surface. Never
/// zero-sized.
#[derive(Clone, PartialEq, Eq)]
pub struct CompiledImage {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl CompiledImage {
    pub fn from_rgba(image: &RgbaImage) -> Option<Self> {
        if image.is_empty() || image.pixels.len() != RgbaImage::byte_len(image.width, image.height) {
            return None;
        }

        let mut data = image.pixels.clone();
        for px in data.chunks_exact_mut(4) {
            let a = px[3];
            if a != u8::MAX {
                px[0] = premultiply(px[0], a);
                px[1] = premultiply(px[1], a);
                px[2] = premultiply(px[2], a);
            }
        }

        Some(Self {
            width: image.width,
            height: image.height,
            data,
        })
    }

    pub fn from_premultiplied(data: Vec<u8>, width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 || data.len() != RgbaImage::byte_len(width, height) {
            return None;
        }
        Some(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Converts back to straight alpha.
    pub fn to_rgba(&self) -> RgbaImage {
        let mut pixels = self.data.clone();
        for px in pixels.chunks_exact_mut(4) {
            let a = px[3];
            match a {
                0 => px.copy_from_slice(&[0, 0, 0, 0]),
                u8::MAX => {}
                _ => {
                    px[0] = demultiply(px[0], a);
                    px[1] = demultiply(px[1], a);
                    px[2] = demultiply(px[2], a);
                }
            }
        }

        RgbaImage {
            width: self.width,
            height: self.height,
            pixels,
        }
    }
}

impl fmt::Debug for CompiledImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

fn premultiply(c: u8, a: u8) -> u8 {
    let prod = c as u32 * a as u32 + 128;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn demultiply(c: u8, a: u8) -> u8 {
    ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8
}
