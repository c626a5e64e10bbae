/// An 8-bit straight-alpha RGBA color.
///
/// Colors cross the foreign boundary packed into a `u32`: byte 0 (least significant) is red,
/// then green, blue and alpha in the most significant byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_packed(value: u32) -> Self {
        let [r, g, b, a] = value.to_le_bytes();
        Self { r, g, b, a }
    }

    pub fn to_packed(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }

    /// CSS `rgba()` notation with the alpha channel scaled to `0..=1`.
    pub fn to_css(self) -> String {
        format!("rgba({},{},{},{})", self.r, self.g, self.b, self.a as f64 / 255.0)
    }

    pub fn is_opaque(self) -> bool {
        self.a == u8::MAX
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}
