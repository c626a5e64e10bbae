/// Parsed form of the CSS font shorthand carried in
/// [`GraphicsAttributes::font`](super::GraphicsAttributes), e.g.
/// `normal 400 12.000000pt/1 "DejaVu Sans", sans-serif`.
#[derive(Debug, Clone, PartialEq)]
pub struct FontSpec {
    /// Font size in CSS pixels.
    pub size_px: f64,
    pub weight: u16,
    pub italic: bool,
    /// Family names in preference order, quotes removed.
    pub families: Vec<String>,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            size_px: 10.0,
            weight: 400,
            italic: false,
            families: vec!["sans-serif".to_string()],
        }
    }
}

impl FontSpec {
    /// Parses a font shorthand. Anything unparsable falls back to the defaults for that part.
    pub fn parse(font: &str) -> Self {
        let mut spec = FontSpec::default();
        let mut rest = font.trim();

        loop {
            let (token, tail) = match rest.split_once(char::is_whitespace) {
                Some((token, tail)) => (token, tail.trim_start()),
                None => (rest, ""),
            };
            if token.is_empty() {
                return spec;
            }

            if let Some(size) = parse_size(token) {
                spec.size_px = size;
                if !tail.is_empty() {
                    spec.families = parse_families(tail);
                }
                return spec;
            }

            match token {
                "italic" | "oblique" => spec.italic = true,
                "bold" | "bolder" => spec.weight = 700,
                "lighter" => spec.weight = 300,
                _ => {
                    if let Ok(weight) = token.parse::<u16>() {
                        spec.weight = weight;
                    }
                }
            }
            rest = tail;
        }
    }

    pub fn is_bold(&self) -> bool {
        self.weight >= 600
    }
}

fn parse_size(token: &str) -> Option<f64> {
    // Drop an optional line height: "12pt/1".
    let size = token.split('/').next()?;
    if let Some(px) = size.strip_suffix("px") {
        return px.parse::<f64>().ok().filter(|v| *v > 0.0);
    }
    if let Some(pt) = size.strip_suffix("pt") {
        return pt.parse::<f64>().ok().filter(|v| *v > 0.0).map(|v| v * 4.0 / 3.0);
    }
    None
}

fn parse_families(list: &str) -> Vec<String> {
    list.split(',')
        .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
        .filter(|f| !f.is_empty())
        .collect()
}
