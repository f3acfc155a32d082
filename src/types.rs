/// PostScript points per centimetre.
pub const PT_PER_CM: f32 = 72.0 / 2.54;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn a4() -> Self {
        Self {
            width: 595.28,
            height: 841.89,
        }
    }

    pub fn letter() -> Self {
        // 8.5in x 11in at 72pt/in.
        Self {
            width: 612.0,
            height: 792.0,
        }
    }

    pub fn is_a4(&self) -> bool {
        (self.width - 595.28).abs() < 0.5 && (self.height - 841.89).abs() < 0.5
    }

    /// CSS `@page size` value.
    pub fn css_value(&self) -> String {
        if self.is_a4() {
            "A4".to_string()
        } else {
            format!("{}pt {}pt", fmt_pt(self.width), fmt_pt(self.height))
        }
    }
}

/// Page margins in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Margins {
    pub fn all(value: f32) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }

    pub fn from_cm(top: f32, right: f32, bottom: f32, left: f32) -> Self {
        Self {
            top: top * PT_PER_CM,
            right: right * PT_PER_CM,
            bottom: bottom * PT_PER_CM,
            left: left * PT_PER_CM,
        }
    }

    pub fn is_valid_for(&self, size: Size) -> bool {
        let edges = [self.top, self.right, self.bottom, self.left];
        edges.iter().all(|v| v.is_finite() && *v >= 0.0)
            && self.left + self.right < size.width
            && self.top + self.bottom < size.height
    }

    /// CSS `@page margin` shorthand (top right bottom left).
    pub fn css_value(&self) -> String {
        format!(
            "{}pt {}pt {}pt {}pt",
            fmt_pt(self.top),
            fmt_pt(self.right),
            fmt_pt(self.bottom),
            fmt_pt(self.left)
        )
    }
}

impl Default for Margins {
    // 0.5cm top, 2cm elsewhere.
    fn default() -> Self {
        Margins::from_cm(0.5, 2.0, 2.0, 2.0)
    }
}

/// Page geometry handed to every render engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub size: Size,
    pub margins: Margins,
}

impl PageSetup {
    pub fn printable_width(&self) -> f32 {
        self.size.width - self.margins.left - self.margins.right
    }

    pub fn printable_height(&self) -> f32 {
        self.size.height - self.margins.top - self.margins.bottom
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            size: Size::a4(),
            margins: Margins::default(),
        }
    }
}

pub(crate) fn fmt_pt(value: f32) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded}")
    }
}
