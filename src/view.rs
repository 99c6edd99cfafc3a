//! View descriptors – the deterministic markup a presentational view renders
//! into before it is mounted, laid out and rasterized.
//!
//! A [`View`] is a tree of [`Block`]s plus the section it belongs to. Views are
//! plain data: building one never touches fonts or pixels.

use std::fmt;

use serde::Serialize;

/// Which part of an exported document a view renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    CoverPage,
    Msa,
    Invoice,
    OrderForm,
}

impl SectionKind {
    pub fn is_main_content(self) -> bool {
        matches!(self, SectionKind::Invoice | SectionKind::OrderForm)
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SectionKind::CoverPage => "cover page",
            SectionKind::Msa => "MSA",
            SectionKind::Invoice => "invoice",
            SectionKind::OrderForm => "order form",
        };
        f.write_str(s)
    }
}

/// RGBA colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);
    pub const GRAY_100: Self = Self::rgb(0.953, 0.957, 0.961);
    pub const GRAY_300: Self = Self::rgb(0.831, 0.843, 0.871);
    pub const GRAY_500: Self = Self::rgb(0.424, 0.447, 0.502);
    pub const GRAY_900: Self = Self::rgb(0.067, 0.094, 0.153);
    pub const NAVY: Self = Self::rgb(0.102, 0.212, 0.365);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| v as f32 / 255.0);
        match hex.len() {
            6 => Some(Self::rgb(
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
            )),
            3 => Some(Self::rgb(
                channel(&hex[0..1].repeat(2))?,
                channel(&hex[1..2].repeat(2))?,
                channel(&hex[2..3].repeat(2))?,
            )),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextStyle {
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: Color,
    pub align: TextAlign,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 14.0,
            bold: false,
            italic: false,
            color: Color::GRAY_900,
            align: TextAlign::Left,
            line_height: 1.4,
        }
    }
}

impl TextStyle {
    pub fn size(mut self, font_size: f32) -> Self {
        self.font_size = font_size;
        self
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn align(mut self, align: TextAlign) -> Self {
        self.align = align;
        self
    }

    pub fn line_height(mut self, line_height: f32) -> Self {
        self.line_height = line_height;
        self
    }
}

/// Box decoration and spacing shared by container blocks (CSS px).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BoxStyle {
    pub padding: f32,
    pub margin_bottom: f32,
    pub gap: f32,
    pub background: Option<Color>,
    pub border: Option<(f32, Color)>,
    /// Fixed height, used for cover-page bands.
    pub min_height: Option<f32>,
}

/// A column of a [`Block::Table`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableColumn {
    pub header: String,
    /// Relative width; columns share the table width in proportion.
    pub weight: f32,
    pub align: TextAlign,
}

impl TableColumn {
    pub fn new(header: &str, weight: f32, align: TextAlign) -> Self {
        Self {
            header: header.to_string(),
            weight,
            align,
        }
    }
}

/// One node of a view tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Block {
    /// Children stacked vertically.
    Column { style: BoxStyle, children: Vec<Block> },
    /// Children laid out horizontally, sharing the width by weight.
    Row { style: BoxStyle, children: Vec<(f32, Block)> },
    Text { text: String, style: TextStyle },
    List { ordered: bool, items: Vec<String>, style: TextStyle },
    Table {
        columns: Vec<TableColumn>,
        rows: Vec<Vec<String>>,
        header_background: Color,
        style: TextStyle,
    },
    /// Horizontal line.
    Rule { thickness: f32, color: Color },
    Spacer { height: f32 },
    /// Base64 data-URI image drawn at a fixed size.
    Image { src: String, width: f32, height: f32 },
}

impl Block {
    pub fn column(children: Vec<Block>) -> Self {
        Block::Column {
            style: BoxStyle::default(),
            children,
        }
    }

    pub fn styled_column(style: BoxStyle, children: Vec<Block>) -> Self {
        Block::Column { style, children }
    }

    pub fn row(children: Vec<(f32, Block)>) -> Self {
        Block::Row {
            style: BoxStyle::default(),
            children,
        }
    }

    pub fn text(text: impl Into<String>, style: TextStyle) -> Self {
        Block::Text {
            text: text.into(),
            style,
        }
    }

    pub fn spacer(height: f32) -> Self {
        Block::Spacer { height }
    }

    pub fn rule() -> Self {
        Block::Rule {
            thickness: 1.0,
            color: Color::GRAY_300,
        }
    }

    /// Number of blocks in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        1 + match self {
            Block::Column { children, .. } => children.iter().map(Block::node_count).sum(),
            Block::Row { children, .. } => children.iter().map(|(_, b)| b.node_count()).sum(),
            _ => 0,
        }
    }

    /// Concatenated text content, in document order (used by tests and logs).
    pub fn plain_text(&self) -> String {
        let mut out = Vec::new();
        self.collect_text(&mut out);
        out.join("\n")
    }

    fn collect_text(&self, out: &mut Vec<String>) {
        match self {
            Block::Column { children, .. } => children.iter().for_each(|c| c.collect_text(out)),
            Block::Row { children, .. } => children.iter().for_each(|(_, c)| c.collect_text(out)),
            Block::Text { text, .. } => out.push(text.clone()),
            Block::List { items, .. } => out.extend(items.iter().cloned()),
            Block::Table { columns, rows, .. } => {
                out.extend(columns.iter().map(|c| c.header.clone()));
                for row in rows {
                    out.extend(row.iter().cloned());
                }
            }
            Block::Rule { .. } | Block::Spacer { .. } | Block::Image { .. } => {}
        }
    }
}

/// A renderable view: what gets mounted into an off-screen host container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub section: SectionKind,
    pub root: Block,
}

impl View {
    pub fn new(section: SectionKind, root: Block) -> Self {
        Self { section, root }
    }
}
