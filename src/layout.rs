//! Layout engine – uses Taffy to lay out a view's block tree at the host
//! container's width, then converts the result into positioned boxes.
//!
//! Widths are resolved top-down while the Taffy tree is built so that text can
//! be word-wrapped to its final column width; Taffy then resolves the vertical
//! flow (heights, margins, gaps, minimum heights).

use std::collections::HashMap;
use taffy::prelude::*;

use crate::error::{ExportError, Result};
use crate::fonts::{wrap_text, FontManager};
use crate::view::{Block, BoxStyle, Color, SectionKind, TableColumn, TextAlign, TextStyle, View};

/// Width of the marker gutter in front of list items.
const LIST_GUTTER: f32 = 24.0;
/// Vertical padding of table cells.
const CELL_PADDING: f32 = 8.0;

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A positioned box in view coordinates (CSS px, origin top-left).
#[derive(Debug, Clone)]
pub struct PositionedBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub background: Option<Color>,
    pub border: Option<(f32, Color)>,
    pub content: BoxContent,
    pub children: Vec<PositionedBox>,
}

#[derive(Debug, Clone)]
pub enum BoxContent {
    None,
    Text { lines: Vec<String>, style: TextStyle },
    Rule { color: Color },
    Image { src: String },
}

/// A view after layout: what the rasterizer paints.
#[derive(Debug, Clone)]
pub struct LaidOutView {
    pub section: SectionKind,
    pub width: f32,
    pub height: f32,
    pub root: PositionedBox,
}

impl LaidOutView {
    /// Number of text lines in the view (used for logging).
    pub fn line_count(&self) -> usize {
        fn count(b: &PositionedBox) -> usize {
            let own = match &b.content {
                BoxContent::Text { lines, .. } => lines.len(),
                _ => 0,
            };
            own + b.children.iter().map(count).sum::<usize>()
        }
        count(&self.root)
    }
}

// ---------------------------------------------------------------------------
// Build Taffy tree from blocks
// ---------------------------------------------------------------------------

#[derive(Default, Clone)]
struct Decoration {
    background: Option<Color>,
    border: Option<(f32, Color)>,
}

struct LayoutBuilder<'a> {
    taffy: TaffyTree<()>,
    fonts: &'a FontManager,
    node_decoration: HashMap<NodeId, Decoration>,
    node_content: HashMap<NodeId, BoxContent>,
    section: SectionKind,
}

impl<'a> LayoutBuilder<'a> {
    fn new(fonts: &'a FontManager, section: SectionKind) -> Self {
        Self {
            taffy: TaffyTree::new(),
            fonts,
            node_decoration: HashMap::new(),
            node_content: HashMap::new(),
            section,
        }
    }

    fn fail(&self, e: taffy::TaffyError) -> ExportError {
        ExportError::render(self.section.to_string(), format!("layout failed: {e}"))
    }

    fn leaf(&mut self, style: Style) -> Result<NodeId> {
        self.taffy.new_leaf(style).map_err(|e| self.fail(e))
    }

    fn container(&mut self, style: Style, children: &[NodeId]) -> Result<NodeId> {
        self.taffy
            .new_with_children(style, children)
            .map_err(|e| self.fail(e))
    }

    fn build_node(&mut self, block: &Block, width: f32) -> Result<NodeId> {
        match block {
            Block::Column { style, children } => {
                let inner = inner_width(style, width);
                let child_nodes = children
                    .iter()
                    .map(|c| self.build_node(c, inner))
                    .collect::<Result<Vec<_>>>()?;
                self.build_box(style, FlexDirection::Column, width, &child_nodes)
            }
            Block::Row { style, children } => {
                let inner = inner_width(style, width);
                let weights: Vec<f32> = children.iter().map(|(w, _)| w.max(0.0)).collect();
                let widths = share_width(inner, style.gap, &weights);
                let child_nodes = children
                    .iter()
                    .zip(widths)
                    .map(|((_, c), w)| self.build_node(c, w))
                    .collect::<Result<Vec<_>>>()?;
                self.build_box(style, FlexDirection::Row, width, &child_nodes)
            }
            Block::Text { text, style } => self.build_text(text, style, width),
            Block::List {
                ordered,
                items,
                style,
            } => self.build_list(*ordered, items, style, width),
            Block::Table {
                columns,
                rows,
                header_background,
                style,
            } => {
                let table = table_block(columns, rows, *header_background, style);
                self.build_node(&table, width)
            }
            Block::Rule { thickness, color } => {
                let node = self.leaf(fixed(width, *thickness))?;
                self.node_content.insert(node, BoxContent::Rule { color: *color });
                Ok(node)
            }
            Block::Spacer { height } => self.leaf(fixed(width, *height)),
            Block::Image { src, width: w, height } => {
                let node = self.leaf(fixed(w.min(width), *height))?;
                self.node_content.insert(node, BoxContent::Image { src: src.clone() });
                Ok(node)
            }
        }
    }

    fn build_box(
        &mut self,
        style: &BoxStyle,
        direction: FlexDirection,
        width: f32,
        children: &[NodeId],
    ) -> Result<NodeId> {
        let border = style.border.map(|(w, _)| w).unwrap_or(0.0);
        let gap = match direction {
            FlexDirection::Row => Size {
                width: LengthPercentage::Length(style.gap),
                height: LengthPercentage::Length(0.0),
            },
            _ => Size {
                width: LengthPercentage::Length(0.0),
                height: LengthPercentage::Length(style.gap),
            },
        };
        let taffy_style = Style {
            display: Display::Flex,
            flex_direction: direction,
            align_items: Some(AlignItems::FlexStart),
            flex_shrink: 0.0,
            size: Size {
                width: Dimension::Length(width),
                height: Dimension::Auto,
            },
            min_size: Size {
                width: Dimension::Auto,
                height: style.min_height.map(Dimension::Length).unwrap_or(Dimension::Auto),
            },
            padding: uniform(style.padding),
            border: uniform(border),
            margin: Rect {
                top: LengthPercentageAuto::Length(0.0),
                right: LengthPercentageAuto::Length(0.0),
                bottom: LengthPercentageAuto::Length(style.margin_bottom),
                left: LengthPercentageAuto::Length(0.0),
            },
            gap,
            ..Default::default()
        };
        let node = self.container(taffy_style, children)?;
        if style.background.is_some() || style.border.is_some() {
            self.node_decoration.insert(
                node,
                Decoration {
                    background: style.background,
                    border: style.border,
                },
            );
        }
        Ok(node)
    }

    fn build_text(&mut self, text: &str, style: &TextStyle, width: f32) -> Result<NodeId> {
        let lines = wrap_text(
            text.trim(),
            style.font_size,
            style.bold,
            style.italic,
            width,
            self.fonts,
        );
        let height = lines.len() as f32 * style.font_size * style.line_height;

        let node = self.leaf(fixed(width, height))?;
        self.node_content.insert(
            node,
            BoxContent::Text {
                lines,
                style: style.clone(),
            },
        );
        Ok(node)
    }

    fn build_list(&mut self, ordered: bool, items: &[String], style: &TextStyle, width: f32) -> Result<NodeId> {
        let body_width = (width - LIST_GUTTER).max(1.0);
        let mut rows = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let marker = if ordered {
                format!("{}.", i + 1)
            } else {
                "\u{2022}".to_string()
            };
            let marker_node = self.build_text(&marker, style, LIST_GUTTER)?;
            let body_node = self.build_text(item, style, body_width)?;
            let row_style = Style {
                display: Display::Flex,
                flex_direction: FlexDirection::Row,
                align_items: Some(AlignItems::FlexStart),
                size: Size {
                    width: Dimension::Length(width),
                    height: Dimension::Auto,
                },
                margin: Rect {
                    top: LengthPercentageAuto::Length(0.0),
                    right: LengthPercentageAuto::Length(0.0),
                    bottom: LengthPercentageAuto::Length(style.font_size * 0.3),
                    left: LengthPercentageAuto::Length(0.0),
                },
                ..Default::default()
            };
            rows.push(self.container(row_style, &[marker_node, body_node])?);
        }
        let list_style = Style {
            display: Display::Flex,
            flex_direction: FlexDirection::Column,
            size: Size {
                width: Dimension::Length(width),
                height: Dimension::Auto,
            },
            ..Default::default()
        };
        self.container(list_style, &rows)
    }

    /// Extract positioned boxes after layout computation.
    fn extract(&self, node: NodeId, offset_x: f32, offset_y: f32) -> Result<PositionedBox> {
        let layout = self.taffy.layout(node).map_err(|e| self.fail(e))?;
        let decoration = self.node_decoration.get(&node).cloned().unwrap_or_default();
        let content = self
            .node_content
            .get(&node)
            .cloned()
            .unwrap_or(BoxContent::None);

        let x = offset_x + layout.location.x;
        let y = offset_y + layout.location.y;

        let children = self
            .taffy
            .children(node)
            .unwrap_or_default()
            .iter()
            .map(|&child| self.extract(child, x, y))
            .collect::<Result<Vec<_>>>()?;

        Ok(PositionedBox {
            x,
            y,
            width: layout.size.width,
            height: layout.size.height,
            background: decoration.background,
            border: decoration.border,
            content,
            children,
        })
    }
}

fn fixed(width: f32, height: f32) -> Style {
    Style {
        flex_shrink: 0.0,
        size: Size {
            width: Dimension::Length(width.max(0.0)),
            height: Dimension::Length(height.max(0.0)),
        },
        ..Default::default()
    }
}

fn uniform(v: f32) -> Rect<LengthPercentage> {
    Rect {
        top: LengthPercentage::Length(v),
        right: LengthPercentage::Length(v),
        bottom: LengthPercentage::Length(v),
        left: LengthPercentage::Length(v),
    }
}

fn inner_width(style: &BoxStyle, width: f32) -> f32 {
    let border = style.border.map(|(w, _)| w).unwrap_or(0.0);
    (width - 2.0 * (style.padding + border)).max(1.0)
}

/// Split `width` among children in proportion to their weights.
fn share_width(width: f32, gap: f32, weights: &[f32]) -> Vec<f32> {
    if weights.is_empty() {
        return Vec::new();
    }
    let usable = (width - gap * (weights.len() - 1) as f32).max(0.0);
    let total: f32 = weights.iter().sum();
    if total <= 0.0 {
        let each = usable / weights.len() as f32;
        return vec![each; weights.len()];
    }
    weights.iter().map(|w| usable * w / total).collect()
}

/// Tables are laid out as a column of rows: a shaded header row, then one
/// row per record separated by hairlines.
fn table_block(columns: &[TableColumn], rows: &[Vec<String>], header_background: Color, style: &TextStyle) -> Block {
    let cell_row = |cells: Vec<Block>, background: Option<Color>| Block::Row {
        style: BoxStyle {
            padding: CELL_PADDING,
            gap: 12.0,
            background,
            ..BoxStyle::default()
        },
        children: columns
            .iter()
            .map(|c| c.weight)
            .zip(cells)
            .collect(),
    };

    let header = cell_row(
        columns
            .iter()
            .map(|c| {
                Block::text(
                    c.header.clone(),
                    style.clone().bold().color(Color::GRAY_500).align(c.align),
                )
            })
            .collect(),
        Some(header_background),
    );

    let mut children = vec![header];
    for row in rows {
        let cells = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                Block::text(
                    row.get(i).cloned().unwrap_or_default(),
                    style.clone().align(c.align),
                )
            })
            .collect();
        children.push(cell_row(cells, None));
        children.push(Block::Rule {
            thickness: 1.0,
            color: Color::GRAY_300,
        });
    }
    Block::column(children)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Lay out a view at a fixed container width (CSS px).
pub fn layout_view(view: &View, width: f32, fonts: &FontManager) -> Result<LaidOutView> {
    let mut builder = LayoutBuilder::new(fonts, view.section);
    let child = builder.build_node(&view.root, width)?;

    let root_style = Style {
        display: Display::Flex,
        flex_direction: FlexDirection::Column,
        size: Size {
            width: Dimension::Length(width),
            height: Dimension::Auto,
        },
        ..Default::default()
    };
    let root = builder.container(root_style, &[child])?;

    builder
        .taffy
        .compute_layout(
            root,
            Size {
                width: AvailableSpace::Definite(width),
                height: AvailableSpace::MaxContent,
            },
        )
        .map_err(|e| builder.fail(e))?;

    let root_box = builder.extract(root, 0.0, 0.0)?;
    Ok(LaidOutView {
        section: view.section,
        width,
        height: root_box.height,
        root: root_box,
    })
}

/// Horizontal offset of a line inside a box of `box_width` for an alignment.
pub fn align_offset(align: TextAlign, box_width: f32, line_width: f32) -> f32 {
    match align {
        TextAlign::Left => 0.0,
        TextAlign::Center => ((box_width - line_width) / 2.0).max(0.0),
        TextAlign::Right => (box_width - line_width).max(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_text<'a>(b: &'a PositionedBox, needle: &str) -> Option<&'a PositionedBox> {
        if let BoxContent::Text { lines, .. } = &b.content {
            if lines.iter().any(|l| l.contains(needle)) {
                return Some(b);
            }
        }
        b.children.iter().find_map(|c| find_text(c, needle))
    }

    #[test]
    fn layout_simple_paragraph() {
        let view = View::new(
            SectionKind::Msa,
            Block::column(vec![Block::text("Hello world", TextStyle::default())]),
        );
        let fonts = FontManager::default();
        let laid = layout_view(&view, 794.0, &fonts).unwrap();
        assert_eq!(laid.width, 794.0);
        // 14 px × 1.4 line height
        assert!((laid.height - 19.6).abs() < 0.01, "height = {}", laid.height);
        assert_eq!(laid.line_count(), 1);
    }

    #[test]
    fn rows_share_width_by_weight() {
        let view = View::new(
            SectionKind::Invoice,
            Block::row(vec![
                (1.0, Block::text("Left", TextStyle::default())),
                (3.0, Block::text("Right", TextStyle::default())),
            ]),
        );
        let fonts = FontManager::default();
        let laid = layout_view(&view, 400.0, &fonts).unwrap();
        let left = find_text(&laid.root, "Left").unwrap();
        let right = find_text(&laid.root, "Right").unwrap();
        assert!((left.width - 100.0).abs() < 0.01);
        assert!((right.width - 300.0).abs() < 0.01);
        assert!((right.x - 100.0).abs() < 0.01);
        assert_eq!(left.y, right.y);
    }

    #[test]
    fn padding_margins_and_min_height() {
        let view = View::new(
            SectionKind::CoverPage,
            Block::column(vec![
                Block::styled_column(
                    BoxStyle {
                        padding: 10.0,
                        margin_bottom: 5.0,
                        min_height: Some(200.0),
                        ..BoxStyle::default()
                    },
                    vec![Block::spacer(20.0)],
                ),
                Block::text("After", TextStyle::default()),
            ]),
        );
        let fonts = FontManager::default();
        let laid = layout_view(&view, 300.0, &fonts).unwrap();
        let after = find_text(&laid.root, "After").unwrap();
        assert!((after.y - 205.0).abs() < 0.01, "y = {}", after.y);
    }

    #[test]
    fn long_text_wraps_and_grows() {
        let words = "lorem ipsum dolor sit amet ".repeat(40);
        let view = View::new(
            SectionKind::Msa,
            Block::column(vec![Block::text(words, TextStyle::default())]),
        );
        let fonts = FontManager::default();
        let laid = layout_view(&view, 300.0, &fonts).unwrap();
        assert!(laid.line_count() > 10);
        assert!(laid.height > 10.0 * 19.6);
    }

    #[test]
    fn tables_and_lists_produce_rows() {
        let view = View::new(
            SectionKind::Invoice,
            Block::column(vec![
                Block::Table {
                    columns: vec![
                        TableColumn::new("Item", 3.0, TextAlign::Left),
                        TableColumn::new("Total", 1.0, TextAlign::Right),
                    ],
                    rows: vec![vec!["Hosting".into(), "$500.00".into()]],
                    header_background: Color::GRAY_100,
                    style: TextStyle::default(),
                },
                Block::List {
                    ordered: true,
                    items: vec!["First".into(), "Second".into()],
                    style: TextStyle::default(),
                },
            ]),
        );
        let fonts = FontManager::default();
        let laid = layout_view(&view, 600.0, &fonts).unwrap();
        let header = find_text(&laid.root, "Item").unwrap();
        let cell = find_text(&laid.root, "Hosting").unwrap();
        assert!(cell.y > header.y);
        assert!(find_text(&laid.root, "2.").is_some());
        let second = find_text(&laid.root, "Second").unwrap();
        assert!((second.x - LIST_GUTTER).abs() < 0.01);
    }

    #[test]
    fn alignment_offsets() {
        assert_eq!(align_offset(TextAlign::Left, 100.0, 40.0), 0.0);
        assert_eq!(align_offset(TextAlign::Center, 100.0, 40.0), 30.0);
        assert_eq!(align_offset(TextAlign::Right, 100.0, 40.0), 60.0);
        assert_eq!(align_offset(TextAlign::Right, 30.0, 40.0), 0.0);
    }
}
