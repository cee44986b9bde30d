//! Draw and preview styling.
//!
//! Every drawn geometry is painted in one of three states: active (being
//! drawn or selected), inactive (finished, editable) or static (display
//! only). The palette distinguishes all three.

use peniko::Color;

/// Active fill and stroke (purple).
pub const ACTIVE: Color = Color::from_rgb8(0x8B, 0x40, 0xDF);
/// Inactive and static fill and stroke (magenta).
pub const INACTIVE: Color = Color::from_rgb8(0xD6, 0x0D, 0xA3);
/// Outline of inactive polygons.
pub const OUTLINE: Color = Color::from_rgb8(0x00, 0x00, 0x00);
/// Halo behind points and vertices.
pub const HALO: Color = Color::from_rgb8(0xFF, 0xFF, 0xFF);
/// Raw GeoJSON preview color.
pub const PREVIEW: Color = Color::from_rgb8(0x3B, 0xB2, 0xD0);

/// Id of the map source that shows the raw GeoJSON preview.
pub const PREVIEW_SOURCE_ID: &str = "geojson-editor-data";

/// Visual state of a drawn feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleState {
    Active,
    Inactive,
    Static,
}

/// What a style layer paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleTarget {
    Polygon,
    Line,
    Point,
    /// Vertices of lines and polygons under edit.
    Vertex,
    /// Midpoint handles between vertices.
    Midpoint,
}

#[derive(Debug, Clone, Copy)]
pub enum Paint {
    Fill {
        color: Color,
        outline: Color,
        opacity: f32,
    },
    Line {
        color: Color,
        width: f32,
        dashed: bool,
    },
    Circle {
        color: Color,
        radius: f32,
    },
}

/// One style layer.
#[derive(Debug, Clone, Copy)]
pub struct DrawStyle {
    pub id: &'static str,
    pub target: StyleTarget,
    /// `None` applies in every state.
    pub state: Option<StyleState>,
    pub paint: Paint,
}

impl DrawStyle {
    const fn new(
        id: &'static str,
        target: StyleTarget,
        state: Option<StyleState>,
        paint: Paint,
    ) -> Self {
        Self {
            id,
            target,
            state,
            paint,
        }
    }

    pub fn applies_to(&self, target: StyleTarget, state: StyleState) -> bool {
        self.target == target && self.state.is_none_or(|s| s == state)
    }
}

const fn fill(color: Color, outline: Color, opacity: f32) -> Paint {
    Paint::Fill {
        color,
        outline,
        opacity,
    }
}

const fn line(color: Color, width: f32, dashed: bool) -> Paint {
    Paint::Line {
        color,
        width,
        dashed,
    }
}

const fn circle(color: Color, radius: f32) -> Paint {
    Paint::Circle { color, radius }
}

use StyleState::{Active, Inactive, Static};
use StyleTarget::{Line as LineT, Midpoint, Point, Polygon, Vertex};

const DRAW_STYLES: &[DrawStyle] = &[
    DrawStyle::new(
        "gl-draw-polygon-fill-inactive",
        Polygon,
        Some(Inactive),
        fill(INACTIVE, OUTLINE, 0.5),
    ),
    DrawStyle::new(
        "gl-draw-polygon-fill-active",
        Polygon,
        Some(Active),
        fill(ACTIVE, ACTIVE, 0.2),
    ),
    DrawStyle::new(
        "gl-draw-polygon-midpoint",
        Midpoint,
        None,
        circle(ACTIVE, 3.0),
    ),
    DrawStyle::new(
        "gl-draw-polygon-stroke-inactive",
        Polygon,
        Some(Inactive),
        line(INACTIVE, 2.0, false),
    ),
    DrawStyle::new(
        "gl-draw-polygon-stroke-active",
        Polygon,
        Some(Active),
        line(ACTIVE, 2.0, true),
    ),
    DrawStyle::new(
        "gl-draw-line-inactive",
        LineT,
        Some(Inactive),
        line(INACTIVE, 2.0, false),
    ),
    DrawStyle::new(
        "gl-draw-line-active",
        LineT,
        Some(Active),
        line(ACTIVE, 2.0, true),
    ),
    DrawStyle::new(
        "gl-draw-polygon-and-line-vertex-stroke-inactive",
        Vertex,
        Some(Inactive),
        circle(HALO, 5.0),
    ),
    DrawStyle::new(
        "gl-draw-polygon-and-line-vertex-inactive",
        Vertex,
        Some(Inactive),
        circle(ACTIVE, 3.0),
    ),
    DrawStyle::new(
        "gl-draw-point-point-stroke-inactive",
        Point,
        Some(Inactive),
        circle(HALO, 5.0),
    ),
    DrawStyle::new(
        "gl-draw-point-inactive",
        Point,
        Some(Inactive),
        circle(INACTIVE, 3.0),
    ),
    DrawStyle::new(
        "gl-draw-point-stroke-active",
        Point,
        Some(Active),
        circle(HALO, 7.0),
    ),
    DrawStyle::new(
        "gl-draw-point-active",
        Point,
        Some(Active),
        circle(ACTIVE, 5.0),
    ),
    DrawStyle::new(
        "gl-draw-polygon-fill-static",
        Polygon,
        Some(Static),
        fill(INACTIVE, INACTIVE, 0.1),
    ),
    DrawStyle::new(
        "gl-draw-polygon-stroke-static",
        Polygon,
        Some(Static),
        line(INACTIVE, 2.0, false),
    ),
    DrawStyle::new(
        "gl-draw-line-static",
        LineT,
        Some(Static),
        line(INACTIVE, 2.0, false),
    ),
    DrawStyle::new(
        "gl-draw-point-static",
        Point,
        Some(Static),
        circle(INACTIVE, 5.0),
    ),
];

const PREVIEW_STYLES: &[DrawStyle] = &[
    DrawStyle::new(
        "geojson-editor-polygon-fill",
        Polygon,
        None,
        fill(PREVIEW, PREVIEW, 0.1),
    ),
    DrawStyle::new(
        "geojson-editor-polygon-stroke-base",
        Polygon,
        None,
        line(HALO, 4.0, false),
    ),
    DrawStyle::new(
        "geojson-editor-polygon-stroke",
        Polygon,
        None,
        line(PREVIEW, 2.0, false),
    ),
    DrawStyle::new(
        "geojson-editor-line",
        LineT,
        None,
        line(PREVIEW, 2.0, false),
    ),
    DrawStyle::new(
        "geojson-editor-point-point-stroke",
        Point,
        None,
        circle(HALO, 6.0),
    ),
    DrawStyle::new("geojson-editor-point", Point, None, circle(PREVIEW, 5.0)),
];

/// Style layers for the draw surface.
pub fn draw_styles() -> &'static [DrawStyle] {
    DRAW_STYLES
}

/// Style layers for the raw GeoJSON preview source.
pub fn preview_styles() -> &'static [DrawStyle] {
    PREVIEW_STYLES
}

/// Styles painting `target` in `state`, in paint order.
pub fn styles_for(
    target: StyleTarget,
    state: StyleState,
) -> impl Iterator<Item = &'static DrawStyle> {
    DRAW_STYLES.iter().filter(move |s| s.applies_to(target, state))
}

/// `#rrggbb` form of a color.
pub fn to_hex(color: Color) -> String {
    let rgba = color.to_rgba8();
    format!("#{:02x}{:02x}{:02x}", rgba.r, rgba.g, rgba.b)
}
