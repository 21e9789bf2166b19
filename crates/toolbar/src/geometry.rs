//! Rectangle math for floating panels.
//!
//! Inputs are in viewport space unless noted. `place_floating_element`
//! returns coordinates relative to the anchor element the panel is
//! positioned in.

use serde::{Deserialize, Serialize};

/// Coordinate used for a hidden panel. Far enough off-screen to never show.
pub const OFFSCREEN: f32 = -10000.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f32,
    pub left: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(top: f32, left: f32, width: f32, height: f32) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn contains_point(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right() && y >= self.top && y <= self.bottom()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Viewport position of the element a panel is laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Origin {
    pub top: f32,
    pub left: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub top: f32,
    pub left: f32,
    pub opacity: f32,
}

impl Placement {
    pub const HIDDEN: Placement = Placement {
        top: OFFSCREEN,
        left: OFFSCREEN,
        opacity: 0.0,
    };

    pub fn is_visible(&self) -> bool {
        self.opacity > 0.0
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::HIDDEN
    }
}

/// Read access to the host's element tree.
pub trait LayoutView {
    type Node: Copy + PartialEq;

    /// The editable root element.
    fn root(&self) -> Self::Node;
    fn first_element_child(&self, node: Self::Node) -> Option<Self::Node>;
    /// Bounding rect in viewport space.
    fn rect_of(&self, node: Self::Node) -> Rect;
}

/// Snapshot of the host's live text selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeSelection<N> {
    pub anchor_node: N,
    pub is_collapsed: bool,
    /// Bounding rect of the first range, viewport space.
    pub range_rect: Rect,
}

/// Rect of the native selection in viewport space.
///
/// A selection anchored on the root itself (select-all from the start) has
/// no useful range rect, so the first leaf element is measured instead.
pub fn resolve_selection_rect<L: LayoutView + ?Sized>(
    native: &NativeSelection<L::Node>,
    layout: &L,
) -> Rect {
    let root = layout.root();
    if native.anchor_node != root {
        return native.range_rect;
    }
    let mut inner = root;
    while let Some(child) = layout.first_element_child(inner) {
        inner = child;
    }
    layout.rect_of(inner)
}

pub fn place_floating_element(
    target: Option<Rect>,
    panel: Size,
    anchor: Origin,
    container: Rect,
    vertical_gap: f32,
    horizontal_offset: f32,
) -> Placement {
    let Some(target) = target else {
        return Placement::HIDDEN;
    };

    let mut top = target.top - panel.height - vertical_gap;
    let mut left = target.left - horizontal_offset;

    if top < container.top {
        top += panel.height + target.height + vertical_gap * 2.0;
    }
    if left + panel.width > container.right() {
        left = container.right() - panel.width - horizontal_offset;
    }

    Placement {
        top: top - anchor.top,
        left: left - anchor.left,
        opacity: 1.0,
    }
}
