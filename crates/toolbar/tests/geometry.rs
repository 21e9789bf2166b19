use plate_toolbar::{
    LayoutView, NativeSelection, OFFSCREEN, Origin, Placement, Rect, Size, place_floating_element,
    resolve_selection_rect,
};
use pretty_assertions::assert_eq;

const CONTAINER: Rect = Rect {
    top: 0.0,
    left: 0.0,
    width: 800.0,
    height: 600.0,
};
const PANEL: Size = Size {
    width: 200.0,
    height: 40.0,
};

fn place(target: Option<Rect>) -> Placement {
    place_floating_element(target, PANEL, Origin::default(), CONTAINER, 10.0, 5.0)
}

#[test]
fn panel_above_the_container_flips_below_the_target() {
    let placement = place(Some(Rect::new(5.0, 10.0, 50.0, 20.0)));
    assert_eq!(
        placement,
        Placement {
            top: 35.0,
            left: 5.0,
            opacity: 1.0,
        }
    );
    assert!(placement.left + PANEL.width <= CONTAINER.right());
}

#[test]
fn panel_sits_above_the_target_when_there_is_room() {
    let placement = place(Some(Rect::new(300.0, 100.0, 50.0, 20.0)));
    assert_eq!((placement.top, placement.left), (250.0, 95.0));
}

#[test]
fn panel_is_pulled_back_inside_the_right_edge() {
    let placement = place(Some(Rect::new(300.0, 700.0, 50.0, 20.0)));
    assert_eq!(placement.left, 595.0);
    assert!(placement.left + PANEL.width <= CONTAINER.right());
}

#[test]
fn result_is_relative_to_the_anchor() {
    let placement = place_floating_element(
        Some(Rect::new(300.0, 100.0, 50.0, 20.0)),
        PANEL,
        Origin {
            top: 50.0,
            left: 20.0,
        },
        CONTAINER,
        10.0,
        5.0,
    );
    assert_eq!((placement.top, placement.left), (200.0, 75.0));
}

#[test]
fn missing_target_hides_the_panel() {
    let placement = place(None);
    assert_eq!(placement, Placement::HIDDEN);
    assert_eq!(placement.opacity, 0.0);
    assert!(placement.top <= -9999.0 && placement.left <= -9999.0);
    assert_eq!(placement.top, OFFSCREEN);
    assert!(!placement.is_visible());
}

/// root(0) > 1 > 2, plus an unrelated node 3.
struct ChainLayout;

impl LayoutView for ChainLayout {
    type Node = u32;

    fn root(&self) -> u32 {
        0
    }

    fn first_element_child(&self, node: u32) -> Option<u32> {
        match node {
            0 => Some(1),
            1 => Some(2),
            _ => None,
        }
    }

    fn rect_of(&self, node: u32) -> Rect {
        Rect::new(node as f32 * 10.0, 4.0, 100.0, 18.0)
    }
}

#[test]
fn selection_on_the_root_measures_the_innermost_first_child() {
    let native = NativeSelection {
        anchor_node: 0,
        is_collapsed: false,
        range_rect: Rect::default(),
    };
    assert_eq!(
        resolve_selection_rect(&native, &ChainLayout),
        Rect::new(20.0, 4.0, 100.0, 18.0)
    );
}

#[test]
fn selection_elsewhere_uses_the_range_rect() {
    let range_rect = Rect::new(40.0, 12.0, 30.0, 16.0);
    let native = NativeSelection {
        anchor_node: 3,
        is_collapsed: false,
        range_rect,
    };
    assert_eq!(resolve_selection_rect(&native, &ChainLayout), range_rect);
}
