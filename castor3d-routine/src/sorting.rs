//! Draw order of render nodes.

use glam::Vec3;
use ordered_float::OrderedFloat;

use crate::pass::RenderNode;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Sorting {
    FrontToBack,
    BackToFront,
}

/// Orders nodes by squared distance between their world position and the
/// camera.
pub fn sort_nodes(nodes: &mut [RenderNode], camera_location: Vec3, sorting: Sorting) {
    profiling::scope!("Sorting");

    match sorting {
        Sorting::FrontToBack => {
            nodes.sort_unstable_by_key(|n| OrderedFloat(n.location().distance_squared(camera_location)));
        }
        Sorting::BackToFront => {
            nodes.sort_unstable_by_key(|n| OrderedFloat(-n.location().distance_squared(camera_location)));
        }
    }
}

#[cfg(test)]
mod tests {
    use castor3d::scene::Pass;
    use glam::{Mat4, Vec3};

    use super::{sort_nodes, Sorting};
    use crate::pass::RenderNode;

    fn node(name: &str, z: f32) -> RenderNode {
        RenderNode {
            geometry: name.into(),
            mesh: "quad".into(),
            model: Mat4::from_translation(Vec3::new(0.0, 0.0, z)),
            pass: Pass::default(),
        }
    }

    fn names(nodes: &[RenderNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.geometry.as_str()).collect()
    }

    #[test]
    fn transparent_nodes_draw_far_first() {
        let mut nodes = vec![node("near", -1.0), node("far", -10.0), node("middle", -5.0)];
        sort_nodes(&mut nodes, Vec3::ZERO, Sorting::BackToFront);
        assert_eq!(names(&nodes), ["far", "middle", "near"]);

        sort_nodes(&mut nodes, Vec3::ZERO, Sorting::FrontToBack);
        assert_eq!(names(&nodes), ["near", "middle", "far"]);
    }

    #[test]
    fn distance_is_from_the_camera() {
        let mut nodes = vec![node("a", -1.0), node("b", -10.0)];
        sort_nodes(&mut nodes, Vec3::new(0.0, 0.0, -12.0), Sorting::FrontToBack);
        assert_eq!(names(&nodes), ["b", "a"]);
    }
}
