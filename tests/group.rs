#[cfg(test)]
mod group {
    use cortex::compound;
    use cortex::core::data::Data;
    use cortex::core::error::Error;
    use cortex::core::geometry::{Point3f, Vector3f};
    use cortex::core::group::{CoordinateSystem, Group, Renderables};
    use cortex::core::primitive::{Primitives, SpherePrimitive, PrimitiveVariableMap};
    use cortex::core::state::{AttributeState, MatrixMotionTransform, Shader, StateRenderables, Transforms};
    use cortex::core::transform::Transform;
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn sphere(radius: f32) -> Arc<Primitives> {
        Arc::new(SpherePrimitive::new(radius, -1.0, 1.0, 360.0, PrimitiveVariableMap::new()).into())
    }

    fn radii(g: &Group) -> Vec<f32> {
        g.children()
            .iter()
            .filter_map(|c| match c {
                Renderables::Primitive(p) => match p.as_ref() {
                    Primitives::SpherePrimitive(s) => Some(s.radius),
                    _ => None
                },
                _ => None
            })
            .collect()
    }

    #[test]
    fn children_keep_insertion_order() {
        let g = Group::new();
        let (a, b, c) = (sphere(1.0), sphere(2.0), sphere(3.0));

        g.add_child(a).unwrap();
        g.add_child(b.clone()).unwrap();
        g.add_child(c).unwrap();
        assert_eq!(radii(&g), vec![1.0, 2.0, 3.0]);

        g.remove_child(&Renderables::from(b.clone())).unwrap();
        assert_eq!(radii(&g), vec![1.0, 3.0]);

        match g.remove_child(&Renderables::from(b)) {
            Err(Error::NotFound { .. }) => (),
            r => panic!("expected NotFound, got {:?}", r)
        }
    }

    #[test]
    fn removal_is_by_identity() {
        let g = Group::new();
        g.add_child(sphere(1.0)).unwrap();

        // Equal value, different object
        assert!(g.remove_child(&Renderables::from(sphere(1.0))).is_err());
        assert_eq!(g.children().len(), 1);
    }

    #[test]
    fn transform_is_not_a_state() {
        let g = Group::new();

        match g.add_state(Transforms::from(Transform::new())) {
            Err(Error::Type { .. }) => (),
            r => panic!("expected Type error, got {:?}", r)
        }

        let shader = Shader::new("surface", "plastic", compound!{});
        assert!(matches!(g.remove_state(&shader.clone().into()), Err(Error::NotFound { .. })));

        g.add_state(shader.clone()).unwrap();
        g.remove_state(&StateRenderables::from(shader)).unwrap();
        assert!(g.state().is_empty());
    }

    #[test]
    fn cannot_add_to_own_subtree() {
        let root = Group::new();
        let child = Group::new();
        root.add_child(child.clone()).unwrap();

        assert!(matches!(root.add_child(root.clone()), Err(Error::Hierarchy { .. })));
        assert!(matches!(child.add_child(root.clone()), Err(Error::Hierarchy { .. })));
    }

    #[test]
    fn reparenting_requires_removal_first() {
        let a = Group::new();
        let b = Group::new();
        let c = Group::new();

        a.add_child(c.clone()).unwrap();
        assert!(matches!(b.add_child(c.clone()), Err(Error::Hierarchy { .. })));
        assert!(Arc::ptr_eq(&c.parent().unwrap(), &a));

        a.remove_child(&Renderables::from(c.clone())).unwrap();
        assert!(c.parent().is_none());

        b.add_child(c.clone()).unwrap();
        assert!(Arc::ptr_eq(&c.parent().unwrap(), &b));
        assert!(a.children().is_empty());
    }

    #[test]
    fn parent_link_does_not_own() {
        let child = Group::new();
        {
            let parent = Group::new();
            parent.add_child(child.clone()).unwrap();
            assert!(child.parent().is_some());
        }

        assert!(child.parent().is_none());
    }

    #[test]
    fn attributes_inherit_from_parents() {
        let parent = Group::new();
        let child = Group::new();
        parent.add_child(child.clone()).unwrap();

        parent.set_attribute("name", "a".into());
        parent.add_state(AttributeState::new(compound!{ "user:x" => 1 })).unwrap();
        assert_eq!(child.get_attribute("name"), Some(Data::from("a")));

        child.set_attribute("name", "b".into());
        assert_eq!(child.get_attribute("name"), Some(Data::from("b")));
        assert_eq!(child.get_attribute("user:x"), Some(Data::Int(1)));
        assert_eq!(child.get_attribute("missing"), None);

        // set_attribute updates the existing state rather than adding one
        parent.set_attribute("name", "c".into());
        assert_eq!(parent.state().len(), 2);
        assert_eq!(parent.get_attribute("name"), Some(Data::from("c")));
    }

    #[test]
    fn global_transform_follows_parents() {
        let parent = Group::new();
        let child = Group::new();
        parent.add_child(child.clone()).unwrap();

        parent.set_transform(Some(Transform::translate(&Vector3f::new(1.0, 0.0, 0.0)).into()));
        child.set_transform(Some(Transform::translate(&Vector3f::new(0.0, 2.0, 0.0)).into()));

        let p = child.global_transform_matrix(0.0).transform_point(&Point3f::origin());
        assert_relative_eq!(p.x, 1.0);
        assert_relative_eq!(p.y, 2.0);
        assert_eq!(Group::new().transform_matrix(0.0), Transform::new());
    }

    #[test]
    fn bound_includes_transform() {
        let g = Group::new();
        g.add_child(sphere(1.0)).unwrap();
        g.add_child(CoordinateSystem::new("frame", None)).unwrap();
        g.set_transform(Some(Transform::translate(&Vector3f::new(2.0, 0.0, 0.0)).into()));

        let b = g.bound().unwrap();
        assert_relative_eq!(b.p_min.x, 1.0);
        assert_relative_eq!(b.p_max.x, 3.0);
        assert_relative_eq!(b.p_max.z, 1.0);

        assert!(Group::new().bound().unwrap().is_empty());
    }

    #[test]
    fn animated_bound_covers_every_sample() {
        let g = Group::new();
        g.add_child(sphere(1.0)).unwrap();

        let motion = MatrixMotionTransform::from_samples(vec![
            (0.0, Transform::new()),
            (1.0, Transform::translate(&Vector3f::new(4.0, 0.0, 0.0)))
        ]).unwrap();
        g.set_transform(Some(motion.into()));

        let b = g.bound().unwrap();
        assert_relative_eq!(b.p_min.x, -1.0);
        assert_relative_eq!(b.p_max.x, 5.0);
    }

    #[test]
    fn clear_detaches_children() {
        let g = Group::new();
        let child = Group::new();
        g.add_child(child.clone()).unwrap();
        g.add_state(AttributeState::default()).unwrap();

        g.clear_children();
        g.clear_state();

        assert!(g.children().is_empty());
        assert!(g.state().is_empty());
        assert!(child.parent().is_none());
    }
}
