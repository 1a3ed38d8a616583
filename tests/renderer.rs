#[cfg(test)]
mod recording_renderer {
    use cortex::compound;
    use cortex::core::data::Data;
    use cortex::core::error::{Error, Result};
    use cortex::core::geometry::Vector3f;
    use cortex::core::geometry::bounds::Bounds3f;
    use cortex::core::group::{CoordinateSystem, Group, Renderables};
    use cortex::core::parameterised::ParameterisedProcedural;
    use cortex::core::primitive::{Primitives, PrimitiveVariableMap, SpherePrimitive};
    use cortex::core::renderer::{Procedural, Renderer};
    use cortex::core::state::{AttributeState, MatrixMotionTransform};
    use cortex::core::statestack::CULL_REGION;
    use cortex::core::transform::Transform;
    use cortex::procedurals::sphereflake::SphereFlakeProcedural;
    use cortex::renderers::recording::{Call, ProceduralMode, RecordingRenderer};
    use std::sync::Mutex;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behaviour {
        Sphere,
        Fail(fn() -> Error),
        LeaveOpen
    }

    /// Counts renders and remembers the "name" attribute it saw each time.
    struct Content {
        bound     : Bounds3f,
        behaviour : Behaviour,
        renders   : AtomicUsize,
        names     : Mutex<Vec<Option<Data>>>
    }

    impl Content {
        fn new(bound: Bounds3f, behaviour: Behaviour) -> Arc<Content> {
            Arc::new(Content {
                bound,
                behaviour,
                renders: AtomicUsize::new(0),
                names: Mutex::new(Vec::new())
            })
        }

        fn renders(&self) -> usize {
            self.renders.load(Ordering::SeqCst)
        }
    }

    impl Procedural for Content {
        fn bound(&self) -> Result<Bounds3f> {
            Ok(self.bound)
        }

        fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            self.names.lock().unwrap().push(renderer.get_attribute("name"));

            renderer.sphere(0.5, -1.0, 1.0, 360.0, &PrimitiveVariableMap::new())?;

            match self.behaviour {
                Behaviour::Sphere => Ok(()),
                Behaviour::Fail(e) => Err(e()),
                Behaviour::LeaveOpen => renderer.attribute_begin()
            }
        }
    }

    fn in_world() -> RecordingRenderer {
        let mut r = RecordingRenderer::default();
        r.world_begin().unwrap();
        r
    }

    fn is_state_error<T: std::fmt::Debug>(r: Result<T>) -> bool {
        matches!(r, Err(Error::State { .. }))
    }

    #[test]
    fn group_renders_state_then_children() {
        let g = Group::new();
        g.add_state(AttributeState::new(compound!{ "name" => "bob" })).unwrap();
        g.set_transform(Some(Transform::new().into()));
        g.add_child(Primitives::from(SpherePrimitive::default())).unwrap();

        let mut r = in_world();
        g.render(&mut r, true).unwrap();
        r.world_end().unwrap();

        assert_eq!(r.calls(), &[
            Call::WorldBegin,
            Call::AttributeBegin,
            Call::ConcatTransform(Transform::new()),
            Call::SetAttribute("name".to_owned(), Data::from("bob")),
            Call::Sphere { radius: 1.0, z_min: -1.0, z_max: 1.0, theta_max: 360.0 },
            Call::AttributeEnd,
            Call::WorldEnd
        ][..]);
    }

    #[test]
    fn group_motion_transform_renders_one_concat_per_key() {
        let t0 = Transform::new();
        let t1 = Transform::translate(&Vector3f::new(0.0, 2.0, 0.0));

        let g = Group::new();
        let m = MatrixMotionTransform::from_samples(vec![(0.0, t0), (1.0, t1)]).unwrap();
        g.set_transform(Some(m.into()));
        g.add_child(Primitives::from(SpherePrimitive::default())).unwrap();

        let mut r = in_world();
        g.render(&mut r, true).unwrap();
        r.world_end().unwrap();

        assert_eq!(r.calls(), &[
            Call::WorldBegin,
            Call::AttributeBegin,
            Call::MotionBegin(vec![0.0, 1.0]),
            Call::ConcatTransform(t0),
            Call::ConcatTransform(t1),
            Call::MotionEnd,
            Call::Sphere { radius: 1.0, z_min: -1.0, z_max: 1.0, theta_max: 360.0 },
            Call::AttributeEnd,
            Call::WorldEnd
        ][..]);
    }

    #[test]
    fn coordinate_system_child_is_scoped() {
        let t = Transform::translate(&Vector3f::new(0.0, 0.0, 4.0));

        let g = Group::new();
        g.add_child(CoordinateSystem::new("lamp", Some(t.into()))).unwrap();

        let mut r = in_world();
        g.render(&mut r, false).unwrap();

        assert_eq!(r.get_named_transform("lamp").unwrap(), t);
        assert_eq!(r.get_transform().unwrap(), Transform::new());
        r.world_end().unwrap();

        assert_eq!(r.calls(), &[
            Call::WorldBegin,
            Call::TransformBegin,
            Call::ConcatTransform(t),
            Call::CoordinateSystem("lamp".to_owned()),
            Call::TransformEnd,
            Call::WorldEnd
        ][..]);
    }

    #[test]
    fn parameterised_child_goes_through_procedural() {
        let mut flake = SphereFlakeProcedural::new().unwrap();
        flake.parameters_mut().set_value("levels", 0).unwrap();

        let g = Group::new();
        g.add_child(Renderables::Parameterised(Arc::new(flake))).unwrap();

        let mut r = in_world();
        g.render(&mut r, true).unwrap();
        r.world_end().unwrap();

        assert_eq!(r.calls(), &[
            Call::WorldBegin,
            Call::AttributeBegin,
            Call::AttributeBegin,
            Call::SetAttribute("name".to_owned(), Data::from("/flake")),
            Call::ProceduralBegin(Bounds3f::from_radius(1.0)),
            Call::Sphere { radius: 1.0, z_min: -1.0, z_max: 1.0, theta_max: 360.0 },
            Call::ProceduralEnd,
            Call::AttributeEnd,
            Call::AttributeEnd,
            Call::WorldEnd
        ][..]);
    }

    #[test]
    fn blocks_must_match() {
        let mut r = in_world();

        assert!(is_state_error(r.attribute_end()));
        assert!(is_state_error(r.transform_end()));

        r.attribute_begin().unwrap();
        assert!(is_state_error(r.transform_end()));
        assert!(is_state_error(r.world_end()));

        r.attribute_end().unwrap();
        r.world_end().unwrap();
    }

    #[test]
    fn state_machine_order() {
        let mut r = RecordingRenderer::default();

        assert!(is_state_error(r.attribute_begin()));
        r.set_option("user:frame", &Data::Int(1)).unwrap();
        r.camera("main", &compound!{}).unwrap();

        r.world_begin().unwrap();
        assert!(is_state_error(r.set_option("user:frame", &Data::Int(2))));
        assert!(is_state_error(r.camera("other", &compound!{})));
        assert!(is_state_error(r.world_begin()));
        r.world_end().unwrap();

        assert!(is_state_error(r.sphere(1.0, -1.0, 1.0, 360.0, &PrimitiveVariableMap::new())));
        assert!(is_state_error(r.world_begin()));
        assert_eq!(r.get_option("user:frame"), Some(Data::Int(1)));
    }

    #[test]
    fn attribute_block_restores_state() {
        let mut r = in_world();
        r.set_attribute("name", &"outer".into()).unwrap();

        r.attribute_begin().unwrap();
        r.set_attribute("name", &"inner".into()).unwrap();
        r.concat_transform(&Transform::translate(&Vector3f::new(1.0, 0.0, 0.0))).unwrap();
        assert_eq!(r.get_attribute("name"), Some(Data::from("inner")));
        r.attribute_end().unwrap();

        assert_eq!(r.get_attribute("name"), Some(Data::from("outer")));
        assert_eq!(r.get_transform().unwrap(), Transform::new());

        // Transform blocks only restore the transform
        r.transform_begin().unwrap();
        r.set_attribute("name", &"kept".into()).unwrap();
        r.concat_transform(&Transform::scale(2.0, 2.0, 2.0)).unwrap();
        r.transform_end().unwrap();

        assert_eq!(r.get_attribute("name"), Some(Data::from("kept")));
        assert_eq!(r.get_transform().unwrap(), Transform::new());
    }

    #[test]
    fn named_coordinate_systems() {
        let t = Transform::translate(&Vector3f::new(0.0, 0.0, 5.0));
        let mut r = in_world();

        r.concat_transform(&t).unwrap();
        r.coordinate_system("camera").unwrap();

        r.attribute_begin().unwrap();
        r.set_transform(&Transform::new()).unwrap();
        r.set_transform_from("camera").unwrap();
        assert_eq!(r.get_transform().unwrap(), t);
        assert!(matches!(r.set_transform_from("nowhere"), Err(Error::NotFound { .. })));
        r.attribute_end().unwrap();

        assert_eq!(r.get_named_transform("world").unwrap(), Transform::new());
        assert_eq!(r.get_named_transform("camera").unwrap(), t);
    }

    #[test]
    fn shaders_and_lights() {
        let mut r = in_world();

        r.shader("surface", "matte", &compound!{}).unwrap();
        r.shader("surface", "plastic", &compound!{ "Ks" => 0.5 as f32 }).unwrap();
        assert_eq!(r.stack().graphics_state().shaders.len(), 1);
        assert_eq!(r.stack().graphics_state().shaders[0].name, "plastic");

        r.light("distant", "key", &compound!{}).unwrap();
        r.illuminate("key", false).unwrap();
        assert_eq!(r.stack().graphics_state().lights.get("key"), Some(&false));
        assert!(matches!(r.illuminate("fill", true), Err(Error::NotFound { .. })));
    }

    #[test]
    fn motion_transform_block() {
        let t0 = Transform::new();
        let t1 = Transform::translate(&Vector3f::new(3.0, 0.0, 0.0));
        let mut r = in_world();

        r.motion_begin(&[0.0, 1.0]).unwrap();
        assert!(is_state_error(r.motion_begin(&[0.0])));
        assert!(is_state_error(r.attribute_begin()));
        r.concat_transform(&t0).unwrap();
        r.concat_transform(&t1).unwrap();
        r.motion_end().unwrap();

        assert_eq!(r.get_transform().unwrap(), t0);
        assert_eq!(r.stack().current_transform().transform(1.0), t1);
        assert!(is_state_error(r.motion_end()));
    }

    #[test]
    fn motion_requires_matching_topology() {
        let vars = PrimitiveVariableMap::new();
        let mut r = in_world();

        r.motion_begin(&[0.0, 1.0]).unwrap();
        r.sphere(1.0, -1.0, 1.0, 360.0, &vars).unwrap();
        assert!(matches!(r.points(0, &vars), Err(Error::TopologyMismatch { .. })));

        let mut r = in_world();
        r.motion_begin(&[0.0, 1.0]).unwrap();
        r.sphere(1.0, -1.0, 1.0, 360.0, &vars).unwrap();
        assert!(matches!(r.motion_end(), Err(Error::TopologyMismatch { .. })));

        let mut r = in_world();
        assert!(r.motion_begin(&[1.0, 0.0]).is_err());
        assert!(r.motion_begin(&[]).is_err());
    }

    #[test]
    fn procedural_renders_in_own_block() {
        let p = Content::new(Bounds3f::from_radius(1.0), Behaviour::Sphere);
        let mut r = in_world();

        r.set_attribute("name", &"parent".into()).unwrap();
        r.procedural(p.clone()).unwrap();
        r.world_end().unwrap();

        assert_eq!(p.renders(), 1);
        assert_eq!(*p.names.lock().unwrap(), vec![Some(Data::from("parent"))]);
        assert!(r.calls().contains(&Call::ProceduralBegin(Bounds3f::from_radius(1.0))));
    }

    #[test]
    fn culled_procedural_never_renders() {
        let mut r = RecordingRenderer::default();
        r.set_option(CULL_REGION, &Data::Box3f(Bounds3f::from_radius(1.0))).unwrap();
        r.world_begin().unwrap();

        let outside = Content::new(Bounds3f::from_radius(1.0), Behaviour::Sphere);
        let inside = Content::new(Bounds3f::from_radius(1.0), Behaviour::Sphere);
        let empty = Content::new(Bounds3f::empty(), Behaviour::Sphere);

        r.transform_begin().unwrap();
        r.concat_transform(&Transform::translate(&Vector3f::new(10.0, 0.0, 0.0))).unwrap();
        r.procedural(outside.clone()).unwrap();
        r.transform_end().unwrap();

        r.procedural(inside.clone()).unwrap();
        r.procedural(empty.clone()).unwrap();
        r.world_end().unwrap();

        assert_eq!(outside.renders(), 0);
        assert_eq!(inside.renders(), 1);
        assert_eq!(empty.renders(), 0);

        let culled = r.calls().iter().filter(|c| matches!(c, Call::ProceduralCulled(_))).count();
        assert_eq!(culled, 2);
    }

    #[test]
    fn culling_sees_every_motion_sample() {
        let mut r = RecordingRenderer::default();
        r.set_option(CULL_REGION, &Data::Box3f(Bounds3f::from_radius(1.0))).unwrap();
        r.world_begin().unwrap();

        let arriving = Content::new(Bounds3f::from_radius(1.0), Behaviour::Sphere);
        let away = Content::new(Bounds3f::from_radius(1.0), Behaviour::Sphere);

        r.transform_begin().unwrap();
        r.motion_begin(&[0.0, 1.0]).unwrap();
        r.concat_transform(&Transform::translate(&Vector3f::new(50.0, 0.0, 0.0))).unwrap();
        r.concat_transform(&Transform::new()).unwrap();
        r.motion_end().unwrap();
        r.procedural(arriving.clone()).unwrap();
        r.transform_end().unwrap();

        r.motion_begin(&[0.0, 1.0]).unwrap();
        r.concat_transform(&Transform::translate(&Vector3f::new(50.0, 0.0, 0.0))).unwrap();
        r.concat_transform(&Transform::translate(&Vector3f::new(60.0, 0.0, 0.0))).unwrap();
        r.motion_end().unwrap();
        r.procedural(away.clone()).unwrap();
        r.world_end().unwrap();

        assert_eq!(arriving.renders(), 1);
        assert_eq!(away.renders(), 0);
    }

    #[test]
    fn deferred_procedurals_render_once_at_world_end() {
        let first = Content::new(Bounds3f::from_radius(1.0), Behaviour::Sphere);
        let second = Content::new(Bounds3f::from_radius(1.0), Behaviour::Sphere);
        let mut r = RecordingRenderer::new(ProceduralMode::Deferred);
        r.world_begin().unwrap();

        r.attribute_begin().unwrap();
        r.set_attribute("name", &"first".into()).unwrap();
        r.procedural(first.clone()).unwrap();
        r.attribute_end().unwrap();
        r.procedural(second.clone()).unwrap();

        assert_eq!(first.renders() + second.renders(), 0);
        r.world_end().unwrap();

        assert_eq!(first.renders(), 1);
        assert_eq!(second.renders(), 1);
        assert_eq!(*first.names.lock().unwrap(), vec![Some(Data::from("first"))]);
        assert_eq!(*second.names.lock().unwrap(), vec![None]);

        // Call order is preserved
        let begins: Vec<usize> = r.calls()
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c, Call::ProceduralBegin(_)))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(begins.len(), 2);
        assert_eq!(r.calls().last(), Some(&Call::WorldEnd));
    }

    #[test]
    fn resource_failure_renders_empty() {
        let p = Content::new(Bounds3f::from_radius(1.0), Behaviour::Fail(|| Error::resource("missing.ply", "file not found")));
        let mut r = in_world();

        r.procedural(p.clone()).unwrap();
        r.world_end().unwrap();

        assert_eq!(p.renders(), 1);
        assert!(!r.calls().iter().any(|c| matches!(c, Call::Sphere { .. })));
        assert!(r.calls().contains(&Call::ProceduralEnd));
    }

    #[test]
    fn fatal_failure_propagates() {
        let failing = Content::new(Bounds3f::from_radius(1.0), Behaviour::Fail(|| Error::invalid("bad")));
        let mut r = in_world();
        assert!(matches!(r.procedural(failing), Err(Error::InvalidArgument { .. })));

        // The call site is restored, so the world can still close
        let open = Content::new(Bounds3f::from_radius(1.0), Behaviour::LeaveOpen);
        assert!(is_state_error(r.procedural(open)));
        assert_eq!(r.stack().depth(), 0);
        r.world_end().unwrap();
    }

    #[test]
    fn listing_is_indented() {
        let mut r = in_world();
        r.attribute_begin().unwrap();
        r.sphere(1.0, -1.0, 1.0, 360.0, &PrimitiveVariableMap::new()).unwrap();
        r.attribute_end().unwrap();
        r.world_end().unwrap();

        let listing = format!("{}", r);
        let lines: Vec<&str> = listing.lines().collect();

        assert_eq!(lines[0], "WorldBegin");
        assert_eq!(lines[1], "    AttributeBegin");
        assert_eq!(lines[2], "        Sphere 1 -1 1 360");
        assert_eq!(lines[3], "    AttributeEnd");
        assert_eq!(lines[4], "WorldEnd");
    }
}
