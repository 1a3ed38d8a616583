#[cfg(test)]
mod parameterised_procedural {
    use cortex::core::cortex::Float;
    use cortex::core::data::{CompoundData, Data};
    use cortex::core::error::{Error, Result};
    use cortex::core::geometry::Vector3f;
    use cortex::core::geometry::bounds::Bounds3f;
    use cortex::core::fileutil::SearchPath;
    use cortex::core::parameter::{CompoundParameter, Parameter};
    use cortex::core::parameterised::{self, ParameterisedProcedural, RenderFlags};
    use cortex::core::primitive::PrimitiveVariableMap;
    use cortex::core::registry::ProceduralRegistry;
    use cortex::core::renderer::Renderer;
    use cortex::core::transform::Transform;
    use cortex::procedurals::sphereflake::SphereFlakeProcedural;
    use cortex::renderers::recording::{Call, RecordingRenderer};
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn flake(levels: i32) -> SphereFlakeProcedural {
        let mut p = SphereFlakeProcedural::new().unwrap();
        p.parameters_mut().set_value("levels", levels).unwrap();
        p
    }

    fn record(p: Arc<dyn ParameterisedProcedural>, flags: &RenderFlags) -> (Result<()>, Vec<Call>) {
        let mut r = RecordingRenderer::default();
        r.world_begin().unwrap();
        let res = parameterised::render(&p, &mut r, flags);

        (res, r.take_calls())
    }

    fn spheres(calls: &[Call]) -> usize {
        calls.iter().filter(|c| matches!(c, Call::Sphere { .. })).count()
    }

    /// Counts calls into `do_bound` and `do_render`.
    struct Counter {
        parameters : CompoundParameter,
        bounds     : AtomicUsize,
        renders    : AtomicUsize
    }

    impl Counter {
        fn new() -> Self {
            let parameters = CompoundParameter::new("counter", "")
                .with(Parameter::new("size", "", 1.0 as Float).with_range(Some(0.0), None))
                .unwrap();

            Self { parameters, bounds: AtomicUsize::new(0), renders: AtomicUsize::new(0) }
        }
    }

    impl ParameterisedProcedural for Counter {
        fn parameters(&self) -> &CompoundParameter {
            &self.parameters
        }

        fn parameters_mut(&mut self) -> &mut CompoundParameter {
            &mut self.parameters
        }

        fn do_bound(&self, args: &CompoundData) -> Result<Bounds3f> {
            self.bounds.fetch_add(1, Ordering::SeqCst);
            let size = args.get("size").and_then(|d| d.as_float()).unwrap_or(0.0);

            Ok(Bounds3f::from_radius(size))
        }

        fn do_render(&self, r: &mut dyn Renderer, args: &CompoundData) -> Result<()> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            let size = args.get("size").and_then(|d| d.as_float()).unwrap_or(0.0);

            r.sphere(size, -1.0, 1.0, 360.0, &PrimitiveVariableMap::new())
        }
    }

    #[test]
    fn flake_bound_matches_extent() {
        let b = parameterised::bound(&flake(0)).unwrap();
        assert_eq!(b, Bounds3f::from_radius(1.0));

        // 1 + 1/3 + (1/3 + 1/9) + 1/9
        let b = parameterised::bound(&SphereFlakeProcedural::new().unwrap()).unwrap();
        assert_relative_eq!(b.p_max.x, 17.0 / 9.0, epsilon = 1e-5);
    }

    #[test]
    fn bound_is_idempotent() {
        let p: Arc<dyn ParameterisedProcedural> = Arc::new(flake(2));

        let first = parameterised::bound(p.as_ref()).unwrap();
        let (res, _) = record(p.clone(), &RenderFlags::default());
        res.unwrap();
        let second = parameterised::bound(p.as_ref()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn flake_emits_every_level() {
        let (res, calls) = record(Arc::new(flake(1)), &RenderFlags::default());
        res.unwrap();
        assert_eq!(spheres(&calls), 7);

        let (res, calls) = record(Arc::new(flake(2)), &RenderFlags::default());
        res.unwrap();
        assert_eq!(spheres(&calls), 43);
        assert!(calls.contains(&Call::SetAttribute("name".to_owned(), Data::from("/flake/px/nz"))));
    }

    #[test]
    fn invalid_parameters_are_all_reported() {
        let mut p = SphereFlakeProcedural::new().unwrap();
        p.parameters_mut().set_value("radius", -1.0 as Float).unwrap();
        p.parameters_mut().set_value("scale", 2.0 as Float).unwrap();

        match parameterised::bound(&p) {
            Err(Error::Validation { parameters, .. }) =>
                assert_eq!(parameters, vec!["radius".to_owned(), "scale".to_owned()]),
            r => panic!("expected Validation, got {:?}", r)
        }

        let (res, calls) = record(Arc::new(p), &RenderFlags::default());
        assert!(matches!(res, Err(Error::Validation { .. })));
        assert_eq!(calls, vec![Call::WorldBegin]);
    }

    #[test]
    fn wrong_type_fails_validation() {
        let mut p = SphereFlakeProcedural::new().unwrap();
        p.parameters_mut().set_value("levels", 1.5 as Float).unwrap();

        match parameterised::bound(&p) {
            Err(Error::Validation { parameters, message }) => {
                assert_eq!(parameters, vec!["levels".to_owned()]);
                assert!(message.contains("IntData"));
            }
            r => panic!("expected Validation, got {:?}", r)
        }
    }

    #[test]
    fn flags_select_what_is_rendered() {
        let counter = Arc::new(Counter::new());
        let p: Arc<dyn ParameterisedProcedural> = counter.clone();

        let flags = RenderFlags { with_geometry: false, ..Default::default() };
        let (res, calls) = record(p.clone(), &flags);
        res.unwrap();
        assert_eq!(calls, vec![Call::WorldBegin, Call::AttributeBegin, Call::AttributeEnd]);
        assert_eq!(counter.renders.load(Ordering::SeqCst), 0);

        let flags = RenderFlags { in_attribute_block: false, immediate_geometry: true, ..Default::default() };
        let (res, calls) = record(p.clone(), &flags);
        res.unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(counter.renders.load(Ordering::SeqCst), 1);
        assert_eq!(counter.bounds.load(Ordering::SeqCst), 0);

        // Through the renderer the bound is asked for before rendering
        let (res, calls) = record(p, &RenderFlags::default());
        res.unwrap();
        assert_eq!(spheres(&calls), 1);
        assert_eq!(counter.bounds.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn culled_procedural_is_never_rendered() {
        let counter = Arc::new(Counter::new());
        let p: Arc<dyn ParameterisedProcedural> = counter.clone();

        let mut r = RecordingRenderer::default();
        r.set_option("cull:region", &Data::Box3f(Bounds3f::from_radius(1.0))).unwrap();
        r.world_begin().unwrap();
        r.concat_transform(&Transform::translate(&Vector3f::new(50.0, 0.0, 0.0))).unwrap();

        parameterised::render(&p, &mut r, &RenderFlags::default()).unwrap();
        r.world_end().unwrap();

        assert_eq!(counter.bounds.load(Ordering::SeqCst), 1);
        assert_eq!(counter.renders.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parameters_parse_from_strings() {
        let mut p = SphereFlakeProcedural::new().unwrap();
        let params = p.parameters_mut();

        params.set_value_from_str("levels", "3").unwrap();
        params.set_value_from_str("radius", "2.5").unwrap();
        assert_eq!(params.parameter("levels").unwrap().get_value(), &Data::Int(3));
        assert_eq!(params.get_value().get("radius"), Some(&Data::Float(2.5)));

        assert!(matches!(params.set_value_from_str("levels", "many"), Err(Error::Validation { .. })));
        assert!(matches!(params.set_value_from_str("depth", "1"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn presets_and_nested_parameters() {
        let mut mode = Parameter::new("mode", "", "a")
            .with_presets(vec![("a", Data::from("a")), ("b", Data::from("b"))], true);
        mode.set_preset("b").unwrap();
        assert_eq!(mode.get_value(), &Data::from("b"));
        assert!(mode.set_preset("c").is_err());

        let mut nested = CompoundParameter::new("outer", "")
            .with(CompoundParameter::new("inner", "").with(mode).unwrap())
            .unwrap();

        nested.set_value("inner.mode", "z").unwrap();
        match nested.validated_value() {
            Err(Error::Validation { parameters, .. }) => assert_eq!(parameters, vec!["inner.mode".to_owned()]),
            r => panic!("expected Validation, got {:?}", r)
        }

        nested.set_value_from_str("inner.mode", "a").unwrap();
        let value = nested.validated_value().unwrap();
        let inner = value.get("inner").and_then(|d| d.as_compound()).unwrap();
        assert_eq!(inner.get("mode"), Some(&Data::from("a")));

        assert!(matches!(
            nested.add_parameter(Parameter::new("inner", "", 1)),
            Err(Error::InvalidArgument { .. })));
    }

    #[test]
    fn registry_loads_by_name_and_version() {
        let mut registry = ProceduralRegistry::with_builtins(SearchPath::default());

        assert_eq!(registry.names(), vec!["read".to_owned(), "sphereFlake".to_owned()]);
        assert!(registry.load("sphereFlake", None).is_ok());
        assert!(matches!(registry.load("teapot", None), Err(Error::NotFound { .. })));
        assert!(matches!(registry.load("sphereFlake", Some(7)), Err(Error::NotFound { .. })));

        registry.register("sphereFlake", 2, || {
            let mut p = SphereFlakeProcedural::new()?;
            p.parameters_mut().set_value("levels", 0)?;
            let p: Box<dyn ParameterisedProcedural> = Box::new(p);
            Ok(p)
        });

        assert_eq!(registry.versions("sphereFlake"), vec![1, 2]);
        let newest = registry.load("sphereFlake", None).unwrap();
        assert_eq!(newest.parameters().parameter("levels").unwrap().get_value(), &Data::Int(0));
        let first = registry.load("sphereFlake", Some(1)).unwrap();
        assert_eq!(first.parameters().parameter("levels").unwrap().get_value(), &Data::Int(2));

        // Construction failures reach the caller of load
        registry.register("broken", 1, || Err(Error::invalid("duplicate parameter")));
        assert!(matches!(registry.load("broken", None), Err(Error::InvalidArgument { .. })));
    }
}
