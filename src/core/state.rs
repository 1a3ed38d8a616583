use crate::core::cortex::Float;
use crate::core::data::{CompoundData, Data};
use crate::core::error::{Error, Result};
use crate::core::renderer::Renderer;
use crate::core::transform::Transform;
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

/// Named bag of attribute overrides, applied in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeState {
    attributes: CompoundData
}

impl AttributeState {
    pub fn new(attributes: CompoundData) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &CompoundData {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut CompoundData {
        &mut self.attributes
    }

    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        for (name, value) in self.attributes.iter() {
            renderer.set_attribute(name, value)?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shader {
    pub kind       : String,
    pub name       : String,
    pub parameters : CompoundData
}

impl Shader {
    pub fn new(kind: &str, name: &str, parameters: CompoundData) -> Self {
        Self { kind: kind.to_owned(), name: name.to_owned(), parameters }
    }

    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.shader(&self.kind, &self.name, &self.parameters)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub name       : String,
    pub handle     : String,
    pub parameters : CompoundData
}

impl Light {
    pub fn new(name: &str, handle: &str, parameters: CompoundData) -> Self {
        Self { name: name.to_owned(), handle: handle.to_owned(), parameters }
    }

    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        renderer.light(&self.name, &self.handle, &self.parameters)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MatrixTransform {
    pub matrix: Transform
}

impl MatrixTransform {
    pub fn new(matrix: Transform) -> Self {
        Self { matrix }
    }
}

/// Time-keyed transform samples. Keys are kept sorted on insertion, so
/// evaluation never sees them out of order. No samples means identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixMotionTransform {
    snapshots: BTreeMap<OrderedFloat<Float>, Transform>
}

impl MatrixMotionTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples<I>(samples: I) -> Result<Self>
    where I: IntoIterator<Item = (Float, Transform)>
    {
        let mut m = Self::new();
        for (time, t) in samples {
            m.add_snapshot(time, t)?;
        }

        Ok(m)
    }

    /// Adds or replaces the sample at `time`.
    pub fn add_snapshot(&mut self, time: Float, t: Transform) -> Result<()> {
        if time.is_nan() {
            return Err(Error::invalid("motion sample time is NaN"));
        }

        self.snapshots.insert(OrderedFloat(time), t);
        Ok(())
    }

    pub fn remove_snapshot(&mut self, time: Float) -> Result<()> {
        self.snapshots
            .remove(&OrderedFloat(time))
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("motion sample at time {}", time)))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn is_animated(&self) -> bool {
        self.snapshots.len() > 1
    }

    pub fn times(&self) -> Vec<Float> {
        self.snapshots.keys().map(|k| k.into_inner()).collect()
    }

    pub fn samples(&self) -> impl Iterator<Item = (Float, &Transform)> {
        self.snapshots.iter().map(|(k, t)| (k.into_inner(), t))
    }

    /// Value at the first sample; identity when there are none.
    pub fn first(&self) -> Transform {
        self.snapshots.values().next().cloned().unwrap_or_default()
    }

    /// Evaluates the transform at `time`. Outside the sampled range the
    /// nearest end sample is returned unchanged; inside, the bracketing
    /// samples are interpolated by translation, rotation and scale.
    pub fn transform(&self, time: Float) -> Transform {
        let key = OrderedFloat(time);

        let after = match self.snapshots.range(key..).next() {
            Some((k, t)) if *k == key => return *t,
            Some(s) => s,
            None => return self.snapshots.values().next_back().cloned().unwrap_or_default()
        };

        let before = match self.snapshots.range(..key).next_back() {
            Some(s) => s,
            None => return *after.1
        };

        let (t0, t1) = (before.0.into_inner(), after.0.into_inner());
        let dt = (time - t0) / (t1 - t0);

        Transform::interpolate(before.1, after.1, dt)
    }

    /// Times a product of `self` and `other` has to be sampled at: the keys
    /// of whichever sides are animated. Empty when neither is, since a
    /// single sample holds for all time.
    pub fn sample_times(&self, other: &MatrixMotionTransform) -> Vec<Float> {
        let mut times: Vec<OrderedFloat<Float>> = Vec::new();

        for m in [self, other].iter().filter(|m| m.is_animated()) {
            times.extend(m.snapshots.keys().cloned());
        }

        times.sort();
        times.dedup();
        times.into_iter().map(|k| k.into_inner()).collect()
    }

    /// Returns `self * local`. The product keeps the keys of the animated
    /// operands only; a static side is applied at every one of them.
    pub fn compose(&self, local: &MatrixMotionTransform) -> MatrixMotionTransform {
        if local.is_empty() { return self.clone(); }
        if self.is_empty() { return local.clone(); }

        let mut times = self.sample_times(local);
        if times.is_empty() {
            times = local.times();
        }

        let snapshots = times
            .into_iter()
            .map(|t| (OrderedFloat(t), self.transform(t) * local.transform(t)))
            .collect();

        MatrixMotionTransform { snapshots }
    }

    pub fn concat(&self, m: &Transform) -> MatrixMotionTransform {
        if self.is_empty() {
            let mut snapshots = BTreeMap::new();
            snapshots.insert(OrderedFloat(0.0), *m);
            return MatrixMotionTransform { snapshots };
        }

        MatrixMotionTransform {
            snapshots: self.snapshots.iter().map(|(k, t)| (*k, *t * *m)).collect()
        }
    }
}

impl From<Transform> for MatrixMotionTransform {
    fn from(t: Transform) -> Self {
        let mut snapshots = BTreeMap::new();
        snapshots.insert(OrderedFloat(0.0), t);

        Self { snapshots }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Transforms {
    Matrix(MatrixTransform),
    Motion(MatrixMotionTransform)
}

impl Transforms {
    pub fn transform(&self, time: Float) -> Transform {
        match self {
            Transforms::Matrix(m) => m.matrix,
            Transforms::Motion(m) => m.transform(time)
        }
    }

    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        match self {
            Transforms::Matrix(m) => renderer.concat_transform(&m.matrix),
            Transforms::Motion(m) if m.is_animated() => {
                renderer.motion_begin(&m.times())?;
                for (_, t) in m.samples() {
                    renderer.concat_transform(t)?;
                }
                renderer.motion_end()
            }
            Transforms::Motion(m) => match m.samples().next() {
                Some((_, t)) => renderer.concat_transform(t),
                None => Ok(())
            }
        }
    }

    pub fn to_motion(&self) -> MatrixMotionTransform {
        match self {
            Transforms::Matrix(m) => m.matrix.into(),
            Transforms::Motion(m) => m.clone()
        }
    }
}

impl From<Transform> for Transforms {
    fn from(t: Transform) -> Self {
        Transforms::Matrix(MatrixTransform::new(t))
    }
}

impl From<MatrixMotionTransform> for Transforms {
    fn from(m: MatrixMotionTransform) -> Self {
        Transforms::Motion(m)
    }
}

/// Anything that can sit in a state list, plus the transforms that must not.
#[derive(Debug, Clone, PartialEq)]
pub enum StateRenderables {
    Attributes(AttributeState),
    Shader(Shader),
    Light(Light),
    Transform(Transforms)
}

impl StateRenderables {
    pub fn type_name(&self) -> &'static str {
        match self {
            StateRenderables::Attributes(_) => "AttributeState",
            StateRenderables::Shader(_)     => "Shader",
            StateRenderables::Light(_)      => "Light",
            StateRenderables::Transform(_)  => "Transform"
        }
    }

    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        match self {
            StateRenderables::Attributes(a) => a.render(renderer),
            StateRenderables::Shader(s)     => s.render(renderer),
            StateRenderables::Light(l)      => l.render(renderer),
            StateRenderables::Transform(t)  => t.render(renderer)
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&Data> {
        match self {
            StateRenderables::Attributes(a) => a.attributes().get(name),
            _ => None
        }
    }
}

impl From<AttributeState> for StateRenderables {
    fn from(a: AttributeState) -> Self {
        StateRenderables::Attributes(a)
    }
}

impl From<Shader> for StateRenderables {
    fn from(s: Shader) -> Self {
        StateRenderables::Shader(s)
    }
}

impl From<Light> for StateRenderables {
    fn from(l: Light) -> Self {
        StateRenderables::Light(l)
    }
}

impl From<Transforms> for StateRenderables {
    fn from(t: Transforms) -> Self {
        StateRenderables::Transform(t)
    }
}
