use crate::core::cortex::Float;
use crate::core::data::Data;
use crate::core::error::{Error, Result};
use crate::core::geometry::bounds::Bounds3f;
use crate::core::parameterised::{self, ParameterisedProcedural, RenderFlags};
use crate::core::primitive::{Primitive, Primitives};
use crate::core::renderer::{Procedural, Renderer, with_attribute_block, with_transform_block};
use crate::core::state::{AttributeState, StateRenderables, Transforms};
use crate::core::transform::Transform;
use parking_lot::RwLock;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Weak};

/// A named frame registered with the renderer when rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateSystem {
    pub name      : String,
    pub transform : Option<Transforms>
}

impl CoordinateSystem {
    pub fn new(name: &str, transform: Option<Transforms>) -> Self {
        Self { name: name.to_owned(), transform }
    }

    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        with_transform_block(renderer, |r| {
            if let Some(ref t) = self.transform {
                t.render(r)?;
            }

            r.coordinate_system(&self.name)
        })
    }
}

/// Everything a Group can hold as a child.
#[derive(Clone)]
pub enum Renderables {
    Primitive(Arc<Primitives>),
    Group(Arc<Group>),
    Procedural(Arc<dyn Procedural>),
    Parameterised(Arc<dyn ParameterisedProcedural>),
    CoordinateSystem(Arc<CoordinateSystem>)
}

impl Renderables {
    pub fn render(&self, renderer: &mut dyn Renderer) -> Result<()> {
        match self {
            Renderables::Primitive(p)        => p.render(renderer),
            Renderables::Group(g)            => g.render(renderer, true),
            Renderables::Procedural(p)       => renderer.procedural(p.clone()),
            Renderables::Parameterised(p)    => parameterised::render(p, renderer, &RenderFlags::default()),
            Renderables::CoordinateSystem(c) => c.render(renderer)
        }
    }

    pub fn bound(&self) -> Result<Bounds3f> {
        match self {
            Renderables::Primitive(p)        => Ok(p.bound()),
            Renderables::Group(g)            => g.bound(),
            Renderables::Procedural(p)       => p.bound(),
            Renderables::Parameterised(p)    => parameterised::bound(p.as_ref()),
            Renderables::CoordinateSystem(_) => Ok(Bounds3f::empty())
        }
    }

    /// Identity comparison: true only for the same underlying object.
    pub fn ptr_eq(&self, other: &Renderables) -> bool {
        fn addr<T: ?Sized>(a: &Arc<T>) -> *const () {
            Arc::as_ptr(a) as *const ()
        }

        match (self, other) {
            (Renderables::Primitive(a), Renderables::Primitive(b))               => addr(a) == addr(b),
            (Renderables::Group(a), Renderables::Group(b))                       => addr(a) == addr(b),
            (Renderables::Procedural(a), Renderables::Procedural(b))             => addr(a) == addr(b),
            (Renderables::Parameterised(a), Renderables::Parameterised(b))       => addr(a) == addr(b),
            (Renderables::CoordinateSystem(a), Renderables::CoordinateSystem(b)) => addr(a) == addr(b),
            _ => false
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Renderables::Primitive(_)        => "Primitive",
            Renderables::Group(_)            => "Group",
            Renderables::Procedural(_)       => "Procedural",
            Renderables::Parameterised(_)    => "ParameterisedProcedural",
            Renderables::CoordinateSystem(_) => "CoordinateSystem"
        }
    }
}

impl Debug for Renderables {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Renderables::Primitive(p)        => write!(f, "Primitive({:?})", p.topology()),
            Renderables::Group(g)            => write!(f, "{:?}", g),
            Renderables::CoordinateSystem(c) => write!(f, "CoordinateSystem({})", c.name),
            _                                => write!(f, "{}", self.type_name())
        }
    }
}

impl From<Primitives> for Renderables {
    fn from(p: Primitives) -> Self {
        Renderables::Primitive(Arc::new(p))
    }
}

impl From<Arc<Primitives>> for Renderables {
    fn from(p: Arc<Primitives>) -> Self {
        Renderables::Primitive(p)
    }
}

impl From<Arc<Group>> for Renderables {
    fn from(g: Arc<Group>) -> Self {
        Renderables::Group(g)
    }
}

impl From<CoordinateSystem> for Renderables {
    fn from(c: CoordinateSystem) -> Self {
        Renderables::CoordinateSystem(Arc::new(c))
    }
}

/// Composite scene-graph node.
///
/// A group owns its state list, its optional transform and its children.
/// Child groups point back at their parent through a weak reference, so
/// the tree holds no ownership cycles. A group has at most one live
/// parent: moving it means `remove_child` on the old parent, then
/// `add_child` on the new one. Leaf renderables carry no parent and may
/// be shared between groups.
///
/// Groups are built first and rendered afterwards. The interior locks make
/// a finished tree safe to traverse from several threads.
pub struct Group {
    this      : Weak<Group>,
    parent    : RwLock<Weak<Group>>,
    transform : RwLock<Option<Transforms>>,
    state     : RwLock<Vec<StateRenderables>>,
    children  : RwLock<Vec<Renderables>>
}

impl Group {
    pub fn new() -> Arc<Group> {
        Arc::new_cyclic(|this| Group {
            this      : this.clone(),
            parent    : RwLock::new(Weak::new()),
            transform : RwLock::new(None),
            state     : RwLock::new(Vec::new()),
            children  : RwLock::new(Vec::new())
        })
    }

    pub fn parent(&self) -> Option<Arc<Group>> {
        self.parent.read().upgrade()
    }

    fn is_ancestor_or_self(&self, g: &Group) -> bool {
        if std::ptr::eq(self, g) { return true; }

        let mut p = self.parent();
        while let Some(group) = p {
            if std::ptr::eq(group.as_ref(), g) { return true; }
            p = group.parent();
        }

        false
    }

    pub fn add_child(&self, child: impl Into<Renderables>) -> Result<()> {
        let child = child.into();

        if let Renderables::Group(ref g) = child {
            if self.is_ancestor_or_self(g) {
                return Err(Error::hierarchy("a group cannot be added to its own subtree"));
            }

            if let Some(p) = g.parent() {
                let message = if std::ptr::eq(p.as_ref(), self) {
                    "group is already a child of this group"
                } else {
                    "group already has a parent; remove it from that parent first"
                };
                return Err(Error::hierarchy(message));
            }

            *g.parent.write() = self.this.clone();
        }

        self.children.write().push(child);
        Ok(())
    }

    pub fn remove_child(&self, child: &Renderables) -> Result<()> {
        let removed = {
            let mut children = self.children.write();
            let pos = children
                .iter()
                .position(|c| c.ptr_eq(child))
                .ok_or_else(|| Error::not_found(format!("{} in group children", child.type_name())))?;

            children.remove(pos)
        };

        if let Renderables::Group(g) = removed {
            *g.parent.write() = Weak::new();
        }

        Ok(())
    }

    pub fn clear_children(&self) {
        let removed = std::mem::take(&mut *self.children.write());

        for c in removed {
            if let Renderables::Group(g) = c {
                *g.parent.write() = Weak::new();
            }
        }
    }

    /// Snapshot of the children in insertion order.
    pub fn children(&self) -> Vec<Renderables> {
        self.children.read().clone()
    }

    pub fn add_state(&self, state: impl Into<StateRenderables>) -> Result<()> {
        let state = state.into();

        if let StateRenderables::Transform(_) = state {
            return Err(Error::type_error("AttributeState, Shader or Light", "Transform (use set_transform)"));
        }

        self.state.write().push(state);
        Ok(())
    }

    pub fn remove_state(&self, state: &StateRenderables) -> Result<()> {
        if let StateRenderables::Transform(_) = state {
            return Err(Error::type_error("AttributeState, Shader or Light", "Transform (use set_transform)"));
        }

        let mut states = self.state.write();
        let pos = states
            .iter()
            .position(|s| s == state)
            .ok_or_else(|| Error::not_found(format!("{} in group state", state.type_name())))?;

        states.remove(pos);
        Ok(())
    }

    pub fn clear_state(&self) {
        self.state.write().clear();
    }

    pub fn state(&self) -> Vec<StateRenderables> {
        self.state.read().clone()
    }

    pub fn set_transform(&self, transform: Option<Transforms>) {
        *self.transform.write() = transform;
    }

    pub fn get_transform(&self) -> Option<Transforms> {
        self.transform.read().clone()
    }

    /// Local transform at `time`, identity when none is set.
    pub fn transform_matrix(&self, time: Float) -> Transform {
        self.transform
            .read()
            .as_ref()
            .map(|t| t.transform(time))
            .unwrap_or_default()
    }

    /// Object-to-world transform at `time`, following the parent chain.
    pub fn global_transform_matrix(&self, time: Float) -> Transform {
        let local = self.transform_matrix(time);

        match self.parent() {
            Some(p) => p.global_transform_matrix(time) * local,
            None => local
        }
    }

    /// Newest-first search of this group's attribute states, then of the
    /// parents'.
    pub fn get_attribute(&self, name: &str) -> Option<Data> {
        let local = self.state
            .read()
            .iter()
            .rev()
            .find_map(|s| s.attribute(name).cloned());

        local.or_else(|| self.parent().and_then(|p| p.get_attribute(name)))
    }

    pub fn set_attribute(&self, name: &str, value: Data) {
        let mut states = self.state.write();

        for s in states.iter_mut().rev() {
            if let StateRenderables::Attributes(a) = s {
                if a.attributes().contains_key(name) {
                    a.attributes_mut().insert(name.to_owned(), value);
                    return;
                }
            }
        }

        let mut a = AttributeState::default();
        a.attributes_mut().insert(name.to_owned(), value);
        states.push(a.into());
    }

    pub fn render(&self, renderer: &mut dyn Renderer, in_attribute_block: bool) -> Result<()> {
        if in_attribute_block {
            with_attribute_block(renderer, |r| {
                self.render_state(r)?;
                self.render_children(r)
            })
        } else {
            self.render_state(renderer)?;
            self.render_children(renderer)
        }
    }

    /// Emits the transform and state list into the current block.
    pub fn render_state(&self, renderer: &mut dyn Renderer) -> Result<()> {
        if let Some(t) = self.get_transform() {
            t.render(renderer)?;
        }

        for s in self.state().iter() {
            s.render(renderer)?;
        }

        Ok(())
    }

    pub fn render_children(&self, renderer: &mut dyn Renderer) -> Result<()> {
        for c in self.children().iter() {
            c.render(renderer)?;
        }

        Ok(())
    }

    /// Union of the children's bounds in the parent's space. Animated
    /// transforms contribute the bound at every sample time.
    pub fn bound(&self) -> Result<Bounds3f> {
        let mut b = Bounds3f::empty();
        for c in self.children().iter() {
            b = b.union_bounds(&c.bound()?);
        }

        let bound = match self.get_transform() {
            Some(Transforms::Motion(m)) if m.is_animated() => m
                .samples()
                .fold(Bounds3f::empty(), |acc, (_, t)| acc.union_bounds(&t.transform_bounds(&b))),
            Some(t) => t.transform(0.0).transform_bounds(&b),
            None => b
        };

        Ok(bound)
    }
}

impl Debug for Group {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("state", &self.state.read().len())
            .field("transform", &self.transform.read().is_some())
            .field("children", &*self.children.read())
            .finish()
    }
}
