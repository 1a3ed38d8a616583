use crate::core::cortex::Float;
use crate::core::data::{CompoundData, Data};
use crate::core::error::{Error, Result};
use std::fmt::{self, Display, Formatter};

/// A single typed, named value with a default, optional presets and an
/// optional numeric range. Values are validated when read through
/// `validated_value`, not when set.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name         : String,
    description  : String,
    default      : Data,
    value        : Data,
    presets      : Vec<(String, Data)>,
    presets_only : bool,
    min          : Option<Float>,
    max          : Option<Float>
}

impl Parameter {
    pub fn new(name: &str, description: &str, default: impl Into<Data>) -> Self {
        let default = default.into();

        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            value: default.clone(),
            default,
            presets: Vec::new(),
            presets_only: false,
            min: None,
            max: None
        }
    }

    pub fn with_presets(mut self, presets: Vec<(&str, Data)>, presets_only: bool) -> Self {
        self.presets = presets.into_iter().map(|(n, d)| (n.to_owned(), d)).collect();
        self.presets_only = presets_only;
        self
    }

    pub fn with_range(mut self, min: Option<Float>, max: Option<Float>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_value(&self) -> &Data {
        &self.default
    }

    pub fn get_value(&self) -> &Data {
        &self.value
    }

    pub fn presets(&self) -> &[(String, Data)] {
        &self.presets
    }

    pub fn set_value(&mut self, value: impl Into<Data>) {
        self.value = value.into();
    }

    pub fn set_preset(&mut self, preset: &str) -> Result<()> {
        let value = self.presets
            .iter()
            .find(|(n, _)| n == preset)
            .map(|(_, d)| d.clone())
            .ok_or_else(|| Error::not_found(format!("preset \"{}\" of parameter \"{}\"", preset, self.name)))?;

        self.value = value;
        Ok(())
    }

    /// Parses `s` as the default's type. A preset name is accepted too.
    pub fn set_value_from_str(&mut self, s: &str) -> Result<()> {
        if self.set_preset(s).is_ok() {
            return Ok(());
        }

        self.value = self.default
            .parse_like(s)
            .ok_or_else(|| Error::validation(
                vec![self.name.clone()],
                format!("cannot parse \"{}\" as {}", s, self.default.type_name())))?;

        Ok(())
    }

    /// Why `value` is unacceptable, if it is.
    pub fn value_error(&self, value: &Data) -> Option<String> {
        if !value.same_type(&self.default) {
            return Some(format!("expected {}, got {}", self.default.type_name(), value.type_name()));
        }

        if self.presets_only && !self.presets.iter().any(|(_, d)| d == value) {
            let names: Vec<&str> = self.presets.iter().map(|(n, _)| n.as_str()).collect();
            return Some(format!("value {} is not one of the presets [{}]", value, names.join(", ")));
        }

        if let Some(v) = value.as_float() {
            if let Some(min) = self.min {
                if v < min { return Some(format!("{} is less than the minimum {}", v, min)); }
            }

            if let Some(max) = self.max {
                if v > max { return Some(format!("{} is greater than the maximum {}", v, max)); }
            }
        }

        None
    }

    pub fn validated_value(&self) -> Result<Data> {
        match self.value_error(&self.value) {
            Some(message) => Err(Error::validation(vec![self.name.clone()], message)),
            None => Ok(self.value.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterNode {
    Value(Parameter),
    Compound(CompoundParameter)
}

impl ParameterNode {
    pub fn name(&self) -> &str {
        match self {
            ParameterNode::Value(p) => p.name(),
            ParameterNode::Compound(c) => c.name()
        }
    }
}

impl From<Parameter> for ParameterNode {
    fn from(p: Parameter) -> Self {
        ParameterNode::Value(p)
    }
}

impl From<CompoundParameter> for ParameterNode {
    fn from(c: CompoundParameter) -> Self {
        ParameterNode::Compound(c)
    }
}

/// An ordered set of parameters, possibly nested. Members are addressed by
/// dotted paths such as `bounds.mode`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompoundParameter {
    name        : String,
    description : String,
    members     : Vec<ParameterNode>
}

impl CompoundParameter {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_owned(),
            description: description.to_owned(),
            members: Vec::new()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn add_parameter(&mut self, p: impl Into<ParameterNode>) -> Result<()> {
        let p = p.into();

        if self.members.iter().any(|m| m.name() == p.name()) {
            return Err(Error::invalid(format!("parameter \"{}\" already exists", p.name())));
        }

        self.members.push(p);
        Ok(())
    }

    pub fn with(mut self, p: impl Into<ParameterNode>) -> Result<Self> {
        self.add_parameter(p)?;
        Ok(self)
    }

    pub fn members(&self) -> &[ParameterNode] {
        &self.members
    }

    fn node(&self, path: &str) -> Option<&ParameterNode> {
        let mut parts = path.splitn(2, '.');
        let head = parts.next()?;
        let node = self.members.iter().find(|m| m.name() == head)?;

        match (parts.next(), node) {
            (None, n) => Some(n),
            (Some(rest), ParameterNode::Compound(c)) => c.node(rest),
            _ => None
        }
    }

    fn node_mut(&mut self, path: &str) -> Option<&mut ParameterNode> {
        let mut parts = path.splitn(2, '.');
        let head = parts.next()?;
        let node = self.members.iter_mut().find(|m| m.name() == head)?;

        match parts.next() {
            None => Some(node),
            Some(rest) => match node {
                ParameterNode::Compound(c) => c.node_mut(rest),
                _ => None
            }
        }
    }

    pub fn parameter(&self, path: &str) -> Option<&Parameter> {
        match self.node(path) {
            Some(ParameterNode::Value(p)) => Some(p),
            _ => None
        }
    }

    pub fn parameter_mut(&mut self, path: &str) -> Result<&mut Parameter> {
        match self.node_mut(path) {
            Some(ParameterNode::Value(p)) => Ok(p),
            _ => Err(Error::not_found(format!("parameter \"{}\"", path)))
        }
    }

    pub fn set_value(&mut self, path: &str, value: impl Into<Data>) -> Result<()> {
        self.parameter_mut(path)?.set_value(value);
        Ok(())
    }

    pub fn set_value_from_str(&mut self, path: &str, value: &str) -> Result<()> {
        self.parameter_mut(path)?.set_value_from_str(value)
    }

    /// Current values, unvalidated.
    pub fn get_value(&self) -> CompoundData {
        self.members
            .iter()
            .map(|m| match m {
                ParameterNode::Value(p) => (p.name().to_owned(), p.get_value().clone()),
                ParameterNode::Compound(c) => (c.name().to_owned(), Data::Compound(c.get_value()))
            })
            .collect()
    }

    /// Validates every member and returns the values. All failures are
    /// reported together, each by its dotted path.
    pub fn validated_value(&self) -> Result<CompoundData> {
        let mut failures = Vec::new();
        let value = self.collect_validated("", &mut failures);

        if failures.is_empty() {
            return Ok(value);
        }

        let (parameters, messages): (Vec<String>, Vec<String>) = failures.into_iter().unzip();
        Err(Error::validation(parameters, messages.join("; ")))
    }

    fn collect_validated(&self, prefix: &str, failures: &mut Vec<(String, String)>) -> CompoundData {
        let mut value = CompoundData::new();

        for m in self.members.iter() {
            let path = format!("{}{}", prefix, m.name());

            match m {
                ParameterNode::Value(p) => match p.value_error(p.get_value()) {
                    Some(message) => failures.push((path.clone(), format!("{}: {}", path, message))),
                    None => { value.insert(p.name().to_owned(), p.get_value().clone()); }
                },
                ParameterNode::Compound(c) => {
                    let nested = c.collect_validated(&format!("{}.", path), failures);
                    value.insert(c.name().to_owned(), Data::Compound(nested));
                }
            }
        }

        value
    }
}

impl Display for CompoundParameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fn walk(c: &CompoundParameter, indent: usize, f: &mut Formatter<'_>) -> fmt::Result {
            for m in c.members() {
                match m {
                    ParameterNode::Value(p) => writeln!(
                        f, "{:indent$}{} ({}) = {}  {}",
                        "", p.name(), p.default_value().type_name(), p.get_value(), p.description(),
                        indent = indent)?,
                    ParameterNode::Compound(c) => {
                        writeln!(f, "{:indent$}{}  {}", "", c.name(), c.description(), indent = indent)?;
                        walk(c, indent + 4, f)?;
                    }
                }
            }

            Ok(())
        }

        walk(self, 0, f)
    }
}
