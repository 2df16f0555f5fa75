//! Validated in-memory fault-tree model.
//!
//! This is the input surface of the analysis core: named events, gates
//! with formulas, and common-cause failure groups. XML parsing and model
//! validation against a schema live in collaborators; this module only
//! enforces what the core itself cannot tolerate (dangling references,
//! probabilities outside [0,1], malformed connectives).
//!
//! # Example
//!
//! ```
//! use fta_rs::model::{Arg, Connective, Formula, Model};
//!
//! let mut model = Model::new("top");
//! model.add_basic_event("pump", 0.1).unwrap();
//! model.add_basic_event("valve", 0.2).unwrap();
//! model
//!     .add_gate(
//!         "top",
//!         Formula::new(Connective::And).arg(Arg::basic("pump")).arg(Arg::basic("valve")),
//!     )
//!     .unwrap();
//! model.validate().unwrap();
//! ```

use hashbrown::HashMap;

use crate::error::Error;

/// Leaf random variable with a probability of failure.
#[derive(Debug, Clone)]
pub struct BasicEvent {
    id: String,
    p: f64,
}

impl BasicEvent {
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn p(&self) -> f64 {
        self.p
    }
}

/// Leaf constant (true/false), e.g. a maintenance switch.
#[derive(Debug, Clone)]
pub struct HouseEvent {
    id: String,
    state: bool,
}

impl HouseEvent {
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn state(&self) -> bool {
        self.state
    }
}

/// Logical connective of a formula.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Connective {
    And,
    Or,
    /// Single-argument complement.
    Not,
    /// Single-argument pass-through.
    Null,
    Nand,
    Nor,
    /// Exactly two arguments.
    Xor,
    /// K-of-N voting; the threshold is the formula's `vote_number`.
    Atleast,
}

/// One argument of a formula, with polarity.
#[derive(Debug, Clone)]
pub enum Arg {
    Basic { id: String, complement: bool },
    House { id: String, complement: bool },
    Gate { id: String, complement: bool },
    Formula { formula: Box<Formula>, complement: bool },
}

impl Arg {
    pub fn basic(id: impl Into<String>) -> Self {
        Arg::Basic { id: id.into(), complement: false }
    }
    pub fn not_basic(id: impl Into<String>) -> Self {
        Arg::Basic { id: id.into(), complement: true }
    }
    pub fn house(id: impl Into<String>) -> Self {
        Arg::House { id: id.into(), complement: false }
    }
    pub fn gate(id: impl Into<String>) -> Self {
        Arg::Gate { id: id.into(), complement: false }
    }
    pub fn not_gate(id: impl Into<String>) -> Self {
        Arg::Gate { id: id.into(), complement: true }
    }
    pub fn formula(formula: Formula) -> Self {
        Arg::Formula { formula: Box::new(formula), complement: false }
    }
}

/// A logical connective over ordered, signed arguments.
#[derive(Debug, Clone)]
pub struct Formula {
    connective: Connective,
    vote_number: Option<usize>,
    args: Vec<Arg>,
}

impl Formula {
    pub fn new(connective: Connective) -> Self {
        Self {
            connective,
            vote_number: None,
            args: Vec::new(),
        }
    }

    /// An `ATLEAST(k)` voting formula.
    pub fn atleast(vote_number: usize) -> Self {
        Self {
            connective: Connective::Atleast,
            vote_number: Some(vote_number),
            args: Vec::new(),
        }
    }

    /// Appends an argument (builder style).
    pub fn arg(mut self, arg: Arg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn connective(&self) -> Connective {
        self.connective
    }
    pub fn vote_number(&self) -> Option<usize> {
        self.vote_number
    }
    pub fn args(&self) -> &[Arg] {
        &self.args
    }
}

/// Common-cause failure group with a beta-factor model.
///
/// With factor `beta`, each member's failure splits into an independent
/// part of probability `(1-beta)·p` and a shared common-cause event.
#[derive(Debug, Clone)]
pub struct CcfGroup {
    pub id: String,
    pub members: Vec<String>,
    pub beta: f64,
}

/// The validated fault-tree model consumed by the analysis.
#[derive(Debug, Clone, Default)]
pub struct Model {
    top: String,
    gates: HashMap<String, Formula>,
    basic_events: HashMap<String, BasicEvent>,
    house_events: HashMap<String, HouseEvent>,
    ccf_groups: Vec<CcfGroup>,
}

impl Model {
    /// Creates an empty model whose top event is the gate named `top`.
    pub fn new(top: impl Into<String>) -> Self {
        Self {
            top: top.into(),
            ..Default::default()
        }
    }

    pub fn top_event(&self) -> &str {
        &self.top
    }

    pub fn add_basic_event(&mut self, id: impl Into<String>, p: f64) -> Result<(), Error> {
        let id = id.into();
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidModel(format!(
                "probability of basic event '{}' is {}, not in [0, 1]",
                id, p
            )));
        }
        if self.basic_events.insert(id.clone(), BasicEvent { id: id.clone(), p }).is_some() {
            return Err(Error::InvalidModel(format!("duplicate basic event '{}'", id)));
        }
        Ok(())
    }

    pub fn add_house_event(&mut self, id: impl Into<String>, state: bool) -> Result<(), Error> {
        let id = id.into();
        if self.house_events.insert(id.clone(), HouseEvent { id: id.clone(), state }).is_some() {
            return Err(Error::InvalidModel(format!("duplicate house event '{}'", id)));
        }
        Ok(())
    }

    pub fn add_gate(&mut self, id: impl Into<String>, formula: Formula) -> Result<(), Error> {
        let id = id.into();
        if self.gates.insert(id.clone(), formula).is_some() {
            return Err(Error::InvalidModel(format!("duplicate gate '{}'", id)));
        }
        Ok(())
    }

    pub fn add_ccf_group(&mut self, group: CcfGroup) {
        self.ccf_groups.push(group);
    }

    pub fn basic_events(&self) -> &HashMap<String, BasicEvent> {
        &self.basic_events
    }
    pub fn house_events(&self) -> &HashMap<String, HouseEvent> {
        &self.house_events
    }
    pub fn ccf_groups(&self) -> &[CcfGroup] {
        &self.ccf_groups
    }

    pub fn gate(&self, id: &str) -> Option<&Formula> {
        self.gates.get(id)
    }

    /// Checks referential integrity and connective arity.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.gates.contains_key(&self.top) {
            return Err(Error::InvalidModel(format!("top gate '{}' is not defined", self.top)));
        }
        for (id, formula) in &self.gates {
            self.validate_formula(id, formula)?;
        }
        let mut seen = HashMap::new();
        for group in &self.ccf_groups {
            if !(0.0..=1.0).contains(&group.beta) {
                return Err(Error::InvalidModel(format!(
                    "CCF group '{}' has beta {} outside [0, 1]",
                    group.id, group.beta
                )));
            }
            for member in &group.members {
                if !self.basic_events.contains_key(member) {
                    return Err(Error::InvalidModel(format!(
                        "CCF group '{}' member '{}' is not a basic event",
                        group.id, member
                    )));
                }
                if let Some(other) = seen.insert(member.clone(), group.id.clone()) {
                    return Err(Error::InvalidModel(format!(
                        "basic event '{}' is in CCF groups '{}' and '{}'",
                        member, other, group.id
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_formula(&self, gate_id: &str, formula: &Formula) -> Result<(), Error> {
        let n = formula.args.len();
        match formula.connective {
            Connective::Not | Connective::Null => {
                if n != 1 {
                    return Err(Error::InvalidModel(format!(
                        "{:?} formula of gate '{}' takes one argument, got {}",
                        formula.connective, gate_id, n
                    )));
                }
            }
            Connective::Xor => {
                if n != 2 {
                    return Err(Error::InvalidModel(format!(
                        "XOR formula of gate '{}' takes two arguments, got {}",
                        gate_id, n
                    )));
                }
            }
            Connective::Atleast => {
                let k = formula.vote_number.ok_or_else(|| {
                    Error::InvalidModel(format!("ATLEAST formula of gate '{}' has no vote number", gate_id))
                })?;
                if k < 1 || k > n {
                    return Err(Error::InvalidModel(format!(
                        "ATLEAST formula of gate '{}' has vote number {} for {} arguments",
                        gate_id, k, n
                    )));
                }
            }
            _ => {
                if n == 0 {
                    return Err(Error::InvalidModel(format!("formula of gate '{}' has no arguments", gate_id)));
                }
            }
        }
        for arg in &formula.args {
            match arg {
                Arg::Basic { id, .. } => {
                    if !self.basic_events.contains_key(id) {
                        return Err(Error::InvalidModel(format!(
                            "gate '{}' references undefined basic event '{}'",
                            gate_id, id
                        )));
                    }
                }
                Arg::House { id, .. } => {
                    if !self.house_events.contains_key(id) {
                        return Err(Error::InvalidModel(format!(
                            "gate '{}' references undefined house event '{}'",
                            gate_id, id
                        )));
                    }
                }
                Arg::Gate { id, .. } => {
                    if !self.gates.contains_key(id) {
                        return Err(Error::InvalidModel(format!(
                            "gate '{}' references undefined gate '{}'",
                            gate_id, id
                        )));
                    }
                }
                Arg::Formula { formula, .. } => self.validate_formula(gate_id, formula)?,
            }
        }
        Ok(())
    }

    /// Expands CCF groups with the beta-factor model.
    ///
    /// Every member `e` of a group becomes `OR(e, CCF[group])` where `e`
    /// keeps its id with probability `(1-beta)·p(e)` and the shared
    /// common-cause event has probability `beta·max(p)`.
    pub fn expand_ccf(&self) -> Result<Model, Error> {
        let mut expanded = self.clone();
        let mut replacement: HashMap<String, String> = HashMap::new();

        for group in &self.ccf_groups {
            let common_id = format!("CCF[{}]", group.id);
            let mut p_max: f64 = 0.0;
            for member in &group.members {
                let event = self.basic_events.get(member).ok_or_else(|| {
                    Error::InvalidModel(format!("CCF member '{}' is not a basic event", member))
                })?;
                p_max = p_max.max(event.p());
            }
            for member in &group.members {
                let p = self.basic_events[member].p();
                expanded
                    .basic_events
                    .get_mut(member)
                    .expect("member checked above")
                    .p = (1.0 - group.beta) * p;
                replacement.insert(member.clone(), common_id.clone());
            }
            expanded.add_basic_event(common_id, group.beta * p_max)?;
        }
        expanded.ccf_groups.clear();

        for formula in expanded.gates.values_mut() {
            rewrite_ccf_args(formula, &replacement);
        }
        Ok(expanded)
    }
}

fn rewrite_ccf_args(formula: &mut Formula, replacement: &HashMap<String, String>) {
    for arg in &mut formula.args {
        match arg {
            Arg::Basic { id, complement } => {
                if let Some(common) = replacement.get(id) {
                    let or = Formula::new(Connective::Or)
                        .arg(Arg::basic(id.clone()))
                        .arg(Arg::basic(common.clone()));
                    *arg = Arg::Formula {
                        formula: Box::new(or),
                        complement: *complement,
                    };
                }
            }
            Arg::Formula { formula, .. } => rewrite_ccf_args(formula, replacement),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_event_model() -> Model {
        let mut model = Model::new("top");
        model.add_basic_event("a", 0.1).unwrap();
        model.add_basic_event("b", 0.2).unwrap();
        model
            .add_gate(
                "top",
                Formula::new(Connective::And).arg(Arg::basic("a")).arg(Arg::basic("b")),
            )
            .unwrap();
        model
    }

    #[test]
    fn test_validate_ok() {
        two_event_model().validate().unwrap();
    }

    #[test]
    fn test_probability_out_of_range() {
        let mut model = Model::new("top");
        assert!(model.add_basic_event("a", 1.5).is_err());
    }

    #[test]
    fn test_dangling_reference() {
        let mut model = Model::new("top");
        model.add_basic_event("a", 0.1).unwrap();
        model
            .add_gate("top", Formula::new(Connective::Or).arg(Arg::basic("a")).arg(Arg::basic("ghost")))
            .unwrap();
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_atleast_vote_number_bounds() {
        let mut model = Model::new("top");
        model.add_basic_event("a", 0.1).unwrap();
        model.add_basic_event("b", 0.1).unwrap();
        model
            .add_gate("top", Formula::atleast(3).arg(Arg::basic("a")).arg(Arg::basic("b")))
            .unwrap();
        assert!(model.validate().is_err());
    }

    #[test]
    fn test_ccf_expansion() {
        let mut model = two_event_model();
        model.add_ccf_group(CcfGroup {
            id: "pumps".to_string(),
            members: vec!["a".to_string(), "b".to_string()],
            beta: 0.5,
        });
        model.validate().unwrap();

        let expanded = model.expand_ccf().unwrap();
        expanded.validate().unwrap();
        assert!((expanded.basic_events()["a"].p() - 0.05).abs() < 1e-12);
        assert!((expanded.basic_events()["b"].p() - 0.1).abs() < 1e-12);
        assert!((expanded.basic_events()["CCF[pumps]"].p() - 0.1).abs() < 1e-12);
        assert!(expanded.ccf_groups().is_empty());
    }
}
