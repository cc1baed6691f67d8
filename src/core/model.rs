//! Mutable state accumulated over one lowering run.
//!
//! [`TargetModel`] wraps the immutable [`TargetFacts`] with everything the
//! engine discovers while flattening trees: the constant pool and the
//! predicate and selector registries. These grow monotonically across
//! instructions and are drained into side tables at emission time.

use hashbrown::HashMap;

use super::error::{SemaError, SemaResult};
use super::facts::{OpcodeId, TargetFacts};

/// Index into the selector registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SelectorId(pub u32);

/// Index into the predicate registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PredicateId(pub u32);

/// Deduplicating pool of integer constants.
///
/// Handles are 1-based; 0 is reserved so a zero handle can never alias a
/// pooled constant. The packed table stores positions, which are handles
/// minus one.
#[derive(Debug, Default)]
pub struct ConstantPool {
    interned: HashMap<u64, u16>,
    values: Vec<u64>,
}

impl ConstantPool {
    /// Intern `value`, returning its 1-based handle.
    pub fn intern(&mut self, value: u64) -> u16 {
        if let Some(&handle) = self.interned.get(&value) {
            return handle;
        }
        self.values.push(value);
        let handle = self.values.len() as u16;
        self.interned.insert(value, handle);
        handle
    }

    /// Pooled values in handle order; position `handle - 1` holds the value.
    pub fn as_slice(&self) -> &[u64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Insertion-ordered set of names with stable indices.
#[derive(Debug, Default)]
pub struct NameRegistry {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl NameRegistry {
    /// Record `name`, returning its index; recording again is a no-op.
    pub fn record(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Target facts plus the state one lowering run accumulates on top of them.
pub struct TargetModel<'t> {
    facts: &'t TargetFacts,
    pub constants: ConstantPool,
    pub predicates: NameRegistry,
    pub selectors: NameRegistry,
    /// Maps an operator to the replacement it lowers as.
    equivalences: HashMap<u32, OpcodeId>,
}

impl<'t> TargetModel<'t> {
    /// Build the model, resolving declared operator equivalences.
    ///
    /// An equivalence must shrink the result list; one that does not is a
    /// description bug and fails the whole run.
    pub fn new(facts: &'t TargetFacts) -> SemaResult<Self> {
        let mut equivalences = HashMap::new();
        for &(from, to) in facts.equivalences() {
            let from_results = facts.opcode(from).results;
            let to_results = facts.opcode(to).results;
            if from_results <= to_results {
                return Err(SemaError::NonReducingEquivalence {
                    from: facts.opcode(from).name.clone(),
                    to: facts.opcode(to).name.clone(),
                });
            }
            equivalences.insert(from.0, to);
        }
        Ok(Self {
            facts,
            constants: ConstantPool::default(),
            predicates: NameRegistry::default(),
            selectors: NameRegistry::default(),
            equivalences,
        })
    }

    pub fn facts(&self) -> &'t TargetFacts {
        self.facts
    }

    /// Replacement operator for `op`, if an equivalence was declared.
    pub fn equivalent_operator(&self, op: OpcodeId) -> Option<OpcodeId> {
        self.equivalences.get(&op.0).copied()
    }

    pub fn record_predicate(&mut self, name: &str) -> PredicateId {
        PredicateId(self.predicates.record(name))
    }

    /// Register a selection function, returning its id.
    ///
    /// Function names must carry the `select`/`Select` prefix; the recorded
    /// name drops the prefix and flattens template arguments, so
    /// `selectAddr<8>` registers as `Addr_8`.
    pub fn record_selector(&mut self, func: &str) -> SemaResult<SelectorId> {
        if !func.starts_with("select") && !func.starts_with("Select") {
            return Err(SemaError::SelectorName {
                func: func.to_string(),
            });
        }
        let mut name = func[6..].to_string();
        if let Some(pos) = name.find('<') {
            name.replace_range(pos..pos + 1, "_");
            name.pop();
        }
        Ok(SelectorId(self.selectors.record(&name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_facts() -> TargetFacts {
        let mut facts = TargetFacts::new("demo");
        facts.add_opcode("add", 1);
        facts.add_opcode("add_with_flags", 2);
        facts
    }

    #[test]
    fn test_constant_pool_handles_are_one_based() {
        let mut pool = ConstantPool::default();
        assert_eq!(pool.intern(42), 1);
        assert_eq!(pool.intern(7), 2);
        assert_eq!(pool.intern(42), 1);
        assert_eq!(pool.as_slice(), &[42, 7]);
    }

    #[test]
    fn test_name_registry_is_idempotent() {
        let mut names = NameRegistry::default();
        assert_eq!(names.record("aligned"), 0);
        assert_eq!(names.record("in_range"), 1);
        assert_eq!(names.record("aligned"), 0);
        assert_eq!(names.names(), &["aligned", "in_range"]);
    }

    #[test]
    fn test_equivalence_resolution() {
        let mut facts = demo_facts();
        let add = facts.lookup_opcode("add").unwrap();
        let addf = facts.lookup_opcode("add_with_flags").unwrap();
        facts.add_equivalence(addf, add);

        let model = TargetModel::new(&facts).unwrap();
        assert_eq!(model.equivalent_operator(addf), Some(add));
        assert_eq!(model.equivalent_operator(add), None);
    }

    #[test]
    fn test_non_reducing_equivalence_is_rejected() {
        let mut facts = demo_facts();
        let add = facts.lookup_opcode("add").unwrap();
        let addf = facts.lookup_opcode("add_with_flags").unwrap();
        facts.add_equivalence(add, addf);

        assert!(matches!(
            TargetModel::new(&facts),
            Err(SemaError::NonReducingEquivalence { .. })
        ));
    }

    #[test]
    fn test_selector_names_are_normalized() {
        let facts = demo_facts();
        let mut model = TargetModel::new(&facts).unwrap();

        let plain = model.record_selector("selectAddr").unwrap();
        let templated = model.record_selector("SelectAddr<8>").unwrap();
        assert_eq!(model.selectors.names()[plain.0 as usize], "Addr");
        assert_eq!(model.selectors.names()[templated.0 as usize], "Addr_8");

        assert!(matches!(
            model.record_selector("pickAddr"),
            Err(SemaError::SelectorName { .. })
        ));
    }
}
