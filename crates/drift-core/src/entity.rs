use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::vector::StateVector;

/// One member of a population.
///
/// `initial` is the immutable anchor captured at creation; only the
/// evolution engine mutates `current`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub current: StateVector,
    initial: StateVector,
    pub join_day: u32,
}

impl Entity {
    pub fn new(id: String, vector: StateVector, join_day: u32) -> Self {
        Self {
            id,
            current: vector,
            initial: vector,
            join_day,
        }
    }

    pub fn initial(&self) -> &StateVector {
        &self.initial
    }

    /// Days since joining, or `None` before the join day.
    pub fn age(&self, day: u32) -> Option<u32> {
        day.checked_sub(self.join_day)
    }

    /// L2 distance of `current` from the anchor.
    pub fn drift(&self) -> f64 {
        self.current.distance(&self.initial)
    }
}

/// Arena of entities with an id → index lookup.
///
/// Entities are only ever appended. Index order is insertion order, which the
/// growth model keeps sorted by join day.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Population {
    entities: Vec<Entity>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl PartialEq for Population {
    fn eq(&self, other: &Self) -> bool {
        self.entities == other.entities
    }
}

impl Population {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            entities: Vec::with_capacity(n),
            index: HashMap::with_capacity(n),
        }
    }

    /// Append an entity, rejecting a reused id.
    pub fn insert(&mut self, entity: Entity) -> Result<usize> {
        self.ensure_index();
        if self.index.contains_key(&entity.id) {
            return Err(CoreError::DuplicateEntity(entity.id));
        }
        let idx = self.entities.len();
        self.index.insert(entity.id.clone(), idx);
        self.entities.push(entity);
        Ok(idx)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, idx: usize) -> &Entity {
        &self.entities[idx]
    }

    pub(crate) fn entity_mut(&mut self, idx: usize) -> &mut Entity {
        &mut self.entities[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    /// Arena index of an id.
    pub fn index_of(&self, id: &str) -> Option<usize> {
        if self.index.len() == self.entities.len() {
            return self.index.get(id).copied();
        }
        // Deserialized arenas carry no index until the first insert.
        self.entities.iter().position(|e| e.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.index_of(id).map(|i| &self.entities[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of(id).is_some()
    }

    /// Join day of every entity, in arena order.
    pub fn join_days(&self) -> Vec<u32> {
        self.entities.iter().map(|e| e.join_day).collect()
    }

    pub fn current_vectors(&self) -> Vec<StateVector> {
        self.entities.iter().map(|e| e.current).collect()
    }

    pub fn initial_vectors(&self) -> Vec<StateVector> {
        self.entities.iter().map(|e| *e.initial()).collect()
    }

    /// Copy of this population with every `current` reset to its anchor.
    pub fn reset(&self) -> Self {
        let mut out = self.clone();
        for e in &mut out.entities {
            e.current = e.initial;
        }
        out
    }

    fn ensure_index(&mut self) {
        if self.index.len() == self.entities.len() {
            return;
        }
        self.index = self
            .entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id.clone(), i))
            .collect();
    }
}
