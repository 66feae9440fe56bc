// Molecule species registry.
//
// Every diffusible species is registered once, before the run, under both
// a unique name and a dense index in `0..species_count`. The index is what
// voxels and the diffusion solver use; the name is what behaviors and
// run descriptions use. Lookups by either key return `Option`.
//
// Each species carries a diffusion coefficient and a first-order decay
// rate for the boundary and biofilm layers. Bulk voxels are chemostatic:
// they never change, so their decay rate is zero, and their diffusion
// coefficient (used when averaging with a neighbour) is the boundary one.
//
// See also: `diffusion.rs` which consumes these constants, `world.rs` for
// `add_molecule_species()`.

use crate::error::ConfigError;
use crate::types::{LayerType, SpeciesIndex};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// Constants for one diffusible species.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MoleculeInfo {
    pub name: String,
    pub index: SpeciesIndex,
    pub diffusion_boundary: f64,
    pub diffusion_biofilm: f64,
    #[serde(default)]
    pub decay_boundary: f64,
    #[serde(default)]
    pub decay_biofilm: f64,
}

impl MoleculeInfo {
    pub fn diffusion_coefficient(&self, layer: LayerType) -> f64 {
        match layer {
            LayerType::Bulk | LayerType::Boundary => self.diffusion_boundary,
            LayerType::Biofilm => self.diffusion_biofilm,
        }
    }

    pub fn decay_rate(&self, layer: LayerType) -> f64 {
        match layer {
            LayerType::Bulk => 0.0,
            LayerType::Boundary => self.decay_boundary,
            LayerType::Biofilm => self.decay_biofilm,
        }
    }

    /// Largest coefficient over all layers, for stability checks.
    pub fn max_diffusion(&self) -> f64 {
        self.diffusion_boundary.max(self.diffusion_biofilm)
    }

    fn check_constants(&self) -> Result<(), ConfigError> {
        let fields = [
            ("diffusion_boundary", self.diffusion_boundary),
            ("diffusion_biofilm", self.diffusion_biofilm),
            ("decay_boundary", self.decay_boundary),
            ("decay_biofilm", self.decay_biofilm),
        ];
        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidSpeciesConstant {
                    name: self.name.clone(),
                    field,
                });
            }
        }
        Ok(())
    }
}

/// All registered species, addressable by name or dense index.
#[derive(Clone, Debug, Default)]
pub struct MoleculeTable {
    by_index: Vec<Option<MoleculeInfo>>,
    by_name: FxHashMap<String, SpeciesIndex>,
}

impl MoleculeTable {
    pub fn new(species_count: usize) -> Self {
        Self {
            by_index: vec![None; species_count],
            by_name: FxHashMap::default(),
        }
    }

    /// Register a species. Index and name must both be unused.
    pub fn register(&mut self, info: MoleculeInfo) -> Result<(), ConfigError> {
        let count = self.by_index.len();
        let slot = self
            .by_index
            .get_mut(info.index)
            .ok_or(ConfigError::SpeciesOutOfRange {
                index: info.index,
                count,
            })?;
        if slot.is_some() {
            return Err(ConfigError::DuplicateSpeciesIndex(info.index));
        }
        if self.by_name.contains_key(&info.name) {
            return Err(ConfigError::DuplicateSpeciesName(info.name));
        }
        info.check_constants()?;
        self.by_name.insert(info.name.clone(), info.index);
        *slot = Some(info);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&MoleculeInfo> {
        let index = *self.by_name.get(name)?;
        self.by_index(index)
    }

    pub fn by_index(&self, index: SpeciesIndex) -> Option<&MoleculeInfo> {
        self.by_index.get(index)?.as_ref()
    }

    pub fn index_of(&self, name: &str) -> Option<SpeciesIndex> {
        self.by_name.get(name).copied()
    }

    /// Registered species in index order.
    pub fn iter(&self) -> impl Iterator<Item = &MoleculeInfo> {
        self.by_index.iter().flatten()
    }

    pub fn species_count(&self) -> usize {
        self.by_index.len()
    }
}
