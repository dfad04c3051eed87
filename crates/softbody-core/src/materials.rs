use crate::config::SoftBodyConfig;

/// Material preset for quick configuration of soft-body behaviour.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MaterialPreset {
    pub structural_compliance: f32,
    pub shear_compliance: f32,
    pub volume_compliance: f32,
    pub global_damping: f32,
    pub shape_memory_stiffness: f32,
    /// Creep rate of plastic deformation. 0 is purely elastic.
    pub creep_rate: f32,
    pub yield_strain: f32,
    pub fracture_enabled: bool,
    pub fracture_threshold: f32,
    pub max_strain: f32,
}

impl MaterialPreset {
    /// Jelly: soft, wobbly, strong shape memory, elastic.
    pub const JELLY: Self = Self {
        structural_compliance: 1.0e-4,
        shear_compliance: 5.0e-4,
        volume_compliance: 1.0e-6,
        global_damping: 0.05,
        shape_memory_stiffness: 0.05,
        creep_rate: 0.0,
        yield_strain: 0.1,
        fracture_enabled: false,
        fracture_threshold: 3.0,
        max_strain: 0.5,
    };

    /// Rubber: stiff and elastic, weak shape memory.
    pub const RUBBER: Self = Self {
        structural_compliance: 1.0e-6,
        shear_compliance: 1.0e-5,
        volume_compliance: 1.0e-7,
        global_damping: 0.01,
        shape_memory_stiffness: 0.02,
        creep_rate: 0.0,
        yield_strain: 0.1,
        fracture_enabled: false,
        fracture_threshold: 3.0,
        max_strain: 0.5,
    };

    /// Clay: deforms permanently, no shape memory.
    pub const CLAY: Self = Self {
        structural_compliance: 1.0e-5,
        shear_compliance: 1.0e-4,
        volume_compliance: 1.0e-6,
        global_damping: 0.5,
        shape_memory_stiffness: 0.0,
        creep_rate: 0.3,
        yield_strain: 0.02,
        fracture_enabled: false,
        fracture_threshold: 3.0,
        max_strain: 0.5,
    };

    /// Glass: near-rigid and brittle.
    pub const GLASS: Self = Self {
        structural_compliance: 0.0,
        shear_compliance: 1.0e-7,
        volume_compliance: 0.0,
        global_damping: 0.01,
        shape_memory_stiffness: 0.02,
        creep_rate: 0.0,
        yield_strain: 0.1,
        fracture_enabled: true,
        fracture_threshold: 1.5,
        max_strain: 0.1,
    };

    /// Apply this material preset to a solver config.
    pub fn apply_to(&self, config: &mut SoftBodyConfig) {
        config.structural_compliance = self.structural_compliance;
        config.shear_compliance = self.shear_compliance;
        config.volume_compliance = self.volume_compliance;
        config.global_damping = self.global_damping;
        config.shape_memory_stiffness = self.shape_memory_stiffness;
        config.plasticity.creep_rate = self.creep_rate;
        config.plasticity.yield_strain = self.yield_strain;
        config.fracture.enabled = self.fracture_enabled;
        config.fracture.threshold = self.fracture_threshold;
        config.fracture.max_strain = self.max_strain;
    }
}
