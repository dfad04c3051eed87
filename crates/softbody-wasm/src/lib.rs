use glam::Vec3;
use softbody_core::{SoftBodyConfig, SoftBodySolver};
use wasm_bindgen::prelude::*;

/// GPU-compatible vertex: 16 bytes, position plus accumulated stress for shading.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GpuVertex {
    position: [f32; 3], // 12 bytes
    stress: f32,        //  4 bytes
}

#[wasm_bindgen]
pub struct SoftBodyWorld {
    solver: SoftBodySolver,
    gpu_buffer: Vec<GpuVertex>,
}

#[wasm_bindgen]
impl SoftBodyWorld {
    /// Build a body from flat `[x, y, z, ...]` vertices and triangle indices.
    #[wasm_bindgen(constructor)]
    pub fn new(
        vertices: &[f32],
        triangles: &[u32],
        total_mass: f32,
        fracture_enabled: bool,
    ) -> Result<SoftBodyWorld, JsValue> {
        let config = SoftBodyConfig::default().with_fracture(fracture_enabled);
        Self::build(vertices, triangles, total_mass, config)
    }

    /// Build a body with a named material preset: "jelly", "rubber", "clay" or "glass".
    #[wasm_bindgen]
    pub fn with_material(
        vertices: &[f32],
        triangles: &[u32],
        total_mass: f32,
        material: &str,
    ) -> Result<SoftBodyWorld, JsValue> {
        let preset = match material {
            "jelly" => softbody_core::MaterialPreset::JELLY,
            "rubber" => softbody_core::MaterialPreset::RUBBER,
            "clay" => softbody_core::MaterialPreset::CLAY,
            "glass" => softbody_core::MaterialPreset::GLASS,
            other => return Err(JsValue::from_str(&format!("unknown material '{other}'"))),
        };
        let mut config = SoftBodyConfig::default();
        preset.apply_to(&mut config);
        Self::build(vertices, triangles, total_mass, config)
    }

    /// Advance the body by `dt` seconds. Returns the wall time spent in ms.
    #[wasm_bindgen]
    pub fn step(&mut self, dt: f32) -> f32 {
        let start = js_sys::Date::now();
        self.solver.step(dt);
        let elapsed = (js_sys::Date::now() - start) as f32;
        self.solver.report_solve_time(elapsed);
        self.write_gpu_output();
        elapsed
    }

    #[wasm_bindgen]
    pub fn apply_impulse(&mut self, cx: f32, cy: f32, cz: f32, ix: f32, iy: f32, iz: f32, radius: f32) {
        self.solver
            .apply_impulse(Vec3::new(cx, cy, cz), Vec3::new(ix, iy, iz), radius);
    }

    #[wasm_bindgen]
    pub fn add_ground(&mut self, height: f32, restitution: f32, friction: f32) {
        self.solver.add_ground_constraint(height, restitution, friction);
    }

    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.solver.reset();
        self.write_gpu_output();
    }

    #[wasm_bindgen]
    pub fn pin(&mut self, index: usize) -> bool {
        self.solver.pin(index)
    }

    #[wasm_bindgen]
    pub fn unpin(&mut self, index: usize) -> bool {
        self.solver.unpin(index)
    }

    #[wasm_bindgen]
    pub fn get_gpu_buffer_ptr(&self) -> *const f32 {
        self.gpu_buffer.as_ptr() as *const f32
    }

    #[wasm_bindgen]
    pub fn get_gpu_buffer_byte_length(&self) -> usize {
        self.gpu_buffer.len() * std::mem::size_of::<GpuVertex>()
    }

    #[wasm_bindgen]
    pub fn vertex_count(&self) -> usize {
        self.solver.vertex_count()
    }

    #[wasm_bindgen]
    pub fn active_particle_count(&self) -> u32 {
        self.solver.stats().active_particle_count
    }

    #[wasm_bindgen]
    pub fn broken_constraint_count(&self) -> u32 {
        self.solver.stats().broken_constraint_count
    }

    #[wasm_bindgen]
    pub fn is_fractured(&self) -> bool {
        self.solver.is_fractured()
    }

    /// Solver statistics packed as
    /// `[particles, active particles, constraints, active constraints, broken,
    ///   solve ms, iterations, substeps, divergence resets, nan recoveries, fractured]`.
    #[wasm_bindgen]
    pub fn stats(&self) -> Vec<f32> {
        let s = self.solver.stats();
        vec![
            s.particle_count as f32,
            s.active_particle_count as f32,
            s.constraint_count as f32,
            s.active_constraint_count as f32,
            s.broken_constraint_count as f32,
            s.last_solve_time_ms,
            s.last_iterations_used as f32,
            s.last_substeps_used as f32,
            s.divergence_resets as f32,
            s.nan_recoveries as f32,
            if s.is_fractured { 1.0 } else { 0.0 },
        ]
    }
}

impl SoftBodyWorld {
    fn build(
        vertices: &[f32],
        triangles: &[u32],
        total_mass: f32,
        config: SoftBodyConfig,
    ) -> Result<SoftBodyWorld, JsValue> {
        if vertices.len() % 3 != 0 {
            return Err(JsValue::from_str(&format!(
                "vertex array has length {}, expected a multiple of 3",
                vertices.len()
            )));
        }
        let points: Vec<Vec3> = vertices
            .chunks_exact(3)
            .map(|c| Vec3::new(c[0], c[1], c[2]))
            .collect();

        let solver = SoftBodySolver::initialize(&points, triangles, total_mass, config)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;

        web_sys::console::log_1(
            &format!(
                "WASM SoftBodyWorld created: {} particles, {} constraints",
                solver.stats().particle_count,
                solver.stats().constraint_count
            )
            .into(),
        );

        let gpu_buffer = vec![
            GpuVertex {
                position: [0.0; 3],
                stress: 0.0,
            };
            solver.vertex_count()
        ];
        let mut world = SoftBodyWorld { solver, gpu_buffer };
        world.write_gpu_output();
        Ok(world)
    }

    fn write_gpu_output(&mut self) {
        let particles = self.solver.particles();
        for (i, pos) in self.solver.mesh_positions().iter().enumerate() {
            self.gpu_buffer[i] = GpuVertex {
                position: pos.to_array(),
                stress: particles.stress[i],
            };
        }
    }
}
