use glam::{Mat3, Vec3};
use softbody_core::constraints::shape_memory::body_frame;
use softbody_core::constraints::{
    solve_order, BodyFrame, Constraint, ConstraintKind, ConstraintPhase, Projection,
    SolveContext,
};
use softbody_core::math::tetrahedron_volume;
use softbody_core::particle::ParticleSet;

const DT: f32 = 1.0 / 240.0;

fn pair(a: Vec3, b: Vec3) -> ParticleSet {
    ParticleSet::from_positions(&[a, b], 1.0)
}

fn length(p: &ParticleSet, a: usize, b: usize) -> f32 {
    (p.predicted[a] - p.predicted[b]).length()
}

fn unit_tetrahedron() -> ParticleSet {
    ParticleSet::from_positions(
        &[
            Vec3::ZERO,
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ],
        1.0,
    )
}

#[test]
fn test_rigid_distance_converges_in_one_pass() {
    let mut p = pair(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
    let mut c = Constraint::distance(&p, 0, 1, 0.0);
    p.predicted[1] = Vec3::new(1.5, 0.0, 0.0);

    let result = c.project(&mut p, &SolveContext::new(DT));
    assert_eq!(result, Projection::Solved);
    assert!(
        (length(&p, 0, 1) - 1.0).abs() < 1e-5,
        "length after one rigid pass: {}",
        length(&p, 0, 1)
    );
}

#[test]
fn test_compliant_distance_converges_to_xpbd_fixed_point() {
    let compliance = 1e-4;
    let mut p = pair(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
    let mut c = Constraint::distance(&p, 0, 1, compliance);
    p.predicted[1] = Vec3::new(1.4, 0.0, 0.0);

    let ctx = SolveContext::new(DT);
    let alpha_tilde = compliance / (DT * DT);
    let initial_error = (length(&p, 0, 1) - 1.0).abs();
    let mut previous_error = initial_error;
    for _ in 0..30 {
        c.project(&mut p, &ctx);
        let error = (length(&p, 0, 1) - 1.0).abs();
        assert!(error <= previous_error + 1e-6, "error grew: {} -> {}", previous_error, error);
        previous_error = error;
    }

    let residual = (length(&p, 0, 1) - 1.0) + alpha_tilde * c.lambda;
    assert!(residual.abs() < 1e-4, "XPBD residual C + alpha*lambda = {}", residual);
    assert!(previous_error < initial_error);
}

#[test]
fn test_distance_correction_is_mass_weighted() {
    let mut p = pair(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
    p.set_mass(0, 3.0);
    p.set_mass(1, 1.0);
    let mut c = Constraint::distance(&p, 0, 1, 0.0);
    p.predicted[1] = Vec3::new(2.0, 0.0, 0.0);
    let before = p.predicted.clone();

    c.project(&mut p, &SolveContext::new(DT));

    let da = p.predicted[0] - before[0];
    let db = p.predicted[1] - before[1];
    let momentum = da * 3.0 + db * 1.0;
    assert!(momentum.length() < 1e-5, "mass-weighted corrections must cancel: {:?}", momentum);
    assert!((db.length() / da.length() - 3.0).abs() < 1e-4, "lighter particle moves 3x further");
}

#[test]
fn test_satisfied_or_immovable_constraints_are_fixed_points() {
    // Satisfied
    let mut p = pair(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
    let mut c = Constraint::distance(&p, 0, 1, 0.0);
    let before = p.predicted.clone();
    c.project(&mut p, &SolveContext::new(DT));
    assert_eq!(p.predicted, before);

    // Violated, but both ends have zero inverse mass
    p.fix(0);
    p.fix(1);
    p.predicted[1] = Vec3::new(3.0, 0.0, 0.0);
    let before = p.predicted.clone();
    assert_eq!(c.project(&mut p, &SolveContext::new(DT)), Projection::Skipped);
    assert_eq!(p.predicted, before);
}

#[test]
fn test_degenerate_rest_length_is_clamped() {
    let p = pair(Vec3::ZERO, Vec3::ZERO);
    let c = Constraint::distance(&p, 0, 1, 0.0);
    match &c.kind {
        ConstraintKind::Distance(d) => assert!(d.rest_length > 0.0),
        other => panic!("expected distance constraint, got {:?}", other),
    }
}

#[test]
fn test_hard_break_exactly_when_strain_exceeds_threshold() {
    let mut p = pair(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
    p.fix(0);
    let mut c = Constraint::distance_with_rest(0, 1, 1.0, 1e-2).breakable(0.5);
    let ctx = SolveContext::new(DT);

    // Strain is raised step by step; the break must happen on the first
    // step above the threshold and never before.
    let strains = [0.1, 0.2, 0.3, 0.4, 0.45, 0.5, 0.55, 0.6];
    let mut broke_at = None;
    for (step, &strain) in strains.iter().enumerate() {
        p.predicted[1] = Vec3::new(1.0 + strain, 0.0, 0.0);
        if c.project(&mut p, &ctx) == Projection::Broken {
            broke_at = Some(step);
            break;
        }
        assert!(c.active);
    }

    assert_eq!(broke_at, Some(6), "should break at strain 0.55, the first above 0.5");
    assert!(!c.active);
    assert_eq!(c.project(&mut p, &ctx), Projection::Skipped);

    c.restore();
    assert!(c.active);
    assert_eq!(c.current_stress, 0.0);
}

#[test]
fn test_ground_and_shape_memory_never_break() {
    let ground = Constraint::ground(0.0, 0.5, 0.5).breakable(0.1);
    assert!(!ground.can_break);
    let shape = Constraint::shape_memory(0, Vec3::ZERO, 0.1).breakable(0.1);
    assert!(!shape.can_break);
}

#[test]
fn test_tetrahedron_restores_volume() {
    let mut p = unit_tetrahedron();
    let mut c = Constraint::tetrahedron(&p, [0, 1, 2, 3], 0.0);
    let rest = 1.0 / 6.0;

    p.predicted[3] = Vec3::new(0.0, 0.0, 0.6);
    let ctx = SolveContext::new(DT);
    for _ in 0..20 {
        c.project(&mut p, &ctx);
    }

    let v = tetrahedron_volume(p.predicted[0], p.predicted[1], p.predicted[2], p.predicted[3]);
    assert!((v - rest).abs() / rest < 1e-3, "volume {} should return to {}", v, rest);
}

#[test]
fn test_tetrahedron_preserves_momentum() {
    let mut p = unit_tetrahedron();
    p.set_mass(2, 4.0);
    let mut c = Constraint::tetrahedron(&p, [0, 1, 2, 3], 0.0);
    p.predicted[3] = Vec3::new(0.1, 0.1, 1.5);
    let before: Vec<Vec3> = p.predicted.clone();

    c.project(&mut p, &SolveContext::new(DT));

    let masses = [1.0, 1.0, 4.0, 1.0];
    let momentum: Vec3 = (0..4).map(|i| (p.predicted[i] - before[i]) * masses[i]).sum();
    assert!(momentum.length() < 1e-5, "momentum drift {:?}", momentum);
}

#[test]
fn test_radial_volume_pushes_outward_when_compressed() {
    let positions: Vec<Vec3> = [
        Vec3::X,
        Vec3::NEG_X,
        Vec3::Y,
        Vec3::NEG_Y,
        Vec3::Z,
        Vec3::NEG_Z,
    ]
    .to_vec();
    let mut p = ParticleSet::from_positions(&positions, 1.0);
    let mut c = Constraint::radial_volume(&p, (0..6).collect(), 0.0);
    for i in 0..6 {
        p.predicted[i] *= 0.5;
    }

    let ctx = SolveContext::new(DT);
    for _ in 0..5 {
        c.project(&mut p, &ctx);
    }
    for i in 0..6 {
        let r = p.predicted[i].length();
        assert!((r - 1.0).abs() < 1e-3, "particle {} radius {}", i, r);
    }
}

#[test]
fn test_ground_lifts_and_records_contact() {
    let mut p = pair(Vec3::new(0.0, 0.1, 0.0), Vec3::new(1.0, 2.0, 0.0));
    p.velocity[0] = Vec3::new(1.0, -3.0, 0.0);
    p.predicted[0] = Vec3::new(0.0, -0.2, 0.0);
    let mut c = Constraint::ground(0.0, 0.5, 0.25);

    let mut ctx = SolveContext::new(DT);
    ctx.impact_stress_scale = 1.0;
    assert_eq!(c.project(&mut p, &ctx), Projection::Solved);

    assert_eq!(p.predicted[0].y, 0.0);
    let contact = p.contact[0].expect("contact recorded");
    assert_eq!(contact.restitution, 0.5);
    assert_eq!(contact.friction, 0.25);
    assert_eq!(contact.incoming_velocity, Vec3::new(1.0, -3.0, 0.0));
    assert!((p.stress[0] - 3.0).abs() < 1e-6, "impact stress {}", p.stress[0]);
    assert!(p.contact[1].is_none());

    // Second pass in the same substep keeps the first contact.
    p.velocity[0] = Vec3::ZERO;
    p.predicted[0].y = -0.1;
    c.project(&mut p, &ctx);
    assert_eq!(p.contact[0].map(|c| c.incoming_velocity.y), Some(-3.0));
    assert!((p.stress[0] - 3.0).abs() < 1e-6, "impact stress counted once");
}

#[test]
fn test_shape_memory_pulls_by_stiffness() {
    let mut p = pair(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
    let mut c = Constraint::shape_memory(1, Vec3::new(1.0, 0.0, 0.0), 0.25);
    p.predicted[1] = Vec3::new(3.0, 0.0, 0.0);

    let mut ctx = SolveContext::new(DT);
    ctx.frame = BodyFrame {
        center: Vec3::ZERO,
        rotation: Mat3::IDENTITY,
    };
    c.project(&mut p, &ctx);
    // Goal is x = 1; a quarter of the 2.0 gap is closed.
    assert!((p.predicted[1].x - 2.5).abs() < 1e-6, "x = {}", p.predicted[1].x);
}

#[test]
fn test_body_frame_tracks_rotation() {
    let rest = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
    let mut p = ParticleSet::from_positions(&rest, 1.0);
    let shape: Vec<_> = (0..6)
        .map(|i| match Constraint::shape_memory(i, rest[i as usize], 0.1).kind {
            ConstraintKind::ShapeMemory(s) => s,
            _ => unreachable!(),
        })
        .collect();

    let rotation = Mat3::from_rotation_y(0.7);
    let offset = Vec3::new(2.0, 1.0, 0.0);
    for i in 0..6 {
        p.predicted[i] = rotation * rest[i] + offset;
    }

    let frame = body_frame(&p, &shape, true);
    assert!((frame.center - offset).length() < 1e-5);
    let diff = frame.rotation - rotation;
    let err: f32 = diff.to_cols_array().iter().map(|x| x.abs()).sum();
    assert!(err < 1e-3, "recovered rotation off by {}", err);

    let fixed = body_frame(&p, &shape, false);
    assert_eq!(fixed.rotation, Mat3::IDENTITY);
}

#[test]
fn test_solve_order_groups_by_phase_then_creation() {
    let p = unit_tetrahedron();
    let constraints = vec![
        Constraint::shape_memory(0, Vec3::ZERO, 0.02),
        Constraint::distance(&p, 0, 1, 0.0),
        Constraint::tetrahedron(&p, [0, 1, 2, 3], 0.0),
        Constraint::ground(0.0, 0.5, 0.5),
        Constraint::distance(&p, 1, 2, 0.0),
    ];
    let order = solve_order(&constraints);
    assert_eq!(order, vec![3, 1, 4, 2, 0]);
    let phases: Vec<ConstraintPhase> = order.iter().map(|&i| constraints[i as usize].phase()).collect();
    assert!(phases.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn test_plastic_creep_is_bounded_and_restorable() {
    let mut p = pair(Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0));
    let mut c = Constraint::distance(&p, 0, 1, 0.0);
    p.position[1] = Vec3::new(2.0, 0.0, 0.0);

    if let ConstraintKind::Distance(d) = &mut c.kind {
        for _ in 0..100 {
            d.apply_plasticity(&p, 0.1, 0.5, 0.3);
        }
        assert!(
            (d.rest_length - 1.3).abs() < 1e-5,
            "rest length should saturate at the plastic limit, got {}",
            d.rest_length
        );
    }

    c.restore();
    match &c.kind {
        ConstraintKind::Distance(d) => assert_eq!(d.rest_length, 1.0),
        _ => unreachable!(),
    }
}
