use approx::assert_abs_diff_eq;
use partview_core::{
    parse_stored_model_json, AnimationStatus, EventFilter, EventType, RecordingRenderer, Viewer,
    ViewerError,
};

const TOL: f32 = 1e-4;

fn viewer_with(name: &str) -> (Viewer, RecordingRenderer) {
    let json = partview_test_fixtures::models::json(name).unwrap();
    let (model, sections) = parse_stored_model_json(&json).unwrap();
    let mut viewer = Viewer::default();
    let mut renderer = RecordingRenderer::new();
    viewer
        .complete_model_load(&mut renderer, model, sections)
        .unwrap();
    (viewer, renderer)
}

fn run_to_completion(viewer: &mut Viewer, renderer: &mut RecordingRenderer, step_s: f32) {
    while viewer.is_animating() {
        viewer.tick(step_s, renderer);
    }
}

#[test]
fn test_disassemble_displaces_leaves_outward() {
    let (mut viewer, mut renderer) = viewer_with("simple-assembly");

    viewer.disassemble(1000.0).unwrap();
    assert_eq!(viewer.animation_status(), AnimationStatus::Disassembling);
    run_to_completion(&mut viewer, &mut renderer, 0.25);

    assert_eq!(viewer.animation_status(), AnimationStatus::Idle);
    assert_abs_diff_eq!(viewer.animation_progress(), 1.0, epsilon = TOL);

    // Leaf centers are (-1,0,0) and (1,0,0); the centroid is the origin,
    // so with spread 1.5 each leaf ends 2.5 from rest (-1 resp. 1).
    let a = viewer.section_pose("a").unwrap();
    assert_abs_diff_eq!(a.translation[0], -2.5, epsilon = TOL);
    let b = viewer.section_pose("b").unwrap();
    assert_abs_diff_eq!(b.translation[0], 2.5, epsilon = TOL);

    // The root group's leaf displacements cancel out; it stays put.
    let root = viewer.section_pose("root").unwrap();
    assert_abs_diff_eq!(root.translation[0], 0.0, epsilon = TOL);

    let completions = viewer.recent_events(&EventFilter {
        event_type: Some(EventType::AnimationComplete),
        ..Default::default()
    });
    assert_eq!(completions.len(), 1);
}

#[test]
fn test_disassemble_while_animating_is_rejected() {
    let (mut viewer, mut renderer) = viewer_with("simple-assembly");
    viewer.disassemble(1000.0).unwrap();
    viewer.tick(0.1, &mut renderer);

    assert!(matches!(
        viewer.disassemble(1000.0),
        Err(ViewerError::AlreadyAnimating { .. })
    ));
    assert!(matches!(
        viewer.reassemble(1000.0),
        Err(ViewerError::AlreadyAnimating { .. })
    ));
}

#[test]
fn test_reassemble_returns_to_rest() {
    let (mut viewer, mut renderer) = viewer_with("simple-assembly");
    viewer.disassemble(1000.0).unwrap();
    run_to_completion(&mut viewer, &mut renderer, 0.25);

    viewer.reassemble(800.0).unwrap();
    assert_eq!(viewer.animation_status(), AnimationStatus::Reassembling);
    run_to_completion(&mut viewer, &mut renderer, 0.2);

    for (id, rest_x) in [("root", 0.0f32), ("a", -1.0), ("b", 1.0)] {
        let pose = viewer.section_pose(id).unwrap();
        assert_abs_diff_eq!(pose.translation[0], rest_x, epsilon = TOL);
        assert_abs_diff_eq!(pose.translation[1], 0.0, epsilon = TOL);
        assert_abs_diff_eq!(pose.translation[2], 0.0, epsilon = TOL);
    }
}

#[test]
fn test_reassemble_without_prior_disassemble_is_defined() {
    let (mut viewer, mut renderer) = viewer_with("simple-assembly");
    viewer.reassemble(500.0).unwrap();
    run_to_completion(&mut viewer, &mut renderer, 0.1);

    assert_eq!(viewer.animation_status(), AnimationStatus::Idle);
    let a = viewer.section_pose("a").unwrap();
    assert_abs_diff_eq!(a.translation[0], -1.0, epsilon = TOL);
}

#[test]
fn test_stop_freezes_current_pose() {
    let (mut viewer, mut renderer) = viewer_with("simple-assembly");
    viewer.disassemble(1000.0).unwrap();
    viewer.tick(0.25, &mut renderer);

    let frozen = viewer.section_pose("a").unwrap();
    assert!(frozen.translation[0] < -1.0 && frozen.translation[0] > -2.5);

    viewer.stop_animation();
    assert_eq!(viewer.animation_status(), AnimationStatus::Idle);

    // Further ticks must not move anything.
    let calls = renderer.transform_call_count();
    viewer.tick(0.5, &mut renderer);
    viewer.tick(0.5, &mut renderer);
    assert_eq!(renderer.transform_call_count(), calls);
    assert_eq!(viewer.section_pose("a").unwrap(), frozen);

    // Stop is a cancellation, not a completion.
    let completions = viewer.recent_events(&EventFilter {
        event_type: Some(EventType::AnimationComplete),
        ..Default::default()
    });
    assert!(completions.is_empty());
}

#[test]
fn test_reassemble_resumes_from_frozen_pose() {
    let (mut viewer, mut renderer) = viewer_with("simple-assembly");
    viewer.disassemble(1000.0).unwrap();
    viewer.tick(0.25, &mut renderer);
    viewer.stop_animation();

    viewer.reassemble(500.0).unwrap();
    run_to_completion(&mut viewer, &mut renderer, 0.1);

    let a = viewer.section_pose("a").unwrap();
    assert_abs_diff_eq!(a.translation[0], -1.0, epsilon = TOL);
    let applied = renderer.transform("a").unwrap();
    assert_abs_diff_eq!(applied.translation[0], -1.0, epsilon = TOL);
}

#[test]
fn test_animation_leaves_no_undo_steps() {
    let (mut viewer, mut renderer) = viewer_with("simple-assembly");

    viewer.disassemble(1000.0).unwrap();
    run_to_completion(&mut viewer, &mut renderer, 0.25);
    viewer.reassemble(1000.0).unwrap();
    run_to_completion(&mut viewer, &mut renderer, 0.25);

    // Nothing is undoable: the load started a fresh timeline and the
    // runs wrote through the transient path only.
    assert!(!viewer.can_undo());
    assert!(matches!(viewer.undo(), Err(ViewerError::NoHistory)));
}

#[test]
fn test_progress_updates_are_throttled() {
    let (mut viewer, mut renderer) = viewer_with("simple-assembly");
    let state_updates = |viewer: &Viewer| {
        viewer
            .recent_events(&EventFilter {
                event_type: Some(EventType::StateUpdate),
                ..Default::default()
            })
            .len()
    };

    // One from the load, one from entering Disassembling.
    viewer.disassemble(1000.0).unwrap();
    assert_eq!(state_updates(&viewer), 2);

    // 1% progress: below the 5% publish step, nothing announced.
    viewer.tick(0.01, &mut renderer);
    assert_eq!(state_updates(&viewer), 2);

    // 6% cumulative progress crosses the step.
    viewer.tick(0.05, &mut renderer);
    assert_eq!(state_updates(&viewer), 3);

    // But poses advance every tick regardless of throttling.
    let a = viewer.section_pose("a").unwrap();
    assert!(a.translation[0] < -1.0);
}

#[test]
fn test_animation_requires_an_active_model() {
    let mut viewer = Viewer::default();
    assert!(matches!(
        viewer.disassemble(1000.0),
        Err(ViewerError::NoActiveModel)
    ));
    assert!(matches!(
        viewer.reassemble(1000.0),
        Err(ViewerError::NoActiveModel)
    ));

    let errors = viewer.recent_events(&EventFilter {
        event_type: Some(EventType::Error),
        ..Default::default()
    });
    assert_eq!(errors.len(), 2);
}

#[test]
fn test_group_sections_follow_their_leaves() {
    let (mut viewer, mut renderer) = viewer_with("gearbox");
    viewer.disassemble(1000.0).unwrap();
    run_to_completion(&mut viewer, &mut renderer, 0.25);

    // Every leaf moved away from its rest pose.
    let json = partview_test_fixtures::models::json("gearbox").unwrap();
    let (_, sections) = parse_stored_model_json(&json).unwrap();
    for id in ["casing", "gear-primary", "gear-secondary", "shaft"] {
        let pose = viewer.section_pose(id).unwrap();
        let rest = sections.iter().find(|s| s.id == id).unwrap().rest_transform;
        assert!(
            !pose.approx_eq(&rest, 1e-3),
            "leaf {id} should be displaced from rest"
        );
    }
}
