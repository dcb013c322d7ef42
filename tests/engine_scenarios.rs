use eid_layers::{
    apply_erasures, DamageAccounting, ErasureEngine, Frame, FrameTag, LayerFlag, LayerTopology,
    Mode, G192_ONE, SOFT_ERASED,
};
use LayerFlag::{Erased, Intact};

fn two_layers() -> LayerTopology {
    LayerTopology::new(vec![2, 4]).unwrap()
}

fn all_ones(len: usize) -> Frame {
    Frame::new(FrameTag::Sync, vec![G192_ONE; len])
}

fn damage(topology: &LayerTopology, input: &Frame, flags: &[LayerFlag], mode: Mode) -> Frame {
    let mut out = Frame::default();
    apply_erasures(input, flags, topology, mode, &mut out).unwrap();
    out
}

#[test]
fn erased_base_layer_empties_the_frame() {
    let out = damage(&two_layers(), &all_ones(4), &[Erased, Intact], Mode::Layered);
    assert_eq!(out.tag, FrameTag::Fer);
    assert_eq!(out.len(), 0);
}

#[test]
fn erased_top_layer_leaves_good_shorter_frame() {
    let out = damage(&two_layers(), &all_ones(4), &[Intact, Erased], Mode::Layered);
    assert_eq!(out.tag, FrameTag::Sync);
    assert_eq!(out, all_ones(2));
}

#[test]
fn individual_mode_still_cuts_an_erased_top_layer() {
    let out = damage(&two_layers(), &all_ones(4), &[Intact, Erased], Mode::Individual);
    assert_eq!(out.tag, FrameTag::Sync);
    assert_eq!(out.len(), 2);
}

#[test]
fn individual_mode_blanks_an_intermediate_layer() {
    let topology = LayerTopology::new(vec![2, 4, 6]).unwrap();
    let out = damage(&topology, &all_ones(6), &[Intact, Erased, Intact], Mode::Individual);
    assert_eq!(out.tag, FrameTag::Fer);
    assert_eq!(out.len(), 6);
    assert_eq!(out.bits, vec![G192_ONE, G192_ONE, SOFT_ERASED, SOFT_ERASED, G192_ONE, G192_ONE]);

    let layered = damage(&topology, &all_ones(6), &[Intact, Erased, Intact], Mode::Layered);
    assert_eq!(layered, all_ones(2));
}

#[test]
fn no_data_frames_never_count_as_damage() {
    let topology = two_layers();
    let mut engine = ErasureEngine::new(topology.clone(), Mode::Layered);
    let mut acc = DamageAccounting::new(topology.layer_count());
    let no_data = Frame::new(FrameTag::Sync, Vec::new());

    acc.record_input(&no_data);
    let (out, outcome) = engine.process(&no_data, &[Erased, Erased]).unwrap();
    assert!(out.is_no_data());
    assert!(outcome.applied.is_empty());
    assert!(outcome.cumulative.is_empty());
    assert!(!outcome.disturbed());
    acc.record_outcome(&outcome);
    acc.record_output(out);

    let rates = acc.rates().unwrap();
    assert_eq!(acc.disturbed(), 0);
    assert_eq!(rates.fer_out_pct, 0.0);
    assert_eq!(rates.no_data_out_pct, 100.0);
    assert_eq!(acc.cumulative(), &[0, 0]);
}

#[test]
fn incoming_erasure_counts_as_existing_damage_only() {
    let topology = two_layers();
    let mut engine = ErasureEngine::new(topology, Mode::Layered);
    let lost = Frame::new(FrameTag::Fer, Vec::new());
    let (out, outcome) = engine.process(&lost, &[Intact, Intact]).unwrap();
    assert_eq!(out.tag, FrameTag::Fer);
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.cumulative.len(), 2);
}

#[test]
fn cascade_attributes_truncated_intact_layers() {
    let topology = LayerTopology::new(vec![2, 4, 6, 8]).unwrap();
    let mut out = Frame::default();
    let outcome = apply_erasures(
        &all_ones(8),
        &[Intact, Erased, Intact, Erased],
        &topology,
        Mode::Layered,
        &mut out,
    )
    .unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(outcome.first_truncated, Some(1));
    assert_eq!(outcome.applied.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
    assert_eq!(outcome.cumulative.iter().collect::<Vec<_>>(), vec![1, 2, 3]);
}

#[test]
fn blank_input_layer_is_counted_in_output_damage() {
    // Layer 1 already arrives blank from an earlier pass.
    let topology = LayerTopology::new(vec![2, 4, 6]).unwrap();
    let input = Frame::new(
        FrameTag::Fer,
        vec![G192_ONE, G192_ONE, SOFT_ERASED, SOFT_ERASED, G192_ONE, G192_ONE],
    );
    let mut out = Frame::default();
    let outcome =
        apply_erasures(&input, &[Intact; 3], &topology, Mode::Individual, &mut out).unwrap();
    assert_eq!(out, input);
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.cumulative.iter().collect::<Vec<_>>(), vec![1]);
}
