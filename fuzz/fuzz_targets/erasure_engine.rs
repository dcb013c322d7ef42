use eid_layers::{apply_erasures, Frame, FrameTag, LayerFlag, LayerTopology, Mode};
use honggfuzz::fuzz;

fn main() {
    let topology = match LayerTopology::new(vec![2, 5, 8, 13]) {
        Ok(t) => t,
        Err(_) => return,
    };
    loop {
        fuzz!(|data: &[u8]| {
            if data.len() < 3 {
                return;
            }
            let tag = FrameTag::from_word(u16::from_le_bytes([data[0], data[1]]));
            let reach = data[2] as usize % (topology.layer_count() + 1);
            let len = if reach == 0 { 0 } else { topology.upper(reach - 1) };
            let bits: Vec<u16> = data[3..].iter().take(len).map(|&b| b as u16).collect();
            if bits.len() < len {
                return;
            }
            let flags: Vec<LayerFlag> = (0..topology.layer_count())
                .map(|i| {
                    if data[2] >> (4 + i) & 1 == 1 {
                        LayerFlag::Erased
                    } else {
                        LayerFlag::Intact
                    }
                })
                .collect();
            let input = Frame::new(tag, bits);
            for mode in [Mode::Layered, Mode::Individual] {
                let mut out = Frame::default();
                let outcome = apply_erasures(&input, &flags, &topology, mode, &mut out);
                if let Ok(outcome) = outcome {
                    assert!(topology.is_boundary(out.len()));
                    assert!(out.len() <= input.len());
                    assert_eq!(outcome.disturbed(), !outcome.applied.is_empty());
                }
            }
        });
    }
}
