use std::io::Cursor;

use eid_layers::{detect_format, probe_sync_header, FrameReader, Framing, StreamKind};
use honggfuzz::fuzz;

fn main() {
    loop {
        fuzz!(|data: &[u8]| {
            let mut cur = Cursor::new(data);
            let Ok(detected) = detect_format(&mut cur) else {
                return;
            };
            let codec = detected.encoding.codec();
            let framing = match detected.kind {
                StreamKind::Tagged => match probe_sync_header(&mut cur, codec.as_ref()) {
                    Ok(true) => Framing::Headered,
                    _ => return,
                },
                StreamKind::SoftBits => Framing::Headerless { frame_len: 160 },
            };
            let mut reader = FrameReader::new(cur, codec, framing);
            while let Ok(Some(frame)) = reader.read_frame() {
                assert!(frame.len() <= u16::MAX as usize);
            }
        });
    }
}
