// Interop vectors: deltas produced by the reference xdelta3 encoder must
// decode to the same bytes here as they do in xdelta3 itself.

use vcdecode::vcdiff::decode_memory;

#[derive(Debug)]
struct Vector {
    name: &'static str,
    source: Vec<u8>,
    target: Vec<u8>,
}

fn lcg(seed: u32, n: usize) -> Vec<u8> {
    let mut x = seed;
    (0..n)
        .map(|_| {
            x = x.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (x >> 16) as u8
        })
        .collect()
}

fn vectors() -> Vec<Vector> {
    let text = b"The quick brown fox jumps over the lazy dog. ".repeat(40);
    let mut edited = text.clone();
    edited[100..110].copy_from_slice(b"0123456789");
    edited.extend_from_slice(b"and then some");

    let random = lcg(7, 64 * 1024);
    let mut shuffled = random[32 * 1024..].to_vec();
    shuffled.extend_from_slice(&random[..32 * 1024]);

    let mut sparse = random.clone();
    for i in (0..sparse.len()).step_by(997) {
        sparse[i] ^= 0x5A;
    }

    vec![
        Vector {
            name: "no_source",
            source: Vec::new(),
            target: b"standalone data without any source".to_vec(),
        },
        Vector {
            name: "identical",
            source: text.clone(),
            target: text.clone(),
        },
        Vector {
            name: "text_edit",
            source: text.clone(),
            target: edited,
        },
        Vector {
            name: "self_repeating",
            source: Vec::new(),
            target: b"abcabcabcabcabcabcabcabcabcabcabcabcabcabc".repeat(50),
        },
        Vector {
            name: "long_run",
            source: b"xyz".to_vec(),
            target: vec![0u8; 100_000],
        },
        Vector {
            name: "rotated_blocks",
            source: random.clone(),
            target: shuffled,
        },
        Vector {
            name: "sparse_mutation",
            source: random.clone(),
            target: sparse,
        },
        Vector {
            name: "unrelated",
            source: lcg(1, 10_000),
            target: lcg(2, 10_000),
        },
    ]
}

#[test]
fn xdelta_encode_decodes_all_vectors() {
    for v in vectors() {
        let delta = xdelta3::encode(&v.target, &v.source)
            .unwrap_or_else(|| panic!("xdelta encode failed for {}", v.name));
        let decoded =
            decode_memory(&delta, &v.source).unwrap_or_else(|e| panic!("vector {}: {e}", v.name));
        assert_eq!(decoded, v.target, "vector {}", v.name);
    }
}

#[test]
fn agrees_with_xdelta_decoder() {
    for v in vectors() {
        let delta = xdelta3::encode(&v.target, &v.source).unwrap();
        let ours = decode_memory(&delta, &v.source).unwrap();
        let theirs = xdelta3::decode(&delta, &v.source).unwrap_or_default();
        assert_eq!(ours, theirs, "vector {}", v.name);
    }
}

#[test]
fn wrong_source_does_not_panic() {
    for v in vectors() {
        let delta = xdelta3::encode(&v.target, &v.source).unwrap();
        // Either an error or different bytes; never a panic.
        let _ = decode_memory(&delta, b"short");
    }
}

#[test]
fn fixed_stream_bytes() {
    // Source "abcdefgh", one VCD_SOURCE window:
    //   COPY 4 @0 (opcode 20), ADD "XY" (opcode 3), RUN 3 'Z' (opcode 0)
    let delta: &[u8] = &[
        0xD6, 0xC3, 0xC4, 0x00, // magic
        0x00, // header indicator
        0x01, 0x08, 0x00, // VCD_SOURCE, segment length 8, offset 0
        0x0D, // delta encoding length
        0x09, 0x00, // target window length, delta indicator
        0x03, 0x04, 0x01, // data, inst, addr lengths
        b'X', b'Y', b'Z', // data
        0x14, 0x03, 0x00, 0x03, // inst
        0x00, // addr
    ];
    assert_eq!(decode_memory(delta, b"abcdefgh").unwrap(), b"abcdXYZZZ");
}
